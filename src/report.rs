use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::{
    self, ClassifiedRecord, Outcome, StockStatus, SupplyPriority, Thresholds, TrendDirection,
};
use crate::models::{
    AdMonitoring, BrandAnalysis, CategoryAnalysis, OracleReport, ProductAnalysis, RankedProduct,
};

const UNKNOWN_BADGE: &str = "⚪ Unknown";

/// Group digits in threes with a thin space: `1234567` → `1 234 567`.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('\u{2009}');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "∞".to_string();
    }
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{}", group_digits(rounded.abs() as u64))
}

pub fn format_currency(value: f64) -> String {
    format!("{} ₽", format_number(value))
}

/// Signed percentage with one decimal; infinite growth renders as `+∞%`.
pub fn format_percent(value: f64) -> String {
    if value == f64::INFINITY {
        return "+∞%".to_string();
    }
    if value.is_nan() {
        return "n/a".to_string();
    }
    if value > 0.0 {
        format!("+{value:.1}%")
    } else {
        format!("{value:.1}%")
    }
}

pub fn format_days(days: f64) -> String {
    if days.is_finite() {
        format!("{days:.1}")
    } else {
        "∞".to_string()
    }
}

fn display_name(record: &ClassifiedRecord) -> String {
    match &record.record.name {
        Some(name) => format!("{} ({})", record.record.article, name),
        None => record.record.article.clone(),
    }
}

/// Order rows for replenishment: urgent first, then the shortest runway.
pub fn replenishment_order(records: &[ClassifiedRecord]) -> Vec<&ClassifiedRecord> {
    let mut classified: Vec<&ClassifiedRecord> = records
        .iter()
        .filter(|record| record.classification().is_some())
        .collect();
    classified.sort_by(|a, b| {
        let (a, b) = match (a.classification(), b.classification()) {
            (Some(a), Some(b)) => (a, b),
            _ => return std::cmp::Ordering::Equal,
        };
        a.supply_priority.cmp(&b.supply_priority).then(
            a.days_until_oos
                .partial_cmp(&b.days_until_oos)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    classified
}

pub fn status_counts(records: &[ClassifiedRecord]) -> [(StockStatus, usize); 3] {
    let mut counts = [
        (StockStatus::Critical, 0),
        (StockStatus::Warning, 0),
        (StockStatus::Good, 0),
    ];
    for classification in records.iter().filter_map(ClassifiedRecord::classification) {
        if let Some(entry) = counts
            .iter_mut()
            .find(|(status, _)| *status == classification.stock_status)
        {
            entry.1 += 1;
        }
    }
    counts
}

/// Terminal table for a classified batch.
pub fn render_stock_table(records: &[ClassifiedRecord]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<24} {:>8} {:>8} {:>8} {:<18} {:<20} {:<16} {:>8}",
        "article", "stock", "sales/d", "days", "status", "priority", "trend", "supply"
    );

    for record in records {
        match &record.outcome {
            Outcome::Classified(classification) => {
                let trend = match classification.sales_trend.percentage {
                    Some(percentage)
                        if classification.sales_trend.direction != TrendDirection::Unknown =>
                    {
                        format!(
                            "{} {}",
                            classification.sales_trend.direction.emoji(),
                            format_percent(percentage)
                        )
                    }
                    _ => format!(
                        "{} {}",
                        classification.sales_trend.direction.emoji(),
                        classification.sales_trend.direction.label()
                    ),
                };
                let _ = writeln!(
                    output,
                    "{:<24} {:>8} {:>8.2} {:>8} {:<18} {:<20} {:<16} {:>8}",
                    record.record.article,
                    record.record.current_stock,
                    record.record.daily_sales_rate,
                    format_days(classification.days_until_oos),
                    format!(
                        "{} {}",
                        classification.stock_status.emoji(),
                        classification.stock_status.label()
                    ),
                    format!(
                        "{} {}",
                        classification.supply_priority.emoji(),
                        classification.supply_priority.label()
                    ),
                    trend,
                    group_digits(classification.recommended_supply),
                );
            }
            Outcome::Unclassifiable(reason) => {
                let _ = writeln!(
                    output,
                    "{:<24} {:>8} {:>8.2} {:>8} {:<18} {}",
                    record.record.article,
                    record.record.current_stock,
                    record.record.daily_sales_rate,
                    "-",
                    UNKNOWN_BADGE,
                    reason
                );
            }
        }
    }

    output
}

/// Markdown supply report for a classified batch.
pub fn build_supply_report(
    generated_on: NaiveDate,
    target_stock_days: f64,
    backend_summary: Option<&str>,
    records: &[ClassifiedRecord],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Supply Planning Report");
    let _ = writeln!(
        output,
        "Generated on {} for a {}-day horizon ({} products)",
        generated_on,
        format_days(target_stock_days),
        records.len()
    );
    if let Some(summary) = backend_summary.filter(|summary| !summary.trim().is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(output, "> {}", summary.trim());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stock Status");
    for (status, count) in status_counts(records) {
        let _ = writeln!(output, "- {} {}: {}", status.emoji(), status.label(), count);
    }

    let ordered = replenishment_order(records);
    let to_order: Vec<_> = ordered
        .iter()
        .filter(|record| {
            record
                .classification()
                .is_some_and(|c| {
                    c.supply_priority != SupplyPriority::Low && c.recommended_supply > 0
                })
        })
        .collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Replenishment Plan");
    if to_order.is_empty() {
        let _ = writeln!(output, "No products need a supply in this horizon.");
    } else {
        let _ = writeln!(output, "| Article | Priority | Days left | Stock | Ship units |");
        let _ = writeln!(output, "|---|---|---|---|---|");
        let mut total_units = 0u64;
        for record in &to_order {
            if let Some(classification) = record.classification() {
                total_units += classification.recommended_supply;
                let _ = writeln!(
                    output,
                    "| {} | {} {} | {} | {} | {} |",
                    display_name(record),
                    classification.supply_priority.emoji(),
                    classification.supply_priority.label(),
                    format_days(classification.days_until_oos),
                    record.record.current_stock,
                    group_digits(classification.recommended_supply)
                );
            }
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "Total units to ship: {}", group_digits(total_units));
    }

    let growing: Vec<_> = records
        .iter()
        .filter(|record| {
            record
                .classification()
                .is_some_and(|c| c.sales_trend.direction == TrendDirection::Growth)
        })
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Sales Trends");
    if growing.is_empty() {
        let _ = writeln!(output, "No products with growing sales.");
    } else {
        for record in growing {
            if let Some(percentage) = record
                .classification()
                .and_then(|c| c.sales_trend.percentage)
            {
                let _ = writeln!(
                    output,
                    "- {} {}: {}",
                    TrendDirection::Growth.emoji(),
                    display_name(record),
                    format_percent(percentage)
                );
            }
        }
    }

    let unclassifiable: Vec<_> = records
        .iter()
        .filter_map(|record| match &record.outcome {
            Outcome::Unclassifiable(reason) => Some((record, reason)),
            Outcome::Classified(_) => None,
        })
        .collect();
    if !unclassifiable.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Unclassifiable Records");
        for (record, reason) in unclassifiable {
            let _ = writeln!(output, "- {} {}: {}", UNKNOWN_BADGE, display_name(record), reason);
        }
    }

    output
}

#[derive(Serialize)]
struct ExportRow<'a> {
    article: &'a str,
    name: &'a str,
    current_stock: i64,
    available_stock: i64,
    daily_sales_rate: f64,
    days_until_oos: String,
    stock_status: &'static str,
    supply_priority: &'static str,
    sales_trend: &'static str,
    trend_percent: String,
    recommended_supply: String,
    note: &'a str,
}

/// Write a classified batch as CSV.
pub fn export_csv(path: &Path, records: &[ClassifiedRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv_rows(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

fn write_csv_rows<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    records: &[ClassifiedRecord],
) -> anyhow::Result<()> {
    for record in records {
        let row = match &record.outcome {
            Outcome::Classified(classification) => ExportRow {
                article: &record.record.article,
                name: record.record.name.as_deref().unwrap_or(""),
                current_stock: record.record.current_stock,
                available_stock: record.record.available(),
                daily_sales_rate: record.record.daily_sales_rate,
                days_until_oos: format_days(classification.days_until_oos),
                stock_status: status_key(classification.stock_status),
                supply_priority: priority_key(classification.supply_priority),
                sales_trend: trend_key(classification.sales_trend.direction),
                trend_percent: classification
                    .sales_trend
                    .percentage
                    .map(format_percent)
                    .unwrap_or_default(),
                recommended_supply: classification.recommended_supply.to_string(),
                note: "",
            },
            Outcome::Unclassifiable(reason) => ExportRow {
                article: &record.record.article,
                name: record.record.name.as_deref().unwrap_or(""),
                current_stock: record.record.current_stock,
                available_stock: record.record.available(),
                daily_sales_rate: record.record.daily_sales_rate,
                days_until_oos: String::new(),
                stock_status: "unknown",
                supply_priority: "unknown",
                sales_trend: "unknown",
                trend_percent: String::new(),
                recommended_supply: String::new(),
                note: reason,
            },
        };
        writer.serialize(row)?;
    }
    Ok(())
}

fn status_key(status: StockStatus) -> &'static str {
    match status {
        StockStatus::Critical => "critical",
        StockStatus::Warning => "warning",
        StockStatus::Good => "good",
    }
}

fn priority_key(priority: SupplyPriority) -> &'static str {
    match priority {
        SupplyPriority::High => "high",
        SupplyPriority::Medium => "medium",
        SupplyPriority::Low => "low",
    }
}

fn trend_key(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Growth => "growth",
        TrendDirection::Decline => "decline",
        TrendDirection::Stable => "stable",
        TrendDirection::Unknown => "unknown",
    }
}

/// Fill in CTR/ROI the backend left out and sort by CTR, best first.
pub fn rank_ads(mut ads: Vec<AdMonitoring>) -> Vec<AdMonitoring> {
    for ad in &mut ads {
        if ad.ctr.is_none() {
            ad.ctr = classify::ctr_percent(ad.clicks, ad.views);
        }
        if ad.roi.is_none() {
            ad.roi = classify::roi_percent(ad.revenue, ad.spend);
        }
    }
    ads.sort_by(|a, b| {
        let a = a.ctr.unwrap_or(f64::NEG_INFINITY);
        let b = b.ctr.unwrap_or(f64::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
    ads
}

pub fn render_ads(ads: &[AdMonitoring]) -> String {
    let mut output = String::new();
    if ads.is_empty() {
        let _ = writeln!(output, "No campaigns found for these articles.");
        return output;
    }

    let _ = writeln!(output, "Campaigns by click-through rate:");
    for ad in ads {
        let _ = writeln!(
            output,
            "- {}{}: {} views, {} clicks (CTR {}), spend {}, revenue {}, ROI {}",
            ad.article,
            ad.campaign_name
                .as_deref()
                .map(|name| format!(" [{name}]"))
                .unwrap_or_default(),
            group_digits(ad.views),
            group_digits(ad.clicks),
            ad.ctr.map(format_percent_plain).unwrap_or_else(|| "n/a".to_string()),
            format_currency(ad.spend),
            format_currency(ad.revenue),
            ad.roi.map(format_percent).unwrap_or_else(|| "n/a".to_string()),
        );
    }
    output
}

fn format_percent_plain(value: f64) -> String {
    format!("{value:.2}%")
}

fn render_ranked(output: &mut String, products: &[RankedProduct]) {
    for (index, product) in products.iter().enumerate() {
        let _ = writeln!(
            output,
            "{:>3}. {} {}{}{}",
            index + 1,
            product.article.as_deref().unwrap_or("-"),
            product.name.as_deref().unwrap_or(""),
            product
                .price
                .map(|price| format!(" · {}", format_currency(price)))
                .unwrap_or_default(),
            product
                .revenue
                .map(|revenue| format!(" · revenue {}", format_currency(revenue)))
                .unwrap_or_default(),
        );
    }
}

pub fn render_product(product: &ProductAnalysis, thresholds: &Thresholds) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Product {}{}",
        product.article,
        product
            .name
            .as_deref()
            .map(|name| format!(": {name}"))
            .unwrap_or_default()
    );
    if let Some(brand) = &product.brand {
        let _ = writeln!(output, "  brand:   {brand}");
    }
    if let Some(price) = product.price {
        let _ = writeln!(output, "  price:   {}", format_currency(price));
    }
    if let Some(rating) = product.rating {
        let reviews = product
            .reviews_count
            .map(|count| format!(" ({} reviews)", group_digits(count)))
            .unwrap_or_default();
        let _ = writeln!(output, "  rating:  {rating:.1}{reviews}");
    }
    if let Some(sales) = product.sales {
        let _ = writeln!(output, "  sales:   {}", format_number(sales));
    }
    if let Some(revenue) = product.revenue {
        let _ = writeln!(output, "  revenue: {}", format_currency(revenue));
    }
    if let Some(stock) = product.stock {
        let status = thresholds
            .stock_status(stock, None)
            .map(|status| format!("{} {}", status.emoji(), status.label()))
            .unwrap_or_else(|_| UNKNOWN_BADGE.to_string());
        let _ = writeln!(output, "  stock:   {stock} {status}");
    }
    if !product.recommendations.is_empty() {
        let _ = writeln!(output, "Recommendations:");
        for recommendation in &product.recommendations {
            let _ = writeln!(output, "- {recommendation}");
        }
    }
    output
}

pub fn render_brand(brand: &BrandAnalysis) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Brand {}", brand.brand_name);
    if let Some(total) = brand.total_products {
        let _ = writeln!(output, "  products:      {}", group_digits(total));
    }
    if let Some(revenue) = brand.total_revenue {
        let _ = writeln!(output, "  revenue:       {}", format_currency(revenue));
    }
    if let Some(price) = brand.average_price {
        let _ = writeln!(output, "  average price: {}", format_currency(price));
    }
    if let Some(rating) = brand.average_rating {
        let _ = writeln!(output, "  rating:        {rating:.1}");
    }
    if !brand.top_products.is_empty() {
        let _ = writeln!(output, "Top products:");
        render_ranked(&mut output, &brand.top_products);
    }
    output
}

pub fn render_category(name: &str, category: &CategoryAnalysis) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Category {}{}",
        name,
        category
            .score
            .map(|score| format!(" (score {score:.1})"))
            .unwrap_or_default()
    );
    match &category.summary {
        Some(serde_json::Value::String(text)) => {
            let _ = writeln!(output, "{text}");
        }
        Some(serde_json::Value::Object(fields)) => {
            for (key, value) in fields {
                let _ = writeln!(output, "  {key}: {value}");
            }
        }
        Some(other) if !other.is_null() => {
            let _ = writeln!(output, "{other}");
        }
        _ => {}
    }
    if !category.pluses.is_empty() {
        let _ = writeln!(output, "Pluses:");
        for plus in &category.pluses {
            let _ = writeln!(output, "+ {plus}");
        }
    }
    if !category.minuses.is_empty() {
        let _ = writeln!(output, "Minuses:");
        for minus in &category.minuses {
            let _ = writeln!(output, "- {minus}");
        }
    }
    if !category.top_products.is_empty() {
        let _ = writeln!(output, "Top products:");
        render_ranked(&mut output, &category.top_products);
    }
    output
}

pub fn render_oracle(report: &OracleReport) -> String {
    let mut output = String::new();
    if report.main_results.is_empty() {
        let _ = writeln!(output, "No search queries matched these filters.");
    } else {
        let _ = writeln!(output, "Top search queries:");
        for (index, query) in report.main_results.iter().enumerate() {
            let _ = writeln!(
                output,
                "{:>3}. {}{}{}{}",
                query.rank.map(|rank| rank as usize).unwrap_or(index + 1),
                query.query,
                query
                    .frequency
                    .map(|frequency| format!(" · {} searches", group_digits(frequency)))
                    .unwrap_or_default(),
                query
                    .revenue
                    .map(|revenue| format!(" · revenue {}", format_currency(revenue)))
                    .unwrap_or_default(),
                query
                    .competition
                    .map(|competition| format!(" · competition {competition:.2}"))
                    .unwrap_or_default(),
            );
        }
    }
    if !report.detailed_results.is_empty() {
        let _ = writeln!(output, "{} detailed rows available.", report.detailed_results.len());
    }
    if let Some(summary) = report.summary.as_ref().filter(|summary| !summary.is_null()) {
        let _ = writeln!(output, "Summary: {summary}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockRecord;

    fn sample_batch() -> Vec<ClassifiedRecord> {
        let records = vec![
            StockRecord {
                article: "slow".to_string(),
                current_stock: 300,
                daily_sales_rate: 1.0,
                ..StockRecord::default()
            },
            StockRecord {
                article: "urgent".to_string(),
                name: Some("Ceramic mug".to_string()),
                current_stock: 6,
                daily_sales_rate: 3.0,
                sales_7d: Some(21.0),
                sales_prev_7d: Some(0.0),
                ..StockRecord::default()
            },
            StockRecord {
                article: "soon".to_string(),
                current_stock: 60,
                daily_sales_rate: 3.0,
                ..StockRecord::default()
            },
            StockRecord {
                article: "broken".to_string(),
                current_stock: -4,
                ..StockRecord::default()
            },
        ];
        Thresholds::default().classify_batch(&records, 30.0)
    }

    #[test]
    fn numbers_are_grouped() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1_234_567), "1\u{2009}234\u{2009}567");
        assert_eq!(format_currency(1500.4), "1\u{2009}500 ₽");
        assert_eq!(format_number(-2500.0), "-2\u{2009}500");
    }

    #[test]
    fn percentages_are_signed() {
        assert_eq!(format_percent(12.345), "+12.3%");
        assert_eq!(format_percent(-4.0), "-4.0%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(f64::INFINITY), "+∞%");
    }

    #[test]
    fn replenishment_order_puts_urgent_first() {
        let batch = sample_batch();
        let ordered: Vec<_> = replenishment_order(&batch)
            .into_iter()
            .map(|record| record.record.article.as_str())
            .collect();
        assert_eq!(ordered, vec!["urgent", "soon", "slow"]);
    }

    #[test]
    fn report_has_sections_and_flags_bad_rows() {
        let batch = sample_batch();
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let report = build_supply_report(date, 30.0, Some("3 of 4 products analysed"), &batch);

        assert!(report.starts_with("# Supply Planning Report"));
        assert!(report.contains("Generated on 2026-10-16 for a 30.0-day horizon (4 products)"));
        assert!(report.contains("> 3 of 4 products analysed"));
        assert!(report.contains("- 🟡 Low stock: 1"));
        assert!(report.contains("| urgent (Ceramic mug) | 🔥 Order now | 2.0 | 6 | 84 |"));
        assert!(report.contains("| soon | ⚠️ Plan a supply | 20.0 | 60 | 30 |"));
        assert!(!report.contains("| slow |"));
        assert!(report.contains("Total units to ship: 114"));
        assert!(report.contains("+∞%"));
        assert!(report.contains("## Unclassifiable Records"));
        assert!(report.contains("broken"));
    }

    #[test]
    fn table_renders_unknown_badge_for_bad_rows() {
        let table = render_stock_table(&sample_batch());
        assert_eq!(table.lines().count(), 5);
        assert!(table.contains(UNKNOWN_BADGE));
    }

    #[test]
    fn csv_export_writes_every_row() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_csv_rows(&mut writer, &sample_batch()).unwrap();
        let bytes = writer.into_inner().ok().expect("csv buffer");
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("article,name,current_stock"));
        assert!(lines[2].starts_with("urgent,Ceramic mug,6,6,3.0,2.0,warning,high,growth"));
        assert!(lines[4].contains("unknown"));
    }

    #[test]
    fn ads_are_ranked_by_ctr_with_roi() {
        let ads = rank_ads(vec![
            AdMonitoring {
                article: "low".to_string(),
                views: 1000,
                clicks: 10,
                spend: 500.0,
                revenue: 400.0,
                ..AdMonitoring::default()
            },
            AdMonitoring {
                article: "none".to_string(),
                ..AdMonitoring::default()
            },
            AdMonitoring {
                article: "high".to_string(),
                views: 1000,
                clicks: 50,
                spend: 1000.0,
                revenue: 3000.0,
                ..AdMonitoring::default()
            },
        ]);

        let order: Vec<_> = ads.iter().map(|ad| ad.article.as_str()).collect();
        assert_eq!(order, vec!["high", "low", "none"]);
        assert_eq!(ads[0].roi, Some(200.0));
        assert_eq!(ads[1].roi, Some(-20.0));
        assert_eq!(ads[2].ctr, None);
        assert!(render_ads(&ads).contains("ROI +200.0%"));
    }

    #[test]
    fn category_summary_text_is_printed() {
        let category = CategoryAnalysis {
            summary: Some(serde_json::Value::String("Steady demand".to_string())),
            pluses: vec!["Low returns".to_string()],
            score: Some(8.0),
            ..CategoryAnalysis::default()
        };
        let text = render_category("Mugs", &category);
        assert!(text.starts_with("Category Mugs (score 8.0)"));
        assert!(text.contains("Steady demand"));
        assert!(text.contains("+ Low returns"));
    }

    #[test]
    fn product_stock_badge_follows_configured_threshold() {
        let product = ProductAnalysis {
            article: "111".to_string(),
            stock: Some(20),
            ..ProductAnalysis::default()
        };

        let default_view = render_product(&product, &Thresholds::default());
        assert!(default_view.contains("stock:   20 🟢 In stock"));

        let strict = Thresholds {
            low_stock: 25,
            ..Thresholds::default()
        };
        assert!(render_product(&product, &strict).contains("stock:   20 🟡 Low stock"));

        let batch = strict.classify_batch(
            &[StockRecord {
                article: "111".to_string(),
                current_stock: 20,
                ..StockRecord::default()
            }],
            30.0,
        );
        assert_eq!(
            batch[0].classification().map(|c| c.stock_status),
            Some(StockStatus::Warning)
        );
    }

    #[test]
    fn negative_product_stock_gets_unknown_badge() {
        let product = ProductAnalysis {
            article: "111".to_string(),
            stock: Some(-2),
            ..ProductAnalysis::default()
        };
        let text = render_product(&product, &Thresholds::default());
        assert!(text.contains("stock:   -2 ⚪ Unknown"));
    }
}
