use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate};

use crate::models::{ManualAdData, StockRecord};

/// Trim, drop blanks and de-duplicate articles, keeping the first occurrence.
pub fn normalize_articles<I, S>(articles: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .map(|article| article.as_ref().trim().to_string())
        .filter(|article| !article.is_empty())
        .filter(|article| seen.insert(article.clone()))
        .collect()
}

/// Read the `article` column of a CSV file.
pub fn load_articles(csv_path: &Path) -> anyhow::Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        article: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut articles = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result.with_context(|| format!("malformed row in {}", csv_path.display()))?;
        articles.push(row.article);
    }

    Ok(normalize_articles(articles))
}

/// Read a stock snapshot for offline classification.
///
/// Expected columns: `article`, `current_stock`, `daily_sales_rate`, and
/// optionally `name`, `reserved_stock`, `sales_7d`, `sales_prev_7d`.
pub fn load_stock_records(csv_path: &Path) -> anyhow::Result<Vec<StockRecord>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        article: String,
        #[serde(default)]
        name: Option<String>,
        current_stock: i64,
        #[serde(default)]
        reserved_stock: Option<i64>,
        daily_sales_rate: f64,
        #[serde(default)]
        sales_7d: Option<f64>,
        #[serde(default)]
        sales_prev_7d: Option<f64>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut records = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result.with_context(|| format!("malformed row in {}", csv_path.display()))?;
        let reserved_stock = row.reserved_stock.unwrap_or(0);
        records.push(StockRecord {
            article: row.article.trim().to_string(),
            name: row.name.filter(|name| !name.trim().is_empty()),
            current_stock: row.current_stock,
            reserved_stock,
            available_stock: (row.current_stock - reserved_stock).max(0),
            daily_sales_rate: row.daily_sales_rate,
            sales_7d: row.sales_7d,
            sales_prev_7d: row.sales_prev_7d,
            ..StockRecord::default()
        });
    }

    Ok(records)
}

/// Read seller-entered ad figures keyed by article from a JSON file.
pub fn load_manual_ad_data(json_path: &Path) -> anyhow::Result<BTreeMap<String, ManualAdData>> {
    let contents = std::fs::read_to_string(json_path)
        .with_context(|| format!("failed to read {}", json_path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid manual ad data in {}", json_path.display()))
}

/// Accept `YYYY-MM` and return it normalized.
pub fn parse_month(value: &str) -> anyhow::Result<String> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
        .with_context(|| format!("month must look like 2026-09, got `{value}`"))?;
    if date.year() < 2000 {
        bail!("month {value} is too far in the past");
    }
    Ok(format!("{:04}-{:02}", date.year(), date.month()))
}
