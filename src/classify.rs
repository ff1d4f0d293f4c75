//! Derived stock metrics shared by every planning surface.
//!
//! Everything here is a pure function of its inputs so that table rows,
//! markdown reports and CSV exports all agree on the same thresholds.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClassifyError;
use crate::models::StockRecord;

/// Stock strictly below this (and above zero) is a warning.
pub const LOW_STOCK_THRESHOLD: i64 = 10;
/// Share of the planning horizon under which replenishment is urgent.
pub const HIGH_PRIORITY_FRACTION: f64 = 1.0 / 3.0;
/// Week-over-week change, in percent, treated as noise.
pub const TREND_BAND_PERCENT: f64 = 5.0;
/// Default planning horizon in days.
pub const DEFAULT_TARGET_STOCK_DAYS: f64 = 30.0;

/// Relative rounding error, in ulps, snapped away before rounding up.
const CEIL_ULPS: f64 = 4.0;
/// Slack on the urgent cutoff so `t * (1/3)` still admits `t / 3`.
const CUTOFF_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub low_stock: i64,
    pub high_priority_fraction: f64,
    pub trend_band_percent: f64,
    pub target_stock_days: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_stock: LOW_STOCK_THRESHOLD,
            high_priority_fraction: HIGH_PRIORITY_FRACTION,
            trend_band_percent: TREND_BAND_PERCENT,
            target_stock_days: DEFAULT_TARGET_STOCK_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Critical,
    Warning,
    Good,
}

impl StockStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "Out of stock",
            Self::Warning => "Low stock",
            Self::Good => "In stock",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Critical => "🔴",
            Self::Warning => "🟡",
            Self::Good => "🟢",
        }
    }

}

/// Replenishment urgency. Ordered so that `High < Medium < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyPriority {
    High,
    Medium,
    Low,
}

impl SupplyPriority {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Order now",
            Self::Medium => "Plan a supply",
            Self::Low => "No action needed",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::High => "🔥",
            Self::Medium => "⚠️",
            Self::Low => "✅",
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Growth,
    Decline,
    Stable,
    Unknown,
}

impl TrendDirection {
    pub fn label(self) -> &'static str {
        match self {
            Self::Growth => "Growing",
            Self::Decline => "Declining",
            Self::Stable => "Stable",
            Self::Unknown => "No data",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Growth => "📈",
            Self::Decline => "📉",
            Self::Stable => "➡️",
            Self::Unknown => "❔",
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesTrend {
    pub direction: TrendDirection,
    /// Change in percent; `+inf` when sales started from zero, `None` when unknown.
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub stock_status: StockStatus,
    pub supply_priority: SupplyPriority,
    pub sales_trend: SalesTrend,
    pub days_until_oos: f64,
    pub recommended_supply: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Classified(Classification),
    Unclassifiable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub record: StockRecord,
    pub outcome: Outcome,
}

impl ClassifiedRecord {
    pub fn classification(&self) -> Option<&Classification> {
        match &self.outcome {
            Outcome::Classified(classification) => Some(classification),
            Outcome::Unclassifiable(_) => None,
        }
    }
}

fn check_rate(field: &'static str, value: f64) -> Result<f64, ClassifyError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ClassifyError::invalid(
            field,
            format!("must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(value)
}

fn check_stock(field: &'static str, value: i64) -> Result<i64, ClassifyError> {
    if value < 0 {
        return Err(ClassifyError::invalid(
            field,
            format!("must be non-negative, got {value}"),
        ));
    }
    Ok(value)
}

fn check_horizon(target_stock_days: f64) -> Result<f64, ClassifyError> {
    if !target_stock_days.is_finite() || target_stock_days <= 0.0 {
        return Err(ClassifyError::invalid(
            "target_stock_days",
            format!("must be a positive number, got {target_stock_days}"),
        ));
    }
    Ok(target_stock_days)
}

impl Thresholds {
    pub fn stock_status(
        &self,
        current_stock: i64,
        daily_sales_rate: Option<f64>,
    ) -> Result<StockStatus, ClassifyError> {
        check_stock("current_stock", current_stock)?;
        if let Some(rate) = daily_sales_rate {
            check_rate("daily_sales_rate", rate)?;
        }

        Ok(match current_stock {
            0 => StockStatus::Critical,
            s if s < self.low_stock => StockStatus::Warning,
            _ => StockStatus::Good,
        })
    }

    pub fn supply_priority(
        &self,
        days_until_oos: f64,
        target_stock_days: f64,
    ) -> Result<SupplyPriority, ClassifyError> {
        let target = check_horizon(target_stock_days)?;
        if days_until_oos.is_nan() || days_until_oos < 0.0 {
            return Err(ClassifyError::invalid(
                "days_until_oos",
                format!("must be non-negative, got {days_until_oos}"),
            ));
        }

        Ok(if days_until_oos == f64::INFINITY {
            SupplyPriority::Low
        } else if days_until_oos <= target * self.high_priority_fraction + CUTOFF_TOLERANCE {
            SupplyPriority::High
        } else if days_until_oos <= target {
            SupplyPriority::Medium
        } else {
            SupplyPriority::Low
        })
    }

    pub fn sales_trend(
        &self,
        recent_rate: Option<f64>,
        prior_rate: Option<f64>,
    ) -> Result<SalesTrend, ClassifyError> {
        let (Some(recent), Some(prior)) = (recent_rate, prior_rate) else {
            return Ok(SalesTrend {
                direction: TrendDirection::Unknown,
                percentage: None,
            });
        };
        let recent = check_rate("recent_rate", recent)?;
        let prior = check_rate("prior_rate", prior)?;

        let percentage = if prior == 0.0 {
            if recent > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            (recent - prior) / prior * 100.0
        };

        let direction = if percentage > self.trend_band_percent {
            TrendDirection::Growth
        } else if percentage < -self.trend_band_percent {
            TrendDirection::Decline
        } else {
            TrendDirection::Stable
        };

        Ok(SalesTrend {
            direction,
            percentage: Some(percentage),
        })
    }

    /// Classify one record against a planning horizon.
    pub fn classify_record(
        &self,
        record: &StockRecord,
        target_stock_days: f64,
    ) -> Result<Classification, ClassifyError> {
        check_stock("reserved_stock", record.reserved_stock)?;
        let stock_status =
            self.stock_status(record.current_stock, Some(record.daily_sales_rate))?;
        let days_until_oos =
            days_until_out_of_stock(record.available(), record.daily_sales_rate)?;
        let supply_priority = self.supply_priority(days_until_oos, target_stock_days)?;
        let sales_trend = self.sales_trend(record.sales_7d, record.sales_prev_7d)?;
        let recommended_supply = recommended_supply(
            record.daily_sales_rate,
            record.current_stock,
            target_stock_days,
        )?;

        Ok(Classification {
            stock_status,
            supply_priority,
            sales_trend,
            days_until_oos,
            recommended_supply,
        })
    }

    /// Classify every record; failures mark the record instead of aborting.
    pub fn classify_batch(
        &self,
        records: &[StockRecord],
        target_stock_days: f64,
    ) -> Vec<ClassifiedRecord> {
        records
            .iter()
            .map(|record| {
                let outcome = match self.classify_record(record, target_stock_days) {
                    Ok(classification) => Outcome::Classified(classification),
                    Err(err) => {
                        warn!(article = %record.article, error = %err, "record is unclassifiable");
                        Outcome::Unclassifiable(err.to_string())
                    }
                };
                ClassifiedRecord {
                    record: record.clone(),
                    outcome,
                }
            })
            .collect()
    }
}

pub fn classify_stock_status(
    current_stock: i64,
    daily_sales_rate: Option<f64>,
) -> Result<StockStatus, ClassifyError> {
    Thresholds::default().stock_status(current_stock, daily_sales_rate)
}

pub fn classify_supply_priority(
    days_until_oos: f64,
    target_stock_days: f64,
) -> Result<SupplyPriority, ClassifyError> {
    Thresholds::default().supply_priority(days_until_oos, target_stock_days)
}

pub fn classify_sales_trend(
    recent_rate: Option<f64>,
    prior_rate: Option<f64>,
) -> Result<SalesTrend, ClassifyError> {
    Thresholds::default().sales_trend(recent_rate, prior_rate)
}

/// Units to ship so the stock covers `target_stock_days` of sales.
pub fn recommended_supply(
    daily_sales_rate: f64,
    current_stock: i64,
    target_stock_days: f64,
) -> Result<u64, ClassifyError> {
    let rate = check_rate("daily_sales_rate", daily_sales_rate)?;
    let stock = check_stock("current_stock", current_stock)?;
    let target = check_horizon(target_stock_days)?;

    let raw = rate * target;
    let snapped = raw.round();
    let desired = if (raw - snapped).abs() <= raw.abs() * CEIL_ULPS * f64::EPSILON {
        snapped
    } else {
        raw.ceil()
    };

    // `desired` is a non-negative integral float here.
    let shortfall = desired - stock as f64;
    Ok(if shortfall > 0.0 { shortfall as u64 } else { 0 })
}

/// `+inf` when nothing sells.
pub fn days_until_out_of_stock(
    available_stock: i64,
    daily_sales_rate: f64,
) -> Result<f64, ClassifyError> {
    let stock = check_stock("available_stock", available_stock)?;
    let rate = check_rate("daily_sales_rate", daily_sales_rate)?;
    if rate == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(stock as f64 / rate)
}

/// Return on ad spend in percent; `None` without spend.
pub fn roi_percent(revenue: f64, spend: f64) -> Option<f64> {
    if spend > 0.0 && revenue.is_finite() {
        Some((revenue - spend) / spend * 100.0)
    } else {
        None
    }
}

pub fn ctr_percent(clicks: u64, views: u64) -> Option<f64> {
    if views == 0 {
        return None;
    }
    Some(clicks as f64 / views as f64 * 100.0)
}
