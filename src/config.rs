//! Configuration loading.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. Command-line flags are applied last by `main`.
//!
//! ## Environment Variables
//! - `SELLER_API_URL`: backend base URL
//! - `SELLER_API_TIMEOUT_SECS`: request timeout in seconds
//! - `SELLER_SESSION_FILE`: where the bearer token is kept between runs
//! - `SELLER_LOW_STOCK_THRESHOLD`: stock below this is a warning
//! - `SELLER_TARGET_STOCK_DAYS`: default planning horizon
//!
//! ## File Locations
//! Without an explicit `--config`, `./seller-planner.toml` is used when present.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::Thresholds;
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "seller-planner.toml";
const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: concat!("seller-planner/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub thresholds: Thresholds,
    pub session_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            thresholds: Thresholds::default(),
            session_file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".seller-planner").join("session"),
        None => PathBuf::from(".seller-planner-session"),
    }
}

/// Load configuration from `path` (or the default file when present) and the
/// process environment.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            load_file(path)?
        }
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                load_file(fallback)?
            } else {
                AppConfig::default()
            }
        }
    };

    let config = apply_env(config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<AppConfig, ConfigError> {
    tracing::info!(path = %path.display(), "loading configuration from file");
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("SELLER_API_URL") {
        config.api.base_url = url;
    }
    if let Some(value) = lookup("SELLER_API_TIMEOUT_SECS") {
        config.api.timeout_secs = parse_value("SELLER_API_TIMEOUT_SECS", &value)?;
    }
    if let Some(path) = lookup("SELLER_SESSION_FILE") {
        config.session_file = PathBuf::from(path);
    }
    if let Some(value) = lookup("SELLER_LOW_STOCK_THRESHOLD") {
        config.thresholds.low_stock = parse_value("SELLER_LOW_STOCK_THRESHOLD", &value)?;
    }
    if let Some(value) = lookup("SELLER_TARGET_STOCK_DAYS") {
        config.thresholds.target_stock_days = parse_value("SELLER_TARGET_STOCK_DAYS", &value)?;
    }
    Ok(config)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |key: &str, reason: &str| ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if config.api.base_url.trim().is_empty() {
        return Err(invalid("api.base_url", "must not be empty"));
    }
    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs", "must be at least 1"));
    }
    let thresholds = &config.thresholds;
    if thresholds.low_stock < 1 {
        return Err(invalid("thresholds.low_stock", "must be at least 1"));
    }
    if !(thresholds.target_stock_days.is_finite() && thresholds.target_stock_days > 0.0) {
        return Err(invalid("thresholds.target_stock_days", "must be positive"));
    }
    if !(thresholds.high_priority_fraction > 0.0 && thresholds.high_priority_fraction <= 1.0) {
        return Err(invalid(
            "thresholds.high_priority_fraction",
            "must be within (0, 1]",
        ));
    }
    if !(thresholds.trend_band_percent.is_finite() && thresholds.trend_band_percent >= 0.0) {
        return Err(invalid("thresholds.trend_band_percent", "must be non-negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::classify::{DEFAULT_TARGET_STOCK_DAYS, LOW_STOCK_THRESHOLD};

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [api]
            base_url = "https://sellers.example.com/api"

            [thresholds]
            low_stock = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://sellers.example.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.thresholds.low_stock, 15);
        assert_eq!(config.thresholds.target_stock_days, DEFAULT_TARGET_STOCK_DAYS);
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SELLER_API_URL", "https://override.example.com"),
            ("SELLER_TARGET_STOCK_DAYS", "45"),
            ("SELLER_SESSION_FILE", "/tmp/token"),
        ]);

        let config = apply_env(AppConfig::default(), |key| {
            env.get(key).map(|value| value.to_string())
        })
        .unwrap();

        assert_eq!(config.api.base_url, "https://override.example.com");
        assert_eq!(config.thresholds.target_stock_days, 45.0);
        assert_eq!(config.thresholds.low_stock, LOW_STOCK_THRESHOLD);
        assert_eq!(config.session_file, PathBuf::from("/tmp/token"));
    }

    #[test]
    fn malformed_environment_value_is_an_error() {
        let result = apply_env(AppConfig::default(), |key| {
            (key == "SELLER_LOW_STOCK_THRESHOLD").then(|| "ten".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn validation_rejects_zero_horizon() {
        let mut config = AppConfig::default();
        config.thresholds.target_stock_days = 0.0;
        assert!(validate(&config).is_err());
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn missing_explicit_file_is_reported() {
        let err = load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
