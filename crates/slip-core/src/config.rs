//! Application configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an override file (explicit path, else
//!    ~/.local/share/slip/config/slip.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default value.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/slip.toml");

/// Resolved application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Monthly spend limit for the budget bar
    pub budget_limit: f64,
    /// Currency symbol used when a record has none
    pub currency_symbol: String,
    /// VAT rate (percent) used when a record has none
    pub default_vat_rate: f64,
    /// Days-left threshold (inclusive) for an "urgent" return window
    pub return_urgent_days: i64,
    /// Number of months in the spending trend
    pub trend_months: u32,
    /// Spam emails assumed blocked per captured receipt
    pub spam_per_receipt: u64,
    /// Root directory for stored objects (None = platform data dir)
    pub storage_root: Option<PathBuf>,
    /// Base URL for public object links
    pub public_base_url: String,
    /// Domain appended to bare aliases
    pub alias_domain: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget_limit: 2500.0,
            currency_symbol: "£".to_string(),
            default_vat_rate: 20.0,
            return_urgent_days: 3,
            trend_months: 6,
            spam_per_receipt: 12,
            storage_root: None,
            public_base_url: "http://localhost:54321".to_string(),
            alias_domain: "slip.email".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default override location or embedded defaults
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load config from an explicit override path
    ///
    /// A path that does not exist falls back to embedded defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse config from TOML text, layered over the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Directory where uploaded objects are kept
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_root
            .clone()
            .or_else(|| data_dir().map(|d| d.join("objects")))
            .unwrap_or_else(|| PathBuf::from("slip-objects"))
    }
}

/// Platform data directory for Slip (~/.local/share/slip on Linux)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("slip"))
}

/// Default override location for the config file
pub fn default_config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("config").join("slip.toml"))
}

fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(default_config_path);

    let content = match path {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading config override");
            fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    budget: Option<RawBudget>,
    display: Option<RawDisplay>,
    status: Option<RawStatus>,
    insights: Option<RawInsights>,
    storage: Option<RawStorage>,
    identity: Option<RawIdentity>,
}

#[derive(Debug, Deserialize)]
struct RawBudget {
    monthly_limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDisplay {
    currency_symbol: Option<String>,
    default_vat_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    return_urgent_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawInsights {
    trend_months: Option<u32>,
    spam_per_receipt: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    root: Option<String>,
    public_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIdentity {
    alias_domain: Option<String>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();

    if let Some(budget) = raw.budget {
        if let Some(limit) = budget.monthly_limit {
            if limit <= 0.0 {
                return Err(Error::Config(format!(
                    "budget.monthly_limit must be positive, got {}",
                    limit
                )));
            }
            config.budget_limit = limit;
        }
    }

    if let Some(display) = raw.display {
        if let Some(symbol) = display.currency_symbol.filter(|s| !s.trim().is_empty()) {
            config.currency_symbol = symbol;
        }
        if let Some(rate) = display.default_vat_rate {
            config.default_vat_rate = rate;
        }
    }

    if let Some(status) = raw.status {
        if let Some(days) = status.return_urgent_days {
            config.return_urgent_days = days.max(0);
        }
    }

    if let Some(insights) = raw.insights {
        if let Some(months) = insights.trend_months {
            // A month-over-month comparison needs two buckets
            config.trend_months = months.max(2);
        }
        if let Some(spam) = insights.spam_per_receipt {
            config.spam_per_receipt = spam;
        }
    }

    if let Some(storage) = raw.storage {
        if let Some(root) = storage.root.filter(|r| !r.trim().is_empty()) {
            config.storage_root = Some(PathBuf::from(root));
        }
        if let Some(url) = storage.public_base_url {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }
    }

    if let Some(identity) = raw.identity {
        if let Some(domain) = identity.alias_domain.filter(|d| !d.trim().is_empty()) {
            config.alias_domain = domain.trim_start_matches('@').to_string();
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [budget]
            monthly_limit = 1000.0

            [status]
            return_urgent_days = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.budget_limit, 1000.0);
        assert_eq!(config.return_urgent_days, 5);
        assert_eq!(config.currency_symbol, "£");
        assert_eq!(config.trend_months, 6);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = Config::from_toml("[budget\nmonthly_limit = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_non_positive_budget_rejected() {
        let result = Config::from_toml("[budget]\nmonthly_limit = 0.0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_alias_domain_and_base_url_are_trimmed() {
        let config = Config::from_toml(
            r#"
            [storage]
            public_base_url = "https://cdn.example.com/"

            [identity]
            alias_domain = "@mail.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.public_base_url, "https://cdn.example.com");
        assert_eq!(config.alias_domain, "mail.example.com");
    }

    #[test]
    fn test_missing_override_file_falls_back() {
        let config = Config::load_from(Path::new("/nonexistent/slip.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_override_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slip.toml");
        fs::write(&path, "[insights]\nspam_per_receipt = 3\ntrend_months = 1\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.spam_per_receipt, 3);
        assert_eq!(config.trend_months, 2);
    }
}
