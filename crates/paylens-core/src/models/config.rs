//! Configuration structures for the checkout engine.

use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::PaylensError;

/// Main configuration for the paylens engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaylensConfig {
    /// Page classification configuration.
    pub classifier: ClassifierConfig,

    /// Amount extraction configuration.
    pub extraction: ExtractionConfig,

    /// Exchange-rate lookup configuration.
    pub rates: RateConfig,

    /// Session window and message channel configuration.
    pub session: SessionConfig,
}

/// Page classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// URL fragments that are never treated as checkout pages (the
    /// companion dashboard). Matched case-insensitively as substrings.
    pub excluded_origins: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            excluded_origins: vec![
                "localhost:3001".to_string(),
                "paylens-dashboard.example.com".to_string(),
            ],
        }
    }
}

/// Amount extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Currency assumed when a total carries no symbol or code.
    pub default_currency: Currency,

    /// Currency the session opener expects amounts in.
    pub reference_currency: Currency,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::Usd,
            reference_currency: Currency::Usd,
        }
    }
}

/// Exchange-rate lookup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Base URL; the source currency code is appended as a path segment.
    pub endpoint: String,

    /// Request timeout in seconds (native targets only).
    pub timeout_secs: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://open.er-api.com/v6/latest".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Session window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Dashboard URL the payment context is passed to.
    pub opener_url: String,

    /// Origins allowed to send messages. An entry ending in `:*` matches
    /// any port of that scheme and host.
    pub trusted_origins: Vec<String>,

    /// Target name of the session window.
    pub window_name: String,

    /// Feature string for the session window.
    pub window_features: String,

    /// Delay before classifying the page a second time.
    pub reclassify_delay_ms: u64,

    /// Delay between receiving a credential and filling the form.
    pub fill_delay_ms: u64,

    /// Delay before re-sending a message to a freshly reopened window.
    pub settle_delay_ms: u64,

    /// How long to wait for the session window before giving up.
    pub session_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            opener_url: "https://paylens-dashboard.example.com".to_string(),
            trusted_origins: vec![
                "https://paylens-dashboard.example.com".to_string(),
                "http://localhost:*".to_string(),
            ],
            window_name: "paylens-session".to_string(),
            window_features: "width=500,height=700".to_string(),
            reclassify_delay_ms: 1000,
            fill_delay_ms: 500,
            settle_delay_ms: 1000,
            session_timeout_secs: 600,
        }
    }
}

impl PaylensConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string. Missing keys take defaults.
    pub fn from_json(content: &str) -> crate::Result<Self> {
        serde_json::from_str(content).map_err(|e| PaylensError::Config(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| PaylensError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = PaylensConfig::from_json(r#"{"session":{"fill_delay_ms":250}}"#).unwrap();
        assert_eq!(config.session.fill_delay_ms, 250);
        assert_eq!(config.session.settle_delay_ms, 1000);
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn test_currency_keys_use_codes() {
        let config = PaylensConfig::from_json(r#"{"extraction":{"default_currency":"EUR"}}"#).unwrap();
        assert_eq!(config.extraction.default_currency, Currency::Eur);
        assert_eq!(config.extraction.reference_currency, Currency::Usd);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("paylens-config-{}.json", std::process::id()));
        let mut config = PaylensConfig::default();
        config.rates.timeout_secs = 3;
        config.save(&path).unwrap();

        let loaded = PaylensConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = PaylensConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, PaylensError::Config(_)), "{err:?}");
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("paylens-config-does-not-exist.json");
        let err = PaylensConfig::from_file(&path).unwrap_err();
        match err {
            PaylensError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }
}
