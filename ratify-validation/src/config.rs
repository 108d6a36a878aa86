//! Engine configuration.
//!
//! ```rust
//! use ratify_validation::EngineConfig;
//!
//! let config = EngineConfig::new()
//!     .default_debounce_ms(150)
//!     .log_rule_faults(false);
//! assert_eq!(config.default_debounce().map(|d| d.as_millis()), Some(150));
//! ```
//!
//! # Environment Variables
//!
//! - `RATIFY_DEFAULT_DEBOUNCE_MS` - Debounce window for rules that declare none
//! - `RATIFY_LOG_RULE_FAULTS=1|0` - Log rule faults swallowed as "no error"

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Validation engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window applied to rules that do not declare one
    pub default_debounce_ms: Option<u64>,
    /// Whether swallowed rule faults are logged at warn level
    pub log_rule_faults: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: None,
            log_rule_faults: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_debounce_ms = env::var("RATIFY_DEFAULT_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .or(defaults.default_debounce_ms);

        let log_rule_faults = env::var("RATIFY_LOG_RULE_FAULTS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(defaults.log_rule_faults);

        Self {
            default_debounce_ms,
            log_rule_faults,
        }
    }

    /// Sets the default debounce window in milliseconds.
    pub fn default_debounce_ms(mut self, ms: u64) -> Self {
        self.default_debounce_ms = Some(ms);
        self
    }

    /// Sets whether swallowed rule faults are logged.
    pub fn log_rule_faults(mut self, enabled: bool) -> Self {
        self.log_rule_faults = enabled;
        self
    }

    /// Default debounce window, if configured.
    pub fn default_debounce(&self) -> Option<Duration> {
        self.default_debounce_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_debounce(), None);
        assert!(config.log_rule_faults);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(r#"{"default_debounce_ms": 40}"#).unwrap();
        assert_eq!(config.default_debounce(), Some(Duration::from_millis(40)));
        assert!(config.log_rule_faults);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new().default_debounce_ms(5).log_rule_faults(false);
        assert_eq!(config.default_debounce_ms, Some(5));
        assert!(!config.log_rule_faults);
    }
}
