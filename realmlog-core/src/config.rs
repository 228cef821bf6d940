//! Parser configuration.
//!
//! Supports TOML configuration files like:
//! ```toml
//! engine_names = ["RealmSpeak", "RealmBattle", "Host"]
//! battle_engine = "RealmBattle"
//! days_per_month = 28
//! inventory_icon_pattern = "(?i)(^|/)items?/"
//! ```
//! Every key is optional; missing keys fall back to the defaults below.

use crate::error::{RealmlogError, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

fn default_engine_names() -> Vec<String> {
    vec![
        "RealmSpeak".to_string(),
        "RealmBattle".to_string(),
        "Host".to_string(),
    ]
}

fn default_battle_engine() -> String {
    "RealmBattle".to_string()
}

fn default_days_per_month() -> u32 {
    28
}

fn default_inventory_icon_pattern() -> String {
    r"(?i)(^|/)(items?|inventory|treasures?|weapons?|armor)/".to_string()
}

fn default_turn_log_pattern() -> String {
    r"(?i)(turn|game|session)[_ -]?log.*\.html?$".to_string()
}

fn default_detail_log_pattern() -> String {
    r"(?i)\.(txt|log)$".to_string()
}

/// Knobs for the log parsers, loaded from TOML.
#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    /// Names that prefix engine-generated lines (`<Engine> - text`).
    #[serde(default = "default_engine_names")]
    pub engine_names: Vec<String>,
    /// The engine that announces battles (`<Engine> - Battle resolving at ...`).
    #[serde(default = "default_battle_engine")]
    pub battle_engine: String,
    #[serde(default = "default_days_per_month")]
    pub days_per_month: u32,
    /// Image references matching this are treated as inventory icons when a
    /// character page has no inventory table.
    #[serde(default = "default_inventory_icon_pattern")]
    pub inventory_icon_pattern: String,
    /// Archive entry names matching this hold the aggregate turn log.
    #[serde(default = "default_turn_log_pattern")]
    pub turn_log_pattern: String,
    /// Archive entry names matching this hold the full-detail combat log.
    #[serde(default = "default_detail_log_pattern")]
    pub detail_log_pattern: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            engine_names: default_engine_names(),
            battle_engine: default_battle_engine(),
            days_per_month: default_days_per_month(),
            inventory_icon_pattern: default_inventory_icon_pattern(),
            turn_log_pattern: default_turn_log_pattern(),
            detail_log_pattern: default_detail_log_pattern(),
        }
    }
}

impl ParserConfig {
    /// Load parser configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RealmlogError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read parser config from {:?}: {}", path, e),
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse parser configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: ParserConfig = toml::from_str(content).map_err(|e| {
            RealmlogError::Config(format!("Failed to parse parser config TOML: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the parsers cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.engine_names.iter().all(|name| name.trim().is_empty()) {
            return Err(RealmlogError::Config(
                "engine_names must contain at least one name".to_string(),
            ));
        }
        if self.battle_engine.trim().is_empty() {
            return Err(RealmlogError::Config(
                "battle_engine must not be empty".to_string(),
            ));
        }
        if self.days_per_month == 0 {
            return Err(RealmlogError::Config(
                "days_per_month must be positive".to_string(),
            ));
        }
        for (key, pattern) in [
            ("inventory_icon_pattern", &self.inventory_icon_pattern),
            ("turn_log_pattern", &self.turn_log_pattern),
            ("detail_log_pattern", &self.detail_log_pattern),
        ] {
            compile_pattern(key, pattern)?;
        }
        Ok(())
    }

    /// True when `name` is one of the configured engine prefixes.
    pub fn is_engine(&self, name: &str) -> bool {
        name == self.battle_engine || self.engine_names.iter().any(|engine| engine == name)
    }

    pub fn inventory_icon_regex(&self) -> Result<Regex> {
        compile_pattern("inventory_icon_pattern", &self.inventory_icon_pattern)
    }

    pub fn turn_log_regex(&self) -> Result<Regex> {
        compile_pattern("turn_log_pattern", &self.turn_log_pattern)
    }

    pub fn detail_log_regex(&self) -> Result<Regex> {
        compile_pattern("detail_log_pattern", &self.detail_log_pattern)
    }
}

fn compile_pattern(key: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RealmlogError::Config(format!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ParserConfig::from_str("").unwrap();
        assert_eq!(config.battle_engine, "RealmBattle");
        assert_eq!(config.days_per_month, 28);
        assert!(config.is_engine("RealmSpeak"));
        assert!(config.is_engine("RealmBattle"));
        assert!(!config.is_engine("Amazon"));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
engine_names = ["Host"]
battle_engine = "Arena"
days_per_month = 30
"#;

        let config = ParserConfig::from_str(toml).unwrap();
        assert_eq!(config.engine_names, vec!["Host".to_string()]);
        assert_eq!(config.days_per_month, 30);
        assert!(config.is_engine("Arena"));
        assert!(config.detail_log_regex().unwrap().is_match("full_detail.txt"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let toml = r#"inventory_icon_pattern = "(unclosed""#;
        let err = ParserConfig::from_str(toml).unwrap_err();
        assert!(matches!(err, RealmlogError::Config(_)));
    }

    #[test]
    fn test_empty_engine_list_rejected() {
        let err = ParserConfig::from_str("engine_names = []").unwrap_err();
        assert!(matches!(err, RealmlogError::Config(_)));
    }
}
