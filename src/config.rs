// ⚙️ Settings - explicit run configuration passed into the classifier
// JSON on disk; every field optional, defaults reproduce the BoG return

use crate::error::{Error, Result};
use crate::rules::{default_categories, CategoryRule, RuleEngine};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const DEFAULT_MIN_BALANCE: u64 = 5;
pub const DEFAULT_PROCESSED_SUFFIX: &str = "_processed";

/// The CLI loads a single file per run.
pub const DEFAULT_CLI_CACHE_CAPACITY: usize = 1;

/// The server holds one dataset per concurrent user.
pub const DEFAULT_SERVER_CACHE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Records need CRNT_BAL strictly above this to be reported
    pub min_balance: u64,

    /// Appended to the input file stem to name the workbook
    pub processed_suffix: String,

    /// Parsed uploads kept in memory; unset picks a per-binary default
    pub cache_capacity: Option<usize>,

    /// Reporting categories, in sheet order
    pub categories: Vec<CategoryRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            min_balance: DEFAULT_MIN_BALANCE,
            processed_suffix: DEFAULT_PROCESSED_SUFFIX.to_string(),
            cache_capacity: None,
            categories: default_categories(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&content)?;
        tracing::info!(path = %path.as_ref().display(), categories = settings.categories.len(), "settings loaded");
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the exporter cannot represent faithfully.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for rule in &self.categories {
            if rule.name.trim().is_empty() {
                return Err(Error::Config("category name must not be blank".to_string()));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(Error::Config(format!("duplicate category {:?}", rule.name)));
            }
        }

        if self.cache_capacity == Some(0) {
            return Err(Error::Config("cache_capacity must be at least 1".to_string()));
        }

        // surface bad or oversized patterns at load time, not on first use
        RuleEngine::from_rules(self.categories.clone())?;

        Ok(())
    }

    /// Compile the category table.
    pub fn rule_engine(&self) -> Result<RuleEngine> {
        RuleEngine::from_rules(self.categories.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.min_balance, 5);
        assert_eq!(settings.processed_suffix, "_processed");
        assert_eq!(settings.categories.len(), 10);
        assert_eq!(settings.cache_capacity, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_cache_capacity_is_rejected() {
        assert!(matches!(
            Settings::from_json(r#"{"cache_capacity": 0}"#),
            Err(Error::Config(_))
        ));
        assert_eq!(
            Settings::from_json(r#"{"cache_capacity": 8}"#).unwrap().cache_capacity,
            Some(8)
        );
    }

    #[test]
    fn test_oversized_pattern_is_rejected_at_load() {
        let pattern = "x".repeat(1_000_000);
        let json = format!(r#"{{"categories": [{{"name": "Huge", "patterns": ["{pattern}"]}}]}}"#);

        match Settings::from_json(&json) {
            Err(Error::Pattern { category, .. }) => assert_eq!(category, "Huge"),
            other => panic!("unexpected result: {:?}", other.map(|s| s.categories.len())),
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{"min_balance": 100}"#).unwrap();

        assert_eq!(settings.min_balance, 100);
        assert_eq!(settings.categories, default_categories());
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        assert!(Settings::from_json(r#"{"min_balance": -1}"#).is_err());
        assert!(Settings::from_json(r#"{"min_balance": "five"}"#).is_err());
    }

    #[test]
    fn test_duplicate_categories_are_rejected() {
        let json = r#"{"categories": [
            {"name": "Pensions", "patterns": ["Pens"]},
            {"name": "Pensions", "patterns": ["Petra"]}
        ]}"#;

        match Settings::from_json(json) {
            Err(Error::Config(msg)) => assert!(msg.contains("Pensions")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_blank_category_name_is_rejected() {
        let json = r#"{"categories": [{"name": "  ", "patterns": ["x"]}]}"#;
        assert!(matches!(Settings::from_json(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"processed_suffix": "_bog", "categories": [{{"name": "Insurance", "patterns": [], "by_type_dep": true}}]}}"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        let engine = settings.rule_engine().unwrap();

        assert_eq!(settings.processed_suffix, "_bog");
        assert_eq!(engine.category_count(), 1);
        assert!(engine.categories()[0].by_type_dep());
    }
}
