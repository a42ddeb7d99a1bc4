// 🏷️ Classification Rules - Rules as Data
// Named-pattern categories matched against customer short names

use crate::error::{Error, Result};
use crate::record::Exposure;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Deposit type code of insurance-linked deposit products.
pub const INSURANCE_LINKED_DEPOSIT: i64 = 28;

/// Upper bound on the compiled size of one category matcher.
pub const PATTERN_SIZE_LIMIT: usize = 1 << 20;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category name; becomes the sheet name on export
    pub name: String,

    /// Case-insensitive substrings matched against CUS_SHO_NAME
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Also take every record with TYPE_OF_DEP == 28, regardless of name
    #[serde(default)]
    pub by_type_dep: bool,
}

impl CategoryRule {
    pub fn new(name: &str, patterns: &[&str]) -> Self {
        CategoryRule {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            by_type_dep: false,
        }
    }

    pub fn with_type_dep(mut self) -> Self {
        self.by_type_dep = true;
        self
    }
}

/// The ten reporting categories, in sheet order.
pub fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("Insurance", &["Enterprise Group"]).with_type_dep(),
        CategoryRule::new("Pensions", &["Pens", "Pension", "Petra"]),
        CategoryRule::new("Securities & Exchange", &["Securit"]),
        CategoryRule::new("Savings & Loans", &["Saving"]),
        CategoryRule::new(
            "MicroFinance",
            &["Micro-Finance", "M'Finance", "MicroFinance", "Micro Finance"],
        ),
        CategoryRule::new(
            "Finance Houses",
            &[
                "Capital",
                "Investment",
                "Income",
                "Finance",
                "Databank",
                "Fund",
                "Obsidian",
                "Stanlib",
                "Zeepay",
            ],
        ),
        CategoryRule::new("Rural Bank", &["Rural Bank"]),
        CategoryRule::new("Credit Union", &["Credit Union", "Cop", "co-op", "BACCSOD"]),
        CategoryRule::new("Money Lending", &["micro-credit", "susu", "lending"]),
        CategoryRule::new(
            "Mortgage Institutions",
            &["propert", "estate", "building", "engineer"],
        ),
    ]
}

// ============================================================================
// COMPILED CATEGORY
// ============================================================================

/// A rule paired with its precompiled alternation.
#[derive(Debug, Clone)]
pub struct CompiledCategory {
    rule: CategoryRule,
    /// `None` when the rule has no patterns: it matches nothing.
    matcher: Option<Regex>,
}

impl CompiledCategory {
    pub fn compile(rule: CategoryRule) -> Result<Self> {
        let matcher = if rule.patterns.is_empty() {
            None
        } else {
            let alternation = rule
                .patterns
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");

            let regex = RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .size_limit(PATTERN_SIZE_LIMIT)
                .build()
                .map_err(|source| Error::Pattern {
                    category: rule.name.clone(),
                    source,
                })?;
            Some(regex)
        };

        Ok(CompiledCategory { rule, matcher })
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn rule(&self) -> &CategoryRule {
        &self.rule
    }

    pub fn by_type_dep(&self) -> bool {
        self.rule.by_type_dep
    }

    /// Check if any pattern occurs in the text (case-insensitive)
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.as_ref().map_or(false, |re| re.is_match(text))
    }

    /// Records without a text name never match.
    pub fn matches_name(&self, exposure: &Exposure) -> bool {
        exposure.name().map_or(false, |name| self.matches(name))
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuleEngine {
    categories: Vec<CompiledCategory>,
}

impl RuleEngine {
    /// Compile rules, keeping declaration order.
    pub fn from_rules(rules: Vec<CategoryRule>) -> Result<Self> {
        let categories = rules
            .into_iter()
            .map(CompiledCategory::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleEngine { categories })
    }

    pub fn categories(&self) -> &[CompiledCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&CompiledCategory> {
        self.categories.iter().find(|c| c.name() == name)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::exposure;
    use crate::record::CellValue;

    #[test]
    fn test_substring_match_ignores_case() {
        let cat = CompiledCategory::compile(CategoryRule::new("Pensions", &["Pens", "Petra"])).unwrap();

        assert!(cat.matches("ABC Pensions Ltd"));
        assert!(cat.matches("PETRA TRUST"));
        assert!(cat.matches("suspense account"));
        assert!(!cat.matches("Generic Co"));
    }

    #[test]
    fn test_patterns_are_literal() {
        // "." and "'" are not regex syntax here
        let cat = CompiledCategory::compile(CategoryRule::new("MicroFinance", &["M'Finance", "a.b"])).unwrap();

        assert!(cat.matches("Kumasi M'FINANCE"));
        assert!(cat.matches("xa.by"));
        assert!(!cat.matches("axby"));
    }

    #[test]
    fn test_empty_pattern_set_matches_nothing() {
        let cat = CompiledCategory::compile(CategoryRule::new("Nothing", &[])).unwrap();

        assert!(!cat.matches(""));
        assert!(!cat.matches("Enterprise Group"));
    }

    #[test]
    fn test_missing_name_never_matches() {
        let cat = CompiledCategory::compile(CategoryRule::new("Any", &["a"])).unwrap();
        let mut exp = exposure("alpha", 1, 1, 10.0, 0);
        assert!(cat.matches_name(&exp));

        exp.customer_name = CellValue::Empty;
        assert!(!cat.matches_name(&exp));
    }

    #[test]
    fn test_default_categories_order() {
        let engine = RuleEngine::from_rules(default_categories()).unwrap();
        let names: Vec<&str> = engine.categories().iter().map(|c| c.name()).collect();

        assert_eq!(
            names,
            vec![
                "Insurance",
                "Pensions",
                "Securities & Exchange",
                "Savings & Loans",
                "MicroFinance",
                "Finance Houses",
                "Rural Bank",
                "Credit Union",
                "Money Lending",
                "Mortgage Institutions",
            ]
        );

        let flagged: Vec<&str> = engine
            .categories()
            .iter()
            .filter(|c| c.by_type_dep())
            .map(|c| c.name())
            .collect();
        assert_eq!(flagged, vec!["Insurance"]);
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: CategoryRule = serde_json::from_str(r#"{"name": "Rural Bank", "patterns": ["Rural Bank"]}"#).unwrap();
        assert!(!rule.by_type_dep);
        assert_eq!(rule.patterns, vec!["Rural Bank".to_string()]);
    }
}
