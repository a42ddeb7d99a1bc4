// 🗂️ Classifier - exposures → per-category tables for the BoG return
//
// Categories are independent filters, not a partition: one record can land
// in several tables, and the Insurance union can hold the same record twice.

use crate::record::{CellValue, Column, Exposure};
use crate::rules::{CompiledCategory, RuleEngine, INSURANCE_LINKED_DEPOSIT};
use crate::status::{determine_status, lookup_status, ExposureStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A matched record with its derived TYPE_OF_EXPOSURE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedExposure {
    #[serde(flatten)]
    pub exposure: Exposure,

    #[serde(rename = "TYPE_OF_EXPOSURE")]
    pub type_of_exposure: ExposureStatus,
}

impl ClassifiedExposure {
    pub fn new(exposure: Exposure) -> Self {
        let type_of_exposure = determine_status(exposure.currency_code, exposure.ledger_code);
        ClassifiedExposure {
            exposure,
            type_of_exposure,
        }
    }

    pub fn cell(&self, column: Column) -> CellValue {
        match column {
            Column::TypeOfExposure => CellValue::Text(self.type_of_exposure.label().to_string()),
            other => self.exposure.cell(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTable {
    pub name: String,
    pub rows: Vec<ClassifiedExposure>,
}

impl CategoryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &'static [Column] {
        &Column::ALL
    }
}

/// Ordered mapping category name → table, plus the run parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub min_balance: u64,
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<CategoryTable>,
}

impl Classification {
    pub fn table(&self, name: &str) -> Option<&CategoryTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// (name, row count) in declaration order
    pub fn summary(&self) -> Vec<(&str, usize)> {
        self.tables.iter().map(|t| (t.name.as_str(), t.len())).collect()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.len()).sum()
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Name-pattern branch: matching names with CRNT_BAL > threshold, input order.
pub fn filter_category(
    exposures: &[Exposure],
    category: &CompiledCategory,
    threshold: f64,
) -> Vec<ClassifiedExposure> {
    exposures
        .iter()
        .filter(|e| category.matches_name(e))
        .filter(|e| e.balance_exceeds(threshold))
        .cloned()
        .map(ClassifiedExposure::new)
        .collect()
}

/// Deposit-type branch: TYPE_OF_DEP == 28 with CRNT_BAL > threshold.
pub fn filter_by_type_dep(exposures: &[Exposure], threshold: f64) -> Vec<ClassifiedExposure> {
    exposures
        .iter()
        .filter(|e| e.deposit_type == Some(INSURANCE_LINKED_DEPOSIT))
        .filter(|e| e.balance_exceeds(threshold))
        .cloned()
        .map(ClassifiedExposure::new)
        .collect()
}

/// One category's table. Flagged categories concatenate the deposit-type
/// branch and the name branch without deduplicating.
pub fn classify_category(
    exposures: &[Exposure],
    category: &CompiledCategory,
    threshold: f64,
) -> CategoryTable {
    let rows = if category.by_type_dep() {
        let mut rows = filter_by_type_dep(exposures, threshold);
        rows.extend(filter_category(exposures, category, threshold));
        rows
    } else {
        filter_category(exposures, category, threshold)
    };

    CategoryTable {
        name: category.name().to_string(),
        rows,
    }
}

// ============================================================================
// DRIVER
// ============================================================================

/// Classify every exposure against every category, in declaration order.
pub fn classify(exposures: &[Exposure], engine: &RuleEngine, min_balance: u64) -> Classification {
    let threshold = min_balance as f64;

    let tables: Vec<CategoryTable> = engine
        .categories()
        .iter()
        .map(|category| {
            let table = classify_category(exposures, category, threshold);
            tracing::debug!(category = %table.name, rows = table.len(), "classified category");
            table
        })
        .collect();

    let unmapped = tables
        .iter()
        .flat_map(|t| t.rows.iter())
        .filter(|row| lookup_status(row.exposure.currency_code, row.exposure.ledger_code).is_none())
        .count();
    if unmapped > 0 {
        tracing::warn!(
            unmapped,
            "classified rows with unmapped (CUR_CODE, LED_CODE) defaulted to {}",
            ExposureStatus::FcaGbp
        );
    }

    Classification {
        min_balance,
        generated_at: Utc::now(),
        tables,
    }
}

// ============================================================================
// TESTS
// ============================================================================
