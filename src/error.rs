// ⚠️ Errors - everything that can stop a classification run

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("input is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}, column {column}: {message} (found {found:?})")]
    InvalidCell {
        row: usize,
        column: &'static str,
        found: String,
        message: &'static str,
    },

    #[error("workbook contains no worksheets")]
    EmptyWorkbook,

    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("category {category:?} has an unusable pattern set: {source}")]
    Pattern {
        category: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
