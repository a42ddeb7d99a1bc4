// BoG Exposures - Core Library
// Exposes all modules for use in the CLI, the preview UI, the server, and tests

pub mod error;
pub mod record;
pub mod status;
pub mod rules;
pub mod classifier;
pub mod loader;
pub mod cache;
pub mod export;
pub mod config;

#[cfg(feature = "tui")]
pub mod ui;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{Error, Result};
pub use record::{CellValue, Column, Exposure};
pub use status::{determine_status, lookup_status, ExposureStatus};
pub use rules::{
    default_categories, CategoryRule, CompiledCategory, RuleEngine, INSURANCE_LINKED_DEPOSIT,
};
pub use classifier::{
    classify, classify_category, filter_by_type_dep, filter_category,
    CategoryTable, Classification, ClassifiedExposure,
};
pub use loader::{load_exposures, InputFormat, RawTable};
pub use cache::{content_key, Dataset, DatasetCache};
pub use export::{
    output_file_name, output_path, sanitize_sheet_name, save_workbook, unique_sheet_names,
    write_workbook, XLSX_MIME,
};
pub use config::Settings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
