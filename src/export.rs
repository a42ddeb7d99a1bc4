// 📤 Workbook Export - one sheet per category, in declaration order

use crate::classifier::{CategoryTable, Classification};
use crate::error::Result;
use crate::record::CellValue;
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const SHEET_NAME_MAX_CHARS: usize = 31;
pub const SHEET_NAME_ILLEGAL: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// ============================================================================
// SHEET NAMES
// ============================================================================

/// Make a category name usable as a worksheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if SHEET_NAME_ILLEGAL.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim_matches('\'');
    let truncated: String = trimmed.chars().take(SHEET_NAME_MAX_CHARS).collect();
    // truncation can expose a trailing apostrophe
    let truncated = truncated.trim_end_matches('\'');

    if truncated.trim().is_empty() {
        "Sheet".to_string()
    } else if truncated.eq_ignore_ascii_case("History") {
        format!("{}_", truncated)
    } else {
        truncated.to_string()
    }
}

/// Sanitized names with case-insensitive duplicates suffixed `~2`, `~3`, ...
pub fn unique_sheet_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for name in names {
        let base = sanitize_sheet_name(name);
        let mut candidate = base.clone();
        let mut n = 2;

        while !seen.insert(candidate.to_lowercase()) {
            let suffix = format!("~{}", n);
            let keep = SHEET_NAME_MAX_CHARS - suffix.chars().count();
            candidate = base.chars().take(keep).collect::<String>() + &suffix;
            n += 1;
        }

        result.push(candidate);
    }

    result
}

/// `exposures.xlsx` → `exposures_processed.xlsx`; the output is always xlsx.
pub fn output_file_name(input_name: &str, suffix: &str) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("exposures");
    format!("{}{}.xlsx", stem, suffix)
}

/// Output path next to the input file.
pub fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    input.with_file_name(output_file_name(name, suffix))
}

// ============================================================================
// WRITER
// ============================================================================

/// Serialize every category table into one xlsx workbook.
pub fn write_workbook(classification: &Classification) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);

    let names = unique_sheet_names(classification.tables.iter().map(|t| t.name.as_str()));

    for (table, sheet_name) in classification.tables.iter().zip(names) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;
        write_table(worksheet, table, &header_format)?;
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::info!(
        sheets = classification.tables.len(),
        rows = classification.total_rows(),
        bytes = bytes.len(),
        "workbook written"
    );
    Ok(bytes)
}

/// Write the workbook to disk, returning the byte count.
pub fn save_workbook(classification: &Classification, path: &Path) -> Result<usize> {
    let bytes = write_workbook(classification)?;
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}

fn write_table(worksheet: &mut Worksheet, table: &CategoryTable, header_format: &Format) -> Result<()> {
    for (col, column) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, column.header(), header_format)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, column) in table.columns().iter().enumerate() {
            match row.cell(*column) {
                CellValue::Empty => {}
                CellValue::Number(n) => {
                    worksheet.write_number(r, col as u16, n)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(r, col as u16, &s)?;
                }
            }
        }
    }

    worksheet.autofit();
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
