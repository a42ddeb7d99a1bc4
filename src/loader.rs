// 📂 Loader - spreadsheet bytes → typed exposure records
// Workbooks go through calamine (first worksheet), .csv files through csv

use crate::error::{Error, Result};
use crate::record::{CellValue, Column, Exposure};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use std::path::Path;

// ============================================================================
// INPUT FORMAT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// xlsx, xlsm, xlsb, xls, ods
    Workbook,
    Csv,
}

impl InputFormat {
    /// Decided by extension; anything that is not `.csv` is tried as a workbook.
    pub fn from_file_name(file_name: &str) -> Self {
        let is_csv = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            InputFormat::Csv
        } else {
            InputFormat::Workbook
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Workbook => "workbook",
            InputFormat::Csv => "csv",
        }
    }
}

// ============================================================================
// RAW TABLE
// ============================================================================

/// Header row plus untyped data rows, before column selection.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Keep the eight required columns and type them. Extra columns are
    /// ignored; every missing column is reported at once.
    pub fn into_exposures(self) -> Result<Vec<Exposure>> {
        let mut missing = Vec::new();
        let mut indices = [0usize; 8];

        for (slot, column) in Column::REQUIRED.iter().enumerate() {
            match self.headers.iter().position(|h| h == column.header()) {
                Some(idx) => indices[slot] = idx,
                None => missing.push(column.header().to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }

        self.rows
            .into_iter()
            .enumerate()
            // header is spreadsheet row 1
            .map(|(i, mut row)| {
                let cells = indices.map(|idx| row.get_mut(idx).map(std::mem::take).unwrap_or_default());
                Exposure::from_cells(i + 2, cells)
            })
            .collect()
    }
}

// ============================================================================
// READERS
// ============================================================================

/// Load exposures from an uploaded file's bytes.
pub fn load_exposures(bytes: &[u8], file_name: &str) -> Result<Vec<Exposure>> {
    let format = InputFormat::from_file_name(file_name);
    let table = match format {
        InputFormat::Csv => read_csv(bytes)?,
        InputFormat::Workbook => read_workbook(bytes)?,
    };

    let exposures = table.into_exposures()?;
    tracing::info!(file = file_name, ?format, records = exposures.len(), "loaded exposures");
    Ok(exposures)
}

pub fn read_workbook(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(Error::EmptyWorkbook)??;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header.iter().map(header_text).collect(),
        None => Vec::new(),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

pub fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from_field).collect());
    }

    Ok(RawTable { headers, rows })
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    const HEADER: &str = "BRA_CODE,CUS_NUM,CUS_SHO_NAME,CUR_CODE,LED_CODE,SUB_ACCT_CODE,CRNT_BAL,TYPE_OF_DEP";

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_file_name("exposures.xlsx"), InputFormat::Workbook);
        assert_eq!(InputFormat::from_file_name("march.CSV"), InputFormat::Csv);
        assert_eq!(InputFormat::from_file_name("no_extension"), InputFormat::Workbook);
    }

    #[test]
    fn test_load_csv_with_extra_and_reordered_columns() {
        let csv = "NOTE,TYPE_OF_DEP,CRNT_BAL,SUB_ACCT_CODE,LED_CODE,CUR_CODE,CUS_SHO_NAME,CUS_NUM,BRA_CODE\n\
                   x,28,10.5,0,1,1,Generic Co,5001,101\n";
        let exposures = load_exposures(csv.as_bytes(), "upload.csv").unwrap();

        assert_eq!(exposures.len(), 1);
        let exp = &exposures[0];
        assert_eq!(exp.name(), Some("Generic Co"));
        assert_eq!(exp.deposit_type, Some(28));
        assert_eq!(exp.current_balance, Some(10.5));
        assert_eq!(exp.branch_code, CellValue::Number(101.0));
    }

    #[test]
    fn test_missing_columns_are_all_reported() {
        let csv = "BRA_CODE,CUS_NUM,CUS_SHO_NAME,CUR_CODE,LED_CODE,SUB_ACCT_CODE\n1,2,A,1,1,0\n";
        let err = load_exposures(csv.as_bytes(), "short.csv").unwrap_err();

        match err {
            Error::MissingColumns(cols) => {
                assert_eq!(cols, vec!["CRNT_BAL".to_string(), "TYPE_OF_DEP".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let csv = HEADER.replace("CRNT_BAL", "crnt_bal") + "\n";
        let err = load_exposures(csv.as_bytes(), "lower.csv").unwrap_err();
        assert!(matches!(err, Error::MissingColumns(ref c) if c == &vec!["CRNT_BAL".to_string()]));
    }

    #[test]
    fn test_blank_cells_become_missing_values() {
        let csv = format!("{HEADER}\n101,5001,,,,,,\n");
        let exposures = load_exposures(csv.as_bytes(), "blank.csv").unwrap();

        let exp = &exposures[0];
        assert_eq!(exp.name(), None);
        assert_eq!(exp.currency_code, None);
        assert_eq!(exp.current_balance, None);
    }

    #[test]
    fn test_invalid_cell_reports_spreadsheet_row() {
        let csv = format!("{HEADER}\n101,1,A,1,1,0,10,0\n101,2,B,1,1,0,lots,0\n");
        let err = load_exposures(csv.as_bytes(), "bad.csv").unwrap_err();

        match err {
            Error::InvalidCell { row, column, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, "CRNT_BAL");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_balance_is_rejected() {
        for balance in ["inf", "NaN"] {
            let csv = format!("{HEADER}\n101,1,A,1,1,0,{balance},0\n");
            let err = load_exposures(csv.as_bytes(), "bad.csv").unwrap_err();
            assert!(matches!(err, Error::InvalidCell { row: 2, column: "CRNT_BAL", .. }), "{balance}");
        }

        // a name that happens to spell NaN is still a name
        let csv = format!("{HEADER}\n101,1,NaN,1,1,0,10,0\n");
        let exposures = load_exposures(csv.as_bytes(), "nan.csv").unwrap();
        assert_eq!(exposures[0].name(), Some("NaN"));
    }

    #[test]
    fn test_load_xlsx_first_sheet() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in HEADER.split(',').enumerate() {
            sheet.write_string(0, col as u16, header).unwrap();
        }
        sheet.write_number(1, 0, 101).unwrap();
        sheet.write_number(1, 1, 5001).unwrap();
        sheet.write_string(1, 2, "ABC Pensions Ltd").unwrap();
        sheet.write_number(1, 3, 1).unwrap();
        sheet.write_number(1, 4, 1).unwrap();
        sheet.write_string(1, 5, "SA-9").unwrap();
        sheet.write_number(1, 6, 100.25).unwrap();
        sheet.write_number(1, 7, 5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let exposures = load_exposures(&bytes, "exposures.xlsx").unwrap();

        assert_eq!(exposures.len(), 1);
        let exp = &exposures[0];
        assert_eq!(exp.name(), Some("ABC Pensions Ltd"));
        assert_eq!(exp.currency_code, Some(1));
        assert_eq!(exp.ledger_code, Some(1));
        assert_eq!(exp.sub_account_code, CellValue::Text("SA-9".into()));
        assert_eq!(exp.current_balance, Some(100.25));
    }

    #[test]
    fn test_corrupt_workbook_is_an_error() {
        let err = load_exposures(b"definitely not a spreadsheet", "broken.xlsx").unwrap_err();
        assert!(matches!(err, Error::Spreadsheet(_)));
    }
}
