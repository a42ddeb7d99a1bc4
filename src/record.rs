// 🧾 Exposure Records - typed rows of the exposures sheet
// Eight source columns plus the derived TYPE_OF_EXPOSURE annotation

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

// ============================================================================
// CELL VALUES
// ============================================================================

/// Raw cell content for columns the classifier never interprets.
///
/// Keeps the kind the cell was read with so the exporter can write it back
/// unchanged (numbers stay numbers, text stays text).
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Interpret a CSV field: blank is empty, numeric text becomes a number.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else if let Some(n) = parse_finite(trimmed) {
            CellValue::Number(n)
        } else {
            CellValue::Text(field.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// `str::parse` also accepts "inf" and "NaN"; those are not numbers here.
fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integral values print without a trailing ".0" (account numbers, codes).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    BranchCode,
    CustomerNumber,
    CustomerName,
    CurrencyCode,
    LedgerCode,
    SubAccountCode,
    CurrentBalance,
    DepositType,
    TypeOfExposure,
}

impl Column {
    /// Columns every input file must carry, in output order.
    pub const REQUIRED: [Column; 8] = [
        Column::BranchCode,
        Column::CustomerNumber,
        Column::CustomerName,
        Column::CurrencyCode,
        Column::LedgerCode,
        Column::SubAccountCode,
        Column::CurrentBalance,
        Column::DepositType,
    ];

    /// Columns of a classified table, in output order.
    pub const ALL: [Column; 9] = [
        Column::BranchCode,
        Column::CustomerNumber,
        Column::CustomerName,
        Column::CurrencyCode,
        Column::LedgerCode,
        Column::SubAccountCode,
        Column::CurrentBalance,
        Column::DepositType,
        Column::TypeOfExposure,
    ];

    /// Header text as it appears in the spreadsheet (case-sensitive).
    pub fn header(&self) -> &'static str {
        match self {
            Column::BranchCode => "BRA_CODE",
            Column::CustomerNumber => "CUS_NUM",
            Column::CustomerName => "CUS_SHO_NAME",
            Column::CurrencyCode => "CUR_CODE",
            Column::LedgerCode => "LED_CODE",
            Column::SubAccountCode => "SUB_ACCT_CODE",
            Column::CurrentBalance => "CRNT_BAL",
            Column::DepositType => "TYPE_OF_DEP",
            Column::TypeOfExposure => "TYPE_OF_EXPOSURE",
        }
    }
}

// ============================================================================
// EXPOSURE
// ============================================================================

/// One customer account row from the exposures sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exposure {
    #[serde(rename = "BRA_CODE")]
    pub branch_code: CellValue,

    #[serde(rename = "CUS_NUM")]
    pub customer_number: CellValue,

    /// Only text names take part in pattern matching.
    #[serde(rename = "CUS_SHO_NAME")]
    pub customer_name: CellValue,

    #[serde(rename = "CUR_CODE")]
    pub currency_code: Option<i64>,

    #[serde(rename = "LED_CODE")]
    pub ledger_code: Option<i64>,

    #[serde(rename = "SUB_ACCT_CODE")]
    pub sub_account_code: CellValue,

    #[serde(rename = "CRNT_BAL")]
    pub current_balance: Option<f64>,

    #[serde(rename = "TYPE_OF_DEP")]
    pub deposit_type: Option<i64>,
}

impl Exposure {
    /// Build a record from the eight required cells, in `Column::REQUIRED` order.
    ///
    /// `row` is the 1-based spreadsheet row, used only for error messages.
    pub fn from_cells(row: usize, cells: [CellValue; 8]) -> Result<Self> {
        let [branch_code, customer_number, customer_name, cur, led, sub_account_code, bal, dep] =
            cells;

        Ok(Exposure {
            branch_code,
            customer_number,
            customer_name,
            currency_code: integer_code(row, Column::CurrencyCode, cur)?,
            ledger_code: integer_code(row, Column::LedgerCode, led)?,
            sub_account_code,
            current_balance: balance(row, bal)?,
            deposit_type: integer_code(row, Column::DepositType, dep)?,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.customer_name.as_text()
    }

    /// Strictly greater than; a missing balance never passes.
    pub fn balance_exceeds(&self, threshold: f64) -> bool {
        self.current_balance.map_or(false, |bal| bal > threshold)
    }

    /// Cell view of a source column. `TypeOfExposure` is not stored on the record.
    pub fn cell(&self, column: Column) -> CellValue {
        let code = |v: Option<i64>| v.map_or(CellValue::Empty, |c| CellValue::Number(c as f64));
        match column {
            Column::BranchCode => self.branch_code.clone(),
            Column::CustomerNumber => self.customer_number.clone(),
            Column::CustomerName => self.customer_name.clone(),
            Column::CurrencyCode => code(self.currency_code),
            Column::LedgerCode => code(self.ledger_code),
            Column::SubAccountCode => self.sub_account_code.clone(),
            Column::CurrentBalance => self
                .current_balance
                .map_or(CellValue::Empty, CellValue::Number),
            Column::DepositType => code(self.deposit_type),
            Column::TypeOfExposure => CellValue::Empty,
        }
    }
}

fn integer_code(row: usize, column: Column, cell: CellValue) -> Result<Option<i64>> {
    match cell {
        CellValue::Empty => Ok(None),
        // i64::MAX as f64 is 2^63, itself out of range
        CellValue::Number(n)
            if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 =>
        {
            Ok(Some(n as i64))
        }
        CellValue::Text(ref s) if s.trim().is_empty() => Ok(None),
        CellValue::Text(ref s) => s.trim().parse::<i64>().map(Some).map_err(|_| Error::InvalidCell {
            row,
            column: column.header(),
            found: s.clone(),
            message: "expected an integer code",
        }),
        CellValue::Number(n) => Err(Error::InvalidCell {
            row,
            column: column.header(),
            found: n.to_string(),
            message: "expected an integer code",
        }),
    }
}

fn balance(row: usize, cell: CellValue) -> Result<Option<f64>> {
    match cell {
        CellValue::Empty => Ok(None),
        CellValue::Number(n) if n.is_finite() => Ok(Some(n)),
        CellValue::Number(n) => Err(Error::InvalidCell {
            row,
            column: Column::CurrentBalance.header(),
            found: n.to_string(),
            message: "expected a finite balance",
        }),
        CellValue::Text(ref s) if s.trim().is_empty() => Ok(None),
        CellValue::Text(ref s) => parse_finite(&s.trim().replace(',', ""))
            .map(Some)
            .ok_or_else(|| Error::InvalidCell {
                row,
                column: Column::CurrentBalance.header(),
                found: s.clone(),
                message: "expected a numeric balance",
            }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
