// 🏷️ Exposure Status - (CUR_CODE, LED_CODE) → account sub-type label

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureStatus {
    Current,
    FeaUsd,
    FcaUsd,
    EasySavers,
    FcaEur,
    FeaGbp,
    FeaEur,
    Call,
    /// Fallback for every pair missing from the table
    FcaGbp,
}

impl ExposureStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExposureStatus::Current => "CURRENT",
            ExposureStatus::FeaUsd => "FEA USD",
            ExposureStatus::FcaUsd => "FCA USD",
            ExposureStatus::EasySavers => "EASY SAVERS",
            ExposureStatus::FcaEur => "FCA EUR",
            ExposureStatus::FeaGbp => "FEA GBP",
            ExposureStatus::FeaEur => "FEA EUR",
            ExposureStatus::Call => "CALL",
            ExposureStatus::FcaGbp => "FCA GBP",
        }
    }
}

impl fmt::Display for ExposureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ExposureStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Table lookup only. `None` means the pair is unmapped.
pub fn lookup_status(currency_code: Option<i64>, ledger_code: Option<i64>) -> Option<ExposureStatus> {
    match (currency_code?, ledger_code?) {
        (1, 1) => Some(ExposureStatus::Current),
        (2, 2) => Some(ExposureStatus::FeaUsd),
        (2, 3) => Some(ExposureStatus::FcaUsd),
        (1, 4) => Some(ExposureStatus::EasySavers),
        (4, 3) => Some(ExposureStatus::FcaEur),
        (3, 2) => Some(ExposureStatus::FeaGbp),
        (4, 2) => Some(ExposureStatus::FeaEur),
        (1, 55) => Some(ExposureStatus::Call),
        _ => None,
    }
}

/// Total version of [`lookup_status`]; unmapped pairs are 'FCA GBP'.
pub fn determine_status(currency_code: Option<i64>, ledger_code: Option<i64>) -> ExposureStatus {
    lookup_status(currency_code, ledger_code).unwrap_or(ExposureStatus::FcaGbp)
}
