use extrato_core::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::csv::CsvError;
use crate::ofx::OfxError;

/// File-level failures. Anything here aborts the import call.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Malformed file: {0}")]
    MalformedFile(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Balance update failed after inserting {inserted} transactions: {source}")]
    BalanceUpdate {
        inserted: usize,
        #[source]
        source: StoreError,
    },
    #[error("Import worker failed: {0}")]
    Worker(String),
}

impl From<OfxError> for ImportError {
    fn from(err: OfxError) -> Self {
        ImportError::MalformedFile(err.to_string())
    }
}

impl From<CsvError> for ImportError {
    fn from(err: CsvError) -> Self {
        ImportError::MalformedFile(err.to_string())
    }
}

/// A single record that could not be imported. `row` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        RowError {
            row,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}
