use chrono::NaiveDate;
use extrato_core::TransactionType;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use crate::csv::GenericRow;
use crate::error::RowError;
use crate::nubank::NubankRow;
use crate::ofx::OfxEntry;

const MISSING_DESCRIPTION: &str = "no description";

/// The one row shape every parser folds into.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTransaction {
    /// 1-based position in the source file.
    pub row: usize,
    pub date: NaiveDate,
    pub description: String,
    /// Never negative; direction lives in `kind`.
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Only generic CSV exports carry an explicit category.
    pub category_name: Option<String>,
    pub raw_source: Value,
}

pub trait Normalize {
    fn normalize(self) -> NormalizedTransaction;
}

/// Parser output: rows that parsed, and diagnostics for rows that did not.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<RowError>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T: Normalize> Parsed<T> {
    pub fn normalize(self) -> Parsed<NormalizedTransaction> {
        Parsed {
            rows: self.rows.into_iter().map(Normalize::normalize).collect(),
            rejected: self.rejected,
        }
    }
}

impl Normalize for OfxEntry {
    fn normalize(self) -> NormalizedTransaction {
        let kind = if self.amount < Decimal::ZERO {
            TransactionType::Expense
        } else {
            TransactionType::Income
        };
        let description = self
            .memo
            .filter(|m| !m.is_empty())
            .or(self.name.filter(|n| !n.is_empty()))
            .unwrap_or_else(|| MISSING_DESCRIPTION.to_string());

        NormalizedTransaction {
            row: self.ordinal,
            date: self.posted,
            description,
            amount: self.amount.abs(),
            kind,
            category_name: None,
            raw_source: json!({ "fitid": self.fit_id, "trntype": self.trn_type }),
        }
    }
}

impl Normalize for NubankRow {
    fn normalize(self) -> NormalizedTransaction {
        NormalizedTransaction {
            row: self.row,
            date: self.date,
            description: self.description.trim().to_string(),
            amount: self.amount.abs(),
            kind: self.layout.kind_for(self.amount),
            category_name: None,
            raw_source: self.raw,
        }
    }
}

impl Normalize for GenericRow {
    fn normalize(self) -> NormalizedTransaction {
        NormalizedTransaction {
            row: self.row,
            date: self.date,
            description: self.description.trim().to_string(),
            amount: self.amount,
            kind: self.kind,
            category_name: self
                .category_name
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            raw_source: self.raw,
        }
    }
}
