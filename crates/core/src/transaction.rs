use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::account::AccountId;
use super::category::CategoryId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
}

impl ParseKindError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        ParseKindError {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// Balance effect of `amount` moving in this direction.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            _ => Err(ParseKindError::new("transaction type", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Paid,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Paid => "paid",
            TransactionStatus::Pending => "pending",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(TransactionStatus::Paid),
            "pending" => Ok(TransactionStatus::Pending),
            other => Err(ParseKindError::new("transaction status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub account_id: Option<AccountId>,
    pub category_id: CategoryId,
    pub description: String,
    /// Always positive; direction lives in `kind`.
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub date: NaiveDate,
    pub status: TransactionStatus,
    pub imported: bool,
    pub import_source: Option<String>,
    pub raw_source: serde_json::Value,
}

impl NewTransaction {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    /// `balance` after this transaction settles. Pending transactions leave it
    /// unchanged; `None` on overflow.
    pub fn apply_to(&self, balance: Decimal) -> Option<Decimal> {
        match self.status {
            TransactionStatus::Paid => balance.checked_add(self.signed_amount()),
            TransactionStatus::Pending => Some(balance),
        }
    }
}
