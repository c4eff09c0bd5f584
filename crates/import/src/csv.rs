use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use extrato_core::TransactionType;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::RowError;
use crate::normalize::Parsed;
use crate::util::{cell, decode_text, parse_amount, parse_date, record_to_json};

const DATE_ALIASES: &[&str] = &["date", "data"];
const DESCRIPTION_ALIASES: &[&str] = &["description", "descrição", "descricao"];
const AMOUNT_ALIASES: &[&str] = &["amount", "valor"];
const TYPE_ALIASES: &[&str] = &["type", "tipo"];
const CATEGORY_ALIASES: &[&str] = &["category_name", "category", "categoria"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Unrecognized header layout")]
    UnknownLayout,
    #[error("No header row")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericRow {
    pub row: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionType,
    pub category_name: Option<String>,
    pub raw: Value,
}

struct Columns {
    date: usize,
    description: usize,
    amount: usize,
    kind: usize,
    category: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, CsvError> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        Ok(Self {
            date: require(&lowered, DATE_ALIASES, "date")?,
            description: require(&lowered, DESCRIPTION_ALIASES, "description")?,
            amount: require(&lowered, AMOUNT_ALIASES, "amount")?,
            kind: require(&lowered, TYPE_ALIASES, "type")?,
            category: position(&lowered, CATEGORY_ALIASES),
        })
    }
}

fn position(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| aliases.contains(&h.as_str()))
}

fn require(headers: &[String], aliases: &[&str], name: &str) -> Result<usize, CsvError> {
    position(headers, aliases).ok_or_else(|| CsvError::MissingColumn(name.to_string()))
}

/// Parses the generic export layout. Each row is validated on its own; a bad
/// row becomes a diagnostic and parsing moves on.
pub fn parse(data: &[u8]) -> Result<Parsed<GenericRow>, CsvError> {
    let text = decode_text(data);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(CsvError::Empty);
    }
    let columns = Columns::locate(&headers)?;

    let mut parsed = Parsed::default();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let outcome = result
            .map_err(|e| e.to_string())
            .and_then(|record| parse_row(&record, &headers, &columns, row));
        match outcome {
            Ok(tx) => parsed.rows.push(tx),
            Err(message) => parsed.rejected.push(RowError::new(row, message)),
        }
    }

    debug!(
        "Parsed {} generic CSV rows ({} rejected)",
        parsed.rows.len(),
        parsed.rejected.len()
    );
    Ok(parsed)
}

fn parse_row(
    record: &StringRecord,
    headers: &StringRecord,
    columns: &Columns,
    row: usize,
) -> Result<GenericRow, String> {
    let description = cell(record, columns.description).ok_or("missing description")?;

    let raw_amount = cell(record, columns.amount).ok_or("missing amount")?;
    let amount = parse_amount(raw_amount).ok_or_else(|| format!("invalid amount '{raw_amount}'"))?;

    let raw_type = cell(record, columns.kind).ok_or("missing type")?;
    let kind = raw_type
        .parse::<TransactionType>()
        .map_err(|_| format!("type must be income or expense, got '{raw_type}'"))?;

    let raw_date = cell(record, columns.date).ok_or("missing date")?;
    let date = parse_date(raw_date, DATE_FORMATS).ok_or_else(|| format!("invalid date '{raw_date}'"))?;

    Ok(GenericRow {
        row,
        date,
        description: description.to_string(),
        amount,
        kind,
        category_name: columns
            .category
            .and_then(|c| cell(record, c))
            .map(str::to_string),
        raw: record_to_json(headers, record),
    })
}
