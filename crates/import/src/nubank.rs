use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use extrato_core::TransactionType;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::csv::CsvError;
use crate::error::RowError;
use crate::format::matches_nubank_header;
use crate::normalize::Parsed;
use crate::util::{cell, decode_text, parse_amount, parse_date, record_to_json};

const HEADER_SCAN_LINES: usize = 5;

const ISO_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d/%m/%y", "%d-%m-%Y", "%d.%m.%Y"];
const MONTH_FIRST_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y"];

const DESCRIPTION_HEADERS: &[&str] = &["descrição", "descricao", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NubankLayout {
    /// Checking account export: `Data,Valor,Identificador,Descrição`.
    Account,
    /// Card statement: `date,title,amount`.
    Card,
}

impl NubankLayout {
    /// `headers` must be trimmed and lowercase.
    pub fn detect(headers: &[String]) -> Option<Self> {
        let has = |name: &str| headers.iter().any(|h| h == name);
        if has("date") && has("title") && has("amount") {
            return Some(NubankLayout::Card);
        }

        let mentions = |needle: &str| headers.iter().any(|h| h.contains(needle));
        if mentions("data") && mentions("valor") {
            return Some(NubankLayout::Account);
        }
        None
    }

    /// Direction of a signed amount. Card statements list purchases as
    /// positive and payments as negative, the reverse of the account export.
    pub fn kind_for(self, amount: Decimal) -> TransactionType {
        let outflow = match self {
            NubankLayout::Account => amount < Decimal::ZERO,
            NubankLayout::Card => amount > Decimal::ZERO,
        };
        if outflow {
            TransactionType::Expense
        } else {
            TransactionType::Income
        }
    }

    fn columns(self, headers: &[String]) -> Result<Columns, CsvError> {
        let exact = |name: &str| headers.iter().position(|h| h == name);
        let missing = |name: &str| CsvError::MissingColumn(name.to_string());

        let columns = match self {
            NubankLayout::Card => Columns {
                date: exact("date").ok_or_else(|| missing("date"))?,
                description: exact("title").ok_or_else(|| missing("title"))?,
                amount: exact("amount").ok_or_else(|| missing("amount"))?,
            },
            NubankLayout::Account => Columns {
                date: headers
                    .iter()
                    .position(|h| h == "date" || h.contains("data"))
                    .ok_or_else(|| missing("data"))?,
                amount: headers
                    .iter()
                    .position(|h| h == "amount" || h.contains("valor"))
                    .ok_or_else(|| missing("valor"))?,
                description: headers
                    .iter()
                    .position(|h| DESCRIPTION_HEADERS.contains(&h.as_str()))
                    .or_else(|| exact("identificador"))
                    .ok_or_else(|| missing("descrição"))?,
            },
        };
        Ok(columns)
    }

    fn parse_date(self, raw: &str) -> Option<NaiveDate> {
        match self {
            NubankLayout::Card => {
                parse_date(raw, ISO_FORMATS).or_else(|| parse_date(raw, DAY_FIRST_FORMATS))
            }
            NubankLayout::Account => parse_day_first(raw),
        }
    }
}

struct Columns {
    date: usize,
    description: usize,
    amount: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NubankRow {
    pub row: usize,
    pub layout: NubankLayout,
    pub date: NaiveDate,
    pub description: String,
    /// Signed, as exported; see `NubankLayout::kind_for`.
    pub amount: Decimal,
    pub raw: Value,
}

/// Day-first dates, with ISO order when the first component is a year and a
/// month-first retry when the day-first reading is impossible.
fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let first = raw.split(|c: char| !c.is_ascii_digit()).next().unwrap_or_default();

    if first.len() == 4 {
        return parse_date(raw, ISO_FORMATS);
    }

    parse_date(raw, DAY_FIRST_FORMATS).or_else(|| {
        let leading: u32 = first.parse().ok()?;
        if leading <= 12 {
            parse_date(raw, MONTH_FIRST_FORMATS)
        } else {
            None
        }
    })
}

/// The header line, or the first line when no known header appears near
/// the top.
fn header_offset(text: &str) -> usize {
    let mut offset = 0;
    for line in text.split_inclusive('\n').take(HEADER_SCAN_LINES) {
        if matches_nubank_header(&line.to_lowercase()) {
            return offset;
        }
        offset += line.len();
    }
    0
}

pub fn parse(data: &[u8]) -> Result<Parsed<NubankRow>, CsvError> {
    let text = decode_text(data);
    let body = &text[header_offset(&text)..];

    let header_line = body
        .lines()
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or(CsvError::Empty)?;
    let delimiter = if header_line.contains(',') { b',' } else { b';' };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let layout = NubankLayout::detect(&lowered).ok_or(CsvError::UnknownLayout)?;
    let columns = layout.columns(&lowered)?;

    debug!("Parsing Nubank CSV with {layout:?} layout, delimiter '{}'", delimiter as char);

    let mut parsed = Parsed::default();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let outcome = result
            .map_err(|e| e.to_string())
            .and_then(|record| parse_row(&record, &headers, layout, &columns, row));
        match outcome {
            Ok(tx) => parsed.rows.push(tx),
            Err(message) => parsed.rejected.push(RowError::new(row, message)),
        }
    }

    debug!(
        "Parsed {} Nubank transactions ({} rejected)",
        parsed.rows.len(),
        parsed.rejected.len()
    );
    Ok(parsed)
}

fn parse_row(
    record: &StringRecord,
    headers: &StringRecord,
    layout: NubankLayout,
    columns: &Columns,
    row: usize,
) -> Result<NubankRow, String> {
    let raw_date = cell(record, columns.date).ok_or("missing date")?;
    let description = cell(record, columns.description).ok_or("missing description")?;
    let raw_amount = cell(record, columns.amount).ok_or("missing amount")?;

    let date = layout
        .parse_date(raw_date)
        .ok_or_else(|| format!("invalid date '{raw_date}'"))?;
    let amount = parse_amount(raw_amount).ok_or_else(|| format!("invalid amount '{raw_amount}'"))?;

    Ok(NubankRow {
        row,
        layout,
        date,
        description: description.to_string(),
        amount,
        raw: record_to_json(headers, record),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_account_layout() {
        let data = "Data,Valor,Identificador,Descrição
01/01/2023,-100.00,123,Compra Teste
02/01/2023,5000.00,124,Salário
";
        let parsed = parse(data.as_bytes()).unwrap();
        assert!(parsed.rejected.is_empty());
        assert_eq!(parsed.rows.len(), 2);

        let first = &parsed.rows[0];
        assert_eq!(first.layout, NubankLayout::Account);
        assert_eq!(first.date, date(2023, 1, 1));
        assert_eq!(first.amount, dec("-100.00"));
        assert_eq!(first.description, "Compra Teste");
        assert_eq!(first.raw["Identificador"], "123");

        let second = &parsed.rows[1];
        assert_eq!(second.date, date(2023, 1, 2));
        assert_eq!(second.description, "Salário");
    }

    #[test]
    fn parse_card_layout() {
        let data = b"date,category,title,amount
2023-01-01,Transporte,Uber,15.90
2023-01-02,Alimentacao,iFood,30.50
";
        let parsed = parse(data).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        let first = &parsed.rows[0];
        assert_eq!(first.layout, NubankLayout::Card);
        assert_eq!(first.amount, dec("15.90"));
        assert_eq!(first.description, "Uber");
        assert_eq!(first.raw["category"], "Transporte");
    }

    #[test]
    fn parse_semicolon_and_brazilian_amounts() {
        let data = "Data;Valor;Identificador;Descrição\n05/03/2024;-1.234,56;x1;Aluguel\n";
        let parsed = parse(data.as_bytes()).unwrap();
        assert_eq!(parsed.rows[0].amount, dec("-1234.56"));
        assert_eq!(parsed.rows[0].date, date(2024, 3, 5));
    }

    #[test]
    fn parse_uses_identifier_when_no_description() {
        let data = b"data,valor,identificador\n10/10/2024,-5.00,Transferencia Pix\n";
        let parsed = parse(data).unwrap();
        assert_eq!(parsed.rows[0].description, "Transferencia Pix");
    }

    #[test]
    fn parse_reports_bad_rows() {
        let data = b"date,title,amount\n2023-01-01,Uber,abc\n2023-01-02,,10.00\n2023-02-30,Taxi,9.00\n2023-01-03,Metro,4.40\n";
        let parsed = parse(data).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].row, 4);
        let rows: Vec<usize> = parsed.rejected.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![1, 2, 3]);
        assert!(parsed.rejected[0].message.contains("invalid amount 'abc'"));
        assert_eq!(parsed.rejected[1].message, "missing description");
        assert!(parsed.rejected[2].message.contains("invalid date"));
    }

    #[test]
    fn parse_skips_preamble_before_header() {
        let data = b"Nubank\nPeriodo: jan/2023\ndate,title,amount\n2023-01-05,Cinema,40.00\n";
        let parsed = parse(data).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].description, "Cinema");
    }

    #[test]
    fn parse_windows_1252_export() {
        let data = b"Data;Valor;Identificador;Descri\xE7\xE3o\n01/02/2023;-9,90;a;P\xE3o de a\xE7\xFAcar\n";
        let parsed = parse(data).unwrap();
        assert_eq!(parsed.rows[0].description, "Pão de açúcar");
        assert_eq!(parsed.rows[0].amount, dec("-9.90"));
    }

    #[test]
    fn parse_unknown_header_errors() {
        let err = parse(b"foo,bar\n1,2\n").unwrap_err();
        assert!(matches!(err, CsvError::UnknownLayout));
        assert!(matches!(parse(b"").unwrap_err(), CsvError::Empty));
    }

    // ── layout rules ──────────────────────────────────────────────────────────

    #[test]
    fn kind_for_inverts_between_layouts() {
        assert_eq!(NubankLayout::Account.kind_for(dec("-1")), TransactionType::Expense);
        assert_eq!(NubankLayout::Account.kind_for(dec("1")), TransactionType::Income);
        assert_eq!(NubankLayout::Card.kind_for(dec("1")), TransactionType::Expense);
        assert_eq!(NubankLayout::Card.kind_for(dec("-1")), TransactionType::Income);
    }

    #[test]
    fn parse_day_first_with_fallbacks() {
        assert_eq!(parse_day_first("02/01/2023"), Some(date(2023, 1, 2)));
        assert_eq!(parse_day_first("2023-01-02"), Some(date(2023, 1, 2)));
        // no 31st month, so read month-first
        assert_eq!(parse_day_first("12/31/2023"), Some(date(2023, 12, 31)));
        assert_eq!(parse_day_first("31/31/2023"), None);
    }
}
