use chrono::NaiveDate;
use csv::StringRecord;
use encoding_rs::WINDOWS_1252;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::str::FromStr;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes exported text: UTF-8 when valid, Windows-1252 otherwise.
pub(crate) fn decode_text(data: &[u8]) -> Cow<'_, str> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    match std::str::from_utf8(data) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(data);
            text
        }
    }
}

/// Parses a money amount as written by Brazilian and US exports.
///
/// Handles `R$`, grouping separators in either convention, accounting
/// parentheses and an explicit `+`. The later of `.`/`,` is taken as the
/// decimal separator; a lone `,` is always decimal.
pub(crate) fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let compact: String = body
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) => compact.replace(',', "."),
        _ => compact,
    };
    let digits = normalized.strip_prefix('+').unwrap_or(&normalized);

    let value = Decimal::from_str(digits).ok()?;
    Some(if negative { -value } else { value })
}

pub(crate) fn parse_date(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Trimmed, non-empty cell at `idx`.
pub(crate) fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn record_to_json(headers: &StringRecord, record: &StringRecord) -> Value {
    let mut map = Map::new();
    for (i, header) in headers.iter().enumerate() {
        if let Some(value) = record.get(i) {
            map.insert(header.to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(map)
}

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_plain() {
        assert_eq!(parse_amount("123.45"), Some(dec("123.45")));
        assert_eq!(parse_amount("-100.00"), Some(dec("-100.00")));
    }

    #[test]
    fn parse_amount_brazilian_notation() {
        assert_eq!(parse_amount("R$ 1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("-15,90"), Some(dec("-15.90")));
    }

    #[test]
    fn parse_amount_us_grouping() {
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
    }

    #[test]
    fn parse_amount_accounting_parens() {
        assert_eq!(parse_amount("(75.25)"), Some(dec("-75.25")));
    }

    #[test]
    fn parse_amount_explicit_plus() {
        assert_eq!(parse_amount("+50.00"), Some(dec("50.00")));
    }

    #[test]
    fn parse_amount_invalid() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("R$"), None);
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_tries_formats_in_order() {
        let d = parse_date(" 02/03/2024 ", &["%d/%m/%Y", "%m/%d/%Y"]).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(parse_date("2024-13-40", &["%Y-%m-%d"]).is_none());
    }

    // ── decode_text ───────────────────────────────────────────────────────────

    #[test]
    fn decode_text_strips_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFdata,valor"), "data,valor");
    }

    #[test]
    fn decode_text_falls_back_to_windows_1252() {
        // "Descrição" as exported by older Windows tools
        let bytes = b"Descri\xE7\xE3o";
        assert_eq!(decode_text(bytes), "Descrição");
    }

    #[test]
    fn record_to_json_maps_headers() {
        let headers = StringRecord::from(vec!["date", "title"]);
        let record = StringRecord::from(vec!["2023-01-01", "Uber"]);
        let value = record_to_json(&headers, &record);
        assert_eq!(value["title"], "Uber");
    }
}
