use chrono::NaiveDate;
use extrato_core::AccountType;
use regex::Regex;
use roxmltree::{Document, Node};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::account::AccountInfo;
use crate::tables::{bank_name, ofx_account_type};
use crate::util::parse_amount;

/// One `<STMTTRN>` block, whichever parse path produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct OfxEntry {
    /// 1-based position among the statement's `<STMTTRN>` blocks.
    pub ordinal: usize,
    pub fit_id: Option<String>,
    pub trn_type: Option<String>,
    pub posted: NaiveDate,
    pub memo: Option<String>,
    pub name: Option<String>,
    /// Signed, as written in `TRNAMT`.
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Strict,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct OfxStatement {
    pub entries: Vec<OfxEntry>,
    pub strategy: ParseStrategy,
}

#[derive(Error, Debug)]
pub enum OfxError {
    #[error("No <OFX> payload found")]
    MissingPayload,
    #[error("Failed to parse OFX: {0}")]
    ParseError(String),
    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Field text of a transaction block before validation.
#[derive(Debug, Default)]
struct RawEntry<'a> {
    dtposted: Option<&'a str>,
    trnamt: Option<&'a str>,
    memo: Option<&'a str>,
    name: Option<&'a str>,
    fitid: Option<&'a str>,
    trntype: Option<&'a str>,
}

impl RawEntry<'_> {
    /// `None` for a node missing a usable date or amount; such nodes are
    /// dropped without a diagnostic.
    fn build(&self, ordinal: usize) -> Option<OfxEntry> {
        let posted = parse_posted(self.dtposted?)?;
        let amount = parse_amount(self.trnamt?)?;
        Some(OfxEntry {
            ordinal,
            fit_id: self.fitid.map(str::to_string),
            trn_type: self.trntype.map(str::to_string),
            posted,
            memo: self.memo.map(str::to_string),
            name: self.name.map(str::to_string),
            amount,
        })
    }
}

#[derive(Debug, Default)]
struct RawAccount {
    org: Option<String>,
    bank_id: Option<String>,
    acct_id: Option<String>,
    acct_type: Option<String>,
    branch_id: Option<String>,
    credit_card: bool,
}

impl RawAccount {
    fn into_info(self, unknown_institution: &str) -> Option<AccountInfo> {
        let account_number = self.acct_id?;
        let institution = self
            .org
            .or_else(|| self.bank_id.as_deref().and_then(bank_name).map(str::to_string))
            .unwrap_or_else(|| unknown_institution.to_string());
        let account_type = match self.acct_type.as_deref() {
            Some(raw) => ofx_account_type(raw),
            None if self.credit_card => AccountType::CreditCard,
            None => AccountType::Wallet,
        };

        Some(AccountInfo {
            institution,
            account_number: Some(account_number),
            account_type,
            bank_id: self.bank_id,
            branch_id: self.branch_id,
        })
    }
}

/// Parses statement transactions: strict XML first, then the pattern
/// extractor over the whole document.
pub fn parse(data: &[u8]) -> Result<OfxStatement, OfxError> {
    let content = String::from_utf8_lossy(data);
    let payload = locate_payload(&content).ok_or(OfxError::MissingPayload)?;

    match parse_strict(payload) {
        Ok(entries) if !entries.is_empty() => {
            debug!("Parsed {} OFX transactions as XML", entries.len());
            return Ok(OfxStatement {
                entries,
                strategy: ParseStrategy::Strict,
            });
        }
        Ok(_) => debug!("XML parse found no usable STMTTRN nodes, using fallback extractor"),
        Err(e) => debug!("XML parse failed ({e}), using fallback extractor"),
    }

    let entries = parse_fallback(&content)?;
    debug!("Fallback extractor recovered {} OFX transactions", entries.len());
    Ok(OfxStatement {
        entries,
        strategy: ParseStrategy::Fallback,
    })
}

/// Account metadata for the resolver, by the same strict-then-fallback
/// strategy. `None` when the file carries no account number.
pub fn extract_account_info(data: &[u8], unknown_institution: &str) -> Option<AccountInfo> {
    let content = String::from_utf8_lossy(data);
    let payload = locate_payload(&content)?;

    let raw = match account_strict(payload) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No account container in OFX XML, using fallback extractor");
            account_fallback(&content).ok()?
        }
        Err(e) => {
            debug!("OFX account XML parse failed ({e}), using fallback extractor");
            account_fallback(&content).ok()?
        }
    };

    raw.into_info(unknown_institution)
}

fn locate_payload(content: &str) -> Option<&str> {
    // ASCII uppercasing keeps byte offsets aligned with `content`.
    let start = content.to_ascii_uppercase().find("<OFX>")?;
    Some(&content[start..])
}

fn collapse_whitespace(payload: &str) -> Result<String, OfxError> {
    let between_tags = Regex::new(r">\s+<")?;
    let runs = Regex::new(r"\s+")?;
    let tight = between_tags.replace_all(payload, "><");
    Ok(runs.replace_all(&tight, " ").into_owned())
}

fn inject_default_namespace(xml: &str) -> String {
    match xml.get(..5) {
        Some(head) if head.eq_ignore_ascii_case("<OFX>") => {
            format!("{} xmlns=\"\">{}", &head[..4], &xml[5..])
        }
        _ => xml.to_string(),
    }
}

/// Runs `read` over the parsed payload, retrying once with an empty
/// default namespace on the root element.
fn with_document<R>(xml: &str, read: impl FnOnce(&Document<'_>) -> R) -> Result<R, OfxError> {
    match Document::parse(xml) {
        Ok(doc) => return Ok(read(&doc)),
        Err(e) => debug!("OFX payload is not well-formed XML ({e}), retrying with default namespace"),
    }

    let patched = inject_default_namespace(xml);
    let doc = Document::parse(&patched).map_err(|e| OfxError::ParseError(e.to_string()))?;
    Ok(read(&doc))
}

fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .filter(move |n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case(tag))
}

fn element_text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|s| !s.is_empty())
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case(tag))
        .and_then(element_text)
}

fn parse_strict(payload: &str) -> Result<Vec<OfxEntry>, OfxError> {
    let xml = collapse_whitespace(payload)?;
    with_document(&xml, |doc| {
        elements(doc.root(), "STMTTRN")
            .enumerate()
            .filter_map(|(i, node)| {
                RawEntry {
                    dtposted: child_text(node, "DTPOSTED"),
                    trnamt: child_text(node, "TRNAMT"),
                    memo: child_text(node, "MEMO"),
                    name: child_text(node, "NAME"),
                    fitid: child_text(node, "FITID"),
                    trntype: child_text(node, "TRNTYPE"),
                }
                .build(i + 1)
            })
            .collect()
    })
}

fn account_strict(payload: &str) -> Result<Option<RawAccount>, OfxError> {
    let xml = collapse_whitespace(payload)?;
    with_document(&xml, |doc| {
        let root = doc.root();
        let container = elements(root, "BANKACCTFROM")
            .next()
            .or_else(|| elements(root, "CCACCTFROM").next())?;
        let credit_card = container.tag_name().name().eq_ignore_ascii_case("CCACCTFROM")
            || elements(root, "CREDITCARDMSGSRSV1").next().is_some();

        Some(RawAccount {
            org: elements(root, "FI")
                .find_map(|fi| child_text(fi, "ORG"))
                .map(str::to_string),
            bank_id: elements(root, "BANKID")
                .find_map(element_text)
                .map(str::to_string),
            acct_id: child_text(container, "ACCTID").map(str::to_string),
            acct_type: child_text(container, "ACCTTYPE").map(str::to_string),
            branch_id: child_text(container, "BRANCHID").map(str::to_string),
            credit_card,
        })
    })
}

/// Case-insensitive `<TAG ...>value` extractor for SGML-style documents
/// whose elements are never closed.
fn tag_pattern(tag: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)<{tag}[^>]*>([^<]+)"))
}

fn capture<'h>(pattern: &Regex, haystack: &'h str) -> Option<&'h str> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

struct EntryPatterns {
    block: Regex,
    dtposted: Regex,
    trnamt: Regex,
    memo: Regex,
    name: Regex,
    fitid: Regex,
    trntype: Regex,
}

impl EntryPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            block: Regex::new(r"(?is)<STMTTRN>(.*?)</STMTTRN>")?,
            dtposted: tag_pattern("DTPOSTED")?,
            trnamt: tag_pattern("TRNAMT")?,
            memo: tag_pattern("MEMO")?,
            name: tag_pattern("NAME")?,
            fitid: tag_pattern("FITID")?,
            trntype: tag_pattern("TRNTYPE")?,
        })
    }
}

fn parse_fallback(content: &str) -> Result<Vec<OfxEntry>, OfxError> {
    let patterns = EntryPatterns::new()?;

    Ok(patterns
        .block
        .captures_iter(content)
        .enumerate()
        .filter_map(|(i, caps)| {
            let body = caps.get(1)?.as_str();
            RawEntry {
                dtposted: capture(&patterns.dtposted, body),
                trnamt: capture(&patterns.trnamt, body),
                memo: capture(&patterns.memo, body),
                name: capture(&patterns.name, body),
                fitid: capture(&patterns.fitid, body),
                trntype: capture(&patterns.trntype, body),
            }
            .build(i + 1)
        })
        .collect())
}

fn account_fallback(content: &str) -> Result<RawAccount, OfxError> {
    let upper = content.to_ascii_uppercase();
    Ok(RawAccount {
        org: capture(&tag_pattern("ORG")?, content).map(str::to_string),
        bank_id: capture(&tag_pattern("BANKID")?, content).map(str::to_string),
        acct_id: capture(&tag_pattern("ACCTID")?, content).map(str::to_string),
        acct_type: capture(&tag_pattern("ACCTTYPE")?, content).map(str::to_string),
        branch_id: capture(&tag_pattern("BRANCHID")?, content).map(str::to_string),
        credit_card: upper.contains("<CCACCTFROM>") || upper.contains("<CREDITCARDMSGSRSV1>"),
    })
}

/// First 8 characters as `YYYYMMDD`; time and timezone suffixes are ignored.
fn parse_posted(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..8)?, "%Y%m%d").ok()
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

    const SGML_OFX: &str = "OFXHEADER:100
DATA:OFXSGML
VERSION:102
SECURITY:NONE
ENCODING:USASCII
CHARSET:1252
COMPRESSION:NONE
OLDFILEUID:NONE
NEWFILEUID:NONE

<OFX>
<SIGNONMSGSRSV1>
<SONRS>
<STATUS>
<CODE>0
<SEVERITY>INFO
</STATUS>
<FI>
<ORG>Banco do Brasil S/A
<FID>001
</FI>
</SONRS>
</SIGNONMSGSRSV1>
<BANKMSGSRSV1>
<STMTTRNRS>
<TRNUID>1001
<STMTRS>
<CURDEF>BRL
<BANKACCTFROM>
<BANKID>001
<BRANCHID>1234-5
<ACCTID>12345
<ACCTTYPE>CHECKING
</BANKACCTFROM>
<BANKTRANLIST>
<DTSTART>20230101000000
<DTEND>20230131000000
<STMTTRN>
<TRNTYPE>DEBIT
<DTPOSTED>20230101000000[-3:BRT]
<TRNAMT>-100.00
<FITID>20230101001
<MEMO>Test Transaction
</STMTTRN>
<STMTTRN>
<TRNTYPE>CREDIT
<DTPOSTED>20230105
<TRNAMT>2500,00
<FITID>20230105001
<NAME>Salario
</STMTTRN>
</BANKTRANLIST>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
";

    const XML_OFX: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<OFX>
  <CREDITCARDMSGSRSV1>
    <CCSTMTTRNRS>
      <CCSTMTRS>
        <CCACCTFROM>
          <ACCTID>4111222233334444</ACCTID>
        </CCACCTFROM>
        <BANKTRANLIST>
          <STMTTRN>
            <TRNTYPE>DEBIT</TRNTYPE>
            <DTPOSTED>20230101120000</DTPOSTED>
            <TRNAMT>-75.50</TRNAMT>
            <FITID>20230101002</FITID>
            <MEMO>Valid XML Test</MEMO>
          </STMTTRN>
          <STMTTRN>
            <TRNTYPE>DEBIT</TRNTYPE>
            <DTPOSTED>not-a-date</DTPOSTED>
            <TRNAMT>-1.00</TRNAMT>
          </STMTTRN>
        </BANKTRANLIST>
      </CCSTMTRS>
    </CCSTMTTRNRS>
  </CREDITCARDMSGSRSV1>
</OFX>
"#;

    // ── parse ─────────────────────────────────────────────────────────────────

    #[test]
    fn parse_sgml_uses_fallback() {
        let stmt = parse(SGML_OFX.as_bytes()).unwrap();
        assert_eq!(stmt.strategy, ParseStrategy::Fallback);
        assert_eq!(stmt.entries.len(), 2);

        let first = &stmt.entries[0];
        assert_eq!(first.ordinal, 1);
        assert_eq!(first.posted, date(2023, 1, 1));
        assert_eq!(first.amount, dec("-100.00"));
        assert_eq!(first.memo.as_deref(), Some("Test Transaction"));
        assert_eq!(first.fit_id.as_deref(), Some("20230101001"));
        assert_eq!(first.trn_type.as_deref(), Some("DEBIT"));

        let second = &stmt.entries[1];
        assert_eq!(second.amount, dec("2500.00"));
        assert_eq!(second.memo, None);
        assert_eq!(second.name.as_deref(), Some("Salario"));
    }

    #[test]
    fn parse_well_formed_xml_strictly() {
        let stmt = parse(XML_OFX.as_bytes()).unwrap();
        assert_eq!(stmt.strategy, ParseStrategy::Strict);
        // The node with an unparseable date is dropped.
        assert_eq!(stmt.entries.len(), 1);
        assert_eq!(stmt.entries[0].memo.as_deref(), Some("Valid XML Test"));
        assert_eq!(stmt.entries[0].amount, dec("-75.50"));
        assert_eq!(stmt.entries[0].posted, date(2023, 1, 1));
    }

    #[test]
    fn parse_malformed_document_recovers_blocks() {
        let data = b"<OFX>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>20230101\n<TRNAMT>-50.00\n<MEMO>Fallback Test\n</STMTTRN>\n</OFX>\n";
        let stmt = parse(data).unwrap();
        assert_eq!(stmt.strategy, ParseStrategy::Fallback);
        assert_eq!(stmt.entries.len(), 1);
        assert_eq!(stmt.entries[0].memo.as_deref(), Some("Fallback Test"));
        assert_eq!(stmt.entries[0].amount, dec("-50.00"));
    }

    #[test]
    fn parse_finds_lowercase_marker() {
        let data = b"junk header\n<ofx><stmttrn><dtposted>20240210<trnamt>12.34<memo>Pix</stmttrn></ofx>";
        let stmt = parse(data).unwrap();
        assert_eq!(stmt.entries.len(), 1);
        assert_eq!(stmt.entries[0].posted, date(2024, 2, 10));
    }

    #[test]
    fn parse_skips_blocks_without_amount() {
        let data = b"<OFX><STMTTRN><DTPOSTED>20230101<MEMO>No amount</STMTTRN>\
<STMTTRN><DTPOSTED>20230102<TRNAMT>-3.00<MEMO>Ok</STMTTRN></OFX>";
        let stmt = parse(data).unwrap();
        assert_eq!(stmt.entries.len(), 1);
        assert_eq!(stmt.entries[0].ordinal, 2);
    }

    #[test]
    fn parse_without_payload_errors() {
        let err = parse(b"date,description,amount\n").unwrap_err();
        assert!(matches!(err, OfxError::MissingPayload));
    }

    #[test]
    fn parse_payload_without_transactions_is_empty() {
        let stmt = parse(b"<OFX><BANKMSGSRSV1></BANKMSGSRSV1></OFX>").unwrap();
        assert!(stmt.entries.is_empty());
    }

    #[test]
    fn inject_default_namespace_rewrites_root() {
        assert_eq!(inject_default_namespace("<OFX><A/></OFX>"), "<OFX xmlns=\"\"><A/></OFX>");
        assert_eq!(inject_default_namespace("<ofx></ofx>"), "<ofx xmlns=\"\"></ofx>");
    }

    #[test]
    fn parse_posted_ignores_time_suffix() {
        assert_eq!(parse_posted("20231231235959.000[-3:BRT]"), Some(date(2023, 12, 31)));
        assert_eq!(parse_posted("2023"), None);
    }

    // ── extract_account_info ──────────────────────────────────────────────────

    #[test]
    fn account_info_prefers_org() {
        let info = extract_account_info(SGML_OFX.as_bytes(), "Banco Desconhecido").unwrap();
        assert_eq!(info.institution, "Banco do Brasil S/A");
        assert_eq!(info.account_number.as_deref(), Some("12345"));
        assert_eq!(info.account_type, AccountType::Checking);
        assert_eq!(info.bank_id.as_deref(), Some("001"));
        assert_eq!(info.branch_id.as_deref(), Some("1234-5"));
    }

    #[test]
    fn account_info_maps_bank_code() {
        let data = b"<OFX>
<BANKMSGSRSV1>
<STMTTRNRS>
<STMTRS>
<BANKACCTFROM>
<BANKID>260
<ACCTID>123456
<ACCTTYPE>CHECKING
</BANKACCTFROM>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
";
        let info = extract_account_info(data, "Banco Desconhecido").unwrap();
        assert_eq!(info.bank_id.as_deref(), Some("260"));
        assert_eq!(info.account_number.as_deref(), Some("123456"));
        assert_eq!(info.institution, "Nubank");
    }

    #[test]
    fn account_info_from_xml_credit_card() {
        let info = extract_account_info(XML_OFX.as_bytes(), "Banco Desconhecido").unwrap();
        assert_eq!(info.account_type, AccountType::CreditCard);
        assert_eq!(info.account_number.as_deref(), Some("4111222233334444"));
        assert_eq!(info.institution, "Banco Desconhecido");
    }

    #[test]
    fn account_info_xml_savings() {
        let data = br#"<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS>
<BANKACCTFROM><BANKID>341</BANKID><ACCTID>998877</ACCTID><ACCTTYPE>SAVINGS</ACCTTYPE></BANKACCTFROM>
</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>"#;
        let info = extract_account_info(data, "Banco Desconhecido").unwrap();
        assert_eq!(info.institution, "Itaú");
        assert_eq!(info.account_type, AccountType::Savings);
    }

    #[test]
    fn account_info_without_acctid_is_none() {
        let data = b"<OFX><BANKACCTFROM><BANKID>260<ACCTTYPE>CHECKING</BANKACCTFROM></OFX>";
        assert!(extract_account_info(data, "Banco Desconhecido").is_none());
    }

    #[test]
    fn account_info_defaults_missing_type_to_wallet() {
        let data = b"<OFX><BANKACCTFROM><BANKID>077<ACCTID>555</BANKACCTFROM></OFX>";
        let info = extract_account_info(data, "Banco Desconhecido").unwrap();
        assert_eq!(info.institution, "Banco Inter");
        assert_eq!(info.account_type, AccountType::Wallet);
    }
}
