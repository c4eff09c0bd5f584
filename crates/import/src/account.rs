use extrato_core::{Account, AccountId, AccountStore, AccountType, NewAccount, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ImportConfig;
use crate::tables::{account_style, CREDIT_CARD_FILENAME_HINTS, FILENAME_INSTITUTIONS};
use crate::util::{contains_any, decode_text};

const NUMBER_IN_NAME: u32 = 10;
const LAST_FOUR_IN_NAME: u32 = 5;
const INSTITUTION_IN_NAME: u32 = 3;
const INSTITUTION_MATCH: u32 = 3;
const TYPE_MATCH: u32 = 2;

/// What a statement file says about the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub institution: String,
    pub account_number: Option<String>,
    pub account_type: AccountType,
    pub bank_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub id: AccountId,
    pub name: String,
    pub was_created: bool,
}

/// Infers account metadata for CSV exports, which carry none in-band.
pub fn account_info_from_csv(
    filename: &str,
    content: &[u8],
    unknown_institution: &str,
) -> AccountInfo {
    let name = filename.to_lowercase();

    let institution = FILENAME_INSTITUTIONS
        .iter()
        .find(|(keywords, _)| contains_any(&name, keywords))
        .map(|(_, institution)| institution.to_string())
        .unwrap_or_else(|| unknown_institution.to_string());

    let text = decode_text(content);
    let first_line = text.lines().next().unwrap_or_default().to_lowercase();
    let card_statement = ["date", "title", "amount"]
        .iter()
        .all(|col| first_line.contains(col));

    let account_type = if contains_any(&name, CREDIT_CARD_FILENAME_HINTS) || card_statement {
        AccountType::CreditCard
    } else {
        AccountType::Checking
    };

    AccountInfo {
        institution,
        account_number: filename_account_number(filename),
        account_type,
        bank_id: None,
        branch_id: None,
    }
}

/// Digits following the first `LETTERS[_-]` run of the uppercased name,
/// e.g. `12345678` in `NU_12345678_01OUT2025.csv`.
fn filename_account_number(filename: &str) -> Option<String> {
    let upper = filename.to_uppercase();
    let bytes = upper.as_bytes();

    for i in 1..bytes.len() {
        if (bytes[i] == b'_' || bytes[i] == b'-') && bytes[i - 1].is_ascii_uppercase() {
            let digits: String = upper[i + 1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return Some(digits);
            }
        }
    }
    None
}

/// Last `n` characters of `s`, or all of it when shorter.
fn last_chars(s: &str, n: usize) -> &str {
    let start = s
        .char_indices()
        .rev()
        .nth(n.saturating_sub(1))
        .map_or(0, |(i, _)| i);
    &s[start..]
}

pub struct AccountResolver {
    pub short_circuit_score: u32,
    pub reuse_score: u32,
    pub credit_card_closing_day: u8,
    pub credit_card_due_day: u8,
}

impl Default for AccountResolver {
    fn default() -> Self {
        Self {
            short_circuit_score: 13,
            reuse_score: 5,
            credit_card_closing_day: 10,
            credit_card_due_day: 15,
        }
    }
}

impl AccountResolver {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            credit_card_closing_day: config.credit_card_closing_day,
            credit_card_due_day: config.credit_card_due_day,
            ..Self::default()
        }
    }

    pub fn score(&self, account: &Account, info: &AccountInfo) -> u32 {
        let mut score = 0;

        if let Some(number) = info.account_number.as_deref() {
            if account.name.contains(number) {
                score += NUMBER_IN_NAME;
            }
            if number.chars().count() >= 4 && account.name.contains(last_chars(number, 4)) {
                score += LAST_FOUR_IN_NAME;
            }
        }

        let institution = info.institution.to_lowercase();
        if account.name.to_lowercase().contains(&institution) {
            score += INSTITUTION_IN_NAME;
        }
        if account
            .institution
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(&institution)
        {
            score += INSTITUTION_MATCH;
        }

        if account.account_type == info.account_type {
            score += TYPE_MATCH;
        }

        score
    }

    /// Picks an existing account for `info`, scanning active accounts in
    /// order. A candidate corroborated by number, institution and type ends
    /// the scan; otherwise the first best-scoring candidate wins if it
    /// clears `reuse_score`.
    pub fn best_match<'a>(&self, accounts: &'a [Account], info: &AccountInfo) -> Option<&'a Account> {
        let has_number = info.account_number.is_some();
        let mut best: Option<(&Account, u32)> = None;

        for account in accounts.iter().filter(|a| a.is_active) {
            let score = self.score(account, info);

            if has_number && score >= self.short_circuit_score {
                return Some(account);
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((account, score));
            }
        }

        best.filter(|(_, score)| *score >= self.reuse_score)
            .map(|(account, _)| account)
    }

    pub fn new_account(&self, user_id: &str, info: &AccountInfo) -> NewAccount {
        let name = match info.account_number.as_deref() {
            Some(number) => format!("{} - {}", info.institution, last_chars(number, 4)),
            None => info.institution.clone(),
        };
        let (color, icon) = account_style(info.account_type);

        let mut account = NewAccount::new(user_id, &name, info.account_type)
            .with_institution(&info.institution);
        account.color = Some(color.to_string());
        account.icon = Some(icon.to_string());
        if info.account_type == AccountType::CreditCard {
            account.closing_day = Some(self.credit_card_closing_day);
            account.due_day = Some(self.credit_card_due_day);
        }
        account
    }

    pub async fn find_or_create<S>(
        &self,
        store: &S,
        user_id: &str,
        info: &AccountInfo,
    ) -> StoreResult<ResolvedAccount>
    where
        S: AccountStore + ?Sized,
    {
        let accounts = store.find_by_user(user_id).await?;

        if let Some(account) = self.best_match(&accounts, info) {
            debug!("Matched existing account {} ({})", account.id, account.name);
            return Ok(ResolvedAccount {
                id: account.id.clone(),
                name: account.name.clone(),
                was_created: false,
            });
        }

        let new_account = self.new_account(user_id, info);
        let name = new_account.name.clone();
        let id = store.create(new_account).await?;
        info!("Created account {id} ({name}) for imported statement");

        Ok(ResolvedAccount {
            id,
            name,
            was_created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extrato_storage::MemoryStore;
    use rust_decimal::Decimal;

    fn info(institution: &str, number: Option<&str>, account_type: AccountType) -> AccountInfo {
        AccountInfo {
            institution: institution.to_string(),
            account_number: number.map(str::to_string),
            account_type,
            bank_id: None,
            branch_id: None,
        }
    }

    fn account(id: &str, name: &str, institution: &str, account_type: AccountType) -> Account {
        Account {
            id: AccountId::from(id),
            user_id: "u1".to_string(),
            name: name.to_string(),
            account_type,
            institution: Some(institution.to_string()),
            initial_balance: Decimal::ZERO,
            current_balance: Decimal::ZERO,
            color: None,
            icon: None,
            closing_day: None,
            due_day: None,
            is_active: true,
        }
    }

    // ── account_info_from_csv ─────────────────────────────────────────────────

    #[test]
    fn csv_info_nubank_card() {
        let info = account_info_from_csv(
            "nubank_fatura_12345678.csv",
            b"date,title,amount\n2025-01-15,Uber,50.00",
            "Banco Desconhecido",
        );
        assert_eq!(info.institution, "Nubank");
        assert_eq!(info.account_number.as_deref(), Some("12345678"));
        assert_eq!(info.account_type, AccountType::CreditCard);
    }

    #[test]
    fn csv_info_inter_checking() {
        let info = account_info_from_csv(
            "inter_extrato_98765.csv",
            b"data,descricao,valor\n2025-01-15,Compra,100.00",
            "Banco Desconhecido",
        );
        assert_eq!(info.institution, "Banco Inter");
        assert_eq!(info.account_number.as_deref(), Some("98765"));
        assert_eq!(info.account_type, AccountType::Checking);
    }

    #[test]
    fn csv_info_unknown_bank() {
        let info = account_info_from_csv(
            "extrato.csv",
            b"data,descricao,valor\n2025-01-15,Compra,100.00",
            "Banco Desconhecido",
        );
        assert_eq!(info.institution, "Banco Desconhecido");
        assert_eq!(info.account_number, None);
        assert_eq!(info.account_type, AccountType::Checking);
    }

    #[test]
    fn csv_info_card_hint_in_filename() {
        let info = account_info_from_csv("itau-cartão-2024.csv", b"data;valor\n", "?");
        assert_eq!(info.institution, "Itaú");
        assert_eq!(info.account_type, AccountType::CreditCard);
    }

    #[test]
    fn filename_account_number_takes_first_run() {
        assert_eq!(
            filename_account_number("NU_93015865_01OUT2025_31OUT2025.csv").as_deref(),
            Some("93015865")
        );
        assert_eq!(filename_account_number("2024_extrato.csv"), None);
        assert_eq!(filename_account_number("conta-77.csv").as_deref(), Some("77"));
    }

    #[test]
    fn last_chars_handles_short_input() {
        assert_eq!(last_chars("12345678", 4), "5678");
        assert_eq!(last_chars("123", 4), "123");
    }

    // ── scoring ───────────────────────────────────────────────────────────────

    #[test]
    fn score_full_corroboration() {
        let resolver = AccountResolver::default();
        let a = account("a1", "Nubank - Cartão 12345", "Nubank", AccountType::CreditCard);
        let i = info("Nubank", Some("12345"), AccountType::CreditCard);
        // number 10 + last four 5 + name 3 + institution 3 + type 2
        assert_eq!(resolver.score(&a, &i), 23);
    }

    #[test]
    fn score_institution_is_case_insensitive() {
        let resolver = AccountResolver::default();
        let a = account("a1", "NUBANK conta", "NuBank", AccountType::Checking);
        let i = info("Nubank", None, AccountType::Savings);
        assert_eq!(resolver.score(&a, &i), 6);
    }

    #[test]
    fn best_match_short_circuits_on_corroborated_account() {
        let resolver = AccountResolver::default();
        let accounts = vec![
            account("a1", "Nubank - 9999", "Nubank", AccountType::CreditCard),
            account("a2", "Nubank - 12345", "Nubank", AccountType::CreditCard),
            account("a3", "Nubank 12345 extra", "Nubank", AccountType::CreditCard),
        ];
        let i = info("Nubank", Some("12345"), AccountType::CreditCard);
        assert_eq!(resolver.best_match(&accounts, &i).unwrap().id.0, "a2");
    }

    #[test]
    fn best_match_stops_at_first_account_reaching_short_circuit() {
        let resolver = AccountResolver::default();
        let accounts = vec![
            account("a1", "Nubank - 2345", "Nubank", AccountType::CreditCard),
            account("a2", "Nubank - 12345", "Nubank", AccountType::CreditCard),
        ];
        let i = info("Nubank", Some("12345"), AccountType::CreditCard);
        assert_eq!(resolver.score(&accounts[0], &i), 13);
        assert_eq!(resolver.score(&accounts[1], &i), 23);
        assert_eq!(resolver.best_match(&accounts, &i).unwrap().id.0, "a1");
    }

    #[test]
    fn best_match_prefers_first_on_ties() {
        let resolver = AccountResolver::default();
        let accounts = vec![
            account("a1", "Carteira", "Itaú", AccountType::Checking),
            account("a2", "Outra", "Itaú", AccountType::Checking),
        ];
        let i = info("Itaú", None, AccountType::Checking);
        assert_eq!(resolver.best_match(&accounts, &i).unwrap().id.0, "a1");
    }

    #[test]
    fn best_match_below_reuse_score_is_none() {
        let resolver = AccountResolver::default();
        let accounts = vec![account("a1", "Carteira", "Bradesco", AccountType::Checking)];
        let i = info("Nubank", Some("12345"), AccountType::Checking);
        // only the type matches
        assert!(resolver.best_match(&accounts, &i).is_none());
    }

    #[test]
    fn best_match_ignores_inactive_accounts() {
        let resolver = AccountResolver::default();
        let mut closed = account("a1", "Nubank - 12345", "Nubank", AccountType::CreditCard);
        closed.is_active = false;
        let i = info("Nubank", Some("12345"), AccountType::CreditCard);
        assert!(resolver.best_match(&[closed], &i).is_none());
    }

    #[test]
    fn new_account_naming_and_card_defaults() {
        let resolver = AccountResolver::default();

        let card = resolver.new_account("u1", &info("Nubank", Some("12345678"), AccountType::CreditCard));
        assert_eq!(card.name, "Nubank - 5678");
        assert_eq!(card.color.as_deref(), Some("#8B5CF6"));
        assert_eq!(card.icon.as_deref(), Some("credit-card"));
        assert_eq!(card.closing_day, Some(10));
        assert_eq!(card.due_day, Some(15));
        assert_eq!(card.initial_balance, Decimal::ZERO);

        let checking = resolver.new_account("u1", &info("Itaú", None, AccountType::Checking));
        assert_eq!(checking.name, "Itaú");
        assert_eq!(checking.icon.as_deref(), Some("bank"));
        assert_eq!(checking.closing_day, None);
    }

    // ── find_or_create ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn find_or_create_reuses_existing() {
        let store = MemoryStore::new();
        let existing = AccountStore::create(
            &store,
            NewAccount::new("u1", "Nubank - Cartão 12345", AccountType::CreditCard)
                .with_institution("Nubank"),
        )
        .await
        .unwrap();

        let resolver = AccountResolver::default();
        let resolved = resolver
            .find_or_create(&store, "u1", &info("Nubank", Some("12345"), AccountType::CreditCard))
            .await
            .unwrap();

        assert_eq!(resolved.id, existing);
        assert!(!resolved.was_created);
        assert_eq!(store.find_by_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_or_create_creates_then_reuses() {
        let store = MemoryStore::new();
        let resolver = AccountResolver::default();
        let i = info("Banco Inter", Some("98765"), AccountType::Checking);

        let first = resolver.find_or_create(&store, "u1", &i).await.unwrap();
        assert!(first.was_created);
        assert_eq!(first.name, "Banco Inter - 8765");

        let second = resolver.find_or_create(&store, "u1", &i).await.unwrap();
        assert!(!second.was_created);
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn find_or_create_does_not_cross_users() {
        let store = MemoryStore::new();
        let resolver = AccountResolver::default();
        let i = info("Nubank", Some("12345"), AccountType::CreditCard);

        let mine = resolver.find_or_create(&store, "u1", &i).await.unwrap();
        let theirs = resolver.find_or_create(&store, "u2", &i).await.unwrap();
        assert!(theirs.was_created);
        assert_ne!(mine.id, theirs.id);
    }
}
