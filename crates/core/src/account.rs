use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::transaction::ParseKindError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Wallet,
    Checking,
    Savings,
    CreditCard,
    Investment,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Wallet => "wallet",
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::CreditCard => "credit_card",
            AccountType::Investment => "investment",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(AccountType::Wallet),
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "credit_card" => Ok(AccountType::CreditCard),
            "investment" => Ok(AccountType::Investment),
            other => Err(ParseKindError::new("account type", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub institution: Option<String>,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// Statement closing day of month, credit cards only.
    pub closing_day: Option<u8>,
    pub due_day: Option<u8>,
    pub is_active: bool,
}

/// An account as handed to `AccountStore::create`, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub user_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub institution: Option<String>,
    pub initial_balance: Decimal,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub closing_day: Option<u8>,
    pub due_day: Option<u8>,
}

impl NewAccount {
    pub fn new(user_id: &str, name: &str, account_type: AccountType) -> Self {
        NewAccount {
            user_id: user_id.to_string(),
            name: name.to_string(),
            account_type,
            institution: None,
            initial_balance: Decimal::ZERO,
            color: None,
            icon: None,
            closing_day: None,
            due_day: None,
        }
    }

    pub fn with_institution(mut self, institution: &str) -> Self {
        self.institution = Some(institution.to_string());
        self
    }

    /// Materializes the stored record. The current balance starts at the
    /// initial balance and the account starts active.
    pub fn into_account(self, id: AccountId) -> Account {
        Account {
            id,
            user_id: self.user_id,
            name: self.name,
            account_type: self.account_type,
            institution: self.institution,
            initial_balance: self.initial_balance,
            current_balance: self.initial_balance,
            color: self.color,
            icon: self.icon,
            closing_day: self.closing_day,
            due_day: self.due_day,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn account_type_round_trips_through_str() {
        for ty in [
            AccountType::Wallet,
            AccountType::Checking,
            AccountType::Savings,
            AccountType::CreditCard,
            AccountType::Investment,
        ] {
            assert_eq!(ty.as_str().parse::<AccountType>().unwrap(), ty);
        }
    }

    #[test]
    fn account_type_rejects_unknown() {
        let err = "brokerage".parse::<AccountType>().unwrap_err();
        assert!(err.to_string().contains("brokerage"));
    }

    #[test]
    fn account_type_serializes_snake_case() {
        let json = serde_json::to_string(&AccountType::CreditCard).unwrap();
        assert_eq!(json, "\"credit_card\"");
    }

    #[test]
    fn into_account_starts_active_at_initial_balance() {
        let mut new = NewAccount::new("u1", "Nubank - 1234", AccountType::Checking)
            .with_institution("Nubank");
        new.initial_balance = dec("250.00");

        let account = new.into_account(AccountId::from("a1"));
        assert_eq!(account.id.to_string(), "a1");
        assert_eq!(account.current_balance, dec("250.00"));
        assert_eq!(account.institution.as_deref(), Some("Nubank"));
        assert!(account.is_active);
    }
}
