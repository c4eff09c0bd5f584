//! Persistence ports consumed by the import engine.
//!
//! The engine only needs these operations. Implementations live in
//! `extrato-storage`; nothing here assumes transactions, locking or
//! isolation from the backend.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use super::account::{Account, AccountId, NewAccount};
use super::category::{Category, CategoryId, NewCategory};
use super::transaction::{NewTransaction, TransactionId, TransactionType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Looks a category up by its natural key.
    async fn find(
        &self,
        user_id: &str,
        name: &str,
        kind: TransactionType,
    ) -> StoreResult<Option<Category>>;

    async fn create(&self, category: NewCategory) -> StoreResult<CategoryId>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All accounts of a user, active or not, in creation order.
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<Account>>;

    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>>;

    async fn create(&self, account: NewAccount) -> StoreResult<AccountId>;

    /// Adds `delta` (which may be negative) to the account's current balance.
    async fn increment_balance(&self, id: &AccountId, delta: Decimal) -> StoreResult<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists the batch and returns the new ids in input order.
    async fn bulk_insert(&self, transactions: Vec<NewTransaction>) -> StoreResult<Vec<TransactionId>>;
}
