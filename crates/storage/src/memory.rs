use async_trait::async_trait;
use extrato_core::{
    Account, AccountId, AccountStore, Category, CategoryId, CategoryStore, NewAccount,
    NewCategory, NewTransaction, StoreError, StoreResult, TransactionId, TransactionStore,
    TransactionType,
};
use rust_decimal::Decimal;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    categories: Vec<Category>,
    accounts: Vec<Account>,
    transactions: Vec<(TransactionId, NewTransaction)>,
    balance_updates: usize,
}

/// Process-local store. Categories are unique per `(user_id, name, type)`,
/// the same as in the SQLite schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.state().categories.clone()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.state().accounts.clone()
    }

    /// Stored transactions in insertion order.
    pub fn transactions(&self) -> Vec<(TransactionId, NewTransaction)> {
        self.state().transactions.clone()
    }

    /// Number of `increment_balance` calls served.
    pub fn balance_updates(&self) -> usize {
        self.state().balance_updates
    }

    /// Returns false when no such account exists.
    pub fn deactivate_account(&self, id: &AccountId) -> bool {
        match self.state().accounts.iter_mut().find(|a| &a.id == id) {
            Some(account) => {
                account.is_active = false;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn find(
        &self,
        user_id: &str,
        name: &str,
        kind: TransactionType,
    ) -> StoreResult<Option<Category>> {
        Ok(self
            .state()
            .categories
            .iter()
            .find(|c| c.user_id == user_id && c.name == name && c.kind == kind)
            .cloned())
    }

    async fn create(&self, category: NewCategory) -> StoreResult<CategoryId> {
        let mut state = self.state();
        let existing = state.categories.iter().find(|c| {
            c.user_id == category.user_id && c.name == category.name && c.kind == category.kind
        });
        if let Some(existing) = existing {
            return Ok(existing.id.clone());
        }

        let id = CategoryId(new_id());
        state.categories.push(category.into_category(id.clone()));
        Ok(id)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<Account>> {
        Ok(self
            .state()
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.state().accounts.iter().find(|a| &a.id == id).cloned())
    }

    async fn create(&self, account: NewAccount) -> StoreResult<AccountId> {
        let id = AccountId(new_id());
        self.state().accounts.push(account.into_account(id.clone()));
        Ok(id)
    }

    async fn increment_balance(&self, id: &AccountId, delta: Decimal) -> StoreResult<()> {
        let mut state = self.state();
        state.balance_updates += 1;
        let account = state
            .accounts
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        account.current_balance = account
            .current_balance
            .checked_add(delta)
            .ok_or_else(|| StoreError::InvalidData(format!("balance of account {id} overflows")))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn bulk_insert(&self, transactions: Vec<NewTransaction>) -> StoreResult<Vec<TransactionId>> {
        let mut state = self.state();
        let ids: Vec<TransactionId> = transactions
            .into_iter()
            .map(|tx| {
                let id = TransactionId(new_id());
                state.transactions.push((id.clone(), tx));
                id
            })
            .collect();
        Ok(ids)
    }
}
