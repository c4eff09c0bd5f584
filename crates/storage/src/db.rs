use async_trait::async_trait;
use extrato_core::{
    Account, AccountId, AccountStore, Category, CategoryId, CategoryStore, NewAccount,
    NewCategory, NewTransaction, StoreError, StoreResult, TransactionId, TransactionStore,
    TransactionType,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid {column} value '{value}'")]
    Decode { column: &'static str, value: String },
    #[error("Balance of account {0} overflows")]
    BalanceOverflow(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => StoreError::Backend(e.to_string()),
            other => StoreError::InvalidData(other.to_string()),
        }
    }
}

fn decode_err(column: &'static str, value: &str) -> DbError {
    DbError::Decode {
        column,
        value: value.to_string(),
    }
}

fn decimal(column: &'static str, value: &str) -> Result<Decimal, DbError> {
    value.parse().map_err(|_| decode_err(column, value))
}

type CategoryRow = (String, String, String, String, String, String);

type AccountRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    bool,
);

const ACCOUNT_COLUMNS: &str = "id, user_id, name, account_type, institution, initial_balance, \
    current_balance, color, icon, closing_day, due_day, is_active";

fn category_from_row(row: CategoryRow) -> Result<Category, DbError> {
    let (id, user_id, name, kind, color, icon) = row;
    Ok(Category {
        id: CategoryId(id),
        user_id,
        name,
        kind: kind.parse().map_err(|_| decode_err("type", &kind))?,
        color,
        icon,
    })
}

fn account_from_row(row: AccountRow) -> Result<Account, DbError> {
    let (
        id,
        user_id,
        name,
        account_type,
        institution,
        initial_balance,
        current_balance,
        color,
        icon,
        closing_day,
        due_day,
        is_active,
    ) = row;

    Ok(Account {
        id: AccountId(id),
        user_id,
        name,
        account_type: account_type
            .parse()
            .map_err(|_| decode_err("account_type", &account_type))?,
        institution,
        initial_balance: decimal("initial_balance", &initial_balance)?,
        current_balance: decimal("current_balance", &current_balance)?,
        color,
        icon,
        closing_day: closing_day.and_then(|d| u8::try_from(d).ok()),
        due_day: due_day.and_then(|d| u8::try_from(d).ok()),
        is_active,
    })
}

/// SQLite-backed implementation of every store port.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and migrates it.
    pub async fn connect(path: &Path) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// A private database that lives as long as the store.
    pub async fn in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: DbPool) -> Result<Self, DbError> {
        for pragma in [
            "PRAGMA journal_mode = WAL",
            "PRAGMA foreign_keys = ON",
            "PRAGMA synchronous = NORMAL",
            "PRAGMA busy_timeout = 5000",
            "PRAGMA cache_size = -32000",
        ] {
            sqlx::query(pragma).execute(&pool).await?;
        }

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn find_category(
        &self,
        user_id: &str,
        name: &str,
        kind: TransactionType,
    ) -> Result<Option<Category>, DbError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, user_id, name, type, color, icon FROM categories WHERE user_id = ? AND name = ? AND type = ?",
        )
        .bind(user_id)
        .bind(name)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(category_from_row).transpose()
    }

    async fn create_category(&self, category: NewCategory) -> Result<CategoryId, DbError> {
        sqlx::query(
            "INSERT INTO categories (id, user_id, name, type, color, icon) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id, name, type) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&category.user_id)
        .bind(&category.name)
        .bind(category.kind.as_str())
        .bind(&category.color)
        .bind(&category.icon)
        .execute(&self.pool)
        .await?;

        let (id,) = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM categories WHERE user_id = ? AND name = ? AND type = ?",
        )
        .bind(&category.user_id)
        .bind(&category.name)
        .bind(category.kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(CategoryId(id))
    }

    async fn accounts_for_user(&self, user_id: &str) -> Result<Vec<Account>, DbError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ? ORDER BY rowid"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(account_from_row).collect()
    }

    async fn account_by_id(&self, id: &AccountId) -> Result<Option<Account>, DbError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn create_account(&self, account: NewAccount) -> Result<AccountId, DbError> {
        let id = Uuid::new_v4().to_string();
        let balance = account.initial_balance.to_string();

        sqlx::query(&format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"
        ))
        .bind(&id)
        .bind(&account.user_id)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(&account.institution)
        .bind(&balance)
        .bind(&balance)
        .bind(&account.color)
        .bind(&account.icon)
        .bind(account.closing_day)
        .bind(account.due_day)
        .execute(&self.pool)
        .await?;

        Ok(AccountId(id))
    }

    /// Returns false when the account does not exist.
    async fn add_to_balance(&self, id: &AccountId, delta: Decimal) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (String,)>(
            "SELECT current_balance FROM accounts WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((current,)) = current else {
            return Ok(false);
        };

        let updated = decimal("current_balance", &current)?
            .checked_add(delta)
            .ok_or_else(|| DbError::BalanceOverflow(id.0.clone()))?;
        sqlx::query("UPDATE accounts SET current_balance = ? WHERE id = ?")
            .bind(updated.to_string())
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_transactions(
        &self,
        transactions: Vec<NewTransaction>,
    ) -> Result<Vec<TransactionId>, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(transactions.len());

        for t in &transactions {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO transactions (id, user_id, account_id, category_id, description, amount, type, date, status, imported, import_source, raw_source)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&t.user_id)
            .bind(t.account_id.as_ref().map(|a| a.0.as_str()))
            .bind(&t.category_id.0)
            .bind(&t.description)
            .bind(t.amount.to_string())
            .bind(t.kind.as_str())
            .bind(t.date)
            .bind(t.status.as_str())
            .bind(t.imported)
            .bind(&t.import_source)
            .bind(serde_json::to_string(&t.raw_source)?)
            .execute(&mut *tx)
            .await?;
            ids.push(TransactionId(id));
        }

        tx.commit().await?;
        debug!("Inserted {} transactions", ids.len());
        Ok(ids)
    }
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            color TEXT NOT NULL,
            icon TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (user_id, name, type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            account_type TEXT NOT NULL,
            institution TEXT,
            initial_balance TEXT NOT NULL DEFAULT '0',
            current_balance TEXT NOT NULL DEFAULT '0',
            color TEXT,
            icon TEXT,
            closing_day INTEGER,
            due_day INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts (user_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            account_id TEXT,
            category_id TEXT NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            type TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            imported INTEGER NOT NULL DEFAULT 0,
            import_source TEXT,
            raw_source TEXT NOT NULL DEFAULT 'null',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (account_id) REFERENCES accounts(id),
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions (user_id, date)")
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait]
impl CategoryStore for SqliteStore {
    async fn find(
        &self,
        user_id: &str,
        name: &str,
        kind: TransactionType,
    ) -> StoreResult<Option<Category>> {
        Ok(self.find_category(user_id, name, kind).await?)
    }

    async fn create(&self, category: NewCategory) -> StoreResult<CategoryId> {
        Ok(self.create_category(category).await?)
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<Account>> {
        Ok(self.accounts_for_user(user_id).await?)
    }

    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.account_by_id(id).await?)
    }

    async fn create(&self, account: NewAccount) -> StoreResult<AccountId> {
        Ok(self.create_account(account).await?)
    }

    async fn increment_balance(&self, id: &AccountId, delta: Decimal) -> StoreResult<()> {
        if self.add_to_balance(id, delta).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("account {id}")))
        }
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn bulk_insert(&self, transactions: Vec<NewTransaction>) -> StoreResult<Vec<TransactionId>> {
        Ok(self.insert_transactions(transactions).await?)
    }
}
