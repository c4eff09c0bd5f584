use extrato_core::{
    AccountId, AccountStore, CategoryId, CategoryStore, NewTransaction,
    StoreResult, TransactionStatus, TransactionStore, TransactionType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::account::{account_info_from_csv, AccountInfo, AccountResolver, ResolvedAccount};
use crate::classifier::{CategoryCache, CategoryClassifier};
use crate::config::ImportConfig;
use crate::error::{ImportError, RowError};
use crate::format::{detect_format, FileFormat};
use crate::normalize::{NormalizedTransaction, Parsed};
use crate::tables::FALLBACK_CATEGORY;
use crate::{csv, nubank, ofx};

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub user_id: String,
    pub filename: String,
    pub content: Vec<u8>,
    /// Skips account resolution when it names an active account of the user.
    pub account_id: Option<AccountId>,
}

impl ImportRequest {
    pub fn new(user_id: &str, filename: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            user_id: user_id.to_string(),
            filename: filename.to_string(),
            content: content.into(),
            account_id: None,
        }
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported_count: usize,
    pub error_count: usize,
    /// `row N: message`, ordered by row.
    pub errors: Vec<String>,
    pub file_format: FileFormat,
    pub categories_created: Vec<String>,
    pub account_created: bool,
    pub account_id: Option<AccountId>,
    pub account_name: Option<String>,
}

/// Everything the import needs from the file, computed without touching a store.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub format: FileFormat,
    pub transactions: Vec<NormalizedTransaction>,
    pub rejected: Vec<RowError>,
    pub account_info: Option<AccountInfo>,
}

/// Detects, parses and normalizes one upload.
pub fn parse_file(
    filename: &str,
    content: &[u8],
    config: &ImportConfig,
) -> Result<ParsedFile, ImportError> {
    let format = detect_format(filename, content)?;
    debug!("Detected {format} format for {filename}");

    let parsed = match format {
        FileFormat::Ofx => Parsed {
            rows: ofx::parse(content)?.entries,
            rejected: Vec::new(),
        }
        .normalize(),
        FileFormat::NubankCsv => nubank::parse(content)?.normalize(),
        FileFormat::Csv => csv::parse(content)?.normalize(),
    };

    if parsed.rows.is_empty() && parsed.rejected.is_empty() {
        return Err(ImportError::MalformedFile(format!(
            "no transactions found in {filename}"
        )));
    }

    let account_info = match format {
        FileFormat::Ofx => ofx::extract_account_info(content, &config.unknown_institution),
        FileFormat::NubankCsv | FileFormat::Csv => Some(account_info_from_csv(
            filename,
            content,
            &config.unknown_institution,
        )),
    };

    Ok(ParsedFile {
        format,
        transactions: parsed.rows,
        rejected: parsed.rejected,
        account_info,
    })
}

/// One async lock per user, created on first use and dropped once nobody
/// holds or waits on it.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn acquire(&self, user_id: &str) -> UserGuard<'_> {
        let lock = self.map().entry(user_id.to_string()).or_default().clone();
        UserGuard {
            locks: self,
            user_id: user_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, user_id: &str) {
        let mut locks = self.map();
        // the map's own reference is the last one
        if locks.get(user_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(user_id);
        }
    }
}

struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.user_id);
    }
}

pub struct ImportPipeline<C: ?Sized, A: ?Sized, T: ?Sized> {
    categories: Arc<C>,
    accounts: Arc<A>,
    transactions: Arc<T>,
    config: Arc<ImportConfig>,
    classifier: CategoryClassifier,
    resolver: AccountResolver,
    locks: UserLocks,
}

impl<S> ImportPipeline<S, S, S>
where
    S: CategoryStore + AccountStore + TransactionStore + ?Sized,
{
    /// A pipeline over one backend that implements every port.
    pub fn shared(store: Arc<S>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }
}

impl<C, A, T> ImportPipeline<C, A, T>
where
    C: CategoryStore + ?Sized,
    A: AccountStore + ?Sized,
    T: TransactionStore + ?Sized,
{
    pub fn new(categories: Arc<C>, accounts: Arc<A>, transactions: Arc<T>) -> Self {
        Self::with_config(categories, accounts, transactions, ImportConfig::default())
    }

    pub fn with_config(
        categories: Arc<C>,
        accounts: Arc<A>,
        transactions: Arc<T>,
        config: ImportConfig,
    ) -> Self {
        Self {
            categories,
            accounts,
            transactions,
            resolver: AccountResolver::from_config(&config),
            classifier: CategoryClassifier::default(),
            config: Arc::new(config),
            locks: UserLocks::default(),
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Imports one statement file for one user.
    ///
    /// Bad rows are reported in the result and never abort the call. Calls for
    /// the same user run one at a time.
    pub async fn import(&self, request: ImportRequest) -> Result<ImportResult, ImportError> {
        let ImportRequest {
            user_id,
            filename,
            content,
            account_id,
        } = request;

        let _guard = self.locks.acquire(&user_id).await;

        let config = Arc::clone(&self.config);
        let name = filename.clone();
        let parsed = tokio::task::spawn_blocking(move || parse_file(&name, &content, &config))
            .await
            .map_err(|e| ImportError::Worker(e.to_string()))??;

        let format = parsed.format;
        info!(
            "Importing {} rows from {filename} ({format}) for user {user_id}",
            parsed.transactions.len()
        );

        let mut cache = CategoryCache::new();
        let mut rejected = parsed.rejected;
        let mut batch = Vec::with_capacity(parsed.transactions.len());
        let mut delta = Decimal::ZERO;

        for tx in parsed.transactions {
            if tx.amount <= Decimal::ZERO {
                rejected.push(RowError::new(
                    tx.row,
                    format!("amount must be positive, got {}", tx.amount),
                ));
                continue;
            }

            let category = self.resolve_category(&mut cache, &user_id, &tx).await;
            let category_id = match category {
                Ok(id) => id,
                Err(e) => {
                    rejected.push(RowError::new(
                        tx.row,
                        format!("could not resolve category: {e}"),
                    ));
                    continue;
                }
            };

            let row = tx.row;
            let new = NewTransaction {
                user_id: user_id.clone(),
                account_id: None,
                category_id,
                description: tx.description,
                amount: tx.amount,
                kind: tx.kind,
                date: tx.date,
                status: TransactionStatus::Paid,
                imported: true,
                import_source: Some(format.as_str().to_string()),
                raw_source: tx.raw_source,
            };
            match new.apply_to(delta) {
                Some(next) => {
                    delta = next;
                    batch.push(new);
                }
                None => rejected.push(RowError::new(
                    row,
                    format!("amount {} overflows the balance of this import", new.amount),
                )),
            }
        }

        // only once some row will be inserted
        let account = if batch.is_empty() {
            None
        } else {
            self.resolve_account(&user_id, account_id.as_ref(), parsed.account_info.as_ref())
                .await
        };
        if let Some(account) = &account {
            for tx in &mut batch {
                tx.account_id = Some(account.id.clone());
            }
        }

        let inserted = if batch.is_empty() {
            0
        } else {
            self.transactions.bulk_insert(batch).await?.len()
        };

        if let Some(account) = &account {
            if inserted > 0 && !delta.is_zero() {
                self.accounts
                    .increment_balance(&account.id, delta)
                    .await
                    .map_err(|source| ImportError::BalanceUpdate { inserted, source })?;
                debug!("Adjusted balance of account {} by {delta}", account.id);
            }
        }

        rejected.sort_by_key(|e| e.row);
        let errors: Vec<String> = rejected.iter().map(ToString::to_string).collect();

        info!(
            "Imported {inserted} transactions from {filename} ({} errors)",
            errors.len()
        );

        Ok(ImportResult {
            imported_count: inserted,
            error_count: errors.len(),
            errors,
            file_format: format,
            categories_created: cache.into_created(),
            account_created: account.as_ref().is_some_and(|a| a.was_created),
            account_name: account.as_ref().map(|a| a.name.clone()),
            account_id: account.map(|a| a.id),
        })
    }

    async fn resolve_account(
        &self,
        user_id: &str,
        requested: Option<&AccountId>,
        info: Option<&AccountInfo>,
    ) -> Option<ResolvedAccount> {
        if let Some(id) = requested {
            match self.accounts.find_by_id(id).await {
                Ok(Some(account)) if account.user_id == user_id && account.is_active => {
                    return Some(ResolvedAccount {
                        id: account.id,
                        name: account.name,
                        was_created: false,
                    });
                }
                Ok(_) => warn!("Ignoring account {id}: not an active account of user {user_id}"),
                Err(e) => warn!("Ignoring account {id}: lookup failed: {e}"),
            }
        }

        if !self.config.resolve_accounts {
            return None;
        }
        let info = info?;

        match self
            .resolver
            .find_or_create(self.accounts.as_ref(), user_id, info)
            .await
        {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                warn!("Account resolution failed, importing without an account: {e}");
                None
            }
        }
    }

    async fn resolve_category(
        &self,
        cache: &mut CategoryCache,
        user_id: &str,
        tx: &NormalizedTransaction,
    ) -> StoreResult<CategoryId> {
        let store = self.categories.as_ref();

        let attempt = match tx.category_name.as_deref() {
            Some(name) => Some((name, FALLBACK_CATEGORY.color, FALLBACK_CATEGORY.icon)),
            None => {
                let c = self.classifier.classify(&tx.description);
                (!c.is_fallback()).then_some((c.name, c.color, c.icon))
            }
        };

        if let Some((name, color, icon)) = attempt {
            match cache
                .get_or_create(store, user_id, name, tx.kind, color, icon)
                .await
            {
                Ok(id) => return Ok(id),
                Err(e) => warn!(
                    "Category '{name}' unavailable for row {}, using default: {e}",
                    tx.row
                ),
            }
        }

        self.default_category(cache, user_id, tx.kind).await
    }

    async fn default_category(
        &self,
        cache: &mut CategoryCache,
        user_id: &str,
        kind: TransactionType,
    ) -> StoreResult<CategoryId> {
        cache
            .get_or_create(
                self.categories.as_ref(),
                user_id,
                &self.config.default_category,
                kind,
                FALLBACK_CATEGORY.color,
                FALLBACK_CATEGORY.icon,
            )
            .await
    }
}
