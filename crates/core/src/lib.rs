pub mod account;
pub mod category;
pub mod store;
pub mod transaction;

pub use account::{Account, AccountId, AccountType, NewAccount};
pub use category::{Category, CategoryId, NewCategory};
pub use store::{AccountStore, CategoryStore, StoreError, StoreResult, TransactionStore};
pub use transaction::{
    NewTransaction, ParseKindError, TransactionId, TransactionStatus, TransactionType,
};
