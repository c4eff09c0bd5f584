pub mod db;
pub mod memory;

pub use db::{DbError, DbPool, SqliteStore};
pub use memory::MemoryStore;
