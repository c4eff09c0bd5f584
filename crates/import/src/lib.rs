pub mod account;
pub mod classifier;
pub mod config;
pub mod csv;
pub mod error;
pub mod format;
pub mod normalize;
pub mod nubank;
pub mod ofx;
pub mod pipeline;
pub mod tables;
pub(crate) mod util;

pub use account::{account_info_from_csv, AccountInfo, AccountResolver, ResolvedAccount};
pub use classifier::{CategoryCache, CategoryClassifier, Classification};
pub use config::{ConfigError, ImportConfig};
pub use self::csv::{CsvError, GenericRow};
pub use error::{ImportError, RowError};
pub use format::{detect_format, FileFormat};
pub use normalize::{Normalize, NormalizedTransaction, Parsed};
pub use nubank::{NubankLayout, NubankRow};
pub use ofx::{OfxEntry, OfxError, OfxStatement, ParseStrategy};
pub use pipeline::{parse_file, ImportPipeline, ImportRequest, ImportResult, ParsedFile};
