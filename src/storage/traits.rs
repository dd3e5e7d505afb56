//! Storage traits and error types

use crate::storage::ItemRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for persistence sinks consuming assembled records
///
/// The pipeline treats the sink as fire-and-forget per batch: an error is
/// logged at the call site and never propagates back into the crawl.
pub trait ItemSink {
    /// Persists a batch of records atomically
    ///
    /// # Returns
    ///
    /// The number of records written
    fn save_many(&mut self, records: &[ItemRecord]) -> StorageResult<usize>;
}
