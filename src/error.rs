//! TESSERA - Custom Error Types
//! Defines the error hierarchy for the storage engine.

use std::path::PathBuf;

use thiserror::Error;

/// Custom Result type for the Tessera engine.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Error types for the Tessera storage engine.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// I/O errors from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk table violates the format (truncated record, bad offsets).
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Key is not visible in any layer of the engine.
    #[error("Key not found")]
    KeyNotFound,

    /// A read against one table failed; names the table.
    #[error("sstable {path:?}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: Box<TesseraError>,
    },

    /// Writing, syncing or renaming a new table failed.
    #[error("flushing sstable {path:?}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table or a single record would overflow the 32-bit offsets of the format.
    #[error("sstable too large: {0} bytes does not fit a 32-bit offset")]
    TableTooLarge(u64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TesseraError {
    /// True for the plain "absent" outcome, as opposed to a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TesseraError::KeyNotFound)
    }

    /// Attach the path of the table that produced this error.
    pub(crate) fn in_table(self, path: impl Into<PathBuf>) -> Self {
        match self {
            TesseraError::KeyNotFound => self,
            e @ TesseraError::Table { .. } => e,
            other => TesseraError::Table {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}
