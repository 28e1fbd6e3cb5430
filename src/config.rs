//! TESSERA - Engine Configuration
//! Defines tunable parameters for the storage engine.

use std::path::PathBuf;

use crate::error::{Result, TesseraError};

/// Default flush threshold: ~2MB of live keys and values.
pub const DEFAULT_MEMTABLE_MAX_SIZE: usize = 1 << 21;

/// Default spacing, in bytes, between sparse index entries.
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 11;

/// Configuration for the Tessera storage engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the `<N>.sstable` files.
    pub data_dir: PathBuf,

    /// Combined size of the live and tombstone indexes, in bytes,
    /// at which they are flushed to a new SSTable.
    pub memtable_max_size: usize,

    /// Byte interval between sparse index checkpoints in new tables.
    pub block_size: usize,

    /// Whether to fsync a new table before renaming it into place.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            memtable_max_size: DEFAULT_MEMTABLE_MAX_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Create a new Config with a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the flush threshold.
    pub fn with_memtable_max_size(mut self, size: usize) -> Self {
        self.memtable_max_size = size;
        self
    }

    /// Set the sparse index block size for new tables.
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(TesseraError::Config("block_size must be non-zero".into()));
        }
        if self.block_size > u32::MAX as usize {
            return Err(TesseraError::Config(format!(
                "block_size {} exceeds the 32-bit table offsets",
                self.block_size
            )));
        }
        if self.memtable_max_size == 0 {
            return Err(TesseraError::Config(
                "memtable_max_size must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
