//! TESSERA - Key-Value Interfaces
//! The surface every store in this crate exposes: the skip list on its own,
//! a single SSTable (read-only), and the full engine.

use crate::error::{Result, TesseraError};
use crate::types::{Key, Value};

/// Boxed, ordered stream of live key-value pairs.
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Key, Value)>> + 'a>;

/// Read side of a store.
pub trait ReadableDb {
    /// Get the value for `key`, or `TesseraError::KeyNotFound`.
    fn get(&self, key: &[u8]) -> Result<Value>;

    /// True if `key` is visible. Only real failures are errors.
    fn has(&self, key: &[u8]) -> Result<bool> {
        match ReadableDb::get(self, key) {
            Ok(_) => Ok(true),
            Err(TesseraError::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All pairs with `start <= key < limit`, ascending by key.
    fn range_scan<'a>(&'a self, start: &[u8], limit: &[u8]) -> Result<KvIter<'a>>;
}

/// A mutable store. Not a multimap: `put` overwrites.
pub trait Db: ReadableDb {
    fn put(&mut self, key: Key, value: Value) -> Result<()>;

    /// Deleting an absent key is a no-op.
    fn delete(&mut self, key: &[u8]) -> Result<()>;
}
