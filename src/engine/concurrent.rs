//! TESSERA - Shared Engine Handle
//! Cloneable, thread-safe handle to one Tessera engine.
//!
//! `get`, `has` and scans take the read lock, so readers run in parallel.
//! `put`, `delete` and `flush` take the write lock. A flush triggered by a
//! write therefore happens while no reader is in the middle of a lookup.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::Config;
use crate::error::Result;
use crate::types::{Key, Value};

use super::metrics::EngineMetrics;
use super::Tessera;

/// Thread-safe wrapper around the Tessera engine.
///
/// A poisoned lock is recovered rather than propagated.
///
/// ```no_run
/// use std::thread;
/// use tessera::config::Config;
/// use tessera::engine::concurrent::ConcurrentTessera;
///
/// let db = ConcurrentTessera::open(Config::new("./data")).unwrap();
/// let writer = db.clone();
/// thread::spawn(move || writer.put(b"key".to_vec(), b"value".to_vec()).unwrap())
///     .join()
///     .unwrap();
/// assert_eq!(db.get(b"key").unwrap(), b"value".to_vec());
/// ```
#[derive(Clone)]
pub struct ConcurrentTessera {
    inner: Arc<RwLock<Tessera>>,
}

impl ConcurrentTessera {
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::from_engine(Tessera::open(config)?))
    }

    pub fn from_engine(engine: Tessera) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tessera> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tessera> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &[u8]) -> Result<Value> {
        self.read().get(key)
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.read().has(key)
    }

    pub fn put(&self, key: Key, value: Value) -> Result<()> {
        self.write().put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.write().delete(key)
    }

    pub fn flush(&self) -> Result<()> {
        self.write().flush()
    }

    /// Live pairs with `start <= key < limit`, collected under one read lock.
    pub fn scan_range(&self, start: &[u8], limit: &[u8]) -> Result<Vec<(Key, Value)>> {
        let engine = self.read();
        let entries = engine.range_scan(start, limit)?.collect();
        entries
    }

    pub fn scan(&self) -> Result<Vec<(Key, Value)>> {
        self.read().scan()
    }

    pub fn table_count(&self) -> usize {
        self.read().table_count()
    }

    pub fn memtable_size(&self) -> usize {
        self.read().memtable_size()
    }

    /// Run `f` against the engine metrics while holding the read lock.
    pub fn with_metrics<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&EngineMetrics) -> R,
    {
        f(self.read().metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn open(dir: &tempfile::TempDir, threshold: usize) -> ConcurrentTessera {
        ConcurrentTessera::open(
            Config::new(dir.path())
                .with_memtable_max_size(threshold)
                .with_sync_writes(false),
        )
        .unwrap()
    }

    #[test]
    fn test_clone_and_share() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir, 64 * 1024);

        db.clone().put(b"shared".to_vec(), b"data".to_vec()).unwrap();
        assert_eq!(db.get(b"shared").unwrap(), b"data".to_vec());
        assert!(db.has(b"shared").unwrap());
    }

    #[test]
    fn test_concurrent_writers_with_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir, 256);
        let mut handles = vec![];

        for t in 0..4 {
            let db = db.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}_key_{:03}", t, i).into_bytes();
                    db.put(key, format!("value_{}", i).into_bytes()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(db.table_count() > 0);
        let all = db.scan().unwrap();
        assert_eq!(all.len(), 400);
        assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_readers_during_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir, 128);
        db.put(b"stable".to_vec(), b"value".to_vec()).unwrap();

        let mut handles = vec![];
        for _ in 0..4 {
            let db = db.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(db.get(b"stable").unwrap(), b"value".to_vec());
                }
            }));
        }
        for i in 0..4 {
            let db = db.clone();
            handles.push(thread::spawn(move || {
                for j in 0..50 {
                    let key = format!("w{}_{}", i, j).into_bytes();
                    db.put(key, b"x".to_vec()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(db.scan_range(b"w", b"x").unwrap().len(), 200);
    }

    #[test]
    fn test_delete_and_flush() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir, 64 * 1024);
        db.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        db.flush().unwrap();
        db.delete(b"a").unwrap();
        assert!(db.get(b"a").unwrap_err().is_not_found());
        assert_eq!(db.table_count(), 1);
        assert_eq!(db.memtable_size(), 0);
    }

    #[test]
    fn test_metrics_access() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir, 64 * 1024);
        db.put(b"test".to_vec(), b"value".to_vec()).unwrap();
        assert!(db.with_metrics(|m| m.total_ops()) > 0);
    }
}
