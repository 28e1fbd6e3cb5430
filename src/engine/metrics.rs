//! TESSERA - Engine Metrics
//! Lock-free operation counters, readable while the engine is in use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters for the Tessera engine.
///
/// Counters use `Ordering::Relaxed`: they are for observation only and
/// never order other memory accesses.
#[derive(Debug)]
pub struct EngineMetrics {
    pub puts: AtomicU64,
    pub gets: AtomicU64,
    /// `get` calls that found nothing (absent or deleted).
    pub get_misses: AtomicU64,
    pub deletes: AtomicU64,
    /// Deletes that had to record a tombstone instead of dropping a buffered entry.
    pub tombstones: AtomicU64,
    pub scans: AtomicU64,
    /// Number of memtable flushes to a new SSTable.
    pub flushes: AtomicU64,
    /// Bytes of SSTable files written by flushes.
    pub flushed_bytes: AtomicU64,
    /// Key and value bytes accepted by `put`.
    pub bytes_written: AtomicU64,
    /// Value bytes returned by `get`.
    pub bytes_read: AtomicU64,
    /// SSTables found on disk when the engine was opened.
    pub tables_loaded: AtomicU64,
    opened_at: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            get_misses: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            tombstones: AtomicU64::new(0),
            scans: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flushed_bytes: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            tables_loaded: AtomicU64::new(0),
            opened_at: Instant::now(),
        }
    }

    pub fn record_put(&self, key_size: usize, value_size: usize) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add((key_size + value_size) as u64, Ordering::Relaxed);
    }

    /// Record a get; `None` is a miss.
    pub fn record_get(&self, value_size: Option<usize>) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        match value_size {
            Some(size) => {
                self.bytes_read.fetch_add(size as u64, Ordering::Relaxed);
            }
            None => {
                self.get_misses.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_delete(&self, tombstoned: bool) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        if tombstoned {
            self.tombstones.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, bytes: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_tables_loaded(&self, count: usize) {
        self.tables_loaded.store(count as u64, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.opened_at.elapsed().as_secs_f64()
    }

    /// puts + gets + deletes + scans.
    pub fn total_ops(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
            + self.gets.load(Ordering::Relaxed)
            + self.deletes.load(Ordering::Relaxed)
            + self.scans.load(Ordering::Relaxed)
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "\n═══ TESSERA Engine Metrics ═══\n\
             Operations:\n\
               puts:       {}\n\
               gets:       {} ({} misses)\n\
               deletes:    {} ({} tombstoned)\n\
               scans:      {}\n\
             Storage:\n\
               flushes:    {} ({} bytes)\n\
               tables at open: {}\n\
             I/O:\n\
               written:    {} bytes\n\
               read:       {} bytes\n\
             Uptime: {:.2}s",
            self.puts.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.get_misses.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
            self.tombstones.load(Ordering::Relaxed),
            self.scans.load(Ordering::Relaxed),
            self.flushes.load(Ordering::Relaxed),
            self.flushed_bytes.load(Ordering::Relaxed),
            self.tables_loaded.load(Ordering::Relaxed),
            self.bytes_written.load(Ordering::Relaxed),
            self.bytes_read.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operations() {
        let m = EngineMetrics::new();

        m.record_put(5, 10);
        m.record_put(3, 7);
        m.record_get(Some(10));
        m.record_get(None);
        m.record_delete(false);
        m.record_delete(true);
        m.record_scan();
        m.record_flush(128);

        assert_eq!(m.puts.load(Ordering::Relaxed), 2);
        assert_eq!(m.gets.load(Ordering::Relaxed), 2);
        assert_eq!(m.get_misses.load(Ordering::Relaxed), 1);
        assert_eq!(m.deletes.load(Ordering::Relaxed), 2);
        assert_eq!(m.tombstones.load(Ordering::Relaxed), 1);
        assert_eq!(m.scans.load(Ordering::Relaxed), 1);
        assert_eq!(m.flushes.load(Ordering::Relaxed), 1);
        assert_eq!(m.flushed_bytes.load(Ordering::Relaxed), 128);
        assert_eq!(m.bytes_written.load(Ordering::Relaxed), 25);
        assert_eq!(m.bytes_read.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_total_ops() {
        let m = EngineMetrics::new();
        m.record_put(1, 1);
        m.record_get(None);
        m.record_delete(true);
        m.record_scan();
        m.record_flush(10);
        assert_eq!(m.total_ops(), 4);
    }

    #[test]
    fn test_report_format() {
        let m = EngineMetrics::new();
        m.record_put(10, 20);
        m.record_tables_loaded(3);
        let report = m.report();
        assert!(report.contains("puts:"));
        assert!(report.contains("tables at open: 3"));
        assert!(report.contains("written:    30 bytes"));
    }
}
