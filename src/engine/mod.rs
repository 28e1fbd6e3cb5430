//! TESSERA - Storage Engine Module
//! The combining engine and the components it is built from.

pub mod concurrent;
pub mod flush;
pub mod format;
pub mod memtable;
pub mod merge;
pub mod metrics;
pub mod sstable;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::{Db, KvIter, ReadableDb};
use crate::error::{Result, TesseraError};
use crate::types::{Key, Lookup, Value};

use self::flush::TableSummary;
use self::memtable::MemTable;
use self::merge::{MergeIterator, Source};
use self::metrics::EngineMetrics;
use self::sstable::SSTable;

const TABLE_EXTENSION: &str = "sstable";
const TEMP_SUFFIX: &str = ".sstable.tmp";

/// The core Tessera storage engine.
///
/// Writes land in a live skip list. Deletes of keys that may already be on
/// disk are recorded in a second skip list of tombstones. When the two
/// together reach `memtable_max_size` bytes they are merged into a new
/// immutable SSTable and replaced with empty lists.
///
/// Reads consult, in order: the tombstones, the live list, then every
/// table from newest to oldest, stopping at the first answer.
pub struct Tessera {
    memtable: MemTable,
    tombstones: MemTable,
    /// Oldest first.
    tables: Vec<SSTable>,
    next_table_id: u64,
    config: Config,
    metrics: EngineMetrics,
}

impl Tessera {
    /// Open or create a Tessera engine in `config.data_dir`, loading any
    /// tables already there.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;

        let (tables, next_table_id) = load_tables(&config.data_dir)?;
        let metrics = EngineMetrics::new();
        metrics.record_tables_loaded(tables.len());

        log::info!(
            "Tessera engine opened at {:?} ({} sstables loaded)",
            config.data_dir,
            tables.len()
        );

        Ok(Self {
            memtable: MemTable::new(),
            tombstones: MemTable::new(),
            tables,
            next_table_id,
            config,
            metrics,
        })
    }

    /// Resolve `key` across every layer, newest first.
    fn lookup(&self, key: &[u8]) -> Result<Lookup> {
        if self.tombstones.contains_key(key) {
            return Ok(Lookup::Tombstoned);
        }
        match self.memtable.lookup(key) {
            Lookup::Absent => self.lookup_tables(key),
            found => Ok(found),
        }
    }

    fn lookup_tables(&self, key: &[u8]) -> Result<Lookup> {
        for table in self.tables.iter().rev() {
            match table.get(key)? {
                Lookup::Absent => continue,
                found_or_deleted => return Ok(found_or_deleted),
            }
        }
        Ok(Lookup::Absent)
    }

    /// Get the value for `key`, or `TesseraError::KeyNotFound`.
    pub fn get(&self, key: &[u8]) -> Result<Value> {
        let value = self.lookup(key)?.into_value();
        self.metrics.record_get(value.as_ref().map(Vec::len));
        value.ok_or(TesseraError::KeyNotFound)
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(TesseraError::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Insert a key-value pair, flushing if the buffers are full.
    ///
    /// If the flush fails the write is still buffered and the error is
    /// returned; no table is added and no buffer is replaced.
    pub fn put(&mut self, key: Key, value: Value) -> Result<()> {
        self.metrics.record_put(key.len(), value.len());
        self.tombstones.delete(&key);
        self.memtable.put(key, value);
        self.maybe_flush()
    }

    /// Delete a key. Deleting an absent key is a no-op.
    ///
    /// A buffered key is dropped from the live list. A tombstone is recorded
    /// whenever an older table might still hold the key.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let tombstone = if self.memtable.contains_key(key) {
            let shadowed = self.lookup_tables(key)?.is_found();
            self.memtable.delete(key);
            shadowed
        } else {
            true
        };
        self.metrics.record_delete(tombstone);

        if tombstone {
            self.tombstones.put(key.to_vec(), Value::new());
            self.maybe_flush()?;
        }
        Ok(())
    }

    /// Iterate over live pairs with `start <= key < limit`, ascending.
    pub fn range_scan(&self, start: &[u8], limit: &[u8]) -> Result<MergeIterator<'_>> {
        self.merge_from(start, Some(limit))
    }

    /// Every live pair, ascending.
    pub fn scan(&self) -> Result<Vec<(Key, Value)>> {
        self.merge_from(&[], None)?.collect()
    }

    fn merge_from(&self, start: &[u8], limit: Option<&[u8]>) -> Result<MergeIterator<'_>> {
        self.metrics.record_scan();

        let mut sources: Vec<Source<'_>> = Vec::with_capacity(self.tables.len() + 2);
        sources.push(Box::new(
            self.tombstones
                .range_from(start, limit)
                .map(|(k, _)| Ok((k.to_vec(), None))),
        ));
        sources.push(Box::new(
            self.memtable
                .range_from(start, limit)
                .map(|(k, v)| Ok((k.to_vec(), Some(v.to_vec())))),
        ));
        for table in self.tables.iter().rev() {
            sources.push(Box::new(table.entries(start, limit)));
        }
        MergeIterator::new(sources)
    }

    fn pending_size(&self) -> usize {
        self.memtable.size() + self.tombstones.size()
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.pending_size() >= self.config.memtable_max_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the live and tombstone buffers to a new SSTable and start
    /// fresh ones. Does nothing when both are empty.
    ///
    /// The table is written to a temporary file and renamed into place, so a
    /// failure at any step leaves the engine exactly as it was.
    pub fn flush(&mut self) -> Result<()> {
        if self.memtable.is_empty() && self.tombstones.is_empty() {
            return Ok(());
        }

        let dir = self.config.data_dir.clone();
        fs::create_dir_all(&dir).map_err(|source| TesseraError::Flush {
            path: dir.clone(),
            source,
        })?;

        let id = self.next_table_id;
        let final_path = dir.join(format!("{}.{}", id, TABLE_EXTENSION));
        let temp_path = dir.join(format!("{}{}", id, TEMP_SUFFIX));

        let summary = match self.write_table_file(&temp_path) {
            Ok(summary) => summary,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        if let Err(source) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(TesseraError::Flush {
                path: final_path,
                source,
            });
        }

        let table = match SSTable::open(&final_path) {
            Ok(table) => table,
            Err(e) => {
                let _ = fs::remove_file(&final_path);
                return Err(e);
            }
        };

        self.tables.push(table);
        self.next_table_id += 1;
        self.memtable = MemTable::new();
        self.tombstones = MemTable::new();
        self.metrics.record_flush(summary.bytes);

        log::info!(
            "Flushed sstable {:?}: {} entries, {} tombstones, {} bytes",
            final_path,
            summary.entries,
            summary.tombstones,
            summary.bytes
        );
        Ok(())
    }

    fn write_table_file(&self, path: &Path) -> Result<TableSummary> {
        let io_err = |source| TesseraError::Flush {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::create(path).map_err(io_err)?;
        let summary = flush::write_table(
            self.memtable.iter(),
            self.tombstones.iter().map(|(k, _)| k),
            self.config.block_size,
            BufWriter::new(&mut file),
        )
        .map_err(|e| match e {
            TesseraError::Io(source) => io_err(source),
            other => other,
        })?;

        if self.config.sync_writes {
            file.sync_all().map_err(io_err)?;
        }
        Ok(summary)
    }

    /// Number of SSTables currently backing the engine.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Paths of the backing SSTables, oldest first.
    pub fn table_paths(&self) -> Vec<PathBuf> {
        self.tables.iter().map(|t| t.path().to_path_buf()).collect()
    }

    /// Bytes buffered in the live list.
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Bytes buffered in the tombstone list.
    pub fn tombstones_size(&self) -> usize {
        self.tombstones.size()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

/// Open every `<N>.sstable` in `dir`, ordered by `N` numerically.
/// Returns the tables and the id for the next flush.
fn load_tables(dir: &Path) -> Result<(Vec<SSTable>, u64)> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if name.ends_with(TEMP_SUFFIX) {
            log::warn!("Removing unfinished sstable {:?}", path);
            fs::remove_file(&path)?;
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
            continue;
        }
        match path.file_stem().and_then(|s| s.to_str()).map(str::parse::<u64>) {
            Some(Ok(id)) => found.push((id, path)),
            _ => log::warn!("Ignoring sstable with non-numeric name {:?}", path),
        }
    }

    found.sort_by_key(|(id, _)| *id);
    let next_id = found.last().map_or(0, |(id, _)| id + 1);

    let tables = found
        .iter()
        .map(|(_, path)| SSTable::open(path))
        .collect::<Result<Vec<_>>>()?;
    Ok((tables, next_id))
}

impl ReadableDb for Tessera {
    fn get(&self, key: &[u8]) -> Result<Value> {
        Tessera::get(self, key)
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Tessera::has(self, key)
    }

    fn range_scan<'a>(&'a self, start: &[u8], limit: &[u8]) -> Result<KvIter<'a>> {
        Ok(Box::new(Tessera::range_scan(self, start, limit)?))
    }
}

impl Db for Tessera {
    fn put(&mut self, key: Key, value: Value) -> Result<()> {
        Tessera::put(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        Tessera::delete(self, key)
    }
}
