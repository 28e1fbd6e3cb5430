//! TESSERA - SSTable (Sorted String Table)
//! Immutable on-disk table holding flushed MemTable data.
//!
//! Only the sparse index is kept in memory. A lookup binary-searches the
//! index for the block that may hold the key, reads that block with a
//! positional read and scans it. Positional reads leave no shared cursor
//! on the file handle, so one `SSTable` can serve many readers at once.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::db::{KvIter, ReadableDb};
use crate::error::{Result, TesseraError};
use crate::types::{Key, Lookup, ScanEntry, Value};

use super::format::{Cursor, IndexEntry, FOOTER_SIZE};

/// An opened, immutable SSTable file.
///
/// The file handle stays open for the lifetime of the table; iterators
/// borrow the table and must not outlive it.
#[derive(Debug)]
pub struct SSTable {
    /// Path to the SSTable file (for error messages).
    path: PathBuf,
    file: File,
    /// File offset of the first byte after the data records.
    entries_end: u64,
    index: Vec<IndexEntry>,
    file_size: u64,
}

impl SSTable {
    /// Open an SSTable file and load its sparse index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::open_inner(path).map_err(|e| e.in_table(path))
    }

    fn open_inner(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < FOOTER_SIZE as u64 {
            return Err(TesseraError::Corruption(format!(
                "file is {} bytes, too short to hold the index offset",
                file_size
            )));
        }

        let index_end = file_size - FOOTER_SIZE as u64;
        let mut footer = [0u8; FOOTER_SIZE];
        read_exact_at(&file, &mut footer, index_end)?;
        let index_start = u64::from(u32::from_le_bytes(footer));

        if index_start > index_end {
            return Err(TesseraError::Corruption(format!(
                "sparse index starts at {} but the index section ends at {}",
                index_start, index_end
            )));
        }

        let mut index = Vec::new();
        if index_start < index_end {
            let mut buf = vec![0u8; (index_end - index_start) as usize];
            read_exact_at(&file, &mut buf, index_start)?;
            let mut cursor = Cursor::new(&buf, index_start);
            while !cursor.is_empty() {
                let entry = cursor.next_index_entry()?;
                validate_index_entry(index.last(), &entry, index_start)?;
                index.push(entry);
            }
        }

        if index.is_empty() && index_start != 0 {
            return Err(TesseraError::Corruption(format!(
                "{} bytes of records but no sparse index",
                index_start
            )));
        }

        log::debug!(
            "Opened sstable {:?} ({} bytes, {} index entries)",
            path,
            file_size,
            index.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            entries_end: index_start,
            index,
            file_size,
        })
    }

    /// Returns the path to the SSTable file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of sparse index entries.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// True if the table holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// End offset (exclusive) of the block starting at index entry `i`.
    fn block_end(&self, i: usize) -> u64 {
        self.index
            .get(i + 1)
            .map_or(self.entries_end, |e| u64::from(e.offset))
    }

    /// Index of the last sparse entry whose key is `<= key`.
    fn block_for(&self, key: &[u8]) -> Option<usize> {
        let pos = self.index.partition_point(|e| e.key.as_slice() <= key);
        pos.checked_sub(1)
    }

    fn read_block(&self, i: usize) -> Result<(Vec<u8>, u64)> {
        let start = u64::from(self.index[i].offset);
        let end = self.block_end(i);
        let mut buf = vec![0u8; (end - start) as usize];
        read_exact_at(&self.file, &mut buf, start)?;
        Ok((buf, start))
    }

    /// Point lookup. Distinguishes a tombstone in this table from absence.
    pub fn get(&self, key: &[u8]) -> Result<Lookup> {
        self.get_inner(key).map_err(|e| e.in_table(&self.path))
    }

    fn get_inner(&self, key: &[u8]) -> Result<Lookup> {
        let Some(block) = self.block_for(key) else {
            return Ok(Lookup::Absent);
        };

        let (buf, base) = self.read_block(block)?;
        let mut cursor = Cursor::new(&buf, base);
        while !cursor.is_empty() {
            let record = cursor.next_record()?;
            match record.key.as_slice().cmp(key) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Equal if record.deleted => return Ok(Lookup::Tombstoned),
                std::cmp::Ordering::Equal => return Ok(Lookup::Found(record.value)),
            }
        }
        Ok(Lookup::Absent)
    }

    /// Ordered records with `start <= key < limit`, tombstones included
    /// (as `None` values). `limit: None` runs to the end of the table.
    pub fn entries(&self, start: &[u8], limit: Option<&[u8]>) -> TableIter<'_> {
        let block = self.block_for(start).unwrap_or(0);
        TableIter {
            table: self,
            next_block: block,
            buf: Vec::new(),
            base: 0,
            pos: 0,
            start: start.to_vec(),
            limit: limit.map(<[u8]>::to_vec),
            done: self.index.is_empty(),
        }
    }
}

/// Reject index entries that point outside the data section or go backwards.
fn validate_index_entry(prev: Option<&IndexEntry>, entry: &IndexEntry, entries_end: u64) -> Result<()> {
    if u64::from(entry.offset) >= entries_end {
        return Err(TesseraError::Corruption(format!(
            "index entry {:?} points at offset {} past the data section ({} bytes)",
            String::from_utf8_lossy(&entry.key),
            entry.offset,
            entries_end
        )));
    }
    if let Some(prev) = prev {
        if prev.key >= entry.key || prev.offset >= entry.offset {
            return Err(TesseraError::Corruption(format!(
                "index entry {:?} at offset {} is out of order",
                String::from_utf8_lossy(&entry.key),
                entry.offset
            )));
        }
    }
    Ok(())
}

/// Streams the records of one SSTable, a block at a time.
pub struct TableIter<'a> {
    table: &'a SSTable,
    next_block: usize,
    buf: Vec<u8>,
    base: u64,
    pos: usize,
    start: Key,
    limit: Option<Key>,
    done: bool,
}

impl TableIter<'_> {
    fn next_entry(&mut self) -> Result<Option<ScanEntry>> {
        loop {
            if self.pos >= self.buf.len() {
                if self.next_block >= self.table.index.len() {
                    return Ok(None);
                }
                let (buf, base) = self.table.read_block(self.next_block)?;
                self.buf = buf;
                self.base = base;
                self.pos = 0;
                self.next_block += 1;
                continue;
            }

            let mut cursor = Cursor::new(&self.buf[self.pos..], self.base + self.pos as u64);
            let record = cursor.next_record()?;
            self.pos = (cursor.offset() - self.base) as usize;

            if record.key < self.start {
                continue;
            }
            if let Some(limit) = &self.limit {
                if &record.key >= limit {
                    return Ok(None);
                }
            }
            let value = (!record.deleted).then_some(record.value);
            return Ok(Some((record.key, value)));
        }
    }
}

impl Iterator for TableIter<'_> {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.in_table(&self.table.path)))
            }
        }
    }
}

impl ReadableDb for SSTable {
    fn get(&self, key: &[u8]) -> Result<Value> {
        match SSTable::get(self, key)? {
            Lookup::Found(value) => Ok(value),
            Lookup::Tombstoned | Lookup::Absent => Err(TesseraError::KeyNotFound),
        }
    }

    fn range_scan<'a>(&'a self, start: &[u8], limit: &[u8]) -> Result<KvIter<'a>> {
        Ok(Box::new(self.entries(start, Some(limit)).filter_map(
            |item| match item {
                Ok((key, Some(value))) => Some(Ok((key, value))),
                Ok((_, None)) => None,
                Err(e) => Some(Err(e)),
            },
        )))
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::io::ErrorKind;
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
