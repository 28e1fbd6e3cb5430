//! TESSERA - SSTable Writer
//! Turns sorted in-memory entries into an immutable SSTable file.
//!
//! A sparse index entry is taken whenever the write offset reaches the next
//! `block_size` checkpoint. The last record written is always indexed too, so
//! every key in the table has an index entry at or before it.

use std::io::Write;

use crate::error::{Result, TesseraError};
use crate::types::Key;

use super::format::{self, IndexEntry};

/// What a finished table contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSummary {
    /// Live records written.
    pub entries: usize,
    /// Tombstone records written.
    pub tombstones: usize,
    /// Entries in the sparse index.
    pub index_entries: usize,
    /// Total file size.
    pub bytes: u64,
}

/// Streams records into `writer` and builds the sparse index as it goes.
/// Keys must be added in strictly increasing order.
pub struct TableBuilder<W: Write> {
    writer: W,
    block_size: u64,
    offset: u64,
    next_checkpoint: u64,
    index: Vec<IndexEntry>,
    last_key: Key,
    last_offset: Option<u32>,
    summary: TableSummary,
    scratch: Vec<u8>,
}

impl<W: Write> TableBuilder<W> {
    pub fn new(writer: W, block_size: usize) -> Self {
        Self {
            writer,
            block_size: block_size.max(1) as u64,
            offset: 0,
            next_checkpoint: 0,
            index: Vec::new(),
            last_key: Key::new(),
            last_offset: None,
            summary: TableSummary::default(),
            scratch: Vec::with_capacity(256),
        }
    }

    fn checked_offset(&self) -> Result<u32> {
        u32::try_from(self.offset).map_err(|_| TesseraError::TableTooLarge(self.offset))
    }

    /// Append one record.
    pub fn add(&mut self, key: &[u8], value: &[u8], deleted: bool) -> Result<()> {
        debug_assert!(
            self.last_offset.is_none() || self.last_key.as_slice() < key,
            "keys must be strictly increasing"
        );
        let start = self.checked_offset()?;

        if self.next_checkpoint <= self.offset {
            self.index.push(IndexEntry {
                key: key.to_vec(),
                offset: start,
            });
            self.next_checkpoint = self.offset + self.block_size;
        }

        self.scratch.clear();
        format::encode_record(&mut self.scratch, key, value, deleted)?;
        self.writer.write_all(&self.scratch)?;
        self.offset += self.scratch.len() as u64;

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.last_offset = Some(start);
        if deleted {
            self.summary.tombstones += 1;
        } else {
            self.summary.entries += 1;
        }
        Ok(())
    }

    /// Write the sparse index and the trailing offset, then flush the writer.
    pub fn finish(mut self) -> Result<TableSummary> {
        if let Some(last_offset) = self.last_offset {
            let indexed = self.index.last().map(|e| e.offset);
            if indexed != Some(last_offset) {
                self.index.push(IndexEntry {
                    key: std::mem::take(&mut self.last_key),
                    offset: last_offset,
                });
            }
        }

        let index_start = self.checked_offset()?;
        self.scratch.clear();
        for entry in &self.index {
            format::encode_index_entry(&mut self.scratch, &entry.key, entry.offset)?;
        }
        self.scratch.extend_from_slice(&index_start.to_le_bytes());
        self.writer.write_all(&self.scratch)?;
        self.writer.flush()?;

        self.summary.index_entries = self.index.len();
        self.summary.bytes = self.offset + self.scratch.len() as u64;
        Ok(self.summary)
    }
}

/// Merge a sorted stream of live entries with a sorted stream of deleted
/// keys into one table.
///
/// A key present in both streams is written once, as a tombstone.
pub fn write_table<'a, W, L, T>(
    live: L,
    tombstones: T,
    block_size: usize,
    writer: W,
) -> Result<TableSummary>
where
    W: Write,
    L: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    T: IntoIterator<Item = &'a [u8]>,
{
    let mut builder = TableBuilder::new(writer, block_size);
    let mut live = live.into_iter().peekable();
    let mut dead = tombstones.into_iter().peekable();

    loop {
        match (live.peek().copied(), dead.peek().copied()) {
            (Some((key, value)), Some(dead_key)) => {
                if key < dead_key {
                    builder.add(key, value, false)?;
                    live.next();
                } else {
                    if key == dead_key {
                        live.next();
                    }
                    builder.add(dead_key, &[], true)?;
                    dead.next();
                }
            }
            (Some((key, value)), None) => {
                builder.add(key, value, false)?;
                live.next();
            }
            (None, Some(dead_key)) => {
                builder.add(dead_key, &[], true)?;
                dead.next();
            }
            (None, None) => break,
        }
    }

    builder.finish()
}
