//! TESSERA - Merge Iterator
//! K-way merge of sorted sources into one ordered, deduplicated stream.
//!
//! Sources are passed newest first. A min-heap keyed by `(key, source)`
//! pops the smallest key, and on equal keys the newest source. Every later
//! copy of a key already emitted is dropped, so each key surfaces once with
//! its newest version. Tombstones take part in the merge like any entry and
//! are filtered out after deduplication, which lets a delete hide older
//! copies of the key.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::types::{Key, ScanEntry, Value};

/// One sorted input of the merge.
pub type Source<'a> = Box<dyn Iterator<Item = Result<ScanEntry>> + 'a>;

struct HeapItem {
    key: Key,
    value: Option<Value>,
    /// Position in the source list; lower is newer.
    source: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    // BinaryHeap is a max-heap: invert both keys so the smallest key and,
    // among equal keys, the newest source compare greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

pub struct MergeIterator<'a> {
    sources: Vec<Source<'a>>,
    heap: BinaryHeap<HeapItem>,
    last_key: Option<Key>,
    done: bool,
}

impl<'a> MergeIterator<'a> {
    /// Prime the heap with the first entry of every source.
    /// Fails if any source fails on its first read.
    pub fn new(mut sources: Vec<Source<'a>>) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, iter) in sources.iter_mut().enumerate() {
            if let Some(entry) = iter.next() {
                let (key, value) = entry?;
                heap.push(HeapItem { key, value, source });
            }
        }
        Ok(Self {
            sources,
            heap,
            last_key: None,
            done: false,
        })
    }

    /// Next deduplicated entry, tombstones included.
    pub fn next_entry(&mut self) -> Result<Option<ScanEntry>> {
        while let Some(item) = self.heap.pop() {
            if let Some(entry) = self.sources[item.source].next() {
                let (key, value) = entry?;
                self.heap.push(HeapItem {
                    key,
                    value,
                    source: item.source,
                });
            }

            let is_new = self.last_key.as_ref().map_or(true, |last| *last < item.key);
            if is_new {
                self.last_key = Some(item.key.clone());
                return Ok(Some((item.key, item.value)));
            }
        }
        Ok(None)
    }
}

impl Iterator for MergeIterator<'_> {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.next_entry() {
                Ok(Some((key, Some(value)))) => return Some(Ok((key, value))),
                Ok(Some((_, None))) => continue,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
