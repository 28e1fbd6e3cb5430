//! TESSERA - MemTable (In-Memory Skip List)
//! The MemTable is the write buffer of the engine.
//! All writes land here first before being flushed to SSTables on disk.
//!
//! Nodes live in an arena (`Vec<SkipNode>`) and link to each other by index,
//! so the list needs no `unsafe` and no reference counting. Two permanent
//! sentinels bracket the list: `HEAD` compares below every key and `TAIL`
//! above every key, so the search loops never test for the end of a level.
//!
//! ```text
//! Level 2:  HEAD ──────────────► 20 ──────────────────► TAIL
//! Level 1:  HEAD ──► 10 ───────► 20 ──────► 50 ───────► TAIL
//! Level 0:  HEAD ──► 10 ──► 15 ► 20 ──► 35 ► 50 ──► 60 ► TAIL
//! ```

use std::cmp::Ordering;
use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::db::{Db, KvIter, ReadableDb};
use crate::error::{Result, TesseraError};
use crate::types::{Key, Lookup, Value};

use super::flush::{self, TableSummary};

/// Maximum height of a node.
pub const MAX_LEVEL: usize = 16;

/// Chance that a new node is promoted one more level.
const ASCEND_PROBABILITY: f64 = 0.5;

const HEAD: usize = 0;
const TAIL: usize = 1;
const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Start,
    End,
    Entry,
}

struct SkipNode {
    kind: NodeKind,
    key: Key,
    value: Value,
    /// Arena indices of the successor at each level; `NIL` above the node's height.
    forward: [usize; MAX_LEVEL],
}

impl SkipNode {
    fn sentinel(kind: NodeKind) -> Self {
        Self {
            kind,
            key: Key::new(),
            value: Value::new(),
            forward: [NIL; MAX_LEVEL],
        }
    }

    fn entry(key: Key, value: Value) -> Self {
        Self {
            kind: NodeKind::Entry,
            key,
            value,
            forward: [NIL; MAX_LEVEL],
        }
    }
}

/// In-memory ordered map backed by a skip list.
/// Serves as both the live write buffer and the pending-deletion index.
pub struct MemTable {
    nodes: Vec<SkipNode>,
    /// Arena slots released by `delete`, reused by `put`.
    free: Vec<usize>,
    /// Height of the tallest node currently linked (at least 1).
    level: usize,
    len: usize,
    /// Sum of key and value lengths of live entries.
    size_bytes: usize,
    rng: StdRng,
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemTable {
    /// Create a new, empty MemTable with an entropy-seeded level generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a MemTable whose node heights are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        let mut start = SkipNode::sentinel(NodeKind::Start);
        start.forward = [TAIL; MAX_LEVEL];
        Self {
            nodes: vec![start, SkipNode::sentinel(NodeKind::End)],
            free: Vec::new(),
            level: 1,
            len: 0,
            size_bytes: 0,
            rng,
        }
    }

    /// Returns the approximate size of the MemTable in bytes.
    pub fn size(&self) -> usize {
        self.size_bytes
    }

    /// Returns the number of entries in the MemTable.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the MemTable is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current height of the list.
    pub fn level(&self) -> usize {
        self.level
    }

    fn compare(&self, idx: usize, key: &[u8]) -> Ordering {
        let node = &self.nodes[idx];
        match node.kind {
            NodeKind::Start => Ordering::Less,
            NodeKind::End => Ordering::Greater,
            NodeKind::Entry => node.key.as_slice().cmp(key),
        }
    }

    /// Walk down from the top level to the rightmost node whose key is
    /// strictly less than `key`, recording the node used to drop each level.
    fn descend(&self, key: &[u8], update: &mut [usize; MAX_LEVEL]) -> usize {
        let mut current = HEAD;
        for level in (0..self.level).rev() {
            loop {
                let next = self.nodes[current].forward[level];
                if self.compare(next, key) != Ordering::Less {
                    break;
                }
                current = next;
            }
            update[level] = current;
        }
        current
    }

    /// Index of the node holding `key`, if any.
    fn find(&self, key: &[u8]) -> Option<usize> {
        let mut update = [HEAD; MAX_LEVEL];
        let pred = self.descend(key, &mut update);
        let next = self.nodes[pred].forward[0];
        (self.compare(next, key) == Ordering::Equal).then_some(next)
    }

    /// Get a value by key from the MemTable.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.find(key).map(|idx| self.nodes[idx].value.as_slice())
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Point lookup as a layer of the engine. The MemTable never holds
    /// tombstones itself, so this is either `Found` or `Absent`.
    pub fn lookup(&self, key: &[u8]) -> Lookup {
        match self.get(key) {
            Some(value) => Lookup::Found(value.to_vec()),
            None => Lookup::Absent,
        }
    }

    /// Insert a key-value pair into the MemTable.
    /// If the key already exists, its value is replaced in place.
    pub fn put(&mut self, key: Key, value: Value) {
        let mut update = [HEAD; MAX_LEVEL];
        let pred = self.descend(&key, &mut update);
        let next = self.nodes[pred].forward[0];

        if self.compare(next, &key) == Ordering::Equal {
            let old_len = self.nodes[next].value.len();
            self.size_bytes = self.size_bytes - old_len + value.len();
            self.nodes[next].value = value;
            return;
        }

        let height = self.random_level();
        if height > self.level {
            for slot in update.iter_mut().take(height).skip(self.level) {
                *slot = HEAD;
            }
            self.level = height;
        }

        self.size_bytes += key.len() + value.len();
        self.len += 1;

        let idx = self.alloc(SkipNode::entry(key, value));
        for (level, &prev) in update.iter().enumerate().take(height) {
            self.nodes[idx].forward[level] = self.nodes[prev].forward[level];
            self.nodes[prev].forward[level] = idx;
        }
    }

    /// Remove a key, returning its value. Absent keys are a no-op.
    pub fn delete(&mut self, key: &[u8]) -> Option<Value> {
        let mut update = [HEAD; MAX_LEVEL];
        let pred = self.descend(key, &mut update);
        let target = self.nodes[pred].forward[0];
        if self.compare(target, key) != Ordering::Equal {
            return None;
        }

        for (level, &prev) in update.iter().enumerate().take(self.level) {
            if self.nodes[prev].forward[level] != target {
                break;
            }
            self.nodes[prev].forward[level] = self.nodes[target].forward[level];
        }

        while self.level > 1 && self.nodes[HEAD].forward[self.level - 1] == TAIL {
            self.level -= 1;
        }

        let node = &mut self.nodes[target];
        let key = std::mem::take(&mut node.key);
        let value = std::mem::take(&mut node.value);
        node.forward = [NIL; MAX_LEVEL];
        self.free.push(target);

        self.size_bytes -= key.len() + value.len();
        self.len -= 1;
        Some(value)
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> Range<'_> {
        Range {
            list: self,
            current: HEAD,
            limit: None,
        }
    }

    /// Iterate over entries with `start <= key < limit`.
    pub fn range(&self, start: &[u8], limit: &[u8]) -> Range<'_> {
        self.range_from(start, Some(limit))
    }

    /// Like `range`, with an optional upper bound.
    pub fn range_from(&self, start: &[u8], limit: Option<&[u8]>) -> Range<'_> {
        let mut update = [HEAD; MAX_LEVEL];
        let current = self.descend(start, &mut update);
        Range {
            list: self,
            current,
            limit: limit.map(<[u8]>::to_vec),
        }
    }

    /// Serialize every entry, in order, as a live record of a new SSTable.
    pub fn flush_to_table<W: Write>(&self, writer: W, block_size: usize) -> Result<TableSummary> {
        flush::write_table(self.iter(), std::iter::empty(), block_size, writer)
    }

    fn alloc(&mut self, node: SkipNode) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.gen_bool(ASCEND_PROBABILITY) {
            level += 1;
        }
        level
    }
}

/// Cursor over a key range of a MemTable.
///
/// Holds the last node returned and peeks its level-0 successor on each step.
pub struct Range<'a> {
    list: &'a MemTable,
    current: usize,
    limit: Option<Key>,
}

impl<'a> Iterator for Range<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == TAIL {
            return None;
        }
        let list = self.list;
        let next = list.nodes[self.current].forward[0];
        let node = &list.nodes[next];
        let in_range = node.kind == NodeKind::Entry
            && self
                .limit
                .as_deref()
                .map_or(true, |limit| node.key.as_slice() < limit);
        if !in_range {
            self.current = TAIL;
            return None;
        }
        self.current = next;
        Some((node.key.as_slice(), node.value.as_slice()))
    }
}

impl ReadableDb for MemTable {
    fn get(&self, key: &[u8]) -> Result<Value> {
        MemTable::get(self, key)
            .map(<[u8]>::to_vec)
            .ok_or(TesseraError::KeyNotFound)
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.contains_key(key))
    }

    fn range_scan<'a>(&'a self, start: &[u8], limit: &[u8]) -> Result<KvIter<'a>> {
        Ok(Box::new(
            self.range(start, limit)
                .map(|(k, v)| Ok((k.to_vec(), v.to_vec()))),
        ))
    }
}

impl Db for MemTable {
    fn put(&mut self, key: Key, value: Value) -> Result<()> {
        MemTable::put(self, key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        MemTable::delete(self, key);
        Ok(())
    }
}
