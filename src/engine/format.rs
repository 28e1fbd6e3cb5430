//! TESSERA - SSTable Binary Format
//! Encoding and decoding of the records that make up an SSTable file.
//!
//! ## Layout (all integers u32 little-endian)
//! ```text
//! repeat { [key_len][key][is_deleted: 1 byte][value_len][value] }   data records
//! repeat { [key_len][key][block_offset] }                           sparse index
//! [sparse_index_start]                                              trailing 4 bytes
//! ```
//! There is no checksum or version field. Any length that runs past the
//! bytes available is reported as corruption.

use bytes::{Buf, BufMut};

use crate::error::{Result, TesseraError};
use crate::types::{Key, Value};

/// Size of every length and offset field.
pub const U32_SIZE: usize = 4;

/// Size of the trailing sparse-index offset.
pub const FOOTER_SIZE: usize = U32_SIZE;

/// A single data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Key,
    pub value: Value,
    pub deleted: bool,
}

/// One sampled `(key, offset)` pair of the sparse index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Key,
    pub offset: u32,
}

/// Number of bytes `encode_record` produces for this key and value.
pub fn record_len(key: &[u8], value: &[u8]) -> usize {
    U32_SIZE + key.len() + 1 + U32_SIZE + value.len()
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| TesseraError::TableTooLarge(len as u64))
}

/// Append a data record to `buf`.
pub fn encode_record(buf: &mut impl BufMut, key: &[u8], value: &[u8], deleted: bool) -> Result<()> {
    buf.put_u32_le(len_u32(key.len())?);
    buf.put_slice(key);
    buf.put_u8(u8::from(deleted));
    buf.put_u32_le(len_u32(value.len())?);
    buf.put_slice(value);
    Ok(())
}

/// Append a sparse index entry to `buf`.
pub fn encode_index_entry(buf: &mut impl BufMut, key: &[u8], offset: u32) -> Result<()> {
    buf.put_u32_le(len_u32(key.len())?);
    buf.put_slice(key);
    buf.put_u32_le(offset);
    Ok(())
}

/// Reads records or index entries out of an in-memory section of a table.
///
/// `base` is the file offset of the first byte of `buf`; it only feeds
/// error messages and `offset()`.
pub struct Cursor<'a> {
    buf: &'a [u8],
    base: u64,
    consumed: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self {
            buf,
            base,
            consumed: 0,
        }
    }

    /// File offset of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.base + self.consumed as u64
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn truncated(&self, what: &str) -> TesseraError {
        TesseraError::Corruption(format!(
            "truncated {} at offset {} ({} bytes left)",
            what,
            self.offset(),
            self.buf.remaining()
        ))
    }

    fn take_u32(&mut self, what: &str) -> Result<u32> {
        if self.buf.remaining() < U32_SIZE {
            return Err(self.truncated(what));
        }
        self.consumed += U32_SIZE;
        Ok(self.buf.get_u32_le())
    }

    fn take_u8(&mut self, what: &str) -> Result<u8> {
        if !self.buf.has_remaining() {
            return Err(self.truncated(what));
        }
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    fn take_bytes(&mut self, len: u32, what: &str) -> Result<Vec<u8>> {
        let len = len as usize;
        if self.buf.remaining() < len {
            return Err(self.truncated(what));
        }
        let out = self.buf[..len].to_vec();
        self.buf.advance(len);
        self.consumed += len;
        Ok(out)
    }

    /// Decode the next data record.
    pub fn next_record(&mut self) -> Result<Record> {
        let key_len = self.take_u32("key length")?;
        let key = self.take_bytes(key_len, "key")?;
        let deleted = match self.take_u8("deletion flag")? {
            0 => false,
            1 => true,
            flag => {
                return Err(TesseraError::Corruption(format!(
                    "invalid deletion flag {} at offset {}",
                    flag,
                    self.offset() - 1
                )))
            }
        };
        let value_len = self.take_u32("value length")?;
        let value = self.take_bytes(value_len, "value")?;
        Ok(Record {
            key,
            value,
            deleted,
        })
    }

    /// Decode the next sparse index entry.
    pub fn next_index_entry(&mut self) -> Result<IndexEntry> {
        let key_len = self.take_u32("index key length")?;
        let key = self.take_bytes(key_len, "index key")?;
        let offset = self.take_u32("block offset")?;
        Ok(IndexEntry { key, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let mut buf = Vec::new();
        encode_record(&mut buf, b"ab", b"xyz", true).unwrap();
        assert_eq!(
            buf,
            vec![2, 0, 0, 0, b'a', b'b', 1, 3, 0, 0, 0, b'x', b'y', b'z']
        );
        assert_eq!(buf.len(), record_len(b"ab", b"xyz"));
    }

    #[test]
    fn test_index_entry_layout() {
        let mut buf = Vec::new();
        encode_index_entry(&mut buf, b"k", 0x0102_0304).unwrap();
        assert_eq!(buf, vec![1, 0, 0, 0, b'k', 4, 3, 2, 1]);

        let mut cursor = Cursor::new(&buf, 0);
        let entry = cursor.next_index_entry().unwrap();
        assert_eq!(entry.key, b"k".to_vec());
        assert_eq!(entry.offset, 0x0102_0304);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_cursor_tracks_offsets() {
        let mut buf = Vec::new();
        encode_record(&mut buf, b"a", b"1", false).unwrap();
        encode_record(&mut buf, b"b", b"", true).unwrap();

        let mut cursor = Cursor::new(&buf, 100);
        let first = cursor.next_record().unwrap();
        assert_eq!(cursor.offset(), 100 + record_len(b"a", b"1") as u64);
        assert!(!first.deleted);
        let second = cursor.next_record().unwrap();
        assert!(second.deleted);
        assert!(second.value.is_empty());
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_truncated_value_is_corruption() {
        let mut buf = Vec::new();
        encode_record(&mut buf, b"key", b"value", false).unwrap();
        buf.truncate(buf.len() - 2);

        let err = Cursor::new(&buf, 0).next_record().unwrap_err();
        match err {
            TesseraError::Corruption(msg) => assert!(msg.contains("value")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_key_length_past_end_is_corruption() {
        let buf = [0xff, 0xff, 0xff, 0x7f, b'a'];
        let err = Cursor::new(&buf, 0).next_record().unwrap_err();
        assert!(matches!(err, TesseraError::Corruption(_)));
    }

    #[test]
    fn test_bad_deletion_flag_is_corruption() {
        let mut buf = Vec::new();
        encode_record(&mut buf, b"k", b"v", false).unwrap();
        buf[5] = 7;
        let err = Cursor::new(&buf, 0).next_record().unwrap_err();
        match err {
            TesseraError::Corruption(msg) => assert!(msg.contains("offset 5")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
