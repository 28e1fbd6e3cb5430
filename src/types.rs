//! TESSERA - Core Type Definitions
//! Defines fundamental types used across the storage engine.

/// Key type for the storage engine.
/// Using Vec<u8> allows arbitrary binary keys.
pub type Key = Vec<u8>;

/// Value type for the storage engine.
/// Using Vec<u8> allows arbitrary binary values.
pub type Value = Vec<u8>;

/// One item of an internal scan. A `None` value is a tombstone.
pub type ScanEntry = (Key, Option<Value>);

/// Outcome of a point lookup against a single layer.
///
/// `Tombstoned` means this layer holds a deletion marker for the key,
/// which shadows every older layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Value),
    Tombstoned,
    Absent,
}

impl Lookup {
    /// Collapse to the caller-facing view: tombstones read as absent.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Tombstoned | Lookup::Absent => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}
