//! TESSERA - Ordered Key-Value Storage Engine
//!
//! An embedded store for byte-string keys and values built from two layers:
//! an in-memory skip list that buffers recent writes, and immutable on-disk
//! SSTables that it is flushed to once it outgrows a size threshold.
//!
//! ## Components
//! - **MemTable**: Arena-backed probabilistic skip list
//! - **SSTable**: Sorted record file with a sparse index and block reads
//! - **Tombstones**: Deletes of flushed keys persist as deletion markers
//! - **Merge iterator**: Ordered range scans across every layer, newest wins
//! - **Metrics**: Lock-free atomic counters
//! - **Concurrency**: Cloneable `Arc<RwLock<_>>` handle
//!
//! ## Example
//! ```no_run
//! use tessera::{config::Config, engine::Tessera};
//!
//! let mut db = Tessera::open(Config::new("./data")).unwrap();
//!
//! db.put(b"key".to_vec(), b"value".to_vec()).unwrap();
//! assert_eq!(db.get(b"key").unwrap(), b"value".to_vec());
//!
//! for entry in db.range_scan(b"a", b"z").unwrap() {
//!     let (key, value) = entry.unwrap();
//!     println!("{:?} -> {:?}", key, value);
//! }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod types;

pub use config::Config;
pub use db::{Db, KvIter, ReadableDb};
pub use engine::concurrent::ConcurrentTessera;
pub use engine::Tessera;
pub use error::{Result, TesseraError};
