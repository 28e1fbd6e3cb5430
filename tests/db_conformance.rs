//! TESSERA - Db Conformance Tests
//! One behavioural suite run against every store that implements the
//! `Db` / `ReadableDb` traits.

use std::fs::File;
use std::io::BufWriter;

use tessera::config::Config;
use tessera::engine::memtable::MemTable;
use tessera::engine::sstable::SSTable;
use tessera::engine::Tessera;
use tessera::{Db, ReadableDb, TesseraError};

fn collect_range<D: ReadableDb + ?Sized>(db: &D, start: &[u8], limit: &[u8]) -> Vec<(String, String)> {
    db.range_scan(start, limit)
        .unwrap()
        .map(|r| {
            let (k, v) = r.unwrap();
            (String::from_utf8(k).unwrap(), String::from_utf8(v).unwrap())
        })
        .collect()
}

fn check_put_get_delete(db: &mut dyn Db) {
    db.put(b"Foo".to_vec(), b"A".to_vec()).unwrap();
    db.put(b"Bar".to_vec(), b"B".to_vec()).unwrap();
    db.put(b"Baz".to_vec(), b"C".to_vec()).unwrap();
    assert_eq!(db.get(b"Bar").unwrap(), b"B".to_vec());

    db.delete(b"Bar").unwrap();
    assert!(matches!(db.get(b"Bar"), Err(TesseraError::KeyNotFound)));
    assert!(!db.has(b"Bar").unwrap());
    assert_eq!(db.get(b"Foo").unwrap(), b"A".to_vec());
    assert!(db.has(b"Baz").unwrap());
}

fn check_overwrite(db: &mut dyn Db) {
    for v in ["v1", "v2", "v3"] {
        db.put(b"foo".to_vec(), v.as_bytes().to_vec()).unwrap();
    }
    assert_eq!(db.get(b"foo").unwrap(), b"v3".to_vec());
}

fn check_delete_absent(db: &mut dyn Db) {
    db.delete(b"never-written").unwrap();
    assert!(db.get(b"never-written").unwrap_err().is_not_found());
}

fn check_range_scan(db: &mut dyn Db) {
    for key in ["9", "1", "5", "3", "8", "2", "6"] {
        db.put(key.as_bytes().to_vec(), format!("v{}", key).into_bytes())
            .unwrap();
    }
    let keys: Vec<String> = collect_range(&*db, b"1", b"9").into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["1", "2", "3", "5", "6", "8"]);

    db.delete(b"5").unwrap();
    db.put(b"3".to_vec(), b"new".to_vec()).unwrap();
    assert_eq!(
        collect_range(&*db, b"3", b"7"),
        vec![
            ("3".to_string(), "new".to_string()),
            ("6".to_string(), "v6".to_string())
        ]
    );
    assert!(collect_range(&*db, b"a", b"z").is_empty());
}

fn run_suite(mut make: impl FnMut() -> Box<dyn Db>) {
    check_put_get_delete(make().as_mut());
    check_overwrite(make().as_mut());
    check_delete_absent(make().as_mut());
    check_range_scan(make().as_mut());
}

#[test]
fn test_memtable_conforms() {
    run_suite(|| Box::new(MemTable::with_seed(42)));
}

#[test]
fn test_engine_conforms() {
    let dirs: std::cell::RefCell<Vec<tempfile::TempDir>> = Default::default();
    run_suite(|| {
        let dir = tempfile::tempdir().unwrap();
        let db = Tessera::open(Config::new(dir.path()).with_sync_writes(false)).unwrap();
        dirs.borrow_mut().push(dir);
        Box::new(db)
    });
}

#[test]
fn test_engine_with_flush_per_write_conforms() {
    let dirs: std::cell::RefCell<Vec<tempfile::TempDir>> = Default::default();
    run_suite(|| {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path())
            .with_memtable_max_size(1)
            .with_sync_writes(false);
        let db = Tessera::open(config).unwrap();
        dirs.borrow_mut().push(dir);
        Box::new(db)
    });
}

#[test]
fn test_sstable_reads_conform() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0.sstable");

    let mut source = MemTable::with_seed(1);
    for key in ["1", "2", "3", "5", "6", "8", "9"] {
        source.put(key.as_bytes().to_vec(), format!("v{}", key).into_bytes());
    }
    source
        .flush_to_table(BufWriter::new(File::create(&path).unwrap()), 16)
        .unwrap();

    let table = SSTable::open(&path).unwrap();
    let readable: &dyn ReadableDb = &table;

    assert_eq!(readable.get(b"5").unwrap(), b"v5".to_vec());
    assert!(readable.get(b"4").unwrap_err().is_not_found());
    assert!(readable.has(b"9").unwrap());
    assert!(!readable.has(b"0").unwrap());

    let keys: Vec<String> = collect_range(readable, b"1", b"9").into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["1", "2", "3", "5", "6", "8"]);
}
