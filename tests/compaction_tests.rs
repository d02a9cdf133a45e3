//! Compaction correctness tests.
//!
//! These verify that compaction:
//! 1. Shrinks a journal full of superseded records to one put per live key
//! 2. Leaves the observable key-value mapping unchanged
//! 3. Preserves records appended by other instances during the rewrite
//! 4. No-ops when the journal is already minimal

use daybreak::{Database, JsonSerializer};
use daybreak_journal::{Header, Record};
use tempfile::tempdir;

type Db = Database<JsonSerializer<u32>>;

#[test]
fn compaction_shrinks_to_one_record_per_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    let db = Db::open(&path).unwrap();
    for i in 0..100u32 {
        db.set("k", i).unwrap();
    }
    db.sync().unwrap();
    db.compact().unwrap();
    db.sync().unwrap();

    let expected = Header::new("json").encoded_len()
        + Record::put(b"k".to_vec(), b"99".to_vec()).serialized_len() as u64;
    assert_eq!(std::fs::metadata(&path).unwrap().len(), expected);
    assert_eq!(db.get("k").unwrap(), Some(99));
}

#[test]
fn compaction_keeps_the_mapping_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    let mut db = Db::open(&path).unwrap();
    for i in 0..50u32 {
        db.set(&format!("key{}", i % 10), i).unwrap();
    }
    db.delete("key3").unwrap();
    db.sync().unwrap();

    let before = db.entries().unwrap();
    let size_before = std::fs::metadata(&path).unwrap().len();

    db.compact().unwrap();
    db.sync().unwrap();

    assert_eq!(db.entries().unwrap(), before);
    assert!(std::fs::metadata(&path).unwrap().len() <= size_before);

    // Still intact after a reopen.
    db.close().unwrap();
    let db = Db::open(&path).unwrap();
    assert_eq!(db.entries().unwrap(), before);
}

#[test]
fn compaction_preserves_concurrent_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    let a = Db::open(&path).unwrap();
    let b = Db::open(&path).unwrap();

    a.set_sync("a", 1).unwrap();
    b.sync().unwrap();

    // b appends a record a's cursor has not seen.
    b.set_sync("b", 2).unwrap();

    // a's dump contains only "a"; the tail copy must carry "b" over.
    a.compact().unwrap();
    a.sync().unwrap();
    assert_eq!(a.get("a").unwrap(), Some(1));
    assert_eq!(a.get("b").unwrap(), Some(2));

    b.sync().unwrap();
    assert_eq!(b.get("a").unwrap(), Some(1));
    assert_eq!(b.get("b").unwrap(), Some(2));
}

#[test]
fn second_compaction_is_a_no_op() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    let db = Db::open(&path).unwrap();
    for i in 0..20u32 {
        db.set("k", i).unwrap();
    }
    db.sync().unwrap();
    db.compact().unwrap();
    db.sync().unwrap();

    let size = std::fs::metadata(&path).unwrap().len();
    db.compact().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), size);

    // No temp files left next to the journal.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn clear_leaves_only_the_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    let db = Db::open(&path).unwrap();
    for i in 0..10u32 {
        db.set(&format!("k{i}"), i).unwrap();
    }
    db.sync().unwrap();

    db.clear().unwrap();
    assert!(db.is_empty().unwrap());
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        Header::new("json").encoded_len()
    );

    // Writes keep working after a clear.
    db.set_sync("fresh", 7).unwrap();
    db.sync().unwrap();
    assert_eq!(db.get("fresh").unwrap(), Some(7));
}

#[test]
fn clear_is_visible_to_other_instances() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    let a = Db::open(&path).unwrap();
    let b = Db::open(&path).unwrap();

    a.set_sync("k", 1).unwrap();
    b.sync().unwrap();
    assert_eq!(b.len().unwrap(), 1);

    a.clear().unwrap();
    b.sync().unwrap();
    assert_eq!(b.len().unwrap(), 0);
}
