//! Property-based invariants.
//!
//! - Folding any mutation sequence through the store, syncing and
//!   reopening yields exactly the fold of that sequence.
//! - Compaction never changes the observable mapping.
//! - The record codec round-trips, and damage to any payload byte is
//!   detected.

use daybreak::{Database, JsonSerializer};
use daybreak_journal::{Record, RecordError};
use proptest::prelude::*;
use tempfile::tempdir;

type Db = Database<JsonSerializer<u32>>;

#[derive(Debug, Clone)]
enum Op {
    Put(usize, u32),
    Delete(usize),
}

const KEY_POOL: [&str; 6] = ["apple", "beta", "gamma", "delta", "k", "longer-key-name"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEY_POOL.len(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        (0..KEY_POOL.len()).prop_map(Op::Delete),
    ]
}

/// Reference model: insertion-ordered fold of the same operations.
fn fold_model(ops: &[Op]) -> Vec<(String, u32)> {
    let mut model: Vec<(String, u32)> = Vec::new();
    for op in ops {
        match op {
            Op::Put(k, v) => {
                let key = KEY_POOL[*k];
                model.retain(|(mk, _)| mk != key);
                model.push((key.to_string(), *v));
            }
            Op::Delete(k) => {
                let key = KEY_POOL[*k];
                model.retain(|(mk, _)| mk != key);
            }
        }
    }
    model
}

fn apply(db: &Db, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Put(k, v) => db.set(KEY_POOL[*k], *v).unwrap(),
            Op::Delete(k) => db.delete(KEY_POOL[*k]).unwrap(),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reopened_index_equals_the_fold(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");

        let mut db = Db::open(&path).unwrap();
        apply(&db, &ops);
        db.sync().unwrap();
        db.close().unwrap();

        let db = Db::open(&path).unwrap();
        prop_assert_eq!(db.entries().unwrap(), fold_model(&ops));
    }

    #[test]
    fn compaction_preserves_the_mapping(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");

        let mut db = Db::open(&path).unwrap();
        apply(&db, &ops);
        db.sync().unwrap();
        let before = db.entries().unwrap();
        let size_before = std::fs::metadata(&path).unwrap().len();

        db.compact().unwrap();
        db.sync().unwrap();

        prop_assert_eq!(db.entries().unwrap(), before.clone());
        prop_assert!(std::fs::metadata(&path).unwrap().len() <= size_before);

        db.close().unwrap();
        let db = Db::open(&path).unwrap();
        prop_assert_eq!(db.entries().unwrap(), before);
    }

    #[test]
    fn record_codec_round_trips(
        key in prop::collection::vec(any::<u8>(), 1..64),
        value in prop::option::of(prop::collection::vec(any::<u8>(), 0..256)),
    ) {
        let record = match value {
            Some(v) => Record::put(key, v),
            None => Record::tombstone(key),
        };
        let bytes = record.to_bytes();
        let (parsed, consumed) = Record::from_slice(&bytes).unwrap();
        prop_assert_eq!(parsed, record);
        prop_assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn payload_damage_is_detected(
        key in prop::collection::vec(any::<u8>(), 1..32),
        value in prop::collection::vec(any::<u8>(), 0..64),
        flip in any::<prop::sample::Index>(),
    ) {
        let record = Record::put(key, value);
        let mut bytes = record.to_bytes();

        // Corrupt one byte past the size fields.
        let target = 8 + flip.index(bytes.len() - 8);
        bytes[target] ^= 0xFF;

        let result = Record::from_slice(&bytes);
        let is_checksum_mismatch = matches!(result, Err(RecordError::ChecksumMismatch { .. }));
        prop_assert!(is_checksum_mismatch);
    }
}
