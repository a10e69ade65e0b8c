//! Property tests: whatever the insert order, occupancy or duplicates, the
//! tree stays structurally valid and scans agree with a sorted model.

use std::collections::HashMap;

use pagetree::{AttrType, BTreeIndex, HeapFile, IndexOptions, Operator, RecordId};
use proptest::prelude::*;
use tempfile::tempdir;

fn options(leaf: usize, node: usize) -> IndexOptions {
    IndexOptions::default()
        .with_pool_size(48)
        .with_leaf_occupancy(leaf)
        .with_node_occupancy(node)
}

fn low_op() -> impl Strategy<Value = Operator> {
    prop_oneof![Just(Operator::Gt), Just(Operator::Gte)]
}

fn high_op() -> impl Strategy<Value = Operator> {
    prop_oneof![Just(Operator::Lt), Just(Operator::Lte)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Bulk load, then compare every entry and one range scan with a model.
    #[test]
    fn prop_scan_matches_model(
        keys in prop::collection::vec(-500i32..500, 0..400),
        leaf in 2usize..10,
        node in 2usize..8,
        a in -520i32..520,
        b in -520i32..520,
        lo_op in low_op(),
        hi_op in high_op(),
    ) {
        let dir = tempdir().unwrap();
        let heap = HeapFile::create(dir.path().join("rel"), 16).unwrap();
        let mut model: Vec<(i32, RecordId)> = Vec::new();
        for &key in &keys {
            let rid = heap.insert_record(&key.to_le_bytes()).unwrap();
            model.push((key, rid));
        }
        // Stable: equal keys keep insertion order.
        model.sort_by_key(|(key, _)| *key);

        let mut index = BTreeIndex::open(&heap, 0, AttrType::Integer, &options(leaf, node)).unwrap();

        let summary = index.verify().unwrap();
        prop_assert_eq!(summary.entries, keys.len());
        prop_assert_eq!(index.entries().unwrap(), model.clone());

        let (low, high) = (a.min(b), a.max(b));
        let expected: Vec<RecordId> = model
            .iter()
            .filter(|(key, _)| lo_op.admits(*key, low) && hi_op.admits(*key, high))
            .map(|(_, rid)| *rid)
            .collect();

        match index.start_scan(low, lo_op, high, hi_op) {
            Ok(()) => {
                let mut found = Vec::new();
                while let Some(rid) = index.scan_next().unwrap() {
                    found.push(rid);
                }
                index.end_scan().unwrap();
                prop_assert_eq!(found, expected);
            }
            Err(pagetree::Error::BadScanRange) => prop_assert!(expected.is_empty()),
            Err(e) => return Err(TestCaseError::fail(e.to_string())),
        }

        let stats = index.buffer_pool().stats().snapshot();
        prop_assert_eq!(stats.outstanding_pins(), 0);
        prop_assert_eq!(index.buffer_pool().pinned_frame_count(), 0);
    }

    /// Building from a relation and inserting the same entries one at a
    /// time produce the same tree contents.
    #[test]
    fn prop_bulk_load_equals_incremental(
        keys in prop::collection::vec(any::<i32>(), 0..300),
        leaf in 2usize..8,
        node in 2usize..6,
    ) {
        let dir = tempdir().unwrap();
        let heap = HeapFile::create(dir.path().join("bulk"), 16).unwrap();
        let rids: Vec<RecordId> = keys
            .iter()
            .map(|key| heap.insert_record(&key.to_le_bytes()).unwrap())
            .collect();
        let bulk = BTreeIndex::open(&heap, 0, AttrType::Integer, &options(leaf, node)).unwrap();

        let empty = HeapFile::create(dir.path().join("incr"), 16).unwrap();
        let mut incremental = BTreeIndex::open(&empty, 0, AttrType::Integer, &options(leaf, node)).unwrap();
        for (&key, &rid) in keys.iter().zip(&rids) {
            incremental.insert_entry(key, rid).unwrap();
        }

        prop_assert_eq!(bulk.entries().unwrap(), incremental.entries().unwrap());
        prop_assert_eq!(bulk.verify().unwrap(), incremental.verify().unwrap());
    }

    /// Ascending distinct keys leave every leaf but the last at the split
    /// fill, and each key is found by a point scan.
    #[test]
    fn prop_ascending_build_fill_and_lookup(
        count in 1usize..300,
        leaf in 2usize..8,
        node in 2usize..6,
    ) {
        let dir = tempdir().unwrap();
        let heap = HeapFile::create(dir.path().join("asc"), 16).unwrap();
        let mut ids = HashMap::new();
        for key in 0..count as i32 {
            let rid = heap.insert_record(&key.to_le_bytes()).unwrap();
            ids.insert(rid, key);
        }
        let mut index = BTreeIndex::open(&heap, 0, AttrType::Integer, &options(leaf, node)).unwrap();

        let summary = index.verify().unwrap();
        prop_assert_eq!(summary.entries, count);
        // Each split leaves ceil((L + 1) / 2) entries behind.
        let min_fill = (leaf + 2) / 2;
        prop_assert!(summary.leaf_nodes <= count.div_ceil(min_fill).max(1));

        // Every key is found by a point scan.
        for key in [0, count as i32 / 2, count as i32 - 1] {
            index.start_scan(key, Operator::Gte, key, Operator::Lte).unwrap();
            let rid = index.scan_next().unwrap().unwrap();
            prop_assert_eq!(ids[&rid], key);
            prop_assert_eq!(index.scan_next().unwrap(), None);
            index.end_scan().unwrap();
        }
    }
}
