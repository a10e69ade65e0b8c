//! Heap file behavior through a small buffer pool: eviction write-back,
//! reopen, scan order and shared readers.

use std::thread;

use pagetree::buffer::BufferPoolManager;
use pagetree::storage::DiskManager;
use pagetree::{HeapFile, RecordId};
use tempfile::tempdir;
use test_log::test;

fn tuple(id: i32, width: usize) -> Vec<u8> {
    let mut bytes = vec![(id & 0xFF) as u8; width];
    bytes[..4].copy_from_slice(&id.to_le_bytes());
    bytes
}

/// Three frames for a relation spanning many pages: every page is evicted
/// at least once and must come back intact.
#[test]
fn test_tuples_survive_eviction() {
    let dir = tempdir().unwrap();
    let heap = HeapFile::create(dir.path().join("emp"), 3).unwrap();

    let rids: Vec<RecordId> = (0..2000)
        .map(|id| heap.insert_record(&tuple(id, 40)).unwrap())
        .collect();
    assert!(rids.last().unwrap().page_id.0 >= 10);

    for (id, &rid) in rids.iter().enumerate() {
        assert_eq!(heap.get_record(rid).unwrap(), tuple(id as i32, 40));
    }
}

#[test]
fn test_reopen_preserves_scan_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dept");

    let rids: Vec<RecordId> = {
        let heap = HeapFile::create(&path, 4).unwrap();
        (0..300)
            .map(|id| heap.insert_record(&tuple(id, 24 + (id as usize % 7))).unwrap())
            .collect()
    };

    let heap = HeapFile::open(&path, 4).unwrap();
    let scanned: Vec<(RecordId, Vec<u8>)> = heap.scan().map(Result::unwrap).collect();
    assert_eq!(scanned.len(), 300);
    for (id, (rid, bytes)) in scanned.into_iter().enumerate() {
        assert_eq!(rid, rids[id]);
        assert_eq!(bytes, tuple(id as i32, 24 + id % 7));
    }

    // Appends continue on the last page after reopen.
    let next = heap.insert_record(&tuple(300, 24)).unwrap();
    assert!(next.page_id >= rids[299].page_id);
}

#[test]
fn test_concurrent_readers_share_one_pool() {
    let dir = tempdir().unwrap();
    let heap = HeapFile::create(dir.path().join("emp"), 4).unwrap();
    let rids: Vec<RecordId> = (0..500)
        .map(|id| heap.insert_record(&tuple(id, 64)).unwrap())
        .collect();

    thread::scope(|s| {
        for t in 0..4 {
            let (heap, rids) = (&heap, &rids);
            s.spawn(move || {
                for id in (t..500).step_by(4) {
                    let bytes = heap.get_record(rids[id]).unwrap();
                    assert_eq!(bytes, tuple(id as i32, 64));
                }
            });
        }
    });
}

/// A bare pool under churn: the explicitly pinned page is never chosen
/// as a victim.
#[test]
fn test_explicit_pins_block_eviction() {
    let dir = tempdir().unwrap();
    let bpm = BufferPoolManager::new(3, DiskManager::create(dir.path().join("idx")).unwrap());

    let held = bpm.alloc_page().unwrap();
    bpm.with_page_mut(held, |page| page.put_i32(64, -17)).unwrap();

    for i in 0..10u32 {
        let pid = bpm.alloc_page().unwrap();
        bpm.with_page_mut(pid, |page| page.put_u32(64, i)).unwrap();
        bpm.unpin_page(pid, true).unwrap();
    }

    assert_eq!(bpm.pin_count(held), Some(1));
    assert_eq!(bpm.with_page(held, |page| page.get_i32(64)).unwrap(), -17);
    bpm.unpin_page(held, true).unwrap();

    let stats = bpm.stats().snapshot();
    assert!(stats.evictions >= 8);
    assert_eq!(stats.outstanding_pins(), 0);
}
