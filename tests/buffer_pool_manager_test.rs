//! Buffer Pool Manager Tests
//!
//! Pin-protocol scenarios in the spirit of BusTub's
//! buffer_pool_manager_test.cpp, written against the explicit
//! `alloc_page` / `pin_page` / `unpin_page` API the index uses.

use pagetree::buffer::BufferPoolManager;
use pagetree::common::PageId;
use pagetree::storage::DiskManager;
use pagetree::Error;
use tempfile::tempdir;

const FRAMES: usize = 10;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

/// Helper to write a string to page data.
fn copy_string(data: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    data[..bytes.len()].copy_from_slice(bytes);
    data[bytes.len()] = 0; // null terminator
}

/// Helper to read a null-terminated string from page data.
fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

// ============================================================================
// BusTub: VeryBasicTest
// ============================================================================

#[test]
fn test_very_basic() {
    let (bpm, _dir) = create_bpm(FRAMES);
    let str_data = "Hello, world!";

    let pid = bpm.alloc_page().unwrap();
    bpm.with_page_mut(pid, |page| copy_string(page.as_mut_slice(), str_data))
        .unwrap();
    assert_eq!(
        bpm.with_page(pid, |page| read_string(page.as_slice())).unwrap(),
        str_data
    );
    bpm.unpin_page(pid, true).unwrap();

    bpm.pin_page(pid).unwrap();
    assert_eq!(
        bpm.with_page(pid, |page| read_string(page.as_slice())).unwrap(),
        str_data
    );
    bpm.unpin_page(pid, false).unwrap();
}

// ============================================================================
// BusTub: PagePinEasyTest
// ============================================================================

#[test]
fn test_page_pin_easy() {
    let (bpm, _dir) = create_bpm(2);

    let pageid0 = bpm.alloc_page().unwrap();
    let pageid1 = bpm.alloc_page().unwrap();

    bpm.with_page_mut(pageid0, |page| copy_string(page.as_mut_slice(), "page0"))
        .unwrap();
    bpm.with_page_mut(pageid1, |page| copy_string(page.as_mut_slice(), "page1"))
        .unwrap();

    assert_eq!(bpm.pin_count(pageid0), Some(1));
    assert_eq!(bpm.pin_count(pageid1), Some(1));

    // All frames pinned: neither a new page nor a reload fits.
    assert!(matches!(bpm.alloc_page(), Err(Error::NoFreeFrames)));

    bpm.unpin_page(pageid0, true).unwrap();
    assert_eq!(bpm.pin_count(pageid0), Some(0));
    bpm.unpin_page(pageid1, true).unwrap();
    assert_eq!(bpm.pin_count(pageid1), Some(0));

    // Two fresh pages push both originals out.
    let temp1 = bpm.alloc_page().unwrap();
    let temp2 = bpm.alloc_page().unwrap();
    assert_eq!(bpm.pin_count(pageid0), None);
    assert_eq!(bpm.pin_count(pageid1), None);
    bpm.unpin_page(temp1, false).unwrap();
    bpm.unpin_page(temp2, false).unwrap();

    // Both come back from disk intact.
    bpm.pin_page(pageid0).unwrap();
    bpm.pin_page(pageid1).unwrap();
    assert_eq!(
        bpm.with_page(pageid0, |page| read_string(page.as_slice())).unwrap(),
        "page0"
    );
    assert_eq!(
        bpm.with_page(pageid1, |page| read_string(page.as_slice())).unwrap(),
        "page1"
    );
    bpm.unpin_page(pageid0, false).unwrap();
    bpm.unpin_page(pageid1, false).unwrap();
}

// ============================================================================
// BusTub: PagePinMediumTest
// ============================================================================

#[test]
fn test_page_pin_medium() {
    let (bpm, _dir) = create_bpm(FRAMES);

    let pid0 = bpm.alloc_page().unwrap();
    bpm.with_page_mut(pid0, |page| copy_string(page.as_mut_slice(), "Hello"))
        .unwrap();
    bpm.unpin_page(pid0, true).unwrap();

    // Fill the pool with pinned pages.
    let mut pages = Vec::new();
    for _ in 0..FRAMES {
        pages.push(bpm.alloc_page().unwrap());
    }
    assert_eq!(bpm.pinned_frame_count(), FRAMES);
    assert!(bpm.alloc_page().is_err());
    assert!(bpm.pin_page(pid0).is_err());

    // Free half the frames.
    for &pid in &pages[..FRAMES / 2] {
        bpm.unpin_page(pid, false).unwrap();
    }
    assert_eq!(bpm.pinned_frame_count(), FRAMES / 2);

    bpm.pin_page(pid0).unwrap();
    assert_eq!(
        bpm.with_page(pid0, |page| read_string(page.as_slice())).unwrap(),
        "Hello"
    );
    bpm.unpin_page(pid0, false).unwrap();

    for &pid in &pages[FRAMES / 2..] {
        bpm.unpin_page(pid, false).unwrap();
    }
    assert_eq!(bpm.stats().snapshot().outstanding_pins(), 0);
}

// ============================================================================
// Pin bookkeeping
// ============================================================================

/// Nested pins on one page need the same number of unpins.
#[test]
fn test_nested_pins() {
    let (bpm, _dir) = create_bpm(FRAMES);

    let pid = bpm.alloc_page().unwrap();
    bpm.pin_page(pid).unwrap();
    bpm.pin_page(pid).unwrap();
    assert_eq!(bpm.pin_count(pid), Some(3));

    bpm.unpin_page(pid, false).unwrap();
    bpm.unpin_page(pid, true).unwrap();
    bpm.unpin_page(pid, false).unwrap();
    assert_eq!(bpm.pin_count(pid), Some(0));
    assert!(matches!(
        bpm.unpin_page(pid, false),
        Err(Error::PageNotPinned(_))
    ));
}

/// A dirty flag set by any unpin survives later clean unpins.
#[test]
fn test_dirty_flag_is_sticky() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let pid = {
        let bpm = BufferPoolManager::new(FRAMES, DiskManager::create(&path).unwrap());
        let pid = bpm.alloc_page().unwrap();
        bpm.pin_page(pid).unwrap();
        bpm.with_page_mut(pid, |page| page.put_u32(128, 0xC0FFEE)).unwrap();
        bpm.unpin_page(pid, true).unwrap();
        bpm.unpin_page(pid, false).unwrap();
        bpm.flush_all_pages().unwrap();
        pid
    };

    let bpm = BufferPoolManager::new(FRAMES, DiskManager::open(&path).unwrap());
    bpm.pin_page(pid).unwrap();
    assert_eq!(bpm.with_page(pid, |page| page.get_u32(128)).unwrap(), 0xC0FFEE);
    bpm.unpin_page(pid, false).unwrap();
}

#[test]
fn test_pin_missing_page() {
    let (bpm, _dir) = create_bpm(FRAMES);

    assert!(bpm.pin_page(PageId::new(3)).is_err());
    assert_eq!(bpm.free_frame_count(), FRAMES);
    assert_eq!(bpm.stats().snapshot().outstanding_pins(), 0);
}
