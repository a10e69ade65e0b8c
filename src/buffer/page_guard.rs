//! Scoped page access.
//!
//! A [`PageGuard`] holds one pin and one page lock and gives both back on
//! drop. The heap file reads and appends tuples through guards because its
//! accesses start and end inside a single call. Index pins outlive calls
//! (a scan keeps its leaf pinned between `scan_next` calls), so the index
//! uses the explicit `pin_page` / `unpin_page` protocol instead.
//!
//! A write guard reports the page dirty only if it was actually borrowed
//! mutably.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::buffer_pool_manager::BufferPoolManager;
use super::FrameId;
use crate::common::PageId;
use crate::storage::page::Page;

/// A pinned, locked page. `L` is the lock guard type.
pub struct PageGuard<'a, L> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    touched: bool,
    lock: L,
}

/// Shared access; always released clean.
pub type PageReadGuard<'a> = PageGuard<'a, RwLockReadGuard<'a, Page>>;

/// Exclusive access; released dirty once mutated.
pub type PageWriteGuard<'a> = PageGuard<'a, RwLockWriteGuard<'a, Page>>;

impl<'a, L> PageGuard<'a, L> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame_id: FrameId, page_id: PageId, lock: L) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            touched: false,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl<L: Deref<Target = Page>> Deref for PageGuard<'_, L> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl<L: DerefMut<Target = Page>> DerefMut for PageGuard<'_, L> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.touched = true;
        &mut self.lock
    }
}

impl<L> Drop for PageGuard<'_, L> {
    fn drop(&mut self) {
        self.bpm.release_frame(self.frame_id, self.touched);
    }
}
