//! Buffer frames.
//!
//! A [`Frame`] is one slot of the pool. The page bytes sit behind a
//! reader/writer lock; the bookkeeping (resident page, pins, dirty bit)
//! sits behind one small mutex so it always changes as a unit.

use std::fmt;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// Position of a frame in the pool's frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct FrameState {
    page_id: Option<PageId>,
    pins: u32,
    dirty: bool,
}

/// One slot of the buffer pool.
///
/// A frame is *vacant* until [`occupy`](Frame::occupy) loads a page into
/// it, and goes back to vacant when the pool evicts that page.
pub struct Frame {
    page: RwLock<Page>,
    state: Mutex<FrameState>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            state: Mutex::new(FrameState::default()),
        }
    }

    /// Shared access to the page bytes.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Exclusive access to the page bytes.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// The page resident in this frame, if any.
    pub fn page_id(&self) -> Option<PageId> {
        self.state.lock().page_id
    }

    pub fn pin_count(&self) -> u32 {
        self.state.lock().pins
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Whether the bytes differ from what is on disk.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Bind a freshly loaded page to this frame, pinned once and clean.
    pub(crate) fn occupy(&self, page_id: PageId) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.pins, 0, "occupying a pinned frame");
        *state = FrameState {
            page_id: Some(page_id),
            pins: 1,
            dirty: false,
        };
    }

    /// Add a pin. Returns the new count.
    pub(crate) fn pin(&self) -> u32 {
        let mut state = self.state.lock();
        state.pins += 1;
        state.pins
    }

    /// Drop a pin, folding `dirty` into the sticky dirty bit. Returns the
    /// remaining pin count.
    ///
    /// # Panics
    /// Panics if the frame is not pinned.
    pub(crate) fn release(&self, dirty: bool) -> u32 {
        let mut state = self.state.lock();
        assert!(state.pins > 0, "pin count underflow");
        state.pins -= 1;
        state.dirty |= dirty;
        state.pins
    }

    /// Record that the bytes have reached disk.
    pub(crate) fn mark_clean(&self) {
        self.state.lock().dirty = false;
    }

    /// Forget the resident page. Returns the page that was bound.
    pub(crate) fn vacate(&self) -> Option<PageId> {
        let mut state = self.state.lock();
        let old = state.page_id.take();
        state.dirty = false;
        old
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupy_starts_pinned_and_clean() {
        let frame = Frame::new();
        assert_eq!(frame.page_id(), None);

        frame.occupy(PageId::new(4));
        assert_eq!(frame.page_id(), Some(PageId::new(4)));
        assert_eq!(frame.pin_count(), 1);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_dirty_bit_is_sticky_across_releases() {
        let frame = Frame::new();
        frame.occupy(PageId::new(1));
        frame.pin();

        assert_eq!(frame.release(true), 1);
        assert_eq!(frame.release(false), 0);
        assert!(frame.is_dirty());

        frame.mark_clean();
        assert!(!frame.is_dirty());
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn test_release_unpinned_frame_panics() {
        Frame::new().release(false);
    }

    #[test]
    fn test_vacate_clears_binding() {
        let frame = Frame::new();
        frame.occupy(PageId::new(9));
        frame.release(true);

        assert_eq!(frame.vacate(), Some(PageId::new(9)));
        assert_eq!(frame.page_id(), None);
        assert!(!frame.is_dirty());
        assert_eq!(frame.vacate(), None);
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId::new(3).to_string(), "frame#3");
    }
}
