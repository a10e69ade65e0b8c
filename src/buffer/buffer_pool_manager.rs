//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting, through RAII guards or explicit calls
//! - Dirty page write-back on eviction and flush
//! - FIFO eviction of unpinned frames

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{BufferPoolStats, Counter, Frame, FrameId, PageReadGuard, PageWriteGuard};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Manages a pool of buffer frames caching the pages of one file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ FifoReplacer │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Pin protocol
/// Every acquisition ([`alloc_page`](Self::alloc_page),
/// [`pin_page`](Self::pin_page), a guard constructor) must be matched by
/// exactly one release ([`unpin_page`](Self::unpin_page) or guard drop).
/// A pinned page is never evicted. Passing `dirty = true` on release is
/// the only way a modification becomes eligible for write-back.
///
/// # Usage
/// ```ignore
/// let bpm = BufferPoolManager::new(10, DiskManager::create("t.db")?);
///
/// let pid = bpm.alloc_page()?;
/// bpm.with_page_mut(pid, |page| page.put_u32(100, 7))?;
/// bpm.unpin_page(pid, true)?;
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<FifoReplacer>,

    /// Handles all disk I/O.
    disk_manager: Mutex<DiskManager>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: explicit pin protocol
    // ========================================================================

    /// Allocate a new zeroed page on disk and pin it in the pool.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn alloc_page(&self) -> Result<PageId> {
        let (_, page_id) = self.alloc_page_internal()?;
        Ok(page_id)
    }

    /// Pin an existing page, loading it from disk if needed.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn pin_page(&self, page_id: PageId) -> Result<()> {
        self.fetch_page_internal(page_id)?;
        Ok(())
    }

    /// Release one pin on a page, marking it dirty if it was modified.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let frame_id = self.pinned_frame(page_id)?;
        self.release_frame(frame_id, is_dirty);
        Ok(())
    }

    /// Run `f` over the contents of a pinned page.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the caller does not hold a pin.
    pub fn with_page<R>(&self, page_id: PageId, f: impl FnOnce(&Page) -> R) -> Result<R> {
        let frame_id = self.pinned_frame(page_id)?;
        let page = self.frames[frame_id.0].page();
        Ok(f(&page))
    }

    /// Run `f` over the mutable contents of a pinned page.
    ///
    /// The change only reaches disk if the caller later unpins with
    /// `is_dirty = true`.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the caller does not hold a pin.
    pub fn with_page_mut<R>(&self, page_id: PageId, f: impl FnOnce(&mut Page) -> R) -> Result<R> {
        let frame_id = self.pinned_frame(page_id)?;
        let mut page = self.frames[frame_id.0].page_mut();
        Ok(f(&mut page))
    }

    /// Pin count of a resident page, or `None` if it is not in the pool.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let pt = self.page_table.read();
        pt.get(&page_id).map(|&fid| self.frames[fid.0].pin_count())
    }

    /// Number of frames currently pinned by anyone.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    // ========================================================================
    // Public API: guarded access
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// The page is marked dirty when the guard drops.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Allocate a new page and return a write guard over it.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (frame_id, page_id) = self.alloc_page_internal()?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: flush
    // ========================================================================

    /// Flush a specific page to disk if it's dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let pt = self.page_table.read();
            match pt.get(&page_id) {
                Some(&fid) => fid,
                None => return Ok(()),
            }
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Flush all dirty pages and sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Get the number of pages resident in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of pages in the underlying file.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    // ========================================================================
    // Internal: release
    // ========================================================================

    /// Drop one pin on a frame. Called by `unpin_page` and by guards.
    pub(crate) fn release_frame(&self, frame_id: FrameId, is_dirty: bool) {
        let remaining = self.frames[frame_id.0].release(is_dirty);
        self.stats.record(Counter::Unpin);

        if remaining == 0 {
            self.stats.frame_released();
            let mut replacer = self.replacer.lock();
            replacer.set_evictable(frame_id, true);
        }
    }

    /// Frame holding `page_id`, provided someone holds a pin on it.
    fn pinned_frame(&self, page_id: PageId) -> Result<FrameId> {
        let pt = self.page_table.read();
        match pt.get(&page_id) {
            Some(&frame_id) if self.frames[frame_id.0].is_pinned() => Ok(frame_id),
            _ => Err(Error::PageNotPinned(page_id.0)),
        }
    }

    // ========================================================================
    // Internal: admission
    // ========================================================================

    fn alloc_page_internal(&self) -> Result<(FrameId, PageId)> {
        let frame_id = self.get_free_frame()?;

        let allocated = self.disk_manager.lock().allocate_page();
        let page_id = match allocated {
            Ok(pid) => pid,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        self.frames[frame_id.0].page_mut().reset();
        self.admit(frame_id, page_id);
        Ok((frame_id, page_id))
    }

    /// Pin `page_id`, reading it into a frame on a miss.
    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        {
            // The table lock keeps the frame from being evicted under us.
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.stats.record(Counter::CacheHit);
                if self.frames[frame_id.0].pin() == 1 {
                    self.stats.frame_pinned();
                }
                self.stats.record(Counter::Pin);
                self.hold(frame_id);
                return Ok(frame_id);
            }
        }

        self.stats.record(Counter::CacheMiss);
        let frame_id = self.get_free_frame()?;

        let read = self.disk_manager.lock().read_page(page_id);
        let data = match read {
            Ok(page) => page,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        self.stats.record(Counter::PageRead);

        self.frames[frame_id.0]
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(data.as_slice());
        self.admit(frame_id, page_id);
        Ok(frame_id)
    }

    /// Bind a vacant frame, already holding the page bytes, to `page_id`.
    fn admit(&self, frame_id: FrameId, page_id: PageId) {
        self.frames[frame_id.0].occupy(page_id);
        self.stats.frame_pinned();
        self.stats.record(Counter::Pin);
        self.page_table.write().insert(page_id, frame_id);
        self.hold(frame_id);
    }

    /// Take a pinned frame out of the replacer's candidates.
    fn hold(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    // ========================================================================
    // Internal: frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = {
            let mut replacer = self.replacer.lock();
            replacer.evict().ok_or(Error::NoFreeFrames)?
        };

        self.stats.record(Counter::Eviction);

        let frame = &self.frames[frame_id.0];
        if let Some(pid) = frame.page_id() {
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // Still resident and unpinned: put it back in line.
                self.replacer.lock().set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&pid);
        }
        frame.vacate();

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let page = frame.page();
            {
                let mut dm = self.disk_manager.lock();
                dm.write_page(page_id, &page)?;
            }
            drop(page);

            frame.mark_clean();
            self.stats.record(Counter::PageWritten);
        }

        Ok(())
    }
}
