//! Heap file - an unordered paged collection of tuples.

use std::path::{Path, PathBuf};

use log::{debug, info};

use super::heap_page::{HeapPage, MAX_RECORD_LEN};
use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::PageType;
use crate::storage::DiskManager;

/// A relation stored as a heap of slotted pages.
///
/// The file name doubles as the relation name, which is how an index
/// derives its own file name (`"<relation>.<attr_byte_offset>"`).
///
/// # Example
/// ```no_run
/// use pagetree::relation::HeapFile;
///
/// let heap = HeapFile::create("/tmp/emp", 16).unwrap();
/// let rid = heap.insert_record(&42i32.to_le_bytes()).unwrap();
/// assert_eq!(heap.get_record(rid).unwrap(), 42i32.to_le_bytes());
/// ```
pub struct HeapFile {
    name: String,
    path: PathBuf,
    bpm: BufferPoolManager,
}

impl HeapFile {
    /// Create a new, empty relation file.
    ///
    /// # Errors
    /// Fails if the file exists, the path has no UTF-8 file name, or
    /// `pool_size` is zero.
    pub fn create<P: AsRef<Path>>(path: P, pool_size: usize) -> Result<Self> {
        let name = Self::relation_name(path.as_ref())?;
        Self::check_pool_size(pool_size)?;
        let dm = DiskManager::create(path.as_ref())?;
        info!("created relation {} at {}", name, path.as_ref().display());
        Ok(Self {
            name,
            path: path.as_ref().to_path_buf(),
            bpm: BufferPoolManager::new(pool_size, dm),
        })
    }

    /// Open an existing relation file.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: usize) -> Result<Self> {
        let name = Self::relation_name(path.as_ref())?;
        Self::check_pool_size(pool_size)?;
        let dm = DiskManager::open(path.as_ref())?;
        debug!("opened relation {} with {} pages", name, dm.page_count());
        Ok(Self {
            name,
            path: path.as_ref().to_path_buf(),
            bpm: BufferPoolManager::new(pool_size, dm),
        })
    }

    /// Relation name (the file name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the relation file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a tuple, returning its record id.
    ///
    /// # Errors
    /// `Error::PageFull` if the tuple can never fit in one page.
    pub fn insert_record(&self, record: &[u8]) -> Result<RecordId> {
        if record.len() > MAX_RECORD_LEN {
            return Err(Error::PageFull(record.len()));
        }

        let page_count = self.bpm.disk_page_count();
        if page_count > 0 {
            let last = PageId::new(page_count - 1);
            let mut guard = self.bpm.fetch_page_write(last)?;
            guard.check(last, PageType::Data)?;
            // Check through a shared borrow so a full page stays clean.
            if HeapPage::fits(&guard, record.len()) {
                if let Some(slot) = HeapPage::insert(&mut guard, record) {
                    return Ok(RecordId::new(last, slot));
                }
            }
        }

        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        HeapPage::init(&mut guard);
        let slot = HeapPage::insert(&mut guard, record).ok_or(Error::PageFull(record.len()))?;
        Ok(RecordId::new(page_id, slot))
    }

    /// Read the tuple stored at `rid`.
    ///
    /// # Errors
    /// `Error::RecordNotFound` if the page or slot does not exist.
    pub fn get_record(&self, rid: RecordId) -> Result<Vec<u8>> {
        if rid.page_id.0 >= self.bpm.disk_page_count() {
            return Err(Error::RecordNotFound(rid));
        }
        let guard = self.bpm.fetch_page_read(rid.page_id)?;
        guard.check(rid.page_id, PageType::Data)?;
        HeapPage::get(&guard, rid.slot).ok_or(Error::RecordNotFound(rid))
    }

    /// Sequential scan over every tuple in page/slot order.
    pub fn scan(&self) -> FileScan<'_> {
        FileScan {
            heap: self,
            page: 0,
            slot: 0,
            done: false,
        }
    }

    /// Write all dirty pages to disk.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    fn relation_name(path: &Path) -> Result<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::InvalidOptions(format!("{} has no usable file name", path.display()))
            })
    }

    fn check_pool_size(pool_size: usize) -> Result<()> {
        if pool_size == 0 {
            return Err(Error::InvalidOptions("pool_size must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if let Err(e) = self.bpm.flush_all_pages() {
            log::error!("failed to flush relation {}: {}", self.name, e);
        }
    }
}

/// Sequential cursor over a [`HeapFile`].
///
/// Yields `(RecordId, tuple bytes)` until the last page is exhausted. The
/// end of the relation is plain iterator exhaustion; an I/O or corruption
/// error is yielded once and ends the scan.
pub struct FileScan<'a> {
    heap: &'a HeapFile,
    page: u32,
    slot: u16,
    done: bool,
}

impl FileScan<'_> {
    fn advance(&mut self) -> Result<Option<(RecordId, Vec<u8>)>> {
        while self.page < self.heap.bpm.disk_page_count() {
            let page_id = PageId::new(self.page);
            let guard = self.heap.bpm.fetch_page_read(page_id)?;
            guard.check(page_id, PageType::Data)?;

            if let Some(record) = HeapPage::get(&guard, self.slot) {
                let rid = RecordId::new(page_id, self.slot);
                self.slot += 1;
                return Ok(Some((rid, record)));
            }

            self.page += 1;
            self.slot = 0;
        }
        Ok(None)
    }
}

impl Iterator for FileScan<'_> {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
