//! Page-granular file I/O.
//!
//! Every relation and every index lives in its own file of fixed-size
//! pages; page `n` starts at byte `n * PAGE_SIZE`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::warn;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Reads, writes and appends the pages of one file.
///
/// Not synchronized; the owning [`BufferPoolManager`](crate::BufferPoolManager)
/// keeps it behind a mutex. Writes land in the OS cache until
/// [`sync`](Self::sync), which the pool calls on a full flush.
pub struct DiskManager {
    file: File,
    page_count: u32,
}

impl DiskManager {
    /// Whether a regular file exists at `path`.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Create an empty file. Fails if one already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing file.
    ///
    /// A partial page at the end (an append cut short by a crash) is not
    /// counted; the next allocation overwrites it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        let tail = len % PAGE_SIZE as u64;
        if tail != 0 {
            warn!(
                "{}: ignoring {} trailing bytes of a partial page",
                path.display(),
                tail
            );
        }

        Ok(Self {
            file,
            page_count: (len / PAGE_SIZE as u64) as u32,
        })
    }

    /// # Errors
    /// `Error::PageNotFound` past the end of the file.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.seek_to(page_id)?;
        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    /// Overwrite an allocated page.
    ///
    /// # Errors
    /// `Error::PageNotFound` past the end of the file.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.seek_to(page_id)?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    /// Append a zeroed page and return its id.
    ///
    /// # Errors
    /// `Error::InvalidPageId` once the id space is used up.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        self.page_count += 1;
        Ok(page_id)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn seek_to(&mut self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        Ok(())
    }

    #[inline]
    fn offset_of(page_id: PageId) -> u64 {
        page_id.0 as u64 * PAGE_SIZE as u64
    }
}
