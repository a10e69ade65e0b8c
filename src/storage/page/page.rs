//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Pages are stored in frames within the
//! buffer pool. Typed layouts (index nodes, heap pages) read and write
//! fixed offsets through the little-endian accessors below.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code (copying 4KB should
/// be explicit). A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use pagetree::storage::page::Page;
///
/// let mut page = Page::new();
/// page.put_u32(100, 0xDEAD_BEEF);
/// assert_eq!(page.get_u32(100), 0xDEAD_BEEF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    /// Stamp the page type and refresh the checksum.
    ///
    /// Every typed layout calls this as the last step of serialization.
    pub fn seal(&mut self, page_type: PageType) {
        self.set_header(&PageHeader::new(page_type));
        self.update_checksum();
    }

    /// Check the checksum and that the page holds the expected layout.
    ///
    /// # Errors
    /// Returns `Error::PageCorrupted` naming `page_id` on either mismatch.
    pub fn check(&self, page_id: PageId, expected: PageType) -> Result<()> {
        let header = self.header();
        if header.page_type != expected {
            return Err(Error::corrupted(
                page_id.0,
                format!("expected {} page, found {}", expected, header.page_type),
            ));
        }
        if header.format != PageHeader::FORMAT {
            return Err(Error::corrupted(
                page_id.0,
                format!("unsupported page format {}", header.format),
            ));
        }
        if !header.verify_checksum(&self.data) {
            return Err(Error::corrupted(page_id.0, "checksum mismatch"));
        }
        Ok(())
    }

    /// Read a little-endian `u16` at `offset`.
    #[inline]
    pub fn get_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Write a little-endian `u16` at `offset`.
    #[inline]
    pub fn put_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a little-endian `u32` at `offset`.
    #[inline]
    pub fn get_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    /// Write a little-endian `u32` at `offset`.
    #[inline]
    pub fn put_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a little-endian `i32` at `offset`.
    #[inline]
    pub fn get_i32(&self, offset: usize) -> i32 {
        self.get_u32(offset) as i32
    }

    /// Write a little-endian `i32` at `offset`.
    #[inline]
    pub fn put_i32(&mut self, offset: usize, value: i32) {
        self.put_u32(offset, value as u32);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
