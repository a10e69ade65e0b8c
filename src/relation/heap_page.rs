//! Slotted heap page layout.
//!
//! ```text
//! +--------------------+
//! | PageHeader (13)    |
//! | slot_count (2)     |
//! | free_end (2)       |
//! +--------------------+
//! | Slot array         |  <- grows toward the end of the page
//! | (offset:2, len:2)  |
//! +--------------------+
//! | Free space         |
//! +--------------------+
//! | Tuple bytes        |  <- grows toward the start of the page
//! +--------------------+
//! ```

use crate::common::config::PAGE_SIZE;
use crate::storage::page::{Page, PageHeader, PageType};

const OFFSET_SLOT_COUNT: usize = PageHeader::SIZE;
const OFFSET_FREE_END: usize = PageHeader::SIZE + 2;
const SLOT_ARRAY_START: usize = PageHeader::SIZE + 4;
const SLOT_SIZE: usize = 4;

/// Largest tuple that fits on an empty page.
pub(crate) const MAX_RECORD_LEN: usize = PAGE_SIZE - SLOT_ARRAY_START - SLOT_SIZE;

/// Typed view over a page holding heap tuples.
pub(crate) struct HeapPage;

impl HeapPage {
    /// Lay out an empty heap page.
    pub(crate) fn init(page: &mut Page) {
        page.reset();
        page.put_u16(OFFSET_SLOT_COUNT, 0);
        page.put_u16(OFFSET_FREE_END, PAGE_SIZE as u16);
        page.seal(PageType::Data);
    }

    pub(crate) fn slot_count(page: &Page) -> u16 {
        page.get_u16(OFFSET_SLOT_COUNT)
    }

    fn free_end(page: &Page) -> usize {
        page.get_u16(OFFSET_FREE_END) as usize
    }

    /// Bytes available for one more tuple including its slot.
    pub(crate) fn free_space(page: &Page) -> usize {
        let slot_end = SLOT_ARRAY_START + Self::slot_count(page) as usize * SLOT_SIZE;
        Self::free_end(page).saturating_sub(slot_end)
    }

    /// Whether a tuple of `len` bytes still fits.
    pub(crate) fn fits(page: &Page, len: usize) -> bool {
        Self::free_space(page) >= len + SLOT_SIZE
    }

    /// Append a tuple, returning its slot, or `None` if it doesn't fit.
    pub(crate) fn insert(page: &mut Page, record: &[u8]) -> Option<u16> {
        if !Self::fits(page, record.len()) {
            return None;
        }

        let slot = Self::slot_count(page);
        let start = Self::free_end(page) - record.len();
        page.as_mut_slice()[start..start + record.len()].copy_from_slice(record);

        let slot_offset = SLOT_ARRAY_START + slot as usize * SLOT_SIZE;
        page.put_u16(slot_offset, start as u16);
        page.put_u16(slot_offset + 2, record.len() as u16);
        page.put_u16(OFFSET_SLOT_COUNT, slot + 1);
        page.put_u16(OFFSET_FREE_END, start as u16);

        page.seal(PageType::Data);
        Some(slot)
    }

    /// Copy out the tuple at `slot`, if the slot exists.
    pub(crate) fn get(page: &Page, slot: u16) -> Option<Vec<u8>> {
        if slot >= Self::slot_count(page) {
            return None;
        }
        let slot_offset = SLOT_ARRAY_START + slot as usize * SLOT_SIZE;
        let start = page.get_u16(slot_offset) as usize;
        let len = page.get_u16(slot_offset + 2) as usize;
        Some(page.as_slice()[start..start + len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageId;

    #[test]
    fn test_insert_and_get() {
        let mut page = Page::new();
        HeapPage::init(&mut page);

        assert_eq!(HeapPage::insert(&mut page, b"alpha"), Some(0));
        assert_eq!(HeapPage::insert(&mut page, b"be"), Some(1));

        assert_eq!(HeapPage::slot_count(&page), 2);
        assert_eq!(HeapPage::get(&page, 0).unwrap(), b"alpha");
        assert_eq!(HeapPage::get(&page, 1).unwrap(), b"be");
        assert!(HeapPage::get(&page, 2).is_none());
        assert!(page.check(PageId::new(0), PageType::Data).is_ok());
    }

    #[test]
    fn test_page_fills_up() {
        let mut page = Page::new();
        HeapPage::init(&mut page);

        let record = [7u8; 100];
        let mut inserted = 0;
        while HeapPage::insert(&mut page, &record).is_some() {
            inserted += 1;
        }

        // 104 bytes per tuple including its slot.
        assert_eq!(inserted, (PAGE_SIZE - SLOT_ARRAY_START) / 104);
        assert!(HeapPage::free_space(&page) < 104);
    }

    #[test]
    fn test_max_record_fits_empty_page() {
        let mut page = Page::new();
        HeapPage::init(&mut page);

        let record = vec![1u8; MAX_RECORD_LEN];
        assert_eq!(HeapPage::insert(&mut page, &record), Some(0));
        assert_eq!(HeapPage::free_space(&page), 0);
    }
}
