//! Record identifier type.

use std::fmt;

use super::PageId;

/// Identifies a tuple in a heap file: the page holding it plus its slot.
///
/// The B+Tree stores record ids verbatim next to their keys and never
/// interprets them.
///
/// # Layout (8 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     page_id (little-endian)
/// 4       2     slot (little-endian)
/// 6       2     padding (zero)
/// ```
///
/// # Example
/// ```
/// use pagetree::{PageId, RecordId};
///
/// let rid = RecordId::new(PageId::new(3), 12);
/// assert_eq!(rid.to_string(), "3:12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Page containing the tuple.
    pub page_id: PageId,
    /// Slot number within the page.
    pub slot: u16,
}

impl RecordId {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Record id that refers to no tuple.
    pub const INVALID: RecordId = RecordId {
        page_id: PageId::INVALID,
        slot: u16::MAX,
    };

    /// Create a new record id.
    #[inline]
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }

    /// Check if this record id points at a real page.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.page_id.is_valid()
    }

    /// Serialize into the 8-byte on-page form.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_id.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot.to_le_bytes());
        buf
    }

    /// Deserialize from the 8-byte on-page form.
    ///
    /// # Panics
    /// Panics if `buf.len() < RecordId::SIZE`.
    pub fn from_bytes(buf: &[u8]) -> Self {
        assert!(buf.len() >= Self::SIZE, "buffer too small for RecordId");
        let page = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u16::from_le_bytes([buf[4], buf[5]]);
        Self {
            page_id: PageId::new(page),
            slot,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id.0, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_byte_layout() {
        let rid = RecordId::new(PageId::new(0x04030201), 0x0605);
        let bytes = rid.to_bytes();

        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0, 0]);
        assert_eq!(RecordId::from_bytes(&bytes), rid);
    }

    #[test]
    fn test_record_id_invalid() {
        assert!(!RecordId::INVALID.is_valid());
        assert!(RecordId::new(PageId::new(1), 0).is_valid());
    }

    #[test]
    fn test_record_id_ordering() {
        let a = RecordId::new(PageId::new(1), 9);
        let b = RecordId::new(PageId::new(2), 0);
        assert!(a < b);
        assert!(RecordId::new(PageId::new(1), 1) < a);
    }
}
