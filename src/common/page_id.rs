//! Page identifier type.

use std::fmt;

/// Identifies a page within one paged file.
///
/// Using `u32` allows for 4 billion pages:
/// - 4,294,967,296 pages × 4KB = 16TB maximum file size
///
/// Index files reserve page 0 for the index header; every other page is a
/// leaf or internal node reachable from the header's root pointer.
///
/// # Example
/// ```
/// use pagetree::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    ///
    /// Used on disk to represent "no page" (an empty child slot or the end
    /// of a leaf sibling chain).
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Decode an on-disk page number, mapping the sentinel to `None`.
    #[inline]
    pub fn from_raw(raw: u32) -> Option<PageId> {
        let pid = PageId(raw);
        pid.is_valid().then_some(pid)
    }

    /// Encode an optional page id, using the sentinel for `None`.
    #[inline]
    pub fn to_raw(page_id: Option<PageId>) -> u32 {
        page_id.unwrap_or(Self::INVALID).0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
