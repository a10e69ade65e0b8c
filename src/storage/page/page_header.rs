//! The common prefix of every page: layout tag, format version and CRC32.

use std::fmt;

/// Which layout a page holds.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Never sealed (a freshly allocated or orphaned page).
    #[default]
    Invalid = 0,
    /// Slotted heap page of a relation.
    Data = 1,
    BTreeInternal = 2,
    BTreeLeaf = 3,
    /// Page 0 of an index file.
    IndexHeader = 5,
}

impl PageType {
    /// Unknown tags read as `Invalid`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Data,
            2 => PageType::BTreeInternal,
            3 => PageType::BTreeLeaf,
            5 => PageType::IndexHeader,
            _ => PageType::Invalid,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageType::Invalid => "invalid",
            PageType::Data => "data",
            PageType::BTreeInternal => "internal",
            PageType::BTreeLeaf => "leaf",
            PageType::IndexHeader => "index header",
        })
    }
}

/// Metadata at the start of every page.
///
/// ```text
/// Offset  Size  Field
/// 0       1     page_type
/// 1       1     format (layout version, currently 1)
/// 2       4     checksum (CRC32 LE, computed with this field zeroed)
/// 6       7     reserved, zero
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub format: u8,
    pub checksum: u32,
}

impl PageHeader {
    pub const SIZE: usize = 13;
    /// Layout version written by this build.
    pub const FORMAT: u8 = 1;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_FORMAT: usize = 1;
    pub const OFFSET_CHECKSUM: usize = 2;

    /// A header for `page_type` at the current format; checksum unset.
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            format: Self::FORMAT,
            checksum: 0,
        }
    }

    /// # Panics
    /// Panics if `data` is shorter than [`PageHeader::SIZE`].
    pub fn from_bytes(data: &[u8]) -> Self {
        let head = &data[..Self::SIZE];
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&head[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]);
        Self {
            page_type: PageType::from_u8(head[Self::OFFSET_PAGE_TYPE]),
            format: head[Self::OFFSET_FORMAT],
            checksum: u32::from_le_bytes(checksum),
        }
    }

    /// Overwrite the first [`PageHeader::SIZE`] bytes of `data`.
    ///
    /// # Panics
    /// Panics if `data` is shorter than [`PageHeader::SIZE`].
    pub fn write_to(&self, data: &mut [u8]) {
        let head = &mut data[..Self::SIZE];
        head.fill(0);
        head[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        head[Self::OFFSET_FORMAT] = self.format;
        head[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// CRC32 of a whole page with the checksum field read as zero.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let (before, rest) = page_data.split_at(Self::OFFSET_CHECKSUM);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(before);
        hasher.update(&[0u8; 4]);
        hasher.update(&rest[4..]);
        hasher.finalize()
    }

    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}
