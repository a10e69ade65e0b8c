//! Error types for pagetree.

use thiserror::Error;

use crate::common::RecordId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagetree.
///
/// Storage, buffer pool, heap file and index errors share one enum so that
/// `?` works across layers without conversions.
///
/// There is no end-of-scan variant: running off the end of a range
/// is reported as `Ok(None)` by `BTreeIndex::scan_next`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The file has run out of `u32` page ids.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Attempted to unpin (or access) a page that wasn't pinned.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),

    /// Page contents failed checksum or layout validation.
    #[error("Page {page_id} corrupted: {reason}")]
    PageCorrupted { page_id: u32, reason: String },

    /// An existing index file disagrees with the requested parameters.
    #[error("Index metadata mismatch on {field}: expected {expected}, found {found}")]
    BadIndexInfo {
        field: &'static str,
        expected: String,
        found: String,
    },

    /// Only integer attributes can be indexed.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Rejected index or heap file options.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Scan operators are not one of GT/GTE paired with LT/LTE.
    #[error("Unsupported scan operator combination")]
    BadOpcodes,

    /// Scan bounds select no possible key.
    #[error("Scan range is empty: low bound exceeds high bound")]
    BadScanRange,

    /// `scan_next` or `end_scan` called without an active scan.
    #[error("No scan has been started")]
    ScanNotInitialized,

    /// A tuple is too short to hold the indexed attribute.
    #[error("Record {rid} is {len} bytes, need at least {needed}")]
    RecordTooShort {
        rid: RecordId,
        len: usize,
        needed: usize,
    },

    /// A heap page cannot fit the tuple.
    #[error("Record of {0} bytes does not fit in a page")]
    PageFull(usize),

    /// No live tuple at the given record id.
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),
}

impl Error {
    /// Shorthand for a [`Error::PageCorrupted`] with a formatted reason.
    pub(crate) fn corrupted(page_id: u32, reason: impl Into<String>) -> Self {
        Error::PageCorrupted {
            page_id,
            reason: reason.into(),
        }
    }
}
