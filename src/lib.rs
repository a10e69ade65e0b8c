//! pagetree - an on-disk B+Tree secondary index over integer attributes.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            pagetree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────┐   ┌───────────────────────────┐  │
//! │  │    Index Layer (index/)   │   │ Relation Layer (relation/)│  │
//! │  │ BTreeIndex: insert, scan  │◀──│ HeapFile + FileScan       │  │
//! │  │ NodeStore + node layouts  │   │ (bulk-load source)        │  │
//! │  └───────────────────────────┘   └───────────────────────────┘  │
//! │                 ↓                               ↓               │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Buffer Pool (buffer/)                      │    │
//! │  │   BufferPoolManager: explicit pin/unpin + RAII guards   │    │
//! │  │   FIFO eviction, dirty write-back, pin statistics       │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │           Storage Layer (storage/)                      │    │
//! │  │     DiskManager + Page + PageHeader (type, CRC32)       │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each file (relation or index) has its own buffer pool. An index file is
//! named `"<relation>.<attr_byte_offset>"` and sits next to its relation.
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`relation`] - Heap files the index is built from
//! - [`index`] - The B+Tree index
//!
//! # Quick Start
//! ```no_run
//! use pagetree::{AttrType, BTreeIndex, HeapFile, IndexOptions, Operator};
//!
//! let relation = HeapFile::create("/tmp/orders", 64)?;
//! for id in 0..1000i32 {
//!     relation.insert_record(&id.to_le_bytes())?;
//! }
//!
//! let mut index = BTreeIndex::open(&relation, 0, AttrType::Integer, &IndexOptions::default())?;
//! index.start_scan(100, Operator::Gt, 200, Operator::Lte)?;
//! while let Some(rid) = index.scan_next()? {
//!     let tuple = relation.get_record(rid)?;
//!     assert_eq!(tuple.len(), 4);
//! }
//! index.end_scan()?;
//! # Ok::<(), pagetree::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod relation;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{min_pool_size, PAGE_SIZE};
pub use common::{Error, IndexOptions, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, FrameId, StatsSnapshot};
pub use index::{AttrType, BTreeIndex, Key, Operator, TreeSummary};
pub use relation::{FileScan, HeapFile};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
