//! Base relations.
//!
//! A relation is a heap file of raw tuples addressed by [`RecordId`]. The
//! index layer only ever reads a relation sequentially through
//! [`FileScan`], extracting the indexed attribute from each tuple's bytes.
//!
//! [`RecordId`]: crate::common::RecordId

mod heap_file;
mod heap_page;

pub use heap_file::{FileScan, HeapFile};
