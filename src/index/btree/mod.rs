//! B+Tree secondary index.
//!
//! - [`node`]: on-page layouts and in-memory node values
//! - `store`: pin/decode/encode/unpin on top of the buffer pool
//! - `descent`: root-to-leaf navigation and the ancestor trail
//! - `insert`: insertion, leaf and internal splits, root growth
//! - `scan`: the range scan state machine
//! - `index`: the [`BTreeIndex`] façade

mod descent;
mod index;
mod insert;
pub mod node;
mod scan;
mod store;

pub use index::{BTreeIndex, TreeSummary};
pub use node::{AttrType, Key};
pub use scan::Operator;

use crate::common::PageId;

/// Page holding the [`node::IndexHeader`] in every index file.
pub(crate) const HEADER_PAGE_ID: PageId = PageId(0);
