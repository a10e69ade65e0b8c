//! Index structures.

pub mod btree;

pub use btree::{AttrType, BTreeIndex, Key, Operator, TreeSummary};
