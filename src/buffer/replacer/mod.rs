//! Eviction policy for the buffer pool.
//!
//! - [`FifoReplacer`] - evicts the oldest unpinned frame
//!
//! Index operations pin at most one root-to-leaf path at a time, so a
//! simple insertion-order policy keeps the hot upper levels resident only
//! while they are pinned. Nothing in the tree depends on which unpinned
//! page is chosen.

mod fifo;

pub use fifo::FifoReplacer;
