//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between the index/heap layers
//! and disk. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache, with explicit pin/unpin calls
//! - [`Frame`] - One slot of the pool: page bytes plus pin/dirty state
//! - [`PageGuard`] - Scoped pin + lock, used by the heap file
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::{Frame, FrameId};
pub use page_guard::{PageGuard, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, Counter, StatsSnapshot};
