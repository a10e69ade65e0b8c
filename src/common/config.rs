//! Configuration constants and runtime options for pagetree.

use crate::common::{Error, RecordId, Result};
use crate::storage::page::PageHeader;

/// Size of a page in bytes. Every file is a whole number of pages and
/// page ids are `u32`, so one file tops out at 16TB.
pub const PAGE_SIZE: usize = 4096;

/// Frames in a buffer pool when the caller does not pick a size.
pub const DEFAULT_POOL_SIZE: usize = 100;

/// Longest relation name the index header can store, in bytes.
pub const MAX_RELATION_NAME_LEN: usize = 32;

/// Width of an indexed integer key in bytes.
pub const KEY_SIZE: usize = std::mem::size_of::<i32>();

/// Width of an on-disk page reference in bytes.
pub const PAGE_ID_SIZE: usize = std::mem::size_of::<u32>();

/// Bytes preceding the key array in both node kinds.
///
/// Page header, then two `u32` fields: `stored` plus either the right
/// sibling (leaf) or the level (internal).
pub const NODE_PREFIX_SIZE: usize = PageHeader::SIZE + 8;

/// Most `(key, rid)` pairs a leaf page can hold.
pub const MAX_LEAF_OCCUPANCY: usize = (PAGE_SIZE - NODE_PREFIX_SIZE) / (KEY_SIZE + RecordId::SIZE);

/// Most separator keys an internal page can hold (with one extra child).
pub const MAX_NODE_OCCUPANCY: usize =
    (PAGE_SIZE - NODE_PREFIX_SIZE - PAGE_ID_SIZE) / (KEY_SIZE + PAGE_ID_SIZE);

/// Smallest occupancy that still lets a node split into two non-empty halves.
pub const MIN_OCCUPANCY: usize = 2;

/// Tallest tree an index with this node occupancy can reach.
///
/// A split leaves every internal node with at least `node_occupancy / 2 + 1`
/// children and the root with two, so a tree of height `h` has at least
/// `2 * fanout^(h - 3)` leaves. Page ids are `u32`, which caps the leaf
/// count below `2^32`.
pub const fn max_tree_height(node_occupancy: usize) -> usize {
    let fanout = if node_occupancy < MIN_OCCUPANCY {
        2
    } else {
        (node_occupancy / 2 + 1) as u64
    };
    let mut levels = 0;
    let mut reach = 1u64;
    while reach < (1u64 << 31) {
        reach = reach.saturating_mul(fanout);
        levels += 1;
    }
    levels + 2
}

/// Fewest frames an index pool with this node occupancy may have.
///
/// An insert pins the root-to-leaf path plus one new page, and an open
/// scan holds one more leaf.
pub const fn min_pool_size(node_occupancy: usize) -> usize {
    max_tree_height(node_occupancy) + 2
}

/// Fewest frames any index pool may have, reached at the largest node
/// occupancy.
pub const MIN_POOL_SIZE: usize = min_pool_size(MAX_NODE_OCCUPANCY);

/// Runtime options for opening or creating an index.
///
/// Occupancies default to the page-derived maximum. Smaller values are
/// accepted so that modest data sets still build multi-level trees. Once an
/// index file exists its persisted occupancies take precedence.
///
/// # Example
/// ```
/// use pagetree::IndexOptions;
///
/// let options = IndexOptions::default()
///     .with_pool_size(40)
///     .with_leaf_occupancy(4)
///     .with_node_occupancy(3);
/// assert!(options.validate().is_ok());
///
/// // Narrow nodes make deep trees, which need more frames.
/// assert!(options.with_pool_size(16).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Frames in the index's buffer pool.
    pub pool_size: usize,
    /// Maximum live keys per leaf.
    pub leaf_occupancy: usize,
    /// Maximum separator keys per internal node.
    pub node_occupancy: usize,
}

impl IndexOptions {
    /// Set the buffer pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the leaf occupancy.
    pub fn with_leaf_occupancy(mut self, leaf_occupancy: usize) -> Self {
        self.leaf_occupancy = leaf_occupancy;
        self
    }

    /// Set the internal node occupancy.
    pub fn with_node_occupancy(mut self, node_occupancy: usize) -> Self {
        self.node_occupancy = node_occupancy;
        self
    }

    /// Check that every option is within the supported range.
    ///
    /// # Errors
    /// Returns `Error::InvalidOptions` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_OCCUPANCY..=MAX_LEAF_OCCUPANCY).contains(&self.leaf_occupancy) {
            return Err(Error::InvalidOptions(format!(
                "leaf_occupancy {} outside {}..={}",
                self.leaf_occupancy, MIN_OCCUPANCY, MAX_LEAF_OCCUPANCY
            )));
        }
        if !(MIN_OCCUPANCY..=MAX_NODE_OCCUPANCY).contains(&self.node_occupancy) {
            return Err(Error::InvalidOptions(format!(
                "node_occupancy {} outside {}..={}",
                self.node_occupancy, MIN_OCCUPANCY, MAX_NODE_OCCUPANCY
            )));
        }
        check_pool_size(self.pool_size, self.node_occupancy)
    }
}

/// Check that a pool of `pool_size` frames can serve an index whose nodes
/// hold `node_occupancy` keys.
///
/// # Errors
/// `Error::InvalidOptions` if the pool is too small.
pub fn check_pool_size(pool_size: usize, node_occupancy: usize) -> Result<()> {
    let needed = min_pool_size(node_occupancy);
    if pool_size < needed {
        return Err(Error::InvalidOptions(format!(
            "pool_size {} is below the minimum of {} for node_occupancy {}",
            pool_size, needed, node_occupancy
        )));
    }
    Ok(())
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            leaf_occupancy: MAX_LEAF_OCCUPANCY,
            node_occupancy: MAX_NODE_OCCUPANCY,
        }
    }
}
