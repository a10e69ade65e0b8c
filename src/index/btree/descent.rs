//! Root-to-leaf descent.
//!
//! Insertion keeps every internal node on the path pinned in an
//! [`AncestorTrail`] so that splits can propagate upward without refetching.
//! Scans only need the leaf and release each internal node as soon as the
//! next child is known.

use log::trace;

use super::node::{InternalNode, Key, LeafNode};
use super::store::NodeStore;
use super::Operator;
use crate::common::{PageId, Result};

/// One pinned internal node on the insert path.
pub(crate) struct TrailEntry {
    pub(crate) page_id: PageId,
    pub(crate) node: InternalNode,
    /// Child slot the descent followed out of this node.
    pub(crate) child_slot: usize,
}

/// Pinned ancestors of the leaf being modified, root first.
///
/// Entries are popped as the insert propagates upward. Whatever is left
/// when the operation ends, successfully or not, is released clean with
/// [`AncestorTrail::release`].
#[derive(Default)]
pub(crate) struct AncestorTrail {
    entries: Vec<TrailEntry>,
}

impl AncestorTrail {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: TrailEntry) {
        self.entries.push(entry);
    }

    /// Nearest remaining ancestor.
    pub(crate) fn pop(&mut self) -> Option<TrailEntry> {
        self.entries.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of consecutive full nodes directly above the leaf. A leaf
    /// split propagates through exactly these.
    pub(crate) fn full_suffix_len(&self) -> usize {
        self.entries
            .iter()
            .rev()
            .take_while(|entry| entry.node.is_full())
            .count()
    }

    /// Unpin every remaining ancestor without marking it dirty.
    ///
    /// All entries are released even if one fails; the first failure is
    /// returned.
    pub(crate) fn release(&mut self, store: &NodeStore) -> Result<()> {
        let mut first_err = None;
        for entry in self.entries.drain(..) {
            if let Err(e) = store.unpin(entry.page_id) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Descend from `root` to the leaf that should receive `key`, pushing each
/// internal node onto `trail`.
///
/// On success the returned leaf is pinned in addition to the trail. On
/// error the leaf is not pinned; the trail holds whatever was pinned so far.
pub(crate) fn locate_leaf_for_insert(
    store: &NodeStore,
    root: PageId,
    key: Key,
    trail: &mut AncestorTrail,
) -> Result<(PageId, LeafNode)> {
    let mut page_id = root;
    loop {
        let node = store.read_internal(page_id)?;
        let child_slot = node.child_slot(key);
        let child = node.child(child_slot);
        let level = node.level();
        trace!(
            "insert {}: {} level {} -> slot {} ({})",
            key,
            page_id,
            level,
            child_slot,
            child
        );
        trail.push(TrailEntry {
            page_id,
            node,
            child_slot,
        });

        if level == 1 {
            let leaf = store.read_leaf(child)?;
            return Ok((child, leaf));
        }
        page_id = child;
    }
}

/// Descend to the first leaf that may hold a key admitted by `low_op low`.
///
/// For `Gte` ties route left, since entries equal to a separator can sit
/// at the end of the left subtree after a split. Only the returned leaf is
/// pinned.
pub(crate) fn locate_leaf_for_scan(
    store: &NodeStore,
    root: PageId,
    low: Key,
    low_op: Operator,
) -> Result<(PageId, LeafNode)> {
    let mut page_id = root;
    loop {
        let node = store.read_internal(page_id)?;
        let child_slot = match low_op {
            Operator::Gte => node.child_slot_lower(low),
            _ => node.child_slot(low),
        };
        let child = node.child(child_slot);
        let level = node.level();
        store.unpin(page_id)?;
        trace!("scan {} {}: {} -> {}", low_op, low, page_id, child);

        if level == 1 {
            let leaf = store.read_leaf(child)?;
            return Ok((child, leaf));
        }
        page_id = child;
    }
}

/// Descend along the leftmost edge to the first leaf. Nothing stays pinned.
pub(crate) fn leftmost_leaf(store: &NodeStore, root: PageId) -> Result<PageId> {
    let mut page_id = root;
    loop {
        let node = store.read_internal(page_id)?;
        let child = node.child(0);
        let level = node.level();
        store.unpin(page_id)?;
        if level == 1 {
            return Ok(child);
        }
        page_id = child;
    }
}
