//! Insertion and split propagation.

use log::{debug, info};

use super::descent::{locate_leaf_for_insert, AncestorTrail, TrailEntry};
use super::node::{InternalNode, Key, Node};
use super::{BTreeIndex, HEADER_PAGE_ID};
use crate::common::{PageId, RecordId, Result};

impl BTreeIndex {
    /// Insert `(key, rid)`.
    ///
    /// Duplicate keys are accepted and stored after existing equal keys.
    /// Every page pinned by the insert is released before this returns,
    /// whether it succeeds or not.
    ///
    /// The whole root-to-leaf path stays pinned until the split, if any,
    /// has finished propagating. On top of that at most one new page is
    /// pinned at a time, so a tree of height `h` needs `h + 1` frames.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if the pool cannot hold the path. Pools that
    ///   pass [`IndexOptions::validate`](crate::IndexOptions::validate) for
    ///   the index's node occupancy always can.
    /// - I/O and `Error::PageCorrupted` from reading nodes
    pub fn insert_entry(&mut self, key: Key, rid: RecordId) -> Result<()> {
        let mut trail = AncestorTrail::new();
        let result = self.insert_with_trail(key, rid, &mut trail);
        let released = trail.release(&self.store);
        result.and(released)
    }

    fn insert_with_trail(&mut self, key: Key, rid: RecordId, trail: &mut AncestorTrail) -> Result<()> {
        let (leaf_page, mut leaf) =
            locate_leaf_for_insert(&self.store, self.root_page_id, key, trail)?;

        if !leaf.is_full() {
            leaf.insert(key, rid);
            return self.store.write_and_unpin(leaf_page, &Node::Leaf(leaf));
        }

        // One sibling per splitting node, plus the new root if the split
        // reaches it. All are claimed before any node changes.
        let full_ancestors = trail.full_suffix_len();
        let grows_root = full_ancestors == trail.len();
        let needed = 1 + full_ancestors + usize::from(grows_root);
        let reserved = match self.store.reserve(needed) {
            Ok(pages) => pages,
            Err(e) => return Err(self.store.abandon(&[leaf_page], e)),
        };

        let sibling_page = reserved[0];
        if let Err(e) = self.store.pin_reserved(sibling_page) {
            return Err(self.store.abandon(&[leaf_page], e));
        }
        let sibling = leaf.split_insert(key, rid, sibling_page);
        let mut separator = sibling.keys()[0];
        debug!(
            "split leaf {} -> {} at key {} ({} + {} entries)",
            leaf_page,
            sibling_page,
            separator,
            leaf.stored(),
            sibling.stored()
        );
        self.store.write_and_unpin(leaf_page, &Node::Leaf(leaf))?;
        self.store.write_and_unpin(sibling_page, &Node::Leaf(sibling))?;

        let mut right_child = sibling_page;
        for &new_page in &reserved[1..=full_ancestors] {
            let Some(TrailEntry {
                page_id,
                mut node,
                child_slot,
            }) = trail.pop()
            else {
                unreachable!("full ancestor missing from the trail");
            };

            if let Err(e) = self.store.pin_reserved(new_page) {
                return Err(self.store.abandon(&[page_id], e));
            }
            let (pushed_up, sibling) = node.split_insert(child_slot, separator, right_child);
            debug!(
                "split internal {} -> {} at level {}, pushing up {}",
                page_id,
                new_page,
                node.level(),
                pushed_up
            );
            self.store.write_and_unpin(page_id, &Node::Internal(node))?;
            self.store.write_and_unpin(new_page, &Node::Internal(sibling))?;

            separator = pushed_up;
            right_child = new_page;
        }

        if grows_root {
            return self.grow_root(reserved[needed - 1], separator, right_child);
        }

        let Some(TrailEntry {
            page_id,
            mut node,
            child_slot,
        }) = trail.pop()
        else {
            unreachable!("no ancestor left to absorb the split");
        };
        node.insert_after(child_slot, separator, right_child);
        self.store.write_and_unpin(page_id, &Node::Internal(node))
    }

    /// Install a new root above the old root and its freshly split sibling.
    ///
    /// `new_root` is a reserved page. The header is only pinned here, after
    /// every other page of the split has been released.
    fn grow_root(&mut self, new_root: PageId, separator: Key, right_child: PageId) -> Result<()> {
        let old_root = self.root_page_id;
        let level = self.height;
        let root = InternalNode::new_root(
            self.store.node_occupancy(),
            level,
            old_root,
            separator,
            right_child,
        );
        self.store.pin_reserved(new_root)?;
        self.store.write_and_unpin(new_root, &Node::Internal(root))?;

        let mut header = self.store.read_header(HEADER_PAGE_ID)?;
        header.root_page_id = new_root;
        self.store
            .write_and_unpin(HEADER_PAGE_ID, &Node::Header(header))?;

        self.root_page_id = new_root;
        self.height += 1;
        info!(
            "{}: root split, new root {} at level {} (height {})",
            self.index_name, new_root, level, self.height
        );
        Ok(())
    }
}
