//! Node store: typed nodes on top of the buffer pool's pin protocol.
//!
//! Every `read_*` and [`NodeStore::alloc`] leaves the page pinned. The
//! caller releases it with exactly one of:
//! - [`NodeStore::unpin`], when the page was not modified
//! - [`NodeStore::write_and_unpin`], which serializes the node and
//!   unpins it dirty

use log::error;

use super::node::{IndexHeader, InternalNode, LeafNode, Node, NodeKind};
use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result};

pub(crate) struct NodeStore {
    bpm: BufferPoolManager,
    leaf_occupancy: usize,
    node_occupancy: usize,
}

impl NodeStore {
    pub(crate) fn new(bpm: BufferPoolManager, leaf_occupancy: usize, node_occupancy: usize) -> Self {
        Self {
            bpm,
            leaf_occupancy,
            node_occupancy,
        }
    }

    pub(crate) fn bpm(&self) -> &BufferPoolManager {
        &self.bpm
    }

    pub(crate) fn leaf_occupancy(&self) -> usize {
        self.leaf_occupancy
    }

    pub(crate) fn node_occupancy(&self) -> usize {
        self.node_occupancy
    }

    /// Adopt the occupancies recorded in an existing index header.
    pub(crate) fn set_occupancy(&mut self, leaf_occupancy: usize, node_occupancy: usize) {
        self.leaf_occupancy = leaf_occupancy;
        self.node_occupancy = node_occupancy;
    }

    /// Pin `page_id` and decode it as `kind`. The pin is dropped again if
    /// decoding fails.
    fn read(&self, page_id: PageId, kind: NodeKind) -> Result<Node> {
        self.bpm.pin_page(page_id)?;
        let decoded = self.bpm.with_page(page_id, |page| {
            Node::decode(page, page_id, kind, self.leaf_occupancy, self.node_occupancy)
        });
        match decoded {
            Ok(Ok(node)) => Ok(node),
            Ok(Err(e)) | Err(e) => Err(self.abandon(&[page_id], e)),
        }
    }

    pub(crate) fn read_header(&self, page_id: PageId) -> Result<IndexHeader> {
        match self.read(page_id, NodeKind::Header)? {
            Node::Header(header) => Ok(header),
            _ => unreachable!("decode returns the requested kind"),
        }
    }

    pub(crate) fn read_internal(&self, page_id: PageId) -> Result<InternalNode> {
        match self.read(page_id, NodeKind::Internal)? {
            Node::Internal(node) => Ok(node),
            _ => unreachable!("decode returns the requested kind"),
        }
    }

    pub(crate) fn read_leaf(&self, page_id: PageId) -> Result<LeafNode> {
        match self.read(page_id, NodeKind::Leaf)? {
            Node::Leaf(leaf) => Ok(leaf),
            _ => unreachable!("decode returns the requested kind"),
        }
    }

    /// Allocate and pin a fresh page. It holds no valid node until written.
    pub(crate) fn alloc(&self) -> Result<PageId> {
        self.bpm.alloc_page()
    }

    /// Allocate `count` pages and release them straight away, so a split
    /// can claim their ids before changing anything. Each one is pinned
    /// again with [`NodeStore::pin_reserved`] when its turn comes.
    ///
    /// If an allocation fails, the pages already reserved stay unreferenced
    /// in the file.
    pub(crate) fn reserve(&self, count: usize) -> Result<Vec<PageId>> {
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            let page_id = self.bpm.alloc_page()?;
            self.bpm.unpin_page(page_id, false)?;
            pages.push(page_id);
        }
        Ok(pages)
    }

    /// Pin a page handed out by [`NodeStore::reserve`]. Like
    /// [`NodeStore::alloc`], it holds no node until written.
    pub(crate) fn pin_reserved(&self, page_id: PageId) -> Result<()> {
        self.bpm.pin_page(page_id)
    }

    /// Release a pin without marking the page dirty.
    pub(crate) fn unpin(&self, page_id: PageId) -> Result<()> {
        self.bpm.unpin_page(page_id, false)
    }

    /// Serialize `node` into its pinned page and release it dirty.
    pub(crate) fn write_and_unpin(&self, page_id: PageId, node: &Node) -> Result<()> {
        self.bpm.with_page_mut(page_id, |page| node.encode(page))?;
        self.bpm.unpin_page(page_id, true)
    }

    /// Release `pages` clean after a failure and hand back `err`.
    ///
    /// A release failure here means the pin bookkeeping is already broken;
    /// it is logged and the original error wins.
    pub(crate) fn abandon(&self, pages: &[PageId], err: Error) -> Error {
        for &page_id in pages {
            if let Err(e) = self.bpm.unpin_page(page_id, false) {
                error!("failed to release {} after error ({}): {}", page_id, err, e);
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn create_store(pool_size: usize) -> (NodeStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("nodes.idx")).unwrap();
        (NodeStore::new(BufferPoolManager::new(pool_size, dm), 4, 4), dir)
    }

    #[test]
    fn test_write_then_read_leaf() {
        let (store, _dir) = create_store(4);

        let pid = store.alloc().unwrap();
        let mut leaf = LeafNode::new(4);
        leaf.insert(3, crate::common::RecordId::new(PageId::new(0), 1));
        store.write_and_unpin(pid, &Node::Leaf(leaf.clone())).unwrap();

        assert_eq!(store.read_leaf(pid).unwrap(), leaf);
        assert_eq!(store.bpm().pin_count(pid), Some(1));
        store.unpin(pid).unwrap();
        assert_eq!(store.bpm().stats().snapshot().outstanding_pins(), 0);
    }

    #[test]
    fn test_failed_decode_releases_pin() {
        let (store, _dir) = create_store(4);

        let pid = store.alloc().unwrap();
        store
            .write_and_unpin(pid, &Node::Leaf(LeafNode::new(4)))
            .unwrap();

        assert!(matches!(
            store.read_internal(pid),
            Err(Error::PageCorrupted { .. })
        ));
        assert_eq!(store.bpm().pin_count(pid), Some(0));
    }

    #[test]
    fn test_unwritten_page_is_corrupt() {
        let (store, _dir) = create_store(4);

        let pid = store.alloc().unwrap();
        store.unpin(pid).unwrap();

        assert!(store.read_leaf(pid).is_err());
        assert_eq!(store.bpm().pinned_frame_count(), 0);
    }

    #[test]
    fn test_reserved_pages_hold_no_pins() {
        let (store, _dir) = create_store(2);

        // More pages than frames: reserving must not keep any of them pinned.
        let pages = store.reserve(5).unwrap();
        assert_eq!(pages.len(), 5);
        assert_eq!(store.bpm().pinned_frame_count(), 0);

        for (i, &pid) in pages.iter().enumerate() {
            store.pin_reserved(pid).unwrap();
            let mut leaf = LeafNode::new(4);
            leaf.insert(i as i32, crate::common::RecordId::new(PageId::new(0), 0));
            store.write_and_unpin(pid, &Node::Leaf(leaf)).unwrap();
        }
        for (i, &pid) in pages.iter().enumerate() {
            assert_eq!(store.read_leaf(pid).unwrap().keys(), &[i as i32]);
            store.unpin(pid).unwrap();
        }
        assert_eq!(store.bpm().stats().snapshot().outstanding_pins(), 0);
    }

    #[test]
    fn test_abandon_returns_original_error() {
        let (store, _dir) = create_store(4);

        let a = store.alloc().unwrap();
        let b = store.alloc().unwrap();
        let err = store.abandon(&[a, b], Error::NoFreeFrames);

        assert!(matches!(err, Error::NoFreeFrames));
        assert_eq!(store.bpm().pinned_frame_count(), 0);
    }
}
