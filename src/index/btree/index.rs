//! The index façade: creation, reopening, bulk load and inspection.

use log::{debug, error, info, warn};

use super::descent::leftmost_leaf;
use super::node::{AttrType, IndexHeader, InternalNode, Key, LeafNode, Node};
use super::scan::ScanState;
use super::store::NodeStore;
use super::HEADER_PAGE_ID;
use crate::buffer::BufferPoolManager;
use crate::common::config::{check_pool_size, KEY_SIZE, MAX_RELATION_NAME_LEN};
use crate::common::{Error, IndexOptions, PageId, RecordId, Result};
use crate::relation::HeapFile;
use crate::storage::DiskManager;

/// A B+Tree secondary index over one integer attribute of a relation.
///
/// The index lives in its own file named `"<relation>.<attr_byte_offset>"`
/// next to the relation file. Page 0 holds the [`IndexHeader`]; the root
/// is always an internal node, so a fresh index is a root at level 1 over
/// a single empty leaf and has height 2.
///
/// All page access goes through the index's own buffer pool. Operations
/// pin what they need and release it before returning; the one exception
/// is an active scan, which keeps its current leaf pinned between calls.
///
/// # Example
/// ```no_run
/// use pagetree::{AttrType, BTreeIndex, HeapFile, IndexOptions, Operator};
///
/// let relation = HeapFile::open("/data/employees", 64)?;
/// let mut index = BTreeIndex::open(&relation, 0, AttrType::Integer, &IndexOptions::default())?;
///
/// index.start_scan(18, Operator::Gte, 65, Operator::Lt)?;
/// while let Some(rid) = index.scan_next()? {
///     println!("{}", rid);
/// }
/// index.end_scan()?;
/// # Ok::<(), pagetree::Error>(())
/// ```
pub struct BTreeIndex {
    pub(super) store: NodeStore,
    pub(super) index_name: String,
    relation_name: String,
    attr_byte_offset: u32,
    attr_type: AttrType,
    pub(super) root_page_id: PageId,
    /// Levels including the leaves; always `root.level + 1`.
    pub(super) height: u32,
    pub(super) scan: ScanState,
}

/// Shape of a tree as seen by [`BTreeIndex::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub height: u32,
    pub internal_nodes: usize,
    pub leaf_nodes: usize,
    pub entries: usize,
}

/// Leaf visited during verification: page, right link, entry count.
type LeafVisit = (PageId, Option<PageId>, usize);

impl BTreeIndex {
    /// Open the index on `attr_byte_offset` of `relation`, building it if
    /// the index file does not exist yet.
    ///
    /// A new index is bulk-loaded from a full scan of the relation and
    /// flushed before this returns. If the build fails the partial file is
    /// removed. An existing index is validated against the requested
    /// relation, offset and type, and keeps the occupancies it was built
    /// with regardless of `options`.
    ///
    /// # Errors
    /// - `Error::UnsupportedKeyType` for anything but `AttrType::Integer`
    /// - `Error::InvalidOptions` for out-of-range options, a relation
    ///   name longer than the header can store, or a pool too small for
    ///   an existing file's node occupancy
    /// - `Error::BadIndexInfo` if an existing file was built for
    ///   something else
    /// - `Error::RecordTooShort` if a tuple ends before the attribute
    pub fn open(
        relation: &HeapFile,
        attr_byte_offset: u32,
        attr_type: AttrType,
        options: &IndexOptions,
    ) -> Result<Self> {
        if attr_type != AttrType::Integer {
            return Err(Error::UnsupportedKeyType(attr_type.to_string()));
        }
        options.validate()?;

        let relation_name = relation.name();
        if relation_name.len() > MAX_RELATION_NAME_LEN {
            return Err(Error::InvalidOptions(format!(
                "relation name {:?} exceeds {} bytes",
                relation_name, MAX_RELATION_NAME_LEN
            )));
        }

        let index_name = format!("{}.{}", relation_name, attr_byte_offset);
        let path = relation.path().with_file_name(&index_name);

        if DiskManager::exists(&path) {
            let dm = DiskManager::open(&path)?;
            let store = NodeStore::new(
                BufferPoolManager::new(options.pool_size, dm),
                options.leaf_occupancy,
                options.node_occupancy,
            );
            return Self::attach(store, index_name, relation_name, attr_byte_offset, attr_type);
        }

        let dm = DiskManager::create(&path)?;
        let store = NodeStore::new(
            BufferPoolManager::new(options.pool_size, dm),
            options.leaf_occupancy,
            options.node_occupancy,
        );
        let built = Self::initialize(store, index_name, relation_name, attr_byte_offset)
            .and_then(|mut index| {
                index.bulk_load(relation)?;
                Ok(index)
            });

        if built.is_err() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to remove partial index {}: {}", path.display(), e);
            }
        }
        built
    }

    /// Lay out an empty index: header, a root at level 1 and one empty leaf.
    fn initialize(
        store: NodeStore,
        index_name: String,
        relation_name: &str,
        attr_byte_offset: u32,
    ) -> Result<Self> {
        let header_page = store.alloc()?;
        let root_page = store
            .alloc()
            .map_err(|e| store.abandon(&[header_page], e))?;
        let leaf_page = store
            .alloc()
            .map_err(|e| store.abandon(&[header_page, root_page], e))?;
        if header_page != HEADER_PAGE_ID {
            let err = Error::corrupted(header_page.0, "index file was not empty");
            return Err(store.abandon(&[header_page, root_page, leaf_page], err));
        }

        let header = IndexHeader {
            relation_name: relation_name.to_owned(),
            attr_byte_offset,
            attr_type: AttrType::Integer,
            root_page_id: root_page,
            leaf_occupancy: store.leaf_occupancy(),
            node_occupancy: store.node_occupancy(),
        };
        let root = InternalNode::with_child(store.node_occupancy(), 1, leaf_page);
        let leaf = LeafNode::new(store.leaf_occupancy());

        store.write_and_unpin(leaf_page, &Node::Leaf(leaf))?;
        store.write_and_unpin(root_page, &Node::Internal(root))?;
        store.write_and_unpin(header_page, &Node::Header(header))?;

        info!(
            "created index {} (leaf occupancy {}, node occupancy {})",
            index_name,
            store.leaf_occupancy(),
            store.node_occupancy()
        );
        Ok(Self {
            store,
            index_name,
            relation_name: relation_name.to_owned(),
            attr_byte_offset,
            attr_type: AttrType::Integer,
            root_page_id: root_page,
            height: 2,
            scan: ScanState::Unstarted,
        })
    }

    /// Adopt an existing index file after checking its header.
    fn attach(
        mut store: NodeStore,
        index_name: String,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: AttrType,
    ) -> Result<Self> {
        let header = store.read_header(HEADER_PAGE_ID)?;
        store.unpin(HEADER_PAGE_ID)?;

        check_field("relation_name", relation_name, header.relation_name.as_str())?;
        check_field("attr_byte_offset", attr_byte_offset, header.attr_byte_offset)?;
        check_field("attr_type", attr_type, header.attr_type)?;

        if (header.leaf_occupancy, header.node_occupancy)
            != (store.leaf_occupancy(), store.node_occupancy())
        {
            debug!(
                "{}: using persisted occupancies {}/{}",
                index_name, header.leaf_occupancy, header.node_occupancy
            );
        }
        store.set_occupancy(header.leaf_occupancy, header.node_occupancy);
        check_pool_size(store.bpm().pool_size(), header.node_occupancy)?;

        let root = store.read_internal(header.root_page_id)?;
        store.unpin(header.root_page_id)?;
        let height = root.level() + 1;

        info!(
            "opened index {} (root {}, height {})",
            index_name, header.root_page_id, height
        );
        Ok(Self {
            store,
            index_name,
            relation_name: header.relation_name,
            attr_byte_offset,
            attr_type,
            root_page_id: header.root_page_id,
            height,
            scan: ScanState::Unstarted,
        })
    }

    /// Insert one entry per tuple of `relation`, then flush.
    fn bulk_load(&mut self, relation: &HeapFile) -> Result<()> {
        let mut loaded = 0usize;
        for item in relation.scan() {
            let (rid, tuple) = item?;
            let key = extract_key(&tuple, self.attr_byte_offset, rid)?;
            self.insert_entry(key, rid)?;
            loaded += 1;
        }
        info!(
            "{}: bulk loaded {} entries, height {}",
            self.index_name, loaded, self.height
        );
        self.flush()
    }

    /// Index file name, `"<relation>.<attr_byte_offset>"`.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn attr_byte_offset(&self) -> u32 {
        self.attr_byte_offset
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Number of levels, leaves included. A fresh index has height 2.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn leaf_occupancy(&self) -> usize {
        self.store.leaf_occupancy()
    }

    pub fn node_occupancy(&self) -> usize {
        self.store.node_occupancy()
    }

    /// The index's buffer pool, for stats and pin accounting.
    pub fn buffer_pool(&self) -> &BufferPoolManager {
        self.store.bpm()
    }

    /// Write every dirty page of the index file and sync it.
    pub fn flush(&self) -> Result<()> {
        self.store.bpm().flush_all_pages()
    }

    /// Every entry in key order, read along the leaf chain.
    ///
    /// # Errors
    /// `Error::PageCorrupted` if the chain visits more leaves than the file
    /// has pages.
    pub fn entries(&self) -> Result<Vec<(Key, RecordId)>> {
        let page_limit = self.store.bpm().disk_page_count() as usize;
        let mut entries = Vec::new();
        let mut visited = 0usize;
        let mut next = Some(leftmost_leaf(&self.store, self.root_page_id)?);

        while let Some(page_id) = next {
            visited += 1;
            if visited > page_limit {
                return Err(Error::corrupted(page_id.0, "leaf chain does not terminate"));
            }
            let leaf = self.store.read_leaf(page_id)?;
            self.store.unpin(page_id)?;
            entries.extend(leaf.keys().iter().copied().zip(leaf.rids().iter().copied()));
            next = leaf.right_sibling();
        }
        Ok(entries)
    }

    /// Walk the whole tree and check its structure.
    ///
    /// Checked:
    /// - every internal node sits one level above its children
    /// - keys ascend within a node and stay within the parent's separators
    /// - only the root may have zero separators
    /// - the leaf chain links the leaves left to right and ends at the last
    /// - an empty leaf only exists when it is the sole leaf
    ///
    /// Duplicates may leave a key equal to a separator in its left
    /// subtree, so the upper bound is checked inclusively.
    ///
    /// # Errors
    /// `Error::PageCorrupted` naming the first offending page.
    pub fn verify(&self) -> Result<TreeSummary> {
        let mut summary = TreeSummary {
            height: self.height,
            ..TreeSummary::default()
        };
        let mut leaves = Vec::new();
        self.verify_internal(
            self.root_page_id,
            self.height - 1,
            (None, None),
            true,
            &mut summary,
            &mut leaves,
        )?;

        for pair in leaves.windows(2) {
            let (page_id, sibling, _) = pair[0];
            let (next_page, _, _) = pair[1];
            if sibling != Some(next_page) {
                return Err(Error::corrupted(
                    page_id.0,
                    format!("right sibling {:?}, next leaf is {}", sibling, next_page),
                ));
            }
        }
        if let Some(&(page_id, Some(sibling), _)) = leaves.last() {
            return Err(Error::corrupted(
                page_id.0,
                format!("last leaf links to {}", sibling),
            ));
        }
        if leaves.len() > 1 {
            if let Some(&(page_id, _, _)) = leaves.iter().find(|(_, _, stored)| *stored == 0) {
                return Err(Error::corrupted(page_id.0, "empty leaf in a multi-leaf tree"));
            }
        }

        Ok(summary)
    }

    fn verify_internal(
        &self,
        page_id: PageId,
        expected_level: u32,
        bounds: (Option<Key>, Option<Key>),
        is_root: bool,
        summary: &mut TreeSummary,
        leaves: &mut Vec<LeafVisit>,
    ) -> Result<()> {
        let node = self.store.read_internal(page_id)?;
        self.store.unpin(page_id)?;

        if node.level() != expected_level {
            return Err(Error::corrupted(
                page_id.0,
                format!("level {}, expected {}", node.level(), expected_level),
            ));
        }
        if !is_root && node.stored() == 0 {
            return Err(Error::corrupted(page_id.0, "non-root internal node has no keys"));
        }
        check_keys(page_id, node.keys(), bounds)?;
        summary.internal_nodes += 1;

        for (slot, &child) in node.children().iter().enumerate() {
            let lower = match slot {
                0 => bounds.0,
                _ => Some(node.keys()[slot - 1]),
            };
            let upper = node.keys().get(slot).copied().or(bounds.1);

            if node.level() == 1 {
                let leaf = self.store.read_leaf(child)?;
                self.store.unpin(child)?;
                check_keys(child, leaf.keys(), (lower, upper))?;
                summary.leaf_nodes += 1;
                summary.entries += leaf.stored();
                leaves.push((child, leaf.right_sibling(), leaf.stored()));
            } else {
                self.verify_internal(
                    child,
                    node.level() - 1,
                    (lower, upper),
                    false,
                    summary,
                    leaves,
                )?;
            }
        }
        Ok(())
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        if self.scan_active() {
            if let Err(e) = self.end_scan() {
                error!("{}: failed to end scan on close: {}", self.index_name, e);
            }
        }
        if let Err(e) = self.flush() {
            error!("failed to flush index {}: {}", self.index_name, e);
        }
    }
}

/// Read the little-endian key at `offset` of a tuple.
fn extract_key(tuple: &[u8], offset: u32, rid: RecordId) -> Result<Key> {
    let start = offset as usize;
    let needed = start + KEY_SIZE;
    let bytes = tuple.get(start..needed).ok_or(Error::RecordTooShort {
        rid,
        len: tuple.len(),
        needed,
    })?;
    let mut raw = [0u8; KEY_SIZE];
    raw.copy_from_slice(bytes);
    Ok(Key::from_le_bytes(raw))
}

fn check_field<T, U>(field: &'static str, expected: T, found: U) -> Result<()>
where
    T: PartialEq<U> + ToString,
    U: ToString,
{
    if expected == found {
        return Ok(());
    }
    Err(Error::BadIndexInfo {
        field,
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

fn check_keys(page_id: PageId, keys: &[Key], (lower, upper): (Option<Key>, Option<Key>)) -> Result<()> {
    if keys.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(Error::corrupted(page_id.0, "keys out of order"));
    }
    if let (Some(lower), Some(&first)) = (lower, keys.first()) {
        if first < lower {
            return Err(Error::corrupted(
                page_id.0,
                format!("key {} below separator {}", first, lower),
            ));
        }
    }
    if let (Some(upper), Some(&last)) = (upper, keys.last()) {
        if last > upper {
            return Err(Error::corrupted(
                page_id.0,
                format!("key {} above separator {}", last, upper),
            ));
        }
    }
    Ok(())
}
