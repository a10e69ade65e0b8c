//! On-page node layouts.
//!
//! Three shapes live in an index file:
//! - [`IndexHeader`] on page 0
//! - [`InternalNode`] pages, which carry their `level`
//! - [`LeafNode`] pages
//!
//! The tree only ever works on these typed values. Bytes are touched in
//! [`Node::encode`] and [`Node::decode`], called by the node store when a
//! page is pinned or released. Which shape to decode is always decided by
//! the caller: page 0 is the header, and a child is a leaf exactly when its
//! parent has `level == 1`. The page type byte is only cross-checked.
//!
//! Leaves and internal nodes hold an explicit `stored` count. Unused key
//! slots are still filled with [`KEY_SENTINEL`] on disk so that a page is
//! fully determined by its live contents.

use std::fmt;

use crate::common::config::{
    KEY_SIZE, MAX_LEAF_OCCUPANCY, MAX_NODE_OCCUPANCY, MAX_RELATION_NAME_LEN, MIN_OCCUPANCY,
    NODE_PREFIX_SIZE, PAGE_ID_SIZE,
};
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Indexed key type.
pub type Key = i32;

/// Value written into unused key slots.
pub const KEY_SENTINEL: Key = Key::MAX;

/// Type of the indexed attribute, as persisted in the index header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Integer = 0,
    Double = 1,
    String = 2,
}

impl AttrType {
    /// Convert from u8, returning `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AttrType::Integer),
            1 => Some(AttrType::Double),
            2 => Some(AttrType::String),
            _ => None,
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::Integer => "INTEGER",
            AttrType::Double => "DOUBLE",
            AttrType::String => "STRING",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Index header
// ============================================================================

/// Index metadata stored on page 0.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       13    PageHeader (IndexHeader)
/// 13      1     attr_type
/// 14      4     attr_byte_offset
/// 18      4     root_page_id
/// 22      4     leaf_occupancy
/// 26      4     node_occupancy
/// 30      1     relation name length
/// 31      32    relation name (UTF-8, zero padded)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub relation_name: String,
    pub attr_byte_offset: u32,
    pub attr_type: AttrType,
    pub root_page_id: PageId,
    pub leaf_occupancy: usize,
    pub node_occupancy: usize,
}

impl IndexHeader {
    const OFFSET_ATTR_TYPE: usize = PageHeader::SIZE;
    const OFFSET_ATTR_OFFSET: usize = PageHeader::SIZE + 1;
    const OFFSET_ROOT: usize = PageHeader::SIZE + 5;
    const OFFSET_LEAF_OCC: usize = PageHeader::SIZE + 9;
    const OFFSET_NODE_OCC: usize = PageHeader::SIZE + 13;
    const OFFSET_NAME_LEN: usize = PageHeader::SIZE + 17;
    const OFFSET_NAME: usize = PageHeader::SIZE + 18;

    fn encode(&self, page: &mut Page) {
        page.reset();
        page.as_mut_slice()[Self::OFFSET_ATTR_TYPE] = self.attr_type as u8;
        page.put_u32(Self::OFFSET_ATTR_OFFSET, self.attr_byte_offset);
        page.put_u32(Self::OFFSET_ROOT, self.root_page_id.0);
        page.put_u32(Self::OFFSET_LEAF_OCC, self.leaf_occupancy as u32);
        page.put_u32(Self::OFFSET_NODE_OCC, self.node_occupancy as u32);

        // Name length is checked when the index is opened.
        let name = self.relation_name.as_bytes();
        page.as_mut_slice()[Self::OFFSET_NAME_LEN] = name.len() as u8;
        page.as_mut_slice()[Self::OFFSET_NAME..Self::OFFSET_NAME + name.len()]
            .copy_from_slice(name);

        page.seal(PageType::IndexHeader);
    }

    fn decode(page: &Page, page_id: PageId) -> Result<Self> {
        page.check(page_id, PageType::IndexHeader)?;
        let bytes = page.as_slice();

        let attr_type = AttrType::from_u8(bytes[Self::OFFSET_ATTR_TYPE]).ok_or_else(|| {
            Error::corrupted(page_id.0, format!("unknown attr type {}", bytes[Self::OFFSET_ATTR_TYPE]))
        })?;

        let name_len = bytes[Self::OFFSET_NAME_LEN] as usize;
        if name_len > MAX_RELATION_NAME_LEN {
            return Err(Error::corrupted(page_id.0, "relation name too long"));
        }
        let relation_name =
            std::str::from_utf8(&bytes[Self::OFFSET_NAME..Self::OFFSET_NAME + name_len])
                .map_err(|_| Error::corrupted(page_id.0, "relation name is not UTF-8"))?
                .to_owned();

        let leaf_occupancy = page.get_u32(Self::OFFSET_LEAF_OCC) as usize;
        let node_occupancy = page.get_u32(Self::OFFSET_NODE_OCC) as usize;
        if !(MIN_OCCUPANCY..=MAX_LEAF_OCCUPANCY).contains(&leaf_occupancy)
            || !(MIN_OCCUPANCY..=MAX_NODE_OCCUPANCY).contains(&node_occupancy)
        {
            return Err(Error::corrupted(
                page_id.0,
                format!("occupancy {}/{} out of range", leaf_occupancy, node_occupancy),
            ));
        }

        Ok(Self {
            relation_name,
            attr_byte_offset: page.get_u32(Self::OFFSET_ATTR_OFFSET),
            attr_type,
            root_page_id: PageId::new(page.get_u32(Self::OFFSET_ROOT)),
            leaf_occupancy,
            node_occupancy,
        })
    }
}

// ============================================================================
// Leaf node
// ============================================================================

/// A leaf: ascending keys with their record ids, linked to the next leaf.
///
/// # Layout
/// ```text
/// Offset              Size        Field
/// ------              ----        -----
/// 0                   13          PageHeader (BTreeLeaf)
/// 13                  4           stored
/// 17                  4           right sibling (u32::MAX = none)
/// 21                  4 × cap     keys (KEY_SENTINEL past `stored`)
/// 21 + 4 × cap        8 × cap     record ids
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    capacity: usize,
    keys: Vec<Key>,
    rids: Vec<RecordId>,
    right_sibling: Option<PageId>,
}

impl LeafNode {
    const OFFSET_STORED: usize = PageHeader::SIZE;
    const OFFSET_RIGHT_SIB: usize = PageHeader::SIZE + 4;
    const OFFSET_KEYS: usize = NODE_PREFIX_SIZE;

    /// Create an empty leaf holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::with_capacity(capacity + 1),
            rids: Vec::with_capacity(capacity + 1),
            right_sibling: None,
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn stored(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn rids(&self) -> &[RecordId] {
        &self.rids
    }

    pub fn right_sibling(&self) -> Option<PageId> {
        self.right_sibling
    }

    /// Slot a new `key` goes into: after every entry `<= key`, so equal
    /// keys keep insertion order.
    pub fn insert_slot(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// First slot whose key is `>= key`.
    pub fn lower_bound(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// Insert into a leaf with spare room.
    ///
    /// # Panics
    /// Panics if the leaf is full.
    pub fn insert(&mut self, key: Key, rid: RecordId) {
        assert!(!self.is_full(), "insert into full leaf");
        let slot = self.insert_slot(key);
        self.keys.insert(slot, key);
        self.rids.insert(slot, rid);
    }

    /// Insert into a full leaf and move the upper half to a new sibling.
    ///
    /// The `capacity + 1` entries are split at `ceil((capacity + 1) / 2)`;
    /// the lower part stays here. The sibling takes over this leaf's right
    /// link and this leaf now points at `sibling_page`. The separator for
    /// the parent is the sibling's first key, which also stays in the
    /// sibling.
    pub fn split_insert(&mut self, key: Key, rid: RecordId, sibling_page: PageId) -> LeafNode {
        let slot = self.insert_slot(key);
        self.keys.insert(slot, key);
        self.rids.insert(slot, rid);

        let half = (self.keys.len() + 1) / 2;
        let mut sibling = LeafNode::new(self.capacity);
        sibling.keys = self.keys.split_off(half);
        sibling.rids = self.rids.split_off(half);
        sibling.right_sibling = self.right_sibling.replace(sibling_page);
        sibling
    }

    fn offset_rids(&self) -> usize {
        Self::OFFSET_KEYS + self.capacity * KEY_SIZE
    }

    fn encode(&self, page: &mut Page) {
        page.reset();
        page.put_u32(Self::OFFSET_STORED, self.keys.len() as u32);
        page.put_u32(Self::OFFSET_RIGHT_SIB, PageId::to_raw(self.right_sibling));

        let rid_base = self.offset_rids();
        let invalid = RecordId::INVALID.to_bytes();
        for slot in 0..self.capacity {
            let key = self.keys.get(slot).copied().unwrap_or(KEY_SENTINEL);
            page.put_i32(Self::OFFSET_KEYS + slot * KEY_SIZE, key);

            let rid = self.rids.get(slot).map(RecordId::to_bytes).unwrap_or(invalid);
            let at = rid_base + slot * RecordId::SIZE;
            page.as_mut_slice()[at..at + RecordId::SIZE].copy_from_slice(&rid);
        }

        page.seal(PageType::BTreeLeaf);
    }

    fn decode(page: &Page, page_id: PageId, capacity: usize) -> Result<Self> {
        page.check(page_id, PageType::BTreeLeaf)?;

        let stored = page.get_u32(Self::OFFSET_STORED) as usize;
        if stored > capacity {
            return Err(Error::corrupted(
                page_id.0,
                format!("leaf stores {} entries, capacity {}", stored, capacity),
            ));
        }

        let mut leaf = LeafNode::new(capacity);
        leaf.right_sibling = PageId::from_raw(page.get_u32(Self::OFFSET_RIGHT_SIB));
        let rid_base = leaf.offset_rids();
        for slot in 0..stored {
            leaf.keys.push(page.get_i32(Self::OFFSET_KEYS + slot * KEY_SIZE));
            let at = rid_base + slot * RecordId::SIZE;
            leaf.rids.push(RecordId::from_bytes(&page.as_slice()[at..at + RecordId::SIZE]));
        }
        Ok(leaf)
    }
}

// ============================================================================
// Internal node
// ============================================================================

/// An internal node: `stored` separators and `stored + 1` children.
///
/// Child `i` holds keys below `keys[i]`; child `i + 1` holds keys at or
/// above it. `level` is 1 when the children are leaves.
///
/// # Layout
/// ```text
/// Offset              Size            Field
/// ------              ----            -----
/// 0                   13              PageHeader (BTreeInternal)
/// 13                  4               level
/// 17                  4               stored
/// 21                  4 × cap         keys (KEY_SENTINEL past `stored`)
/// 21 + 4 × cap        4 × (cap + 1)   children (u32::MAX past `stored + 1`)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    capacity: usize,
    level: u32,
    keys: Vec<Key>,
    children: Vec<PageId>,
}

impl InternalNode {
    const OFFSET_LEVEL: usize = PageHeader::SIZE;
    const OFFSET_STORED: usize = PageHeader::SIZE + 4;
    const OFFSET_KEYS: usize = NODE_PREFIX_SIZE;

    /// A node with no separators and a single child.
    pub fn with_child(capacity: usize, level: u32, child: PageId) -> Self {
        let mut children = Vec::with_capacity(capacity + 2);
        children.push(child);
        Self {
            capacity,
            level,
            keys: Vec::with_capacity(capacity + 1),
            children,
        }
    }

    /// A fresh root over two subtrees split at `separator`.
    pub fn new_root(capacity: usize, level: u32, left: PageId, separator: Key, right: PageId) -> Self {
        let mut root = Self::with_child(capacity, level, left);
        root.keys.push(separator);
        root.children.push(right);
        root
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Number of live separator keys.
    #[inline]
    pub fn stored(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn children(&self) -> &[PageId] {
        &self.children
    }

    /// Page id of child `slot`.
    #[inline]
    pub fn child(&self, slot: usize) -> PageId {
        self.children[slot]
    }

    /// Child slot covering `key`: the first `i` with `key < keys[i]`, or
    /// the last child. A key equal to a separator routes right.
    pub fn child_slot(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Leftmost child slot that may hold `key`: the first `i` with
    /// `key <= keys[i]`. Used to find the first of several equal keys.
    pub fn child_slot_lower(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// Insert `separator` with `right_child` just after child `slot`.
    ///
    /// # Panics
    /// Panics if the node is full.
    pub fn insert_after(&mut self, slot: usize, separator: Key, right_child: PageId) {
        assert!(!self.is_full(), "insert into full internal node");
        self.keys.insert(slot, separator);
        self.children.insert(slot + 1, right_child);
    }

    /// Insert into a full node and move the upper half to a new sibling.
    ///
    /// The `capacity + 1` separators are split at `capacity / 2`. The middle
    /// separator is removed from both halves and returned for the parent.
    pub fn split_insert(&mut self, slot: usize, separator: Key, right_child: PageId) -> (Key, InternalNode) {
        self.keys.insert(slot, separator);
        self.children.insert(slot + 1, right_child);

        let half = self.capacity / 2;
        let mut upper_keys = self.keys.split_off(half);
        let pushed_up = upper_keys.remove(0);
        let upper_children = self.children.split_off(half + 1);

        let sibling = InternalNode {
            capacity: self.capacity,
            level: self.level,
            keys: upper_keys,
            children: upper_children,
        };
        (pushed_up, sibling)
    }

    fn offset_children(&self) -> usize {
        Self::OFFSET_KEYS + self.capacity * KEY_SIZE
    }

    fn encode(&self, page: &mut Page) {
        page.reset();
        page.put_u32(Self::OFFSET_LEVEL, self.level);
        page.put_u32(Self::OFFSET_STORED, self.keys.len() as u32);

        for slot in 0..self.capacity {
            let key = self.keys.get(slot).copied().unwrap_or(KEY_SENTINEL);
            page.put_i32(Self::OFFSET_KEYS + slot * KEY_SIZE, key);
        }
        let child_base = self.offset_children();
        for slot in 0..=self.capacity {
            let child = self.children.get(slot).copied();
            page.put_u32(child_base + slot * PAGE_ID_SIZE, PageId::to_raw(child));
        }

        page.seal(PageType::BTreeInternal);
    }

    fn decode(page: &Page, page_id: PageId, capacity: usize) -> Result<Self> {
        page.check(page_id, PageType::BTreeInternal)?;

        let level = page.get_u32(Self::OFFSET_LEVEL);
        let stored = page.get_u32(Self::OFFSET_STORED) as usize;
        if level == 0 {
            return Err(Error::corrupted(page_id.0, "internal node at level 0"));
        }
        if stored > capacity {
            return Err(Error::corrupted(
                page_id.0,
                format!("internal node stores {} keys, capacity {}", stored, capacity),
            ));
        }

        let mut node = InternalNode {
            capacity,
            level,
            keys: Vec::with_capacity(capacity + 1),
            children: Vec::with_capacity(capacity + 2),
        };
        for slot in 0..stored {
            node.keys.push(page.get_i32(Self::OFFSET_KEYS + slot * KEY_SIZE));
        }
        let child_base = node.offset_children();
        for slot in 0..=stored {
            let raw = page.get_u32(child_base + slot * PAGE_ID_SIZE);
            let child = PageId::from_raw(raw).ok_or_else(|| {
                Error::corrupted(page_id.0, format!("missing child pointer in slot {}", slot))
            })?;
            node.children.push(child);
        }
        Ok(node)
    }
}

// ============================================================================
// Tagged node
// ============================================================================

/// Which layout a page is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Header,
    Internal,
    Leaf,
}

/// Any page of an index file, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Header(IndexHeader),
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    /// Serialize into `page`, stamping the page type and checksum.
    pub fn encode(&self, page: &mut Page) {
        match self {
            Node::Header(header) => header.encode(page),
            Node::Internal(node) => node.encode(page),
            Node::Leaf(leaf) => leaf.encode(page),
        }
    }

    /// Deserialize `page` as the layout the caller expects.
    ///
    /// # Errors
    /// `Error::PageCorrupted` on a checksum failure, a page type other than
    /// `kind`, or fields out of range.
    pub fn decode(
        page: &Page,
        page_id: PageId,
        kind: NodeKind,
        leaf_occupancy: usize,
        node_occupancy: usize,
    ) -> Result<Node> {
        Ok(match kind {
            NodeKind::Header => Node::Header(IndexHeader::decode(page, page_id)?),
            NodeKind::Internal => {
                Node::Internal(InternalNode::decode(page, page_id, node_occupancy)?)
            }
            NodeKind::Leaf => Node::Leaf(LeafNode::decode(page, page_id, leaf_occupancy)?),
        })
    }
}
