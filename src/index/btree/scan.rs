//! Range scans over the leaf chain.
//!
//! A scan is a small state machine owned by the index:
//!
//! ```text
//!            start_scan              scan_next past high / last leaf
//! Unstarted ──────────▶ Positioned ─────────────────────────────▶ Exhausted
//!     ▲                     │                                          │
//!     └──── end_scan ───────┴──────────────── end_scan ────────────────┘
//! ```
//!
//! While positioned, exactly one leaf is pinned: the one holding the next
//! candidate entry. It is released when the cursor moves to its right
//! sibling, when the range is exhausted, or on `end_scan`.

use std::fmt;

use log::debug;

use super::descent::locate_leaf_for_scan;
use super::node::{Key, LeafNode};
use super::BTreeIndex;
use crate::common::{Error, PageId, RecordId, Result};

/// Comparison operator for scan bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Gte,
    Gt,
}

impl Operator {
    /// Whether `key` satisfies `key <op> bound`.
    pub fn admits(self, key: Key, bound: Key) -> bool {
        match self {
            Operator::Lt => key < bound,
            Operator::Lte => key <= bound,
            Operator::Gte => key >= bound,
            Operator::Gt => key > bound,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Gt => ">",
        };
        f.write_str(symbol)
    }
}

/// Position of an active scan.
pub(crate) struct ScanCursor {
    /// Pinned leaf holding the next candidate.
    page_id: PageId,
    leaf: LeafNode,
    slot: usize,
    high: Key,
    high_op: Operator,
}

#[derive(Default)]
pub(crate) enum ScanState {
    #[default]
    Unstarted,
    Positioned(ScanCursor),
    Exhausted,
}

/// Check the operator pair and that some integer satisfies both bounds.
fn validate_range(low: Key, low_op: Operator, high: Key, high_op: Operator) -> Result<()> {
    if !matches!(low_op, Operator::Gt | Operator::Gte)
        || !matches!(high_op, Operator::Lt | Operator::Lte)
    {
        return Err(Error::BadOpcodes);
    }

    let first = match low_op {
        Operator::Gt => low.checked_add(1),
        _ => Some(low),
    };
    let last = match high_op {
        Operator::Lt => high.checked_sub(1),
        _ => Some(high),
    };
    match (first, last) {
        (Some(first), Some(last)) if first <= last => Ok(()),
        _ => Err(Error::BadScanRange),
    }
}

impl BTreeIndex {
    /// Begin a range scan over keys satisfying `low_op low` and
    /// `high_op high`.
    ///
    /// A scan that is already active is ended first. Parameters are checked
    /// before anything else, so a rejected call leaves the current scan as
    /// it was.
    ///
    /// # Errors
    /// - `Error::BadOpcodes` unless `low_op` is `Gt`/`Gte` and `high_op` is
    ///   `Lt`/`Lte`
    /// - `Error::BadScanRange` if no key can satisfy both bounds
    pub fn start_scan(&mut self, low: Key, low_op: Operator, high: Key, high_op: Operator) -> Result<()> {
        validate_range(low, low_op, high, high_op)?;
        if !matches!(self.scan, ScanState::Unstarted) {
            self.end_scan()?;
        }

        let (page_id, leaf) = locate_leaf_for_scan(&self.store, self.root_page_id, low, low_op)?;
        let slot = match low_op {
            Operator::Gt => leaf.insert_slot(low),
            _ => leaf.lower_bound(low),
        };
        debug!(
            "{}: scan {} {} .. {} {} starts at {} slot {}",
            self.index_name, low_op, low, high_op, high, page_id, slot
        );

        self.scan = ScanState::Positioned(ScanCursor {
            page_id,
            leaf,
            slot,
            high,
            high_op,
        });
        // Skip to the first leaf that actually holds a candidate.
        self.settle_cursor()
    }

    /// Return the next record id in range, or `None` once the range is
    /// exhausted.
    ///
    /// # Errors
    /// `Error::ScanNotInitialized` if no scan is active.
    pub fn scan_next(&mut self) -> Result<Option<RecordId>> {
        let cursor = match &mut self.scan {
            ScanState::Unstarted => return Err(Error::ScanNotInitialized),
            ScanState::Exhausted => return Ok(None),
            ScanState::Positioned(cursor) => cursor,
        };

        let key = cursor.leaf.keys()[cursor.slot];
        if !cursor.high_op.admits(key, cursor.high) {
            self.finish_scan()?;
            return Ok(None);
        }

        let rid = cursor.leaf.rids()[cursor.slot];
        cursor.slot += 1;
        self.settle_cursor()?;
        Ok(Some(rid))
    }

    /// Stop the active scan and release its leaf.
    ///
    /// # Errors
    /// `Error::ScanNotInitialized` if no scan was started.
    pub fn end_scan(&mut self) -> Result<()> {
        match std::mem::take(&mut self.scan) {
            ScanState::Unstarted => Err(Error::ScanNotInitialized),
            ScanState::Exhausted => Ok(()),
            ScanState::Positioned(cursor) => self.store.unpin(cursor.page_id),
        }
    }

    /// Whether a scan has been started and not yet ended.
    pub fn scan_active(&self) -> bool {
        !matches!(self.scan, ScanState::Unstarted)
    }

    /// Move a positioned cursor past the end of its leaf onto the next
    /// non-empty sibling, or to `Exhausted` when the chain ends.
    ///
    /// If a sibling cannot be read the scan is left `Exhausted` with
    /// nothing pinned.
    fn settle_cursor(&mut self) -> Result<()> {
        let ScanState::Positioned(mut cursor) =
            std::mem::replace(&mut self.scan, ScanState::Exhausted)
        else {
            return Ok(());
        };

        while cursor.slot >= cursor.leaf.stored() {
            let next = cursor.leaf.right_sibling();
            self.store.unpin(cursor.page_id)?;
            let Some(next) = next else {
                return Ok(());
            };
            cursor.leaf = self.store.read_leaf(next)?;
            cursor.page_id = next;
            cursor.slot = 0;
        }

        self.scan = ScanState::Positioned(cursor);
        Ok(())
    }

    /// Release the current leaf and mark the scan exhausted.
    fn finish_scan(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.scan, ScanState::Exhausted) {
            ScanState::Positioned(cursor) => self.store.unpin(cursor.page_id),
            _ => Ok(()),
        }
    }
}
