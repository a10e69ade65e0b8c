//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::buffer::FrameId;

/// Evicts frames in the order they were first recorded.
///
/// Pinned frames are skipped. A skipped frame re-enters at the back of the
/// queue when it is accessed again or becomes evictable.
#[derive(Debug, Default)]
pub struct FifoReplacer {
    /// Frame IDs in insertion order (front = oldest).
    queue: VecDeque<FrameId>,
    /// Members of `queue`, for O(1) lookups.
    in_queue: HashSet<FrameId>,
    /// Frames whose pin count is zero.
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    /// Create an empty replacer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame was accessed. Re-access does not reorder.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if self.in_queue.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    /// Mark whether a frame may be evicted (pin count reached zero or not).
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.record_access(frame_id);
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Pop the oldest evictable frame, or `None` if every frame is pinned.
    ///
    /// Pinned frames popped on the way are dropped from the queue; they
    /// rejoin once unpinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        while let Some(frame_id) = self.queue.pop_front() {
            self.in_queue.remove(&frame_id);
            if self.evictable.remove(&frame_id) {
                return Some(frame_id);
            }
        }
        None
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}
