//! Buffer pool counters.
//!
//! `pins` and `unpins` count every acquisition and release. Once an index
//! call returns the two must agree; the index tests use
//! [`StatsSnapshot::outstanding_pins`] to catch leaked pins.
//!
//! Alongside the counters, a gauge tracks how many frames are pinned at once
//! and its high-water mark.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One kind of buffer pool event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    CacheHit,
    CacheMiss,
    Eviction,
    PageRead,
    PageWritten,
    Pin,
    Unpin,
}

/// Live counters of one buffer pool. Each counter is independent, so
/// relaxed atomics suffice.
///
/// ```
/// use pagetree::buffer::Counter;
/// use pagetree::BufferPoolStats;
///
/// let stats = BufferPoolStats::new();
/// stats.record(Counter::Pin);
/// assert_eq!(stats.snapshot().outstanding_pins(), 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    counters: [AtomicU64; 7],
    pinned_frames: AtomicU64,
    peak_pinned_frames: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&self, counter: Counter) {
        self.counters[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// A frame went from unpinned to pinned.
    pub(crate) fn frame_pinned(&self) {
        let now = self.pinned_frames.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_pinned_frames.fetch_max(now, Ordering::Relaxed);
    }

    /// A frame's last pin was released.
    pub(crate) fn frame_released(&self) {
        self.pinned_frames.fetch_sub(1, Ordering::Relaxed);
    }

    fn load(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    /// Copy the counters out for assertions or logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.load(Counter::CacheHit),
            cache_misses: self.load(Counter::CacheMiss),
            evictions: self.load(Counter::Eviction),
            pages_read: self.load(Counter::PageRead),
            pages_written: self.load(Counter::PageWritten),
            pins: self.load(Counter::Pin),
            unpins: self.load(Counter::Unpin),
            peak_pinned_frames: self.peak_pinned_frames.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters. The peak restarts from the frames pinned now.
    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
        self.peak_pinned_frames
            .store(self.pinned_frames.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`BufferPoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pins: u64,
    pub unpins: u64,
    /// Most frames pinned at the same time.
    pub peak_pinned_frames: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served without disk I/O, 0.0 when idle.
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64,
        }
    }

    /// Pins not yet matched by an unpin.
    pub fn outstanding_pins(&self) -> u64 {
        self.pins.saturating_sub(self.unpins)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} evictions={} reads={} writes={} pins={}/{} ({:.1}% hit)",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.unpins,
            self.pins,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_n(stats: &BufferPoolStats, counter: Counter, n: usize) {
        for _ in 0..n {
            stats.record(counter);
        }
    }

    #[test]
    fn test_hit_rate() {
        let stats = BufferPoolStats::new();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);

        record_n(&stats, Counter::CacheHit, 3);
        record_n(&stats, Counter::CacheMiss, 1);
        assert_eq!(stats.snapshot().hit_rate(), 0.75);
    }

    #[test]
    fn test_outstanding_pins_and_reset() {
        let stats = BufferPoolStats::new();
        record_n(&stats, Counter::Pin, 5);
        record_n(&stats, Counter::Unpin, 3);
        assert_eq!(stats.snapshot().outstanding_pins(), 2);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_peak_pinned_frames() {
        let stats = BufferPoolStats::new();
        stats.frame_pinned();
        stats.frame_pinned();
        stats.frame_released();
        stats.frame_pinned();
        assert_eq!(stats.snapshot().peak_pinned_frames, 2);

        // Two frames are still pinned.
        stats.reset();
        assert_eq!(stats.snapshot().peak_pinned_frames, 2);
        stats.frame_released();
        stats.frame_released();
        stats.reset();
        assert_eq!(stats.snapshot().peak_pinned_frames, 0);
    }

    #[test]
    fn test_counters_are_independent() {
        let stats = BufferPoolStats::new();
        stats.record(Counter::PageWritten);
        stats.record(Counter::Eviction);

        let snap = stats.snapshot();
        assert_eq!(snap.pages_written, 1);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.pages_read, 0);
        assert_eq!(snap.to_string(), "hits=0 misses=0 evictions=1 reads=0 writes=1 pins=0/0 (0.0% hit)");
    }
}
