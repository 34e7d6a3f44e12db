//! Per-stream byte counters and the handle streams report through

use super::cancel::CancellationToken;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Cumulative byte counters, one slot per stream
///
/// Each slot has exactly one writer (its stream). Readers sum the slots and
/// derive per-window byte counts by subtraction; slots are never reset.
#[derive(Debug)]
pub struct StreamCounters {
    slots: Vec<AtomicU64>,
}

impl StreamCounters {
    pub fn new(streams: usize) -> Self {
        Self {
            slots: (0..streams).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn add(&self, slot: usize, bytes: u64) -> u64 {
        self.slots[slot].fetch_add(bytes, Ordering::AcqRel) + bytes
    }

    /// Bytes moved by one stream so far
    pub fn get(&self, slot: usize) -> u64 {
        self.slots[slot].load(Ordering::Acquire)
    }

    /// Sum over every slot
    pub fn total(&self) -> u64 {
        self.slots.iter().map(|slot| slot.load(Ordering::Acquire)).sum()
    }
}

/// Handle a stream uses to report progress and observe the stop signal
#[derive(Debug, Clone)]
pub struct StreamContext {
    index: usize,
    counters: Arc<StreamCounters>,
    stop: CancellationToken,
    byte_ceiling: Option<u64>,
    ceiling_hit: Arc<AtomicBool>,
}

impl StreamContext {
    pub(crate) fn new(
        index: usize,
        counters: Arc<StreamCounters>,
        stop: CancellationToken,
        byte_ceiling: Option<u64>,
        ceiling_hit: Arc<AtomicBool>,
    ) -> Self {
        Self {
            index,
            counters,
            stop,
            byte_ceiling,
            ceiling_hit,
        }
    }

    /// Slot index of this stream
    pub fn index(&self) -> usize {
        self.index
    }

    /// Account `bytes` to this stream
    ///
    /// Returns `false` once the stream should stop. The report that pushes
    /// the run total past the byte ceiling raises the stop signal.
    pub fn record(&self, bytes: u64) -> bool {
        if bytes > 0 {
            self.counters.add(self.index, bytes);
            if let Some(ceiling) = self.byte_ceiling {
                if self.counters.total() >= ceiling {
                    self.ceiling_hit.store(true, Ordering::Release);
                    self.stop.cancel();
                }
            }
        }
        !self.stop.is_cancelled()
    }

    /// Bytes this stream has reported
    pub fn transferred(&self) -> u64 {
        self.counters.get(self.index)
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolve once the run is stopping
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(index: usize, counters: &Arc<StreamCounters>, ceiling: Option<u64>) -> (StreamContext, CancellationToken, Arc<AtomicBool>) {
        let stop = CancellationToken::new();
        let hit = Arc::new(AtomicBool::new(false));
        let ctx = StreamContext::new(index, counters.clone(), stop.clone(), ceiling, hit.clone());
        (ctx, stop, hit)
    }

    #[test]
    fn test_counters_are_cumulative_per_slot() {
        let counters = Arc::new(StreamCounters::new(3));
        let (a, _, _) = context(0, &counters, None);
        let (b, _, _) = context(2, &counters, None);

        assert!(a.record(100));
        assert!(b.record(50));
        assert!(a.record(25));

        assert_eq!(counters.get(0), 125);
        assert_eq!(counters.get(1), 0);
        assert_eq!(counters.get(2), 50);
        assert_eq!(counters.total(), 175);
        assert_eq!(a.transferred(), 125);
    }

    #[test]
    fn test_byte_ceiling_raises_stop() {
        let counters = Arc::new(StreamCounters::new(1));
        let (ctx, stop, hit) = context(0, &counters, Some(1_000));

        assert!(ctx.record(600));
        assert!(!hit.load(Ordering::Acquire));
        assert!(!ctx.record(600));
        assert!(hit.load(Ordering::Acquire));
        assert!(stop.is_cancelled());
        assert!(ctx.should_stop());
    }

    #[test]
    fn test_record_after_stop_reports_stop() {
        let counters = Arc::new(StreamCounters::new(1));
        let (ctx, stop, _) = context(0, &counters, None);
        stop.cancel();
        assert!(!ctx.record(10));
        // Bytes that already arrived still count
        assert_eq!(ctx.transferred(), 10);
    }
}
