//! Simulation statistics.
//!
//! [`Pal`](crate::pal::Pal) owns this struct and is the only thing allowed
//! to mutate it. The FTL and ICL only ever see it through
//! [`Statistics::snapshot`], a read-only view, rather than through a raw
//! pointer as in the original split. Shaped after a counters-plus-snapshot
//! pattern: plain counters internally, a read-only struct handed out.

use serde::Serialize;

use crate::latency::NandOp;

const HISTOGRAM_BUCKETS: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatisticsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub erases: u64,
    pub channel_dma_busy_ticks: u64,
    pub die_mem_busy_ticks: u64,
    pub gc_blocks_reclaimed: u64,
    /// Bucket `i` counts samples with `finish - arrival` in `[2^i, 2^(i+1))`
    /// ticks; the last bucket also catches everything `>= 2^9`.
    pub latency_histogram: [u64; HISTOGRAM_BUCKETS],
}

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    snapshot: StatisticsSnapshot,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_op(&mut self, op: NandOp) {
        match op {
            NandOp::Read => self.snapshot.reads += 1,
            NandOp::Write => self.snapshot.writes += 1,
            NandOp::Erase => self.snapshot.erases += 1,
        }
    }

    pub(crate) fn add_channel_busy(&mut self, ticks: u64) {
        self.snapshot.channel_dma_busy_ticks += ticks;
    }

    pub(crate) fn add_die_busy(&mut self, ticks: u64) {
        self.snapshot.die_mem_busy_ticks += ticks;
    }

    pub(crate) fn record_gc_reclaim(&mut self, blocks: u64) {
        self.snapshot.gc_blocks_reclaimed += blocks;
    }

    pub(crate) fn record_latency_sample(&mut self, arrival: u64, finish: u64) {
        let delta = finish.saturating_sub(arrival);
        let bucket = if delta == 0 {
            0
        } else {
            (63 - delta.leading_zeros()) as usize
        };
        let bucket = bucket.min(HISTOGRAM_BUCKETS - 1);
        self.snapshot.latency_histogram[bucket] += 1;
    }

    /// A read-only view: the capability FTL/ICL receive instead of a raw
    /// pointer into PAL's internals.
    pub fn snapshot(&self) -> &StatisticsSnapshot {
        &self.snapshot
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic() {
        let mut stats = Statistics::new();
        stats.record_op(NandOp::Read);
        stats.record_op(NandOp::Read);
        stats.record_op(NandOp::Write);
        assert_eq!(stats.snapshot().reads, 2);
        assert_eq!(stats.snapshot().writes, 1);
        assert_eq!(stats.snapshot().erases, 0);
    }

    #[test]
    fn histogram_buckets_are_power_of_two() {
        let mut stats = Statistics::new();
        stats.record_latency_sample(0, 1); // delta 1 -> bucket 0
        stats.record_latency_sample(0, 2); // delta 2 -> bucket 1
        stats.record_latency_sample(0, 1024); // delta 1024 -> clamped to last bucket
        let h = stats.snapshot().latency_histogram;
        assert_eq!(h[0], 1);
        assert_eq!(h[1], 1);
        assert_eq!(h[HISTOGRAM_BUCKETS - 1], 1);
    }
}
