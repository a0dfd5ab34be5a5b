//! Parallel Access Layer: turns a physical NAND operation into a completion
//! tick by scheduling its phases against per-channel and per-die timelines.
//!
//! Grounded in `original_source/PAL2.h` / `pal_old.cc`: each physical page
//! touched by a request occupies its channel's bus for the DMA phases and
//! its die's array for the MEM phase, and those are genuinely independent
//! resources: two dies on the same channel can be programming in parallel
//! as long as they aren't both moving data over the bus at once. [`Timeline`]
//! models one such resource; [`Pal`] owns one per channel and one per die.

pub mod timeline;

use timeline::Timeline;

use crate::config::ConfigMap;
use crate::error::Result;
use crate::geometry::{expand_superpage, Cpdpbp, Geometry, PageAllocation, SuperblockMask};
use crate::latency::{LatencyTable, NandOp, Phase};
use crate::stats::Statistics;

fn phase_order(op: NandOp) -> &'static [Phase] {
    match op {
        NandOp::Read => &[Phase::Dma0, Phase::Mem, Phase::Dma1],
        NandOp::Write => &[Phase::Dma0, Phase::Dma1, Phase::Mem],
        NandOp::Erase => &[Phase::Dma0, Phase::Mem],
    }
}

/// The device-wide timeline scheduler and the statistics it feeds.
pub struct Pal {
    geometry: Geometry,
    latency: LatencyTable,
    allocation: PageAllocation,
    superblock: SuperblockMask,
    multi_plane: bool,
    channel_timelines: Vec<Timeline>,
    die_timelines: Vec<Timeline>,
    stats: Statistics,
}

impl Pal {
    pub fn new(
        geometry: Geometry,
        latency: LatencyTable,
        allocation: PageAllocation,
        superblock: SuperblockMask,
        multi_plane: bool,
    ) -> Self {
        let channel_timelines = (0..geometry.channel).map(|_| Timeline::new()).collect();
        let die_timelines = (0..geometry.total_dies()).map(|_| Timeline::new()).collect();
        Self {
            geometry,
            latency,
            allocation,
            superblock,
            multi_plane,
            channel_timelines,
            die_timelines,
            stats: Statistics::new(),
        }
    }

    pub fn from_config(cfg: &ConfigMap) -> Result<Self> {
        use crate::config::keys;

        let geometry = Geometry::from_config(cfg)?;
        let latency = LatencyTable::from_config(cfg, &geometry)?;
        let allocation = PageAllocation::parse(&cfg.get_string_or(keys::PAGE_ALLOCATION, "CWDP"))?;
        let superblock = SuperblockMask::parse(&cfg.get_string_or(keys::SUPERBLOCK_SIZE, ""))?;
        let multi_plane = cfg.get_bool_or(keys::ENABLE_MULTI_PLANE_OPERATION, false);
        Ok(Self::new(geometry, latency, allocation, superblock, multi_plane))
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Record blocks reclaimed by garbage collection. Kept as a method on
    /// `Pal` rather than exposing a mutable `Statistics` handle, so PAL stays
    /// the only thing that ever mutates its own counters.
    pub fn record_gc_reclaim(&mut self, blocks: u64) {
        self.stats.record_gc_reclaim(blocks);
    }

    /// Expand `(block_index, page_index)` into the physical pages one
    /// operation touches, without scheduling anything.
    pub fn addresses_for(&self, block_index: u64, page_index: u32) -> Vec<Cpdpbp> {
        expand_superpage(
            &self.geometry,
            &self.allocation,
            self.superblock,
            self.multi_plane,
            block_index,
            page_index,
        )
    }

    /// Schedule one NAND operation and return its completion tick. The
    /// operation may expand to several physical pages (superpage striping or
    /// multi-plane); the returned tick is the latest of them all, matching
    /// host semantics where a request only completes once every touched
    /// plane has finished.
    pub fn submit(
        &mut self,
        op: NandOp,
        block_index: u64,
        page_index: u32,
        arrival: u64,
    ) -> u64 {
        let addresses = self.addresses_for(block_index, page_index);
        let mut finish = arrival;

        for addr in &addresses {
            let addr_finish = self.schedule_one(op, addr, arrival);
            finish = finish.max(addr_finish);
        }

        self.stats.record_op(op);
        self.stats.record_latency_sample(arrival, finish);
        finish
    }

    fn schedule_one(&mut self, op: NandOp, addr: &Cpdpbp, arrival: u64) -> u64 {
        let channel_idx = addr.channel as usize;
        let die_idx = self.geometry.die_index(addr) as usize;

        let mut cursor = arrival;
        for &phase in phase_order(op) {
            let duration = self.latency.latency(op, addr.page, phase);
            let (start, timeline_busy_acc) = match phase {
                Phase::Mem => {
                    let timeline = &mut self.die_timelines[die_idx];
                    let start = timeline.find_free_slot(cursor, duration);
                    timeline.insert(start, start + duration);
                    (start, true)
                }
                Phase::Dma0 | Phase::Dma1 => {
                    let timeline = &mut self.channel_timelines[channel_idx];
                    let start = timeline.find_free_slot(cursor, duration);
                    timeline.insert(start, start + duration);
                    (start, false)
                }
            };
            let end = start + duration;
            if timeline_busy_acc {
                self.stats.add_die_busy(duration);
            } else {
                self.stats.add_channel_busy(duration);
            }
            cursor = end;
        }
        cursor
    }

    /// Drop busy-interval history that can no longer affect future
    /// scheduling decisions. Safe to call periodically with the
    /// lowest in-flight arrival tick.
    pub fn flush(&mut self, current_tick: u64) {
        for t in &mut self.channel_timelines {
            t.flush(current_tick);
        }
        for t in &mut self.die_timelines {
            t.flush(current_tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::latency::NandType;

    fn test_pal() -> Pal {
        let geometry = Geometry {
            channel: 2,
            package: 1,
            die: 1,
            plane: 1,
            block: 4,
            page: 4,
            page_size: 4096,
            lba_size: 512,
            io_unit_size: 4096,
            over_provisioning_ratio: 0.0,
        };
        let latency = LatencyTable::new(NandType::Slc, 200, 4096);
        let allocation = PageAllocation::parse("CWDP").unwrap();
        let superblock = SuperblockMask::default();
        Pal::new(geometry, latency, allocation, superblock, false)
    }

    #[test]
    fn single_read_completes_after_arrival() {
        let mut pal = test_pal();
        let finish = pal.submit(NandOp::Read, 0, 0, 100);
        assert!(finish > 100);
        assert_eq!(pal.stats().snapshot().reads, 1);
    }

    #[test]
    fn independent_channels_do_not_serialize_each_other() {
        let mut pal = test_pal();
        // block_index 0 maps to channel 0 (CWDP, non-striped); block_index 1
        // with a one-channel stride lands on channel 1 for this geometry.
        let a0 = pal.addresses_for(0, 0)[0];
        let a1 = pal.addresses_for(1, 0)[0];
        assert_ne!(a0.channel, a1.channel);

        let finish_a = pal.submit(NandOp::Read, 0, 0, 0);
        let finish_b = pal.submit(NandOp::Read, 1, 0, 0);
        // Both start at tick 0 on independent channels/dies, so neither
        // should have been pushed later by the other's reservation.
        assert_eq!(finish_a, finish_b);
    }

    #[test]
    fn same_die_requests_serialize() {
        let mut pal = test_pal();
        let first = pal.submit(NandOp::Read, 0, 0, 0);
        let second = pal.submit(NandOp::Read, 0, 1, 0);
        assert!(second >= first);
    }
}
