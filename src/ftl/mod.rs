//! Flash Translation Layer: page-mapping table, block pools, wear leveling,
//! and garbage collection.
//!
//! Grounded in `original_source/ftl/page_mapping.cc`'s `PageMapping` class:
//! `getFreeBlock` pulls the least-worn block out of the free pool (wear
//! leveling), `writeInternal` invalidates the LPN's previous location before
//! remapping it, and `doGarbageCollection` migrates every still-valid page
//! out of a chosen victim before erasing it.

pub mod block;
pub mod gc;
pub mod mapping;

use tracing::{debug, trace};

use block::Block;
use gc::{GcConfig, GcMode};
use mapping::{PageMapping, PhysicalPage};

use crate::config::ConfigMap;
use crate::error::{Result, SimError};
use crate::geometry::Geometry;
use crate::latency::NandOp;
use crate::pal::Pal;

pub struct Ftl {
    geometry: Geometry,
    gc: GcConfig,
    blocks: Vec<Block>,
    free_blocks: Vec<u64>,
    /// Current append target per parallel-die slot (`lastFreeBlock[d]`).
    current_write_block: Vec<Option<u64>>,
    /// Blocks per die slot: exact since `total_physical_blocks = total_dies
    /// * plane * block`.
    blocks_per_die: u64,
    /// Round-robins fresh (non-GC) writes across die slots for parallelism.
    next_die_slot: u64,
    /// `reclaimMore`: bumped each time an append target is exhausted and a
    /// new free block is drawn; folded into `ON_DEMAND` victim count and
    /// reset at the start of every GC pass.
    reclaim_more: u32,
    mapping: PageMapping,
}

impl Ftl {
    pub fn new(geometry: Geometry, gc: GcConfig) -> Self {
        let total = geometry.total_physical_blocks();
        let pages = geometry.pages_in_block();
        let blocks: Vec<Block> = (0..total).map(|i| Block::new(i, pages)).collect();
        let free_blocks: Vec<u64> = (0..total).collect();
        let die_slots = geometry.total_dies().max(1);
        let blocks_per_die = (total / die_slots).max(1);
        Self {
            geometry,
            gc,
            blocks,
            free_blocks,
            current_write_block: vec![None; die_slots as usize],
            blocks_per_die,
            next_die_slot: 0,
            reclaim_more: 0,
            mapping: PageMapping::new(),
        }
    }

    fn die_slots(&self) -> u64 {
        self.current_write_block.len() as u64
    }

    fn die_slot_of(&self, block_index: u64) -> u64 {
        block_index / self.blocks_per_die
    }

    pub fn from_config(cfg: &ConfigMap) -> Result<Self> {
        let mapping_mode = cfg.get_string_or(crate::config::keys::MAPPING_MODE, "PAGE_MAPPING");
        if !mapping_mode.eq_ignore_ascii_case("PAGE_MAPPING") {
            return Err(SimError::ConfigInvalid(format!(
                "MappingMode {mapping_mode:?} is not supported, only page mapping is specified"
            )));
        }
        let geometry = Geometry::from_config(cfg)?;
        let gc = GcConfig::from_config(cfg)?;
        Ok(Self::new(geometry, gc))
    }

    pub fn mapped_page_count(&self) -> usize {
        self.mapping.mapped_count()
    }

    /// Current physical location of `lpn`, if it has ever been written.
    pub fn peek_mapping(&self, lpn: u64) -> Option<(u64, u32)> {
        self.mapping.get(lpn).map(|loc| (loc.block_index, loc.page_index))
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }

    fn free_ratio(&self) -> f64 {
        self.free_blocks.len() as f64 / self.geometry.total_physical_blocks().max(1) as f64
    }

    /// Read `lpn`'s current data. An LPN with no mapping has never been
    /// written. That is a zero-cost no-op rather than an error,
    /// so it simply completes at its arrival tick.
    pub fn read(&mut self, pal: &mut Pal, lpn: u64, tick: u64) -> Result<u64> {
        match self.mapping.get(lpn) {
            Some(loc) => {
                let finish = pal.submit(NandOp::Read, loc.block_index, loc.page_index, tick);
                trace!(lpn, block = loc.block_index, page = loc.page_index, finish, "read");
                Ok(finish)
            }
            None => {
                trace!(lpn, "unmapped read, no-op");
                Ok(tick)
            }
        }
    }

    pub fn write(&mut self, pal: &mut Pal, lpn: u64, tick: u64) -> Result<u64> {
        if self.free_ratio() < self.gc.threshold {
            self.do_garbage_collection(pal, tick)?;
        }

        let die_slot = self.next_die_slot;
        self.next_die_slot = (self.next_die_slot + 1) % self.die_slots();
        let block_idx = self.ensure_write_target(pal, tick, die_slot)?;
        let page_idx = self.blocks[block_idx as usize].write(lpn, tick)?;

        if let Some(old) = self.mapping.set(
            lpn,
            PhysicalPage {
                block_index: block_idx,
                page_index: page_idx,
            },
        ) {
            self.blocks[old.block_index as usize].invalidate(old.page_index);
        }

        let finish = pal.submit(NandOp::Write, block_idx, page_idx, tick);
        trace!(lpn, block = block_idx, page = page_idx, finish, "write");
        Ok(finish)
    }

    /// Metadata-only: removes the mapping and marks the page garbage. Does
    /// not touch PAL: trim has no NAND-level cost in this model.
    pub fn trim(&mut self, lpn: u64) -> Result<()> {
        if let Some(loc) = self.mapping.remove(lpn) {
            self.blocks[loc.block_index as usize].invalidate(loc.page_index);
        }
        Ok(())
    }

    /// Trim the entire LPN space, then opportunistically erase whatever
    /// blocks that leaves fully invalid, a restricted GC pass rather than
    /// an eager whole-device erase, since most blocks will already have
    /// other garbage pages freed by the trim.
    pub fn format(&mut self, pal: &mut Pal, tick: u64) -> Result<()> {
        for (_, loc) in self.mapping.drain() {
            self.blocks[loc.block_index as usize].invalidate(loc.page_index);
        }

        let reclaimable: Vec<u64> = self
            .blocks
            .iter()
            .filter(|b| b.valid_page_count() == 0 && b.next_write_page_index() > 0)
            .map(|b| b.block_index)
            .collect();

        for idx in reclaimable {
            self.blocks[idx as usize].erase(tick)?;
            pal.submit(NandOp::Erase, idx, 0, tick);
            if self.blocks[idx as usize].erase_count() < self.gc.erase_threshold {
                self.free_blocks.push(idx);
            }
        }
        for slot in self.current_write_block.iter_mut() {
            *slot = None;
        }
        debug!(freed = self.free_blocks.len(), "format reclaimed blocks");
        Ok(())
    }

    /// Choose (or keep using) the append target for `die_slot`. Exhausting a
    /// prior target counts as a `reclaimMore` event; having none yet (the
    /// slot's first allocation) does not.
    fn ensure_write_target(&mut self, pal: &mut Pal, tick: u64, die_slot: u64) -> Result<u64> {
        let slot = die_slot as usize;
        if let Some(idx) = self.current_write_block[slot] {
            if !self.blocks[idx as usize].is_full() {
                return Ok(idx);
            }
        }
        let had_target = self.current_write_block[slot].is_some();
        let idx = self.get_free_block(pal, tick, die_slot)?;
        if had_target {
            self.reclaim_more += 1;
        }
        self.current_write_block[slot] = Some(idx);
        Ok(idx)
    }

    /// Pop the least-worn free block within `die_slot` (wear leveling within
    /// the die, per §4.2); run GC and retry if that slot has none free.
    fn get_free_block(&mut self, pal: &mut Pal, tick: u64, die_slot: u64) -> Result<u64> {
        for _ in 0..=self.die_slots() {
            let candidate = self
                .free_blocks
                .iter()
                .enumerate()
                .filter(|(_, &idx)| self.die_slot_of(idx) == die_slot)
                .min_by_key(|(_, &idx)| self.blocks[idx as usize].erase_count())
                .map(|(pos, _)| pos);
            if let Some(pos) = candidate {
                return Ok(self.free_blocks.remove(pos));
            }
            self.do_garbage_collection(pal, tick)?;
        }
        Err(SimError::OutOfFreeBlocks)
    }

    /// How many victims one GC pass should reclaim: a fixed count for
    /// `ON_DEMAND`, or however many blocks it takes to bring the free pool
    /// up to `GCReclaimThreshold` for `THRESHOLD`.
    fn victim_count(&self) -> u32 {
        match self.gc.mode {
            GcMode::OnDemand => self.gc.reclaim_blocks + self.reclaim_more,
            GcMode::Threshold => {
                let total = self.geometry.total_physical_blocks() as f64;
                let target = (total * self.gc.reclaim_threshold) - self.free_blocks.len() as f64;
                target.ceil().max(1.0) as u32
            }
        }
    }

    fn do_garbage_collection(&mut self, pal: &mut Pal, tick: u64) -> Result<()> {
        let count = self.victim_count();
        self.reclaim_more = 0;
        for _ in 0..count {
            let exclude: Vec<u64> = self.current_write_block.iter().filter_map(|&x| x).collect();
            let Some(victim) = gc::select_victim(&self.blocks, self.gc.policy, tick, &exclude)
            else {
                break;
            };
            let die_slot = self.die_slot_of(victim);

            let pages = self.blocks[victim as usize].pages();
            for page in 0..pages {
                if !self.blocks[victim as usize].is_valid(page) {
                    continue;
                }
                let lpn = self.blocks[victim as usize]
                    .lpn_at(page)
                    .expect("valid page has an LPN");

                let target = self.ensure_write_target(pal, tick, die_slot)?;
                let new_page = self.blocks[target as usize].write(lpn, tick)?;
                self.mapping.set(
                    lpn,
                    PhysicalPage {
                        block_index: target,
                        page_index: new_page,
                    },
                );
                self.blocks[victim as usize].invalidate(page);

                pal.submit(NandOp::Read, victim, page, tick);
                pal.submit(NandOp::Write, target, new_page, tick);
            }

            self.blocks[victim as usize].erase(tick)?;
            pal.submit(NandOp::Erase, victim, 0, tick);
            if self.blocks[victim as usize].erase_count() < self.gc.erase_threshold {
                self.free_blocks.push(victim);
            } else {
                debug!(victim, "block retired: erase count reached EraseThreshold");
            }
            pal.record_gc_reclaim(1);
            debug!(victim, "garbage collected block");
        }
        Ok(())
    }
}
