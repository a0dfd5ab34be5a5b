//! Cache-line eviction policies.
//!
//! Shaped after an `EvictionPolicy` trait plus policy factory, stripped of
//! `Arc`/atomics/lock machinery: the cache here runs on a single simulated
//! thread, so a policy just needs `&mut self`. Only three policies are
//! implemented: RANDOM, FIFO, LRU. No CLOCK/2Q/LRU-K extras.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SimError};

pub type WayIndex = usize;

/// Selects an eviction victim among a set's ways, given per-way occupancy
/// and last-access ticks. `valid[way]` is `false` for empty ways, which are
/// always preferred over evicting live data.
pub trait EvictionPolicy {
    /// Record that `way` was just accessed (hit).
    fn record_access(&mut self, way: WayIndex, tick: u64);

    /// Record that `way` was just filled with a new line. Defaults to
    /// `record_access`; FIFO overrides it, since fill time and access time
    /// mean different things to that policy.
    fn record_fill(&mut self, way: WayIndex, tick: u64) {
        self.record_access(way, tick);
    }

    /// Record that `way` was just evicted, so policies with per-way history
    /// can forget it.
    fn record_eviction(&mut self, way: WayIndex);

    /// Choose a victim among `valid[..]`'s `true` entries. Callers are
    /// expected to have already special-cased any ways where `valid` is
    /// `false` (empty lines fill before anything gets evicted).
    fn select_victim(&mut self, valid: &[bool]) -> WayIndex;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicyKind {
    Random,
    Fifo,
    Lru,
}

impl EvictionPolicyKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RANDOM" => Ok(EvictionPolicyKind::Random),
            "FIFO" => Ok(EvictionPolicyKind::Fifo),
            "LRU" => Ok(EvictionPolicyKind::Lru),
            other => Err(SimError::ConfigInvalid(format!(
                "unknown EvictPolicy: {other}"
            ))),
        }
    }
}

pub fn create_eviction_policy(kind: EvictionPolicyKind, way_size: usize) -> Box<dyn EvictionPolicy> {
    match kind {
        EvictionPolicyKind::Random => Box::new(RandomPolicy::new(way_size)),
        EvictionPolicyKind::Fifo => Box::new(FifoPolicy::new(way_size)),
        EvictionPolicyKind::Lru => Box::new(LruPolicy::new(way_size)),
    }
}

/// Picks uniformly among the set's valid ways.
pub struct RandomPolicy {
    rng: StdRng,
    way_size: usize,
}

impl RandomPolicy {
    pub fn new(way_size: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(0xC0FF_EE00 ^ way_size as u64),
            way_size,
        }
    }
}

impl EvictionPolicy for RandomPolicy {
    fn record_access(&mut self, _way: WayIndex, _tick: u64) {}
    fn record_eviction(&mut self, _way: WayIndex) {}

    fn select_victim(&mut self, valid: &[bool]) -> WayIndex {
        let candidates: Vec<WayIndex> = (0..self.way_size).filter(|&w| valid[w]).collect();
        if candidates.is_empty() {
            return 0;
        }
        candidates[self.rng.random_range(0..candidates.len())]
    }

    fn name(&self) -> &'static str {
        "RANDOM"
    }
}

/// Evicts the way that has held its current occupant the longest.
pub struct FifoPolicy {
    fill_tick: Vec<u64>,
}

impl FifoPolicy {
    pub fn new(way_size: usize) -> Self {
        Self {
            fill_tick: vec![0; way_size],
        }
    }
}

impl EvictionPolicy for FifoPolicy {
    fn record_access(&mut self, _way: WayIndex, _tick: u64) {
        // FIFO orders by fill time, not by subsequent access.
    }

    fn record_fill(&mut self, way: WayIndex, tick: u64) {
        self.fill_tick[way] = tick;
    }

    fn record_eviction(&mut self, way: WayIndex) {
        self.fill_tick[way] = 0;
    }

    fn select_victim(&mut self, valid: &[bool]) -> WayIndex {
        (0..self.fill_tick.len())
            .filter(|&w| valid[w])
            .min_by_key(|&w| self.fill_tick[w])
            .unwrap_or(0)
    }

    fn name(&self) -> &'static str {
        "FIFO"
    }
}

/// Evicts the way with the oldest last-access tick.
pub struct LruPolicy {
    last_access: Vec<u64>,
}

impl LruPolicy {
    pub fn new(way_size: usize) -> Self {
        Self {
            last_access: vec![0; way_size],
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn record_access(&mut self, way: WayIndex, tick: u64) {
        self.last_access[way] = tick;
    }

    fn record_eviction(&mut self, way: WayIndex) {
        self.last_access[way] = 0;
    }

    fn select_victim(&mut self, valid: &[bool]) -> WayIndex {
        (0..self.last_access.len())
            .filter(|&w| valid[w])
            .min_by_key(|&w| self.last_access[w])
            .unwrap_or(0)
    }

    fn name(&self) -> &'static str {
        "LRU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_the_stalest_way() {
        let mut p = LruPolicy::new(3);
        p.record_access(0, 10);
        p.record_access(1, 20);
        p.record_access(2, 5);
        assert_eq!(p.select_victim(&[true, true, true]), 2);
    }

    #[test]
    fn fifo_evicts_oldest_fill_regardless_of_access() {
        let mut p = FifoPolicy::new(2);
        p.record_fill(0, 0);
        p.record_fill(1, 10);
        p.record_access(0, 100); // touching way 0 doesn't save it from FIFO
        assert_eq!(p.select_victim(&[true, true]), 0);
    }

    #[test]
    fn random_only_picks_valid_ways() {
        let mut p = RandomPolicy::new(4);
        let victim = p.select_victim(&[false, true, false, false]);
        assert_eq!(victim, 1);
    }
}
