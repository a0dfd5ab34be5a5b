//! DRAM cache-line transfer latency.
//!
//! Models the cost of moving data in or out of the cache's backing DRAM:
//! a fixed row-open / column-access cost (`tRP + tRCD + tCL`) plus a
//! bandwidth-bound transfer term, serialized against every other DRAM
//! access via a single `next_start` watermark; the DRAM bus is one shared
//! resource, so a transfer can't start before the previous one finished.

#[derive(Debug, Clone, Copy)]
pub struct DramTiming {
    trp_ps: u64,
    trcd_ps: u64,
    tcl_ps: u64,
    ps_per_byte: u64,
    next_start: u64,
}

impl DramTiming {
    /// `bandwidth_bytes_per_sec` of 0 is rejected by the caller (see
    /// `from_config`); constructing directly with a nonzero bandwidth is the
    /// caller's responsibility.
    pub fn new(trp_ps: u64, trcd_ps: u64, tcl_ps: u64, bandwidth_bytes_per_sec: u64) -> Self {
        let ps_per_byte = 1_000_000_000_000u64 / bandwidth_bytes_per_sec.max(1);
        Self {
            trp_ps,
            trcd_ps,
            tcl_ps,
            ps_per_byte,
            next_start: 0,
        }
    }

    /// DDR4-2400-ish row/column timings and an 8-byte-wide bus at that
    /// speed, picked as a representative default. Callers needing a
    /// specific part should use `new` directly.
    pub fn default_ddr4() -> Self {
        Self::new(13_750, 13_750, 13_750, 19_200_000_000)
    }

    /// Schedule a transfer of `bytes` arriving no earlier than `arrival`,
    /// serialized against every prior transfer on this DRAM. Returns the
    /// completion tick.
    pub fn transfer(&mut self, arrival: u64, bytes: u64) -> u64 {
        let start = arrival.max(self.next_start);
        let fixed = self.trp_ps + self.trcd_ps + self.tcl_ps;
        let variable = bytes * self.ps_per_byte;
        let finish = start + fixed + variable;
        self.next_start = finish;
        finish
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_to_back_transfers_serialize() {
        let mut d = DramTiming::new(100, 100, 100, 1_000_000_000_000);
        let first = d.transfer(0, 64);
        let second = d.transfer(0, 64);
        assert!(second >= first);
    }

    #[test]
    fn later_arrival_is_not_pulled_earlier() {
        let mut d = DramTiming::new(100, 100, 100, 1_000_000_000_000);
        let finish = d.transfer(1_000_000, 64);
        assert!(finish >= 1_000_000);
    }
}
