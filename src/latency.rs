//! NAND timing tables.
//!
//! Grounded directly in `original_source/LatencyMLC.cc` / `LatencyTLC.cc`:
//! a `[operation][page-type]` table of picosecond constants for the MEM
//! (array busy) phase, plus per-operation DMA0/DMA1 bus-busy constants
//! scaled by `SPDIV` (derived from `DMASpeed`) and `PGDIV` (derived from
//! `PageSize`). SLC's table collapses to a single page type, matching the
//! spec's "SLC: always 0."
//!
//! `Latency.cc` itself (the base class that derives `SPDIV`/`PGDIV` from the
//! constructor args) was not present in the retrieved source; the divisor
//! formulas below (`speed_mhz / 100`, `page_size / 2048`) are a grounded
//! best-effort reconstruction from the comments in `LatencyMLC.cc`
//! (`/50 to 100mhz/`, `/*DMA0*/ .. /PGDIV`), recorded as a judgment call in
//! DESIGN.md rather than invented from nothing.

use crate::config::{keys, ConfigMap};
use crate::error::{Result, SimError};
use crate::geometry::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NandOp {
    Read = 0,
    Write = 1,
    Erase = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dma0,
    Mem,
    Dma1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NandType {
    Slc,
    Mlc,
    Tlc,
}

impl NandType {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SLC" => Ok(NandType::Slc),
            "MLC" => Ok(NandType::Mlc),
            "TLC" => Ok(NandType::Tlc),
            other => Err(SimError::ConfigInvalid(format!(
                "unknown NANDType: {other}"
            ))),
        }
    }

    /// Number of distinct page types (program-time classes) this NAND kind
    /// distinguishes: SLC has 1, MLC has 2 (LSB/MSB), TLC has 3 (LSB/CSB/MSB).
    fn page_types(&self) -> usize {
        match self {
            NandType::Slc => 1,
            NandType::Mlc => 2,
            NandType::Tlc => 3,
        }
    }

    /// Which page-type bucket a given physical page index falls into.
    pub fn page_type(&self, page_index: u32) -> usize {
        match self {
            NandType::Slc => 0,
            NandType::Mlc => (page_index % 2) as usize,
            NandType::Tlc => {
                if page_index <= 5 {
                    0 // LSB
                } else if page_index <= 7 {
                    1 // CSB
                } else {
                    (((page_index - 8) >> 1) % 3) as usize
                }
            }
        }
    }
}

/// `mem_latency[op][page_type]` in picoseconds, plus per-op DMA0/DMA1 bus
/// constants (page-type independent).
#[derive(Debug, Clone)]
pub struct LatencyTable {
    nand: NandType,
    spdiv: u64,
    pgdiv: u64,
    mem: Vec<[u64; 3]>,
    dma0: [u64; 3],
    dma1: [u64; 3],
}

impl LatencyTable {
    /// Convenience constructor for an 8-bit-wide bus (`wdiv = 1`, i.e. the
    /// data-transfer term is unscaled by width).
    pub fn new(nand: NandType, dma_speed_mhz: u32, page_size: u32) -> Self {
        Self::with_width(nand, dma_speed_mhz, page_size, 8)
    }

    /// `dma_width_bits` is the bus width (`DMAWidth`): a wider bus moves the
    /// same page of data in proportionally less time, so it scales down the
    /// data-transfer component of DMA0/DMA1 (the `185_000_000 * 2` term)
    /// without touching the fixed command/address overhead.
    pub fn with_width(nand: NandType, dma_speed_mhz: u32, page_size: u32, dma_width_bits: u32) -> Self {
        let spdiv = (dma_speed_mhz as u64 / 100).max(1);
        let pgdiv = (page_size as u64 / 2048).max(1);
        let wdiv = (dma_width_bits as u64 / 8).max(1);

        // [op][page_type], ps. LSB/CSB/MSB columns; SLC only ever reads
        // column 0.
        let mem: Vec<[u64; 3]> = match nand {
            NandType::Slc => vec![
                [40_000_000, 0, 0],
                [500_000_000, 0, 0],
                [3_500_000_000, 0, 0],
            ],
            NandType::Mlc => vec![
                [40_000_000, 65_000_000, 0],
                [500_000_000, 1_300_000_000, 0],
                [3_500_000_000, 3_500_000_000, 0],
            ],
            NandType::Tlc => vec![
                [58_000_000, 78_000_000, 107_000_000],
                [558_000_000, 2_201_000_000, 5_001_000_000],
                [2_274_000_000, 2_274_000_000, 2_274_000_000],
            ],
        };

        let dma0 = [
            100_000 / spdiv,
            185_000_000 * 2 / (pgdiv * spdiv * wdiv),
            1_500_000 / spdiv,
        ];
        let dma1 = [
            185_000_000 * 2 / (pgdiv * spdiv * wdiv),
            100_000 / spdiv,
            100_000 / spdiv,
        ];

        Self {
            nand,
            spdiv,
            pgdiv,
            mem,
            dma0,
            dma1,
        }
    }

    pub fn from_config(cfg: &ConfigMap, geom: &Geometry) -> Result<Self> {
        let nand = NandType::parse(&cfg.get_string_or(keys::NAND_TYPE, "SLC"))?;
        let dma_speed = cfg.get_u32_or(keys::DMA_SPEED, 200);
        let dma_width = cfg.get_u32_or(keys::DMA_WIDTH, 8);
        Ok(Self::with_width(nand, dma_speed, geom.page_size, dma_width))
    }

    pub fn nand_type(&self) -> NandType {
        self.nand
    }

    /// Latency, in picoseconds, of one phase of one operation at `page_index`.
    pub fn latency(&self, op: NandOp, page_index: u32, phase: Phase) -> u64 {
        match phase {
            Phase::Dma0 => self.dma0[op as usize],
            Phase::Dma1 => self.dma1[op as usize],
            Phase::Mem => {
                let pt = self.nand.page_type(page_index).min(self.nand.page_types() - 1);
                self.mem[op as usize][pt]
            }
        }
    }
}
