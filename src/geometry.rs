//! Flash geometry, the page-allocation policy, and the PAL address mapper.
//!
//! Grounded in `original_source/pal/pal_old.cc`'s `convertCPDPBP`, which
//! walks a 4-letter allocation string dividing a linear block index into
//! per-dimension coordinates, enumerating the dimensions named in the
//! superblock mask. This module generalizes that hand-unrolled C++ (which
//! only handled up to 4 nested loops) into data-driven form.

use std::fmt;

use crate::config::{keys, ConfigMap};
use crate::error::{Result, SimError};

/// One of the four dimensions a `PageAllocation` string may permute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Channel,
    Package,
    Die,
    Plane,
}

impl Dim {
    fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'C' => Ok(Dim::Channel),
            'W' => Ok(Dim::Package),
            'D' => Ok(Dim::Die),
            'P' => Ok(Dim::Plane),
            other => Err(SimError::ConfigInvalid(format!(
                "unknown dimension letter in PageAllocation/SuperblockSize: {other}"
            ))),
        }
    }
}

/// Physical address tuple: Channel, Package, Die, Plane, Block, Page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cpdpbp {
    pub channel: u32,
    pub package: u32,
    pub die: u32,
    pub plane: u32,
    pub block: u64,
    pub page: u32,
}

impl fmt::Display for Cpdpbp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C{}.W{}.D{}.P{}.B{}.Pg{}",
            self.channel, self.package, self.die, self.plane, self.block, self.page
        )
    }
}

/// A permutation of the four addressable dimensions, parsed from e.g. `"CWDP"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAllocation {
    order: [Dim; 4],
}

impl PageAllocation {
    pub fn parse(spec: &str) -> Result<Self> {
        let chars: Vec<char> = spec.chars().collect();
        if chars.len() != 4 {
            return Err(SimError::ConfigInvalid(format!(
                "PageAllocation must be exactly 4 characters, got {spec:?}"
            )));
        }
        let mut order = [Dim::Channel; 4];
        let mut seen = [false; 4];
        for (i, c) in chars.iter().enumerate() {
            let dim = Dim::from_char(*c)?;
            let slot = dim_slot(dim);
            if seen[slot] {
                return Err(SimError::ConfigInvalid(format!(
                    "PageAllocation repeats dimension {c:?}: {spec:?}"
                )));
            }
            seen[slot] = true;
            order[i] = dim;
        }
        Ok(Self { order })
    }
}

/// The subset of dimensions striped together into one superblock/superpage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuperblockMask {
    bits: [bool; 4],
}

impl SuperblockMask {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut bits = [false; 4];
        for c in spec.chars() {
            let dim = Dim::from_char(c)?;
            bits[dim_slot(dim)] = true;
        }
        Ok(Self { bits })
    }

    pub fn contains(&self, dim: Dim) -> bool {
        self.bits[dim_slot(dim)]
    }

    fn with_plane_forced(mut self) -> Self {
        self.bits[dim_slot(Dim::Plane)] = true;
        self
    }
}

fn dim_slot(dim: Dim) -> usize {
    match dim {
        Dim::Channel => 0,
        Dim::Package => 1,
        Dim::Die => 2,
        Dim::Plane => 3,
    }
}

/// Flat NAND geometry: dimension counts plus page/LBA sizing.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub channel: u32,
    pub package: u32,
    pub die: u32,
    pub plane: u32,
    pub block: u32,
    pub page: u32,
    pub page_size: u32,
    pub lba_size: u32,
    pub io_unit_size: u32,
    pub over_provisioning_ratio: f64,
}

impl Geometry {
    pub fn from_config(cfg: &ConfigMap) -> Result<Self> {
        let page_size = cfg.get_u32_or(keys::PAGE_SIZE, 4096);
        let lba_size = cfg.get_u32_or(keys::LBA_SIZE, 512);
        if !lba_size.is_power_of_two() {
            return Err(SimError::ConfigInvalid(format!(
                "LBASize must be a power of two, got {lba_size}"
            )));
        }
        let io_unit_size = cfg.get_u32_or("IOUnitSize", page_size);

        Ok(Self {
            channel: cfg.get_u32_or(keys::CHANNEL, 1).max(1),
            package: cfg.get_u32_or(keys::PACKAGE, 1).max(1),
            die: cfg.get_u32_or(keys::DIE, 1).max(1),
            plane: cfg.get_u32_or(keys::PLANE, 1).max(1),
            block: cfg.get_u32_or(keys::BLOCK, 1).max(1),
            page: cfg.get_u32_or(keys::PAGE, 1).max(1),
            page_size,
            lba_size,
            io_unit_size,
            over_provisioning_ratio: cfg.get_f64_or(keys::OVER_PROVISIONING_RATIO, 0.0),
        })
    }

    pub fn count(&self, dim: Dim) -> u32 {
        match dim {
            Dim::Channel => self.channel,
            Dim::Package => self.package,
            Dim::Die => self.die,
            Dim::Plane => self.plane,
        }
    }

    /// Pages per I/O unit write granule.
    pub fn io_unit_in_page(&self) -> u32 {
        (self.page_size / self.io_unit_size).max(1)
    }

    /// LPN-to-LBA ratio: LBAs addressable per logical page.
    pub fn lba_per_page(&self) -> u32 {
        (self.page_size / self.lba_size).max(1)
    }

    /// Total physical blocks across the whole device (one "Block" per
    /// Channel x Package x Die x Plane x Block coordinate).
    pub fn total_physical_blocks(&self) -> u64 {
        self.channel as u64
            * self.package as u64
            * self.die as u64
            * self.plane as u64
            * self.block as u64
    }

    pub fn pages_in_block(&self) -> u32 {
        self.page
    }

    /// Physical blocks withheld from the logical address space.
    pub fn total_logical_blocks(&self) -> u64 {
        let physical = self.total_physical_blocks() as f64;
        ((physical * (1.0 - self.over_provisioning_ratio)).floor() as u64).max(1)
    }

    pub fn total_logical_pages(&self) -> u64 {
        self.total_logical_blocks() * self.pages_in_block() as u64
    }

    /// A linear index across (Channel, Package, Die) identifying one die's
    /// independent timeline pair.
    pub fn die_index(&self, addr: &Cpdpbp) -> u64 {
        (addr.channel as u64 * self.package as u64 + addr.package as u64) * self.die as u64
            + addr.die as u64
    }

    pub fn total_dies(&self) -> u64 {
        self.channel as u64 * self.package as u64 * self.die as u64
    }
}

/// Expand a (linear block index, page index) pair into every physical page
/// that belongs to the same superpage, per the allocation order and
/// superblock mask.
pub fn expand_superpage(
    geom: &Geometry,
    alloc: &PageAllocation,
    superblock: SuperblockMask,
    multi_plane: bool,
    block_index: u64,
    page_index: u32,
) -> Vec<Cpdpbp> {
    let superblock = if multi_plane {
        superblock.with_plane_forced()
    } else {
        superblock
    };

    let order: Vec<Dim> = if multi_plane {
        let mut o = vec![Dim::Plane];
        o.extend(alloc.order.iter().copied().filter(|d| *d != Dim::Plane));
        o
    } else {
        alloc.order.to_vec()
    };

    let mut tmp = block_index;
    let mut fixed: Vec<(Dim, u32)> = Vec::new();
    let mut enumerate_dims: Vec<Dim> = Vec::new();

    for dim in order {
        let count = geom.count(dim) as u64;
        if superblock.contains(dim) {
            enumerate_dims.push(dim);
        } else {
            let value = (tmp % count) as u32;
            tmp /= count;
            fixed.push((dim, value));
        }
    }

    let block = tmp;
    let mut results = vec![Cpdpbp {
        block,
        page: page_index,
        ..Default::default()
    }];
    for (dim, value) in &fixed {
        for addr in results.iter_mut() {
            set_dim(addr, *dim, *value);
        }
    }

    for dim in enumerate_dims {
        let count = geom.count(dim);
        let mut next = Vec::with_capacity(results.len() * count as usize);
        for addr in &results {
            for value in 0..count {
                let mut a = *addr;
                set_dim(&mut a, dim, value);
                next.push(a);
            }
        }
        results = next;
    }

    results
}

fn set_dim(addr: &mut Cpdpbp, dim: Dim, value: u32) {
    match dim {
        Dim::Channel => addr.channel = value,
        Dim::Package => addr.package = value,
        Dim::Die => addr.die = value,
        Dim::Plane => addr.plane = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> Geometry {
        Geometry {
            channel: 2,
            package: 1,
            die: 1,
            plane: 1,
            block: 4,
            page: 4,
            page_size: 4096,
            lba_size: 4096,
            io_unit_size: 4096,
            over_provisioning_ratio: 0.0,
        }
    }

    #[test]
    fn parse_rejects_repeated_letters() {
        assert!(PageAllocation::parse("CCDP").is_err());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(PageAllocation::parse("CWD").is_err());
    }

    #[test]
    fn no_superblock_stripe_yields_one_address() {
        let g = geom();
        let alloc = PageAllocation::parse("CWDP").unwrap();
        let sb = SuperblockMask::default();
        let addrs = expand_superpage(&g, &alloc, sb, false, 1, 2);
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].channel, 1);
        assert_eq!(addrs[0].block, 0);
        assert_eq!(addrs[0].page, 2);
    }

    #[test]
    fn channel_striped_superblock_yields_one_address_per_channel() {
        let g = geom();
        let alloc = PageAllocation::parse("CWDP").unwrap();
        let sb = SuperblockMask::parse("C").unwrap();
        let addrs = expand_superpage(&g, &alloc, sb, false, 0, 0);
        assert_eq!(addrs.len(), g.channel as usize);
        let mut channels: Vec<u32> = addrs.iter().map(|a| a.channel).collect();
        channels.sort_unstable();
        assert_eq!(channels, vec![0, 1]);
    }

    #[test]
    fn multi_plane_forces_plane_into_superblock() {
        let mut g = geom();
        g.plane = 2;
        let alloc = PageAllocation::parse("CWDP").unwrap();
        let sb = SuperblockMask::default();
        let addrs = expand_superpage(&g, &alloc, sb, true, 0, 0);
        assert_eq!(addrs.len(), 2);
    }
}
