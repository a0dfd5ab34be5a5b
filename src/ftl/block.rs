//! A single erase block: its per-page program state and wear counter.
//!
//! Grounded in `original_source/ftl/common/block.hh` / `block.cc`'s `Block`
//! class (validBits/erasedBits per page, a bitmask tracking which I/O units
//! of a page have been written, and an eraseCount incremented on erase).
//! Simplified here to one I/O unit per page, which is the common case the
//! spec's geometry covers (`IOUnitSize == PageSize` unless stated otherwise).

use crate::error::{Result, SimError};

/// Per-page program state plus the block-wide erase counter.
///
/// - I1: a page can only be written while `erased[page]` is `true` and
///   `valid[page]` is `false`. NAND requires an erase before reprogram, and
///   the simulator refuses to silently overwrite a still-valid page.
/// - I2: writes within a block must use strictly increasing page indices
///   (`next_write_page` is monotonic) until the next erase.
/// - I3: erase clears every page's valid/erased bit *by reference*
///   (`self.valid.fill(false)`) rather than being itself the unit of
///   iteration. Callers erase a block, they don't ask a block to erase
///   itself page by page.
#[derive(Debug, Clone)]
pub struct Block {
    pub block_index: u64,
    valid: Vec<bool>,
    erased: Vec<bool>,
    lpns: Vec<Option<u64>>,
    next_write_page: u32,
    erase_count: u64,
    last_access: u64,
}

impl Block {
    pub fn new(block_index: u64, pages_in_block: u32) -> Self {
        Self {
            block_index,
            valid: vec![false; pages_in_block as usize],
            erased: vec![true; pages_in_block as usize],
            lpns: vec![None; pages_in_block as usize],
            next_write_page: 0,
            erase_count: 0,
            last_access: 0,
        }
    }

    pub fn pages(&self) -> u32 {
        self.valid.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.next_write_page as usize >= self.valid.len()
    }

    pub fn next_write_page_index(&self) -> u32 {
        self.next_write_page
    }

    pub fn erase_count(&self) -> u64 {
        self.erase_count
    }

    pub fn last_write_tick(&self) -> u64 {
        self.last_access
    }

    pub fn valid_page_count(&self) -> u32 {
        self.valid.iter().filter(|v| **v).count() as u32
    }

    pub fn is_valid(&self, page_index: u32) -> bool {
        self.valid[page_index as usize]
    }

    pub fn lpn_at(&self, page_index: u32) -> Option<u64> {
        self.lpns[page_index as usize]
    }

    /// Program the next sequential page with `lpn`'s data at `tick`.
    pub fn write(&mut self, lpn: u64, tick: u64) -> Result<u32> {
        if self.is_full() {
            return Err(SimError::Corrupted(format!(
                "block {} has no erased pages left",
                self.block_index
            )));
        }
        let page = self.next_write_page;
        let idx = page as usize;
        if self.valid[idx] || !self.erased[idx] {
            return Err(SimError::Corrupted(format!(
                "block {} page {page} programmed out of order",
                self.block_index
            )));
        }
        self.valid[idx] = true;
        self.erased[idx] = false;
        self.lpns[idx] = Some(lpn);
        self.next_write_page += 1;
        self.last_access = tick;
        Ok(page)
    }

    /// Mark a page as garbage (its LPN has been remapped or trimmed
    /// elsewhere). Does not free NAND space, only `erase` does that.
    pub fn invalidate(&mut self, page_index: u32) {
        self.valid[page_index as usize] = false;
    }

    /// Reclaim the whole block: every page is erased in one reference,
    /// not iterated page by page by the caller.
    pub fn erase(&mut self, tick: u64) -> Result<()> {
        if self.valid_page_count() != 0 {
            return Err(SimError::Corrupted(format!(
                "block {} erased with {} pages still valid",
                self.block_index,
                self.valid_page_count()
            )));
        }
        self.valid.fill(false);
        self.erased.fill(true);
        self.lpns.fill(None);
        self.next_write_page = 0;
        self.erase_count += 1;
        self.last_access = tick;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_writes_advance_next_write_page() {
        let mut b = Block::new(0, 4);
        assert_eq!(b.write(10, 1).unwrap(), 0);
        assert_eq!(b.write(11, 2).unwrap(), 1);
        assert_eq!(b.next_write_page_index(), 2);
    }

    #[test]
    fn erase_requires_no_valid_pages() {
        let mut b = Block::new(0, 2);
        b.write(10, 1).unwrap();
        assert!(b.erase(5).is_err());
        b.invalidate(0);
        assert!(b.erase(5).is_ok());
        assert_eq!(b.erase_count(), 1);
        assert_eq!(b.next_write_page_index(), 0);
    }

    #[test]
    fn full_block_rejects_further_writes() {
        let mut b = Block::new(0, 1);
        b.write(10, 1).unwrap();
        assert!(b.write(11, 2).is_err());
    }
}
