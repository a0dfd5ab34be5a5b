//! Top-level device: wires configuration into PAL, FTL, and ICL, and is the
//! single entry point a caller drives with host requests.

use tracing::info;

use crate::config::{keys, ConfigMap};
use crate::error::Result;
use crate::ftl::Ftl;
use crate::host::{self, HostCompletion, HostRequest};
use crate::icl::Cache;
use crate::pal::Pal;
use crate::stats::Statistics;

pub struct Simulator {
    pal: Pal,
    ftl: Ftl,
    cache: Cache,
}

impl Simulator {
    pub fn from_config(cfg: &ConfigMap) -> Result<Self> {
        let pal = Pal::from_config(cfg)?;
        let ftl = Ftl::from_config(cfg)?;
        let cache = Cache::from_config(cfg, pal.geometry())?;
        Ok(Self { pal, ftl, cache })
    }

    pub fn stats(&self) -> &Statistics {
        self.pal.stats()
    }

    /// Pre-write a `Warmup`-ratio fraction of the logical address space
    /// sequentially at tick 0, so a measurement run doesn't start on an
    /// all-empty device with nothing to garbage collect or evict.
    pub fn initialize(&mut self, cfg: &ConfigMap) -> Result<()> {
        let ratio = cfg.get_f64_or(keys::WARMUP, 0.0).clamp(0.0, 1.0);
        let total_pages = self.pal.geometry().total_logical_pages();
        let warmup_pages = ((total_pages as f64) * ratio).floor() as u64;
        info!(warmup_pages, total_pages, "warming up device");
        for lpn in 0..warmup_pages {
            self.write(lpn, 0)?;
        }
        Ok(())
    }

    pub fn submit(&mut self, req: HostRequest) -> Result<HostCompletion> {
        host::submit_io(&mut self.cache, &mut self.ftl, &mut self.pal, req)
    }

    pub fn read(&mut self, lpn: u64, tick: u64) -> Result<u64> {
        self.cache.read(&mut self.ftl, &mut self.pal, lpn, tick)
    }

    pub fn write(&mut self, lpn: u64, tick: u64) -> Result<u64> {
        self.cache.write(&mut self.ftl, &mut self.pal, lpn, tick)
    }

    pub fn trim(&mut self, lpn: u64) -> Result<()> {
        self.cache.trim(&mut self.ftl, lpn)
    }

    pub fn flush(&mut self, tick: u64) -> Result<u64> {
        self.cache.flush_all(&mut self.ftl, &mut self.pal, tick)
    }

    pub fn format(&mut self, tick: u64) -> Result<()> {
        self.cache.format(&mut self.ftl, &mut self.pal, tick)
    }

    pub fn get_lpn_info(&self, lpn: u64) -> Option<(u64, u32)> {
        host::get_lpn_info(&self.ftl, lpn)
    }

    pub fn get_used_page_count(&self) -> usize {
        host::get_used_page_count(&self.ftl)
    }
}
