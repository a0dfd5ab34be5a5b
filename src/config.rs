//! Flat key/value configuration surface.
//!
//! The simulator never parses a config *file*, that's explicitly a caller
//! concern (CLI plumbing / file format parsing is out of scope). What it
//! does own is the typed-getter layer on top of a flat string map, in the
//! shape of a `Component`/`Config` pattern: callers build the map however
//! they like (env vars, a TOML file they parsed themselves, a test fixture)
//! and hand it to [`ConfigMap::from_pairs`].

use std::collections::HashMap;

use crate::error::{Result, SimError};

/// Recognized configuration keys.
pub mod keys {
    pub const CHANNEL: &str = "Channel";
    pub const PACKAGE: &str = "Package";
    pub const DIE: &str = "Die";
    pub const PLANE: &str = "Plane";
    pub const BLOCK: &str = "Block";
    pub const PAGE: &str = "Page";
    pub const PAGE_SIZE: &str = "PageSize";
    pub const LBA_SIZE: &str = "LBASize";
    pub const PAGE_ALLOCATION: &str = "PageAllocation";
    pub const SUPERBLOCK_SIZE: &str = "SuperblockSize";
    pub const ENABLE_MULTI_PLANE_OPERATION: &str = "EnableMultiPlaneOperation";
    pub const NAND_TYPE: &str = "NANDType";
    pub const DMA_SPEED: &str = "DMASpeed";
    pub const DMA_WIDTH: &str = "DMAWidth";
    pub const MAPPING_MODE: &str = "MappingMode";
    pub const OVER_PROVISIONING_RATIO: &str = "OverProvisioningRatio";
    pub const GC_THRESHOLD: &str = "GCThreshold";
    pub const GC_MODE: &str = "GCMode";
    pub const GC_RECLAIM_BLOCKS: &str = "GCReclaimBlocks";
    pub const GC_RECLAIM_THRESHOLD: &str = "GCReclaimThreshold";
    pub const GC_EVICT_POLICY: &str = "GCEvictPolicy";
    pub const ERASE_THRESHOLD: &str = "EraseThreshold";
    pub const WARMUP: &str = "Warmup";
    pub const CACHE_SIZE: &str = "CacheSize";
    pub const WAY_SIZE: &str = "WaySize";
    pub const EVICT_POLICY: &str = "EvictPolicy";
    pub const USE_READ_CACHE: &str = "UseReadCache";
    pub const USE_WRITE_CACHE: &str = "UseWriteCache";
    pub const USE_READ_PREFETCH: &str = "UseReadPrefetch";
    pub const PREFETCH_COUNT: &str = "PrefetchCount";
    pub const PREFETCH_RATIO: &str = "PrefetchRatio";
}

/// A flat, typed configuration surface: strings in, typed values out.
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: HashMap<String, String>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SimError::ConfigInvalid(format!("missing key: {key}")))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_u32(&self, key: &str) -> Result<u32> {
        self.get_string(key)?
            .parse()
            .map_err(|_| SimError::ConfigInvalid(format!("{key} is not an unsigned integer")))
    }

    pub fn get_u32_or(&self, key: &str, default: u32) -> u32 {
        self.get_u32(key).unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str) -> Result<u64> {
        self.get_string(key)?
            .parse()
            .map_err(|_| SimError::ConfigInvalid(format!("{key} is not an unsigned integer")))
    }

    pub fn get_u64_or(&self, key: &str, default: u64) -> u64 {
        self.get_u64(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_string(key)?
            .parse()
            .map_err(|_| SimError::ConfigInvalid(format!("{key} is not a float")))
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get_string(key)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(SimError::ConfigInvalid(format!(
                "{key} is not a boolean: {other}"
            ))),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}
