//! A discrete-event performance simulator for an NVMe-style SSD.
//!
//! Three layers, in the order a host request passes through them:
//!
//! - [`icl`]: a set-associative cache sitting in front of the flash.
//! - [`ftl`]: the page-mapping translation layer, block pools, and GC.
//! - [`pal`]: the timeline scheduler that turns a physical NAND operation
//!   into a completion tick.
//!
//! [`sim::Simulator`] wires all three together from a [`config::ConfigMap`]
//! and is the type most callers want.

pub mod config;
pub mod error;
pub mod ftl;
pub mod geometry;
pub mod host;
pub mod icl;
pub mod latency;
pub mod pal;
pub mod sim;
pub mod stats;
pub mod trace;

pub use error::{Result, SimError};
pub use sim::Simulator;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
