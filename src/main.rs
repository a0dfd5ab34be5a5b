// Minimal driver for the SSD simulator core. Intentionally thin: no CLI
// argument parsing or config-file loading, both out of scope for this crate
// (see DESIGN.md); this binary exists to exercise the library with a
// synthetic workload and print the resulting statistics.

use tracing::info;

use ssd_sim::config::{keys, ConfigMap};
use ssd_sim::host::{HostOp, HostRequest};
use ssd_sim::{trace, Simulator, VERSION};

fn default_config() -> ConfigMap {
    let mut cfg = ConfigMap::new();
    cfg.set(keys::CHANNEL, "4");
    cfg.set(keys::PACKAGE, "1");
    cfg.set(keys::DIE, "2");
    cfg.set(keys::PLANE, "1");
    cfg.set(keys::BLOCK, "64");
    cfg.set(keys::PAGE, "256");
    cfg.set(keys::PAGE_SIZE, "4096");
    cfg.set(keys::LBA_SIZE, "512");
    cfg.set(keys::PAGE_ALLOCATION, "CWDP");
    cfg.set(keys::SUPERBLOCK_SIZE, "C");
    cfg.set(keys::NAND_TYPE, "TLC");
    cfg.set(keys::GC_MODE, "THRESHOLD");
    cfg.set(keys::GC_THRESHOLD, "0.1");
    cfg.set(keys::CACHE_SIZE, "256");
    cfg.set(keys::WAY_SIZE, "4");
    cfg.set(keys::EVICT_POLICY, "LRU");
    cfg.set(keys::WARMUP, "0.2");
    cfg
}

fn main() -> ssd_sim::Result<()> {
    trace::init_tracing();
    info!(version = VERSION, "ssd-simctl starting");

    let cfg = default_config();
    let mut sim = Simulator::from_config(&cfg)?;
    sim.initialize(&cfg)?;

    let mut tick = 0u64;
    for req_id in 0..2_000u64 {
        let req = HostRequest {
            req_id,
            op: if req_id % 4 == 0 { HostOp::Write } else { HostOp::Read },
            start_lpn: req_id % 4096,
            lpn_count: 1,
            arrival: tick,
        };
        let completion = sim.submit(req)?;
        tick = tick.max(completion.finish_tick) + 1;
    }

    let snapshot = sim.stats().snapshot();
    println!("{}", serde_json::to_string_pretty(snapshot).unwrap());
    info!(
        reads = snapshot.reads,
        writes = snapshot.writes,
        gc_blocks_reclaimed = snapshot.gc_blocks_reclaimed,
        "workload complete"
    );
    Ok(())
}
