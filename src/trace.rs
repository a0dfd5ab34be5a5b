//! Structured logging setup.
//!
//! `tracing_subscriber` is wired up directly rather than through a wrapper
//! type. The simulator's subsystems (`pal`, `ftl`, `icl`, `host`) each log
//! through plain `tracing` macros tagged with their module path; this just
//! centralizes the one-time subscriber initialization so `main.rs` and
//! integration tests share it.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that reads `RUST_LOG` (defaulting to `info`) and
/// prints without target/thread noise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
