//! Error taxonomy for the simulator core.
//!
//! Mirrors the source error table: most kinds are fatal (the model caught
//! itself in an inconsistent state, or configuration was invalid at init);
//! a couple are ordinary NVMe completion statuses handed back to the caller.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Bad geometry, ratios, or page-allocation string. Fatal at init.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Impossible state: block in both pools, mapping to an unused block,
    /// write to an already-valid page, valid-page count nonzero on an erase
    /// target. Indicates a model bug, not a simulated hardware fault.
    #[error("corrupted simulator state: {0}")]
    Corrupted(String),

    /// Garbage collection could not produce a free block.
    #[error("out of free blocks")]
    OutOfFreeBlocks,

    /// NVMe command not supported. Not fatal, returned to the caller as a
    /// completion status.
    #[error("invalid opcode: {0}")]
    InvalidOpcode(String),

    /// NVM command issued against a detached namespace.
    #[error("namespace not attached: {0}")]
    NamespaceNotAttached(u32),
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::ConfigInvalid(e.to_string())
    }
}
