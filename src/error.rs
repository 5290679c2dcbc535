//! Error types for jbodstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::{DeviceError, Opcode};

/// Result type alias using JbodError
pub type Result<T> = std::result::Result<T, JbodError>;

/// Unified error type for jbodstore operations
#[derive(Debug, Error)]
pub enum JbodError {
    // -------------------------------------------------------------------------
    // Argument Validation Errors (raised before any device interaction)
    // -------------------------------------------------------------------------
    #[error("Address range out of range")]
    OutOfRange,

    #[error("Transfer too large")]
    TooLarge,

    #[error("Invalid buffer")]
    InvalidBuffer,

    // -------------------------------------------------------------------------
    // Device Errors
    // -------------------------------------------------------------------------
    #[error("Device is not mounted")]
    Unmounted,

    #[error("Write permission denied")]
    WritePermissionDenied,

    #[error("Device rejected {opcode:?}: {error}")]
    Device { opcode: Opcode, error: DeviceError },

    // -------------------------------------------------------------------------
    // Transport / Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Transport failure: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    #[error("Cache entry unchanged")]
    NoOp,

    #[error("Block address out of device range: disk {disk}, block {block}")]
    InvalidBlockAddress { disk: u32, block: u32 },

    #[error("Cache already exists")]
    CacheExists,

    #[error("No cache exists")]
    CacheMissing,

    #[error("Invalid cache size: {0} (must be within 2..=4096)")]
    InvalidCacheSize(usize),

    // -------------------------------------------------------------------------
    // Disk Image Errors
    // -------------------------------------------------------------------------
    #[error("Disk image I/O error: {0}")]
    ImageIo(#[source] std::io::Error),

    #[error("Disk image corrupt: {0}")]
    ImageCorrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JbodError {
    /// True for errors detected before any device command is issued
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            JbodError::OutOfRange | JbodError::TooLarge | JbodError::InvalidBuffer
        )
    }
}
