//! # jbodstore
//!
//! Linear, byte-addressable storage over a remote JBOD array:
//! - Wire protocol client for the device's seek/read/write commands
//! - Address translation and read-modify-write for arbitrary byte ranges
//! - Fixed-capacity block cache in front of the device
//! - TCP device emulator for tests and local runs
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 StorageEngine (read / write)                │
//! │         address math, RMW loop, disk boundary seeks         │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!                ▼                               ▼
//!   ┌─────────────────────────┐       ┌─────────────────────┐
//!   │   Connection (client)   │       │     BlockCache      │
//!   │  packets, reliable I/O  │       │  (disk, block) keys │
//!   └────────────┬────────────┘       └─────────────────────┘
//!                │ TCP
//!                ▼
//!   ┌─────────────────────────┐
//!   │  Remote JBOD device     │
//!   │  (or DeviceServer)      │
//!   └─────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod geometry;

pub mod protocol;
pub mod cache;
pub mod device;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{JbodError, Result};
pub use config::Config;
pub use engine::{SharedEngine, StorageEngine};
pub use cache::BlockCache;
pub use network::{CommandChannel, Connection};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of jbodstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
