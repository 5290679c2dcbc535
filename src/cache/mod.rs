//! Cache Module
//!
//! Fixed-capacity block cache sitting in front of the device.
//!
//! ## Responsibilities
//! - Absorb repeated block reads
//! - Supply the base block for partial-block writes
//! - Track lookup/hit counters for diagnostics
//!
//! ## Eviction Policy
//! When every slot is full, the slot with the **highest** recency stamp
//! (the most recently touched entry) is overwritten, the opposite of LRU.
//!
//! ## Data Structure Choice
//! A flat `Vec` of slots scanned linearly. Capacity is capped at 4096, so
//! O(n) lookups stay cheap and slot indices never leave this module.

mod table;

pub use table::BlockCache;

use crate::geometry::{Block, BLOCK_SIZE};

/// Smallest accepted cache capacity
pub const MIN_CACHE_ENTRIES: usize = 2;

/// Largest accepted cache capacity
pub const MAX_CACHE_ENTRIES: usize = 4096;

/// One cache slot
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub disk: u32,
    pub block: u32,
    pub valid: bool,
    pub data: Block,
    /// Logical clock value of the last lookup-hit, update or insert
    pub last_touch: u64,
}

impl CacheEntry {
    /// An empty (invalid) slot
    pub fn empty() -> Self {
        Self {
            disk: 0,
            block: 0,
            valid: false,
            data: [0u8; BLOCK_SIZE],
            last_touch: 0,
        }
    }

    fn matches(&self, disk: u32, block: u32) -> bool {
        self.valid && self.disk == disk && self.block == block
    }
}

/// Running lookup statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub queries: u64,
    pub hits: u64,
}

impl CacheStats {
    /// Hit rate as a percentage (0.0 when nothing was queried)
    pub fn hit_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            100.0 * self.hits as f64 / self.queries as f64
        }
    }
}
