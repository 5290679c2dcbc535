//! Block cache implementation
//!
//! Slot vector with a logical clock for recency.

use crate::error::{JbodError, Result};
use crate::geometry::{is_valid_block, Block};
use super::{CacheEntry, CacheStats, MAX_CACHE_ENTRIES, MIN_CACHE_ENTRIES};

/// Bounded associative store keyed by (disk, block)
#[derive(Debug)]
pub struct BlockCache {
    slots: Vec<CacheEntry>,

    /// Strictly increasing recency counter
    clock: u64,

    stats: CacheStats,
}

impl BlockCache {
    /// Create a cache with `capacity` empty slots
    pub fn new(capacity: usize) -> Result<Self> {
        check_capacity(capacity)?;
        Ok(Self {
            slots: vec![CacheEntry::empty(); capacity],
            clock: 0,
            stats: CacheStats::default(),
        })
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn position(&self, disk: u32, block: u32) -> Option<usize> {
        self.slots.iter().position(|slot| slot.matches(disk, block))
    }

    /// Look up a block, refreshing its recency on a hit
    pub fn lookup(&mut self, disk: u32, block: u32) -> Option<Block> {
        self.stats.queries += 1;

        let index = self.position(disk, block)?;
        self.stats.hits += 1;
        let now = self.tick();
        let slot = &mut self.slots[index];
        slot.last_touch = now;
        Some(slot.data)
    }

    /// Overwrite a cached block's data; does nothing if the block is absent
    pub fn update(&mut self, disk: u32, block: u32, data: &Block) {
        if let Some(index) = self.position(disk, block) {
            let now = self.tick();
            let slot = &mut self.slots[index];
            slot.data = *data;
            slot.last_touch = now;
        }
    }

    /// Insert a block, evicting the most recently touched slot when full
    ///
    /// Returns `JbodError::NoOp` if the block is already cached with
    /// identical data; recency is left untouched in that case.
    pub fn insert(&mut self, disk: u32, block: u32, data: &Block) -> Result<()> {
        if !is_valid_block(disk, block) {
            return Err(JbodError::InvalidBlockAddress { disk, block });
        }

        // Already cached: report unchanged data, otherwise overwrite in place
        if let Some(index) = self.position(disk, block) {
            if self.slots[index].data == *data {
                return Err(JbodError::NoOp);
            }
            self.update(disk, block, data);
            return Ok(());
        }

        // First empty slot, else evict
        let index = match self.slots.iter().position(|slot| !slot.valid) {
            Some(index) => index,
            None => {
                let victim = self.victim();
                tracing::trace!(
                    "Evicting disk {} block {} for disk {} block {}",
                    self.slots[victim].disk,
                    self.slots[victim].block,
                    disk,
                    block
                );
                victim
            }
        };

        let now = self.tick();
        self.slots[index] = CacheEntry {
            disk,
            block,
            valid: true,
            data: *data,
            last_touch: now,
        };
        Ok(())
    }

    /// Slot holding the highest recency stamp
    fn victim(&self) -> usize {
        // Stamps are unique, so the choice is deterministic
        self.slots
            .iter()
            .enumerate()
            .max_by_key(|(_, slot)| slot.last_touch)
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    /// Grow or shrink the slot vector
    ///
    /// Growing keeps every entry. Shrinking drops the trailing slots.
    pub fn resize(&mut self, capacity: usize) -> Result<()> {
        check_capacity(capacity)?;
        // New slots start empty
        self.slots.resize(capacity, CacheEntry::empty());
        Ok(())
    }

    /// True if the block is cached (does not count as a lookup)
    pub fn contains(&self, disk: u32, block: u32) -> bool {
        self.position(disk, block).is_some()
    }

    /// Recency stamp of a cached block (does not count as a lookup)
    pub fn last_touch(&self, disk: u32, block: u32) -> Option<u64> {
        self.position(disk, block).map(|index| self.slots[index].last_touch)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of valid entries
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.valid).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

fn check_capacity(capacity: usize) -> Result<()> {
    if (MIN_CACHE_ENTRIES..=MAX_CACHE_ENTRIES).contains(&capacity) {
        Ok(())
    } else {
        Err(JbodError::InvalidCacheSize(capacity))
    }
}
