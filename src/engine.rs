//! Engine Module
//!
//! Byte-range reads and writes over the device's whole-block commands.
//!
//! ## Responsibilities
//! - Validate byte ranges before touching the device
//! - Translate linear addresses into (disk, block, offset)
//! - Drive the remote seek cursor across block and disk boundaries
//! - Read-modify-write partial blocks without losing untouched bytes
//! - Consult and populate the block cache (write-through)

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{BlockCache, CacheStats};
use crate::config::Config;
use crate::error::{JbodError, Result};
use crate::geometry::{Block, BlockAddress, BLOCKS_PER_DISK, BLOCK_SIZE, MAX_IO_SIZE, TOTAL_SIZE};
use crate::network::{CommandChannel, Connection};
use crate::protocol::{DeviceError, Opcode, Operation, Response};

/// Linear storage over a JBOD device
///
/// ## Command Ordering
/// The device keeps a single seek cursor, so every method issues its
/// commands strictly in order and never has two in flight. Each block
/// read or write is preceded by a seek to that block.
pub struct StorageEngine<C = Connection> {
    channel: C,

    /// Block cache; `None` means caching is disabled
    cache: Option<BlockCache>,
}

impl StorageEngine<Connection> {
    /// Connect to the device described by `config`
    ///
    /// Creates the block cache when `config.cache_entries` is set.
    pub fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let connection = Connection::connect(config)?;
        let mut engine = Self::new(connection);
        if let Some(entries) = config.cache_entries {
            engine.create_cache(entries)?;
        }
        Ok(engine)
    }

    /// Close the connection; the cache goes with it
    pub fn disconnect(mut self) -> Result<()> {
        if self.cache.is_some() {
            self.destroy_cache()?;
        }
        self.channel.disconnect()
    }
}

impl<C: CommandChannel> StorageEngine<C> {
    /// Create an engine over an open channel, with caching disabled
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            cache: None,
        }
    }

    // =========================================================================
    // Device Control
    // =========================================================================

    pub fn mount(&mut self) -> Result<()> {
        self.control(Opcode::Mount)?;
        tracing::debug!("Device mounted");
        Ok(())
    }

    pub fn unmount(&mut self) -> Result<()> {
        self.control(Opcode::Unmount)?;
        tracing::debug!("Device unmounted");
        Ok(())
    }

    /// Ask the device for write permission
    ///
    /// A refusal is reported as `WritePermissionDenied`.
    pub fn grant_write_permission(&mut self) -> Result<()> {
        match self.control(Opcode::WritePermission) {
            Ok(_) => Ok(()),
            Err(JbodError::Device { .. }) => Err(JbodError::WritePermissionDenied),
            Err(e) => Err(e),
        }
    }

    pub fn revoke_write_permission(&mut self) -> Result<()> {
        self.control(Opcode::RevokeWritePermission)?;
        Ok(())
    }

    fn control(&mut self, opcode: Opcode) -> Result<Response> {
        self.command(Operation::bare(opcode), None)
    }

    /// Issue one command and turn a device rejection into an error
    fn command(&mut self, op: Operation, payload: Option<&Block>) -> Result<Response> {
        let response = self.channel.execute(op, payload)?;
        match response.device_error() {
            None => Ok(response),
            Some(error) => {
                tracing::warn!("Device rejected {:?}: {}", op, error);
                Err(match error {
                    DeviceError::Unmounted => JbodError::Unmounted,
                    DeviceError::WriteDenied => JbodError::WritePermissionDenied,
                    error => JbodError::Device {
                        opcode: op.opcode,
                        error,
                    },
                })
            }
        }
    }

    fn seek_to_disk(&mut self, disk: u32) -> Result<()> {
        self.command(Operation::seek_to_disk(disk), None)?;
        Ok(())
    }

    fn seek_to_block(&mut self, block: u32) -> Result<()> {
        self.command(Operation::seek_to_block(block), None)?;
        Ok(())
    }

    /// Move the cursor to the start of `pos`'s block
    fn position(&mut self, pos: &BlockAddress) -> Result<()> {
        self.seek_to_disk(pos.disk)?;
        self.seek_to_block(pos.block)
    }

    // =========================================================================
    // Byte-range I/O
    // =========================================================================

    /// Read `len` bytes starting at `addr` into `out`
    ///
    /// Returns the number of bytes read. On a device or transport failure
    /// the bytes already copied into `out` stay there.
    pub fn read(&mut self, addr: u32, len: u32, out: Option<&mut [u8]>) -> Result<u32> {
        validate(addr, len, out.as_ref().map(|buf| buf.len()))?;
        if len == 0 {
            return Ok(0);
        }
        let out = out.ok_or(JbodError::InvalidBuffer)?;
        let len = len as usize;

        // Initial positioning
        let mut pos = BlockAddress::locate(addr);
        self.position(&pos)?;

        let mut done = 0;
        while done < len {
            // Ran off the end of the current disk
            self.cross_disk_boundary(&mut pos)?;

            // Bytes of this block inside the requested range
            let chunk = (len - done).min(BLOCK_SIZE - pos.offset);
            let block = self.fetch_block(pos.disk, pos.block)?;
            out[done..done + chunk].copy_from_slice(&block[pos.offset..pos.offset + chunk]);

            tracing::trace!(
                "read disk {} block {} [{}..{})",
                pos.disk,
                pos.block,
                pos.offset,
                pos.offset + chunk
            );

            // Every block after the first starts at offset 0
            done += chunk;
            pos.offset = 0;
            pos.block += 1;
        }

        Ok(len as u32)
    }

    /// Write `len` bytes from `data` starting at `addr`
    ///
    /// Bytes of partially covered blocks outside the range are preserved.
    /// Returns the number of bytes written.
    pub fn write(&mut self, addr: u32, len: u32, data: Option<&[u8]>) -> Result<u32> {
        validate(addr, len, data.map(|buf| buf.len()))?;
        if len == 0 {
            return Ok(0);
        }
        let data = data.ok_or(JbodError::InvalidBuffer)?;
        let len = len as usize;

        // Initial positioning
        let mut pos = BlockAddress::locate(addr);
        self.position(&pos)?;

        let mut done = 0;
        while done < len {
            // Ran off the end of the current disk
            self.cross_disk_boundary(&mut pos)?;

            let chunk = (len - done).min(BLOCK_SIZE - pos.offset);

            // A partially covered block needs its current contents so the
            // bytes outside the range survive; a full block is overwritten
            let mut block = if pos.offset != 0 || chunk < BLOCK_SIZE {
                self.fetch_block(pos.disk, pos.block)?
            } else {
                [0u8; BLOCK_SIZE]
            };

            // Overlay the caller's bytes
            block[pos.offset..pos.offset + chunk].copy_from_slice(&data[done..done + chunk]);

            // Write the full block back, then through to the cache
            self.store_block(pos.disk, pos.block, &block)?;

            tracing::trace!(
                "wrote disk {} block {} [{}..{})",
                pos.disk,
                pos.block,
                pos.offset,
                pos.offset + chunk
            );

            done += chunk;
            pos.offset = 0;
            pos.block += 1;
        }

        Ok(len as u32)
    }

    /// Step onto the next disk once the block index runs off the current one
    fn cross_disk_boundary(&mut self, pos: &mut BlockAddress) -> Result<()> {
        if pos.block >= BLOCKS_PER_DISK {
            pos.disk += 1;
            pos.block = 0;
            tracing::trace!("crossing onto disk {}", pos.disk);

            // Next disk, block 0
            self.seek_to_disk(pos.disk)?;
            self.seek_to_block(0)?;
        }
        Ok(())
    }

    /// Full contents of a block, from the cache when possible
    fn fetch_block(&mut self, disk: u32, block: u32) -> Result<Block> {
        // Cache hit: no device round trip
        if let Some(cache) = self.cache.as_mut() {
            if let Some(data) = cache.lookup(disk, block) {
                return Ok(data);
            }
        }

        // Re-seek; the cursor may not be on this block
        self.seek_to_block(block)?;
        let response = self.command(Operation::bare(Opcode::ReadBlock), None)?;
        let data = response.payload.ok_or_else(|| {
            JbodError::Protocol(format!(
                "read of disk {} block {} returned no payload",
                disk, block
            ))
        })?;

        // Misses populate the cache
        self.cache_insert(disk, block, &data)?;
        Ok(data)
    }

    /// Write a full block to the device, then through to the cache
    fn store_block(&mut self, disk: u32, block: u32, data: &Block) -> Result<()> {
        self.seek_to_block(block)?;
        self.command(Operation::bare(Opcode::WriteBlock), Some(data))?;
        self.cache_insert(disk, block, data)
    }

    fn cache_insert(&mut self, disk: u32, block: u32, data: &Block) -> Result<()> {
        match self.cache.as_mut().map(|cache| cache.insert(disk, block, data)) {
            // No cache, or the cached copy is already identical
            None | Some(Ok(())) | Some(Err(JbodError::NoOp)) => Ok(()),
            Some(Err(e)) => Err(e),
        }
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Enable caching with `capacity` slots
    pub fn create_cache(&mut self, capacity: usize) -> Result<()> {
        if self.cache.is_some() {
            return Err(JbodError::CacheExists);
        }
        self.cache = Some(BlockCache::new(capacity)?);
        tracing::debug!("Block cache created with {} entries", capacity);
        Ok(())
    }

    /// Disable caching and drop every cached block
    pub fn destroy_cache(&mut self) -> Result<()> {
        let cache = self.cache.take().ok_or(JbodError::CacheMissing)?;
        let stats = cache.stats();
        tracing::info!(
            "Block cache destroyed: {} hits / {} queries ({:.1}%)",
            stats.hits,
            stats.queries,
            stats.hit_rate()
        );
        Ok(())
    }

    pub fn resize_cache(&mut self, capacity: usize) -> Result<()> {
        self.cache
            .as_mut()
            .ok_or(JbodError::CacheMissing)?
            .resize(capacity)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn cache(&self) -> Option<&BlockCache> {
        self.cache.as_ref()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }
}

/// Argument checks, in order: range, size, zero length, buffer
fn validate(addr: u32, len: u32, buf_len: Option<usize>) -> Result<()> {
    if addr as u64 + len as u64 > TOTAL_SIZE {
        return Err(JbodError::OutOfRange);
    }
    if len > MAX_IO_SIZE {
        return Err(JbodError::TooLarge);
    }
    if len == 0 {
        return Ok(());
    }
    match buf_len {
        Some(buf_len) if buf_len >= len as usize => Ok(()),
        _ => Err(JbodError::InvalidBuffer),
    }
}

// =============================================================================
// Shared Engine
// =============================================================================

/// A `StorageEngine` callable from many threads
///
/// Every call holds one lock for its whole duration, so the device cursor
/// and the cache see operations one at a time.
pub struct SharedEngine<C = Connection> {
    inner: Arc<Mutex<StorageEngine<C>>>,
}

impl<C> Clone for SharedEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CommandChannel> SharedEngine<C> {
    pub fn new(engine: StorageEngine<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn read(&self, addr: u32, len: u32, out: Option<&mut [u8]>) -> Result<u32> {
        self.inner.lock().read(addr, len, out)
    }

    pub fn write(&self, addr: u32, len: u32, data: Option<&[u8]>) -> Result<u32> {
        self.inner.lock().write(addr, len, data)
    }

    pub fn mount(&self) -> Result<()> {
        self.inner.lock().mount()
    }

    pub fn unmount(&self) -> Result<()> {
        self.inner.lock().unmount()
    }

    pub fn grant_write_permission(&self) -> Result<()> {
        self.inner.lock().grant_write_permission()
    }

    pub fn revoke_write_permission(&self) -> Result<()> {
        self.inner.lock().revoke_write_permission()
    }

    /// Run `f` with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut StorageEngine<C>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
