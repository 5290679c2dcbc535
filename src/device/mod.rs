//! Device Module
//!
//! In-process emulation of the remote JBOD array.
//!
//! ## Responsibilities
//! - Hold `NUM_DISKS × BLOCKS_PER_DISK` blocks in memory
//! - Track mount state, write permission and the seek cursor
//! - Execute one operation at a time, exactly as the remote side does
//! - Persist disk contents to an image file
//!
//! ## Cursor Semantics
//! The cursor moves only on SEEK_TO_DISK (which also resets the block to 0)
//! and SEEK_TO_BLOCK. READ_BLOCK and WRITE_BLOCK act on the block under the
//! cursor and leave it in place.

mod image;

pub use image::{DiskImage, IMAGE_VERSION};

use crate::error::Result;
use crate::geometry::{Block, BLOCKS_PER_DISK, BLOCK_SIZE, NUM_DISKS};
use crate::protocol::{DeviceError, Opcode, Operation, Request, Response};

/// Emulated JBOD array
pub struct JbodDevice {
    /// Blocks of all disks, disk-major
    blocks: Vec<Block>,

    mounted: bool,

    write_permission: bool,

    cur_disk: u32,

    cur_block: u32,
}

impl JbodDevice {
    /// Create an unmounted device with zeroed disks and no write permission
    pub fn new() -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]; (NUM_DISKS * BLOCKS_PER_DISK) as usize],
            mounted: false,
            write_permission: false,
            cur_disk: 0,
            cur_block: 0,
        }
    }

    fn index(disk: u32, block: u32) -> usize {
        (disk * BLOCKS_PER_DISK + block) as usize
    }

    /// Handle a wire request, turning malformed operation words into BAD_COMMAND
    pub fn handle(&mut self, request: &Request) -> Response {
        match Operation::decode(request.op) {
            Ok(op) => self.apply(op, request.payload.as_ref(), request.op),
            Err(e) => {
                tracing::warn!("Rejecting operation 0x{:08x}: {}", request.op, e);
                Response::error(request.op, DeviceError::BadCommand)
            }
        }
    }

    /// Execute one decoded operation
    ///
    /// `word` is echoed back in the response.
    pub fn apply(&mut self, op: Operation, payload: Option<&Block>, word: u32) -> Response {
        let result = match op.opcode {
            Opcode::Mount => self.mount(),
            Opcode::Unmount => self.unmount(),
            Opcode::WritePermission => self.grant(),
            Opcode::RevokeWritePermission => self.revoke(),
            Opcode::SeekToDisk => self.seek_to_disk(op.disk as u32),
            Opcode::SeekToBlock => self.seek_to_block(op.block as u32),
            Opcode::ReadBlock => self.read_block(),
            Opcode::WriteBlock => self.write_block(payload),
        };

        match result {
            Ok(block) => Response::ok(word, block),
            Err(error) => {
                tracing::debug!("Device rejected {:?}: {}", op.opcode, error);
                Response::error(word, error)
            }
        }
    }

    fn mount(&mut self) -> std::result::Result<Option<Block>, DeviceError> {
        if self.mounted {
            return Err(DeviceError::AlreadyMounted);
        }
        self.mounted = true;
        self.cur_disk = 0;
        self.cur_block = 0;
        Ok(None)
    }

    fn unmount(&mut self) -> std::result::Result<Option<Block>, DeviceError> {
        if !self.mounted {
            return Err(DeviceError::AlreadyUnmounted);
        }
        self.mounted = false;
        Ok(None)
    }

    fn grant(&mut self) -> std::result::Result<Option<Block>, DeviceError> {
        if self.write_permission {
            return Err(DeviceError::AlreadyGranted);
        }
        self.write_permission = true;
        Ok(None)
    }

    fn revoke(&mut self) -> std::result::Result<Option<Block>, DeviceError> {
        if !self.write_permission {
            return Err(DeviceError::AlreadyRevoked);
        }
        self.write_permission = false;
        Ok(None)
    }

    fn require_mounted(&self) -> std::result::Result<(), DeviceError> {
        if self.mounted {
            Ok(())
        } else {
            Err(DeviceError::Unmounted)
        }
    }

    fn seek_to_disk(&mut self, disk: u32) -> std::result::Result<Option<Block>, DeviceError> {
        self.require_mounted()?;
        if disk >= NUM_DISKS {
            return Err(DeviceError::BadDisk);
        }
        self.cur_disk = disk;
        self.cur_block = 0;
        Ok(None)
    }

    fn seek_to_block(&mut self, block: u32) -> std::result::Result<Option<Block>, DeviceError> {
        self.require_mounted()?;
        if block >= BLOCKS_PER_DISK {
            return Err(DeviceError::BadBlock);
        }
        self.cur_block = block;
        Ok(None)
    }

    fn read_block(&mut self) -> std::result::Result<Option<Block>, DeviceError> {
        self.require_mounted()?;
        Ok(Some(self.blocks[Self::index(self.cur_disk, self.cur_block)]))
    }

    fn write_block(
        &mut self,
        payload: Option<&Block>,
    ) -> std::result::Result<Option<Block>, DeviceError> {
        self.require_mounted()?;
        if !self.write_permission {
            return Err(DeviceError::WriteDenied);
        }
        let data = payload.ok_or(DeviceError::BadCommand)?;
        self.blocks[Self::index(self.cur_disk, self.cur_block)] = *data;
        Ok(None)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn has_write_permission(&self) -> bool {
        self.write_permission
    }

    /// Current (disk, block) cursor
    pub fn cursor(&self) -> (u32, u32) {
        (self.cur_disk, self.cur_block)
    }

    /// Direct view of a block, bypassing the protocol
    pub fn block(&self, disk: u32, block: u32) -> Option<&Block> {
        if disk < NUM_DISKS && block < BLOCKS_PER_DISK {
            Some(&self.blocks[Self::index(disk, block)])
        } else {
            None
        }
    }

    /// Snapshot of all disk contents
    pub fn to_image(&self) -> DiskImage {
        DiskImage::from_blocks(&self.blocks)
    }

    /// Replace all disk contents from an image; mount state is reset
    pub fn load_image(&mut self, image: &DiskImage) -> Result<()> {
        image.copy_into(&mut self.blocks)?;
        self.mounted = false;
        self.write_permission = false;
        self.cur_disk = 0;
        self.cur_block = 0;
        Ok(())
    }
}

impl Default for JbodDevice {
    fn default() -> Self {
        Self::new()
    }
}
