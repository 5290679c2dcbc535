//! Disk image persistence
//!
//! ## File Format
//! ```text
//! ┌──────────┬──────────────────────────────────────┐
//! │ CRC (4)  │ bincode(DiskImage)                   │
//! └──────────┴──────────────────────────────────────┘
//! ```
//! The CRC32 (big-endian) covers the bincode section.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{JbodError, Result};
use crate::geometry::{Block, BLOCKS_PER_DISK, BLOCK_SIZE, NUM_DISKS};

/// Current image format version
pub const IMAGE_VERSION: u16 = 1;

const CRC_SIZE: usize = 4;

/// Serializable snapshot of every disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskImage {
    pub version: u16,
    pub num_disks: u32,
    pub blocks_per_disk: u32,
    pub block_size: u32,
    /// All blocks, disk-major
    pub data: Vec<u8>,
}

impl DiskImage {
    pub(crate) fn from_blocks(blocks: &[Block]) -> Self {
        let mut data = Vec::with_capacity(blocks.len() * BLOCK_SIZE);
        for block in blocks {
            data.extend_from_slice(block);
        }
        Self {
            version: IMAGE_VERSION,
            num_disks: NUM_DISKS,
            blocks_per_disk: BLOCKS_PER_DISK,
            block_size: BLOCK_SIZE as u32,
            data,
        }
    }

    /// Check the image matches this build's geometry
    pub fn validate(&self) -> Result<()> {
        if self.version != IMAGE_VERSION {
            return Err(JbodError::ImageCorrupt(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.num_disks != NUM_DISKS
            || self.blocks_per_disk != BLOCKS_PER_DISK
            || self.block_size != BLOCK_SIZE as u32
        {
            return Err(JbodError::ImageCorrupt(format!(
                "geometry {}x{}x{} does not match {}x{}x{}",
                self.num_disks,
                self.blocks_per_disk,
                self.block_size,
                NUM_DISKS,
                BLOCKS_PER_DISK,
                BLOCK_SIZE
            )));
        }
        let expected = (NUM_DISKS * BLOCKS_PER_DISK) as usize * BLOCK_SIZE;
        if self.data.len() != expected {
            return Err(JbodError::ImageCorrupt(format!(
                "expected {} data bytes, got {}",
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn copy_into(&self, blocks: &mut [Block]) -> Result<()> {
        self.validate()?;
        for (block, chunk) in blocks.iter_mut().zip(self.data.chunks_exact(BLOCK_SIZE)) {
            block.copy_from_slice(chunk);
        }
        Ok(())
    }

    /// Write the image to `path`, replacing any existing file
    ///
    /// The bytes go to a uniquely named temp file in the same directory,
    /// which is renamed over `path` once synced. Concurrent saves never
    /// share a temp file; the last rename wins.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body =
            bincode::serialize(self).map_err(|e| JbodError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&body);

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(JbodError::ImageIo)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writer.write_all(&crc.to_be_bytes()).map_err(JbodError::ImageIo)?;
            writer.write_all(&body).map_err(JbodError::ImageIo)?;
            writer.flush().map_err(JbodError::ImageIo)?;
        }
        tmp.as_file().sync_all().map_err(JbodError::ImageIo)?;

        // Atomic replace; an unpersisted temp file is removed on drop
        tmp.persist(path).map_err(|e| JbodError::ImageIo(e.error))?;

        tracing::debug!("Saved disk image to {}", path.display());
        Ok(())
    }

    /// Read and verify an image from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(JbodError::ImageIo)?;
        if bytes.len() < CRC_SIZE {
            return Err(JbodError::ImageCorrupt(format!(
                "file too short: {} bytes",
                bytes.len()
            )));
        }

        let (crc_bytes, body) = bytes.split_at(CRC_SIZE);
        let stored = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(body);
        if stored != actual {
            return Err(JbodError::ImageCorrupt(format!(
                "CRC mismatch: stored 0x{:08x}, computed 0x{:08x}",
                stored, actual
            )));
        }

        let image: DiskImage =
            bincode::deserialize(body).map_err(|e| JbodError::Serialization(e.to_string()))?;
        image.validate()?;

        tracing::debug!("Loaded disk image from {}", path.display());
        Ok(image)
    }
}
