//! Command definitions
//!
//! Device opcodes and the 32-bit operation word that carries them.
//!
//! ## Operation Word Layout (LSB first)
//! ```text
//!  31            20 19        12 11         4 3      0
//! ┌────────────────┬────────────┬────────────┬────────┐
//! │  zero (12)     │ opcode (8) │ block (8)  │disk (4)│
//! └────────────────┴────────────┴────────────┴────────┘
//! ```

use crate::error::{JbodError, Result};

const DISK_BITS: u32 = 4;
const BLOCK_BITS: u32 = 8;
const OPCODE_BITS: u32 = 8;

const DISK_SHIFT: u32 = 0;
const BLOCK_SHIFT: u32 = DISK_SHIFT + DISK_BITS;
const OPCODE_SHIFT: u32 = BLOCK_SHIFT + BLOCK_BITS;

const DISK_MASK: u32 = (1 << DISK_BITS) - 1;
const BLOCK_MASK: u32 = (1 << BLOCK_BITS) - 1;
const OPCODE_MASK: u32 = (1 << OPCODE_BITS) - 1;

/// Device opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Mount = 0x00,
    Unmount = 0x01,
    SeekToDisk = 0x02,
    SeekToBlock = 0x03,
    ReadBlock = 0x04,
    WriteBlock = 0x05,
    WritePermission = 0x06,
    RevokeWritePermission = 0x07,
}

impl TryFrom<u8> for Opcode {
    type Error = JbodError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Opcode::Mount),
            0x01 => Ok(Opcode::Unmount),
            0x02 => Ok(Opcode::SeekToDisk),
            0x03 => Ok(Opcode::SeekToBlock),
            0x04 => Ok(Opcode::ReadBlock),
            0x05 => Ok(Opcode::WriteBlock),
            0x06 => Ok(Opcode::WritePermission),
            0x07 => Ok(Opcode::RevokeWritePermission),
            _ => Err(JbodError::Protocol(format!(
                "Unknown opcode: 0x{:02x}",
                value
            ))),
        }
    }
}

/// A single device command: opcode plus disk/block targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Target disk (4 bits)
    pub disk: u8,

    /// Target block (8 bits)
    pub block: u8,

    pub opcode: Opcode,
}

impl Operation {
    /// Build an operation; targets are truncated to their field widths
    pub fn new(opcode: Opcode, disk: u32, block: u32) -> Self {
        Self {
            disk: (disk & DISK_MASK) as u8,
            block: (block & BLOCK_MASK) as u8,
            opcode,
        }
    }

    /// An operation that carries no disk/block target
    pub fn bare(opcode: Opcode) -> Self {
        Self::new(opcode, 0, 0)
    }

    pub fn seek_to_disk(disk: u32) -> Self {
        Self::new(Opcode::SeekToDisk, disk, 0)
    }

    pub fn seek_to_block(block: u32) -> Self {
        Self::new(Opcode::SeekToBlock, 0, block)
    }

    /// Pack into the wire operation word
    pub fn encode(&self) -> u32 {
        ((self.disk as u32 & DISK_MASK) << DISK_SHIFT)
            | ((self.block as u32 & BLOCK_MASK) << BLOCK_SHIFT)
            | ((self.opcode as u32 & OPCODE_MASK) << OPCODE_SHIFT)
    }

    /// Unpack a wire operation word
    ///
    /// Bits above the opcode field must be zero.
    pub fn decode(word: u32) -> Result<Self> {
        if word >> (OPCODE_SHIFT + OPCODE_BITS) != 0 {
            return Err(JbodError::Protocol(format!(
                "Reserved bits set in operation word 0x{:08x}",
                word
            )));
        }

        let opcode = Opcode::try_from(((word >> OPCODE_SHIFT) & OPCODE_MASK) as u8)?;
        Ok(Self {
            disk: ((word >> DISK_SHIFT) & DISK_MASK) as u8,
            block: ((word >> BLOCK_SHIFT) & BLOCK_MASK) as u8,
            opcode,
        })
    }
}
