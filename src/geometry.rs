//! Device geometry
//!
//! The array is `NUM_DISKS` disks of `BLOCKS_PER_DISK` blocks each, every
//! block `BLOCK_SIZE` bytes. Disks are concatenated into one linear address
//! space starting at 0:
//!
//! ```text
//!  addr 0                                                     TOTAL_SIZE
//!  ┌──────────────┬──────────────┬─────┬──────────────────────┐
//!  │    disk 0    │    disk 1    │ ... │       disk 15        │
//!  │ b0 b1 .. b255│ b0 b1 .. b255│     │ b0 b1 ..       b255  │
//!  └──────────────┴──────────────┴─────┴──────────────────────┘
//! ```

/// Number of disks in the array
pub const NUM_DISKS: u32 = 16;

/// Number of blocks on each disk
pub const BLOCKS_PER_DISK: u32 = 256;

/// Bytes per block
pub const BLOCK_SIZE: usize = 256;

/// Bytes per disk
pub const DISK_SIZE: u32 = BLOCKS_PER_DISK * BLOCK_SIZE as u32;

/// Bytes in the whole linear address space (1 MiB)
pub const TOTAL_SIZE: u64 = NUM_DISKS as u64 * DISK_SIZE as u64;

/// Largest length accepted by a single read or write call
pub const MAX_IO_SIZE: u32 = 1024;

/// One device block
pub type Block = [u8; BLOCK_SIZE];

/// A linear address decomposed into disk, block and in-block offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    pub disk: u32,
    pub block: u32,
    pub offset: usize,
}

impl BlockAddress {
    /// Decompose a linear byte address
    pub fn locate(addr: u32) -> Self {
        let disk = addr / DISK_SIZE;
        let block = (addr % DISK_SIZE) / BLOCK_SIZE as u32;
        let offset = ((addr - disk * DISK_SIZE) % BLOCK_SIZE as u32) as usize;
        Self {
            disk,
            block,
            offset,
        }
    }

    /// Linear address of this position
    pub fn linear(&self) -> u64 {
        self.disk as u64 * DISK_SIZE as u64
            + self.block as u64 * BLOCK_SIZE as u64
            + self.offset as u64
    }
}

/// True if `(disk, block)` names a block that exists on the device
pub fn is_valid_block(disk: u32, block: u32) -> bool {
    disk < NUM_DISKS && block < BLOCKS_PER_DISK
}
