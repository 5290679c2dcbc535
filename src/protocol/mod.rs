//! Protocol Module
//!
//! Defines the wire protocol spoken with the remote JBOD device.
//!
//! ## Packet Format
//! ```text
//! ┌──────────────────┬──────────┬──────────────────────────────┐
//! │  Op word (4, BE) │ Info (1) │ Block (BLOCK_SIZE, optional) │
//! └──────────────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! ### Opcodes
//! - 0x00: MOUNT
//! - 0x01: UNMOUNT
//! - 0x02: SEEK_TO_DISK     - disk field
//! - 0x03: SEEK_TO_BLOCK    - block field
//! - 0x04: READ_BLOCK       - response carries a block
//! - 0x05: WRITE_BLOCK      - request carries a block
//! - 0x06: WRITE_PERMISSION
//! - 0x07: REVOKE_WRITE_PERMISSION
//!
//! ### Info Byte
//! - bit 0: command failed (responses)
//! - bit 1: block payload follows
//! - bits 2..7: device error code (responses)

mod command;
mod response;
mod codec;

pub use command::{Opcode, Operation};
pub use response::{DeviceError, InfoCode, Request, Response};
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_full,
    read_request, read_response, write_full, write_request, write_response, HEADER_SIZE,
    MAX_PACKET_SIZE,
};
