//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol, and the
//! reliable read/write primitives that frame packets on a byte stream.
//!
//! ## Wire Format
//!
//! ### Packet (request and response share one layout)
//! ```text
//! ┌──────────────────┬──────────┬──────────────────────────────┐
//! │  Op word (4, BE) │ Info (1) │ Block (BLOCK_SIZE, optional) │
//! └──────────────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! In both directions the block follows the header iff bit 1 of the info
//! byte is set.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{JbodError, Result};
use crate::geometry::{Block, BLOCK_SIZE};
use super::{InfoCode, Request, Response};

/// Header size: 4 bytes operation word + 1 byte info code
pub const HEADER_SIZE: usize = 5;

/// Size of a packet that carries a block
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + BLOCK_SIZE;

// =============================================================================
// Packet Encoding/Decoding
// =============================================================================

fn encode_packet(op: u32, info: InfoCode, payload: Option<&Block>) -> Bytes {
    let len = HEADER_SIZE + payload.map_or(0, |_| BLOCK_SIZE);
    let mut buf = BytesMut::with_capacity(len);
    buf.put_u32(op);
    buf.put_u8(info.0);
    if let Some(block) = payload {
        buf.put_slice(block);
    }
    buf.freeze()
}

fn decode_packet(mut bytes: &[u8]) -> Result<(u32, InfoCode, Option<Block>)> {
    if bytes.len() < HEADER_SIZE {
        return Err(JbodError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let op = bytes.get_u32();
    let info = InfoCode(bytes.get_u8());

    let payload = if info.has_payload() {
        if bytes.len() < BLOCK_SIZE {
            return Err(JbodError::Protocol(format!(
                "Incomplete payload: expected {} bytes, got {}",
                BLOCK_SIZE,
                bytes.len()
            )));
        }
        let mut block = [0u8; BLOCK_SIZE];
        bytes.copy_to_slice(&mut block);
        Some(block)
    } else {
        None
    };

    Ok((op, info, payload))
}

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Bytes {
    // Payload bit set iff a block is attached
    let info = InfoCode::request(request.payload.is_some());
    encode_packet(request.op, info, request.payload.as_ref())
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (op, _info, payload) = decode_packet(bytes)?;
    Ok(Request { op, payload })
}

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Bytes {
    let mut info = response.info;
    // Payload bit always mirrors the presence of the block
    if response.payload.is_some() {
        info.0 |= InfoCode::PAYLOAD;
    } else {
        info.0 &= !InfoCode::PAYLOAD;
    }
    encode_packet(response.op, info, response.payload.as_ref())
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (op, info, payload) = decode_packet(bytes)?;
    Ok(Response { op, info, payload })
}

// =============================================================================
// Reliable I/O primitives
// =============================================================================

/// Read exactly `buf.len()` bytes, accumulating partial reads
///
/// A read that returns zero bytes means the peer closed the stream and
/// fails the whole operation.
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut done = 0;
    while done < buf.len() {
        match reader.read(&mut buf[done..]) {
            Ok(0) => {
                return Err(JbodError::Transport(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream closed after {} of {} bytes", done, buf.len()),
                )))
            }
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Write all of `buf`, accumulating partial writes
///
/// A write that accepts zero bytes fails the whole operation.
pub fn write_full<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    let mut done = 0;
    while done < buf.len() {
        match writer.write(&buf[done..]) {
            Ok(0) => {
                return Err(JbodError::Transport(std::io::Error::new(
                    ErrorKind::WriteZero,
                    format!("stream accepted {} of {} bytes", done, buf.len()),
                )))
            }
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read header and, when flagged, the block that follows it
fn read_packet<R: Read>(reader: &mut R) -> Result<(u32, InfoCode, Option<Block>)> {
    let mut header = [0u8; HEADER_SIZE];
    read_full(reader, &mut header)?;

    let op = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let info = InfoCode(header[4]);

    let payload = if info.has_payload() {
        let mut block = [0u8; BLOCK_SIZE];
        read_full(reader, &mut block)?;
        Some(block)
    } else {
        None
    };

    Ok((op, info, payload))
}

/// Read a complete request from a stream
///
/// Blocks until the request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let (op, _info, payload) = read_packet(reader)?;
    Ok(Request { op, payload })
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    write_full(writer, &encode_request(request))
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let (op, info, payload) = read_packet(reader)?;
    Ok(Response { op, info, payload })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_full(writer, &encode_response(response))
}
