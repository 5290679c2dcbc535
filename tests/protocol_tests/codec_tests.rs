//! Codec Tests
//!
//! Tests for packet encoding/decoding and the reliable stream primitives.

use std::io::{self, Cursor, ErrorKind, Read, Write};

use jbodstore::geometry::{Block, BLOCK_SIZE};
use jbodstore::protocol::{
    decode_request, decode_response, encode_request, encode_response, read_full,
    read_request, read_response, write_full, write_request, write_response, DeviceError,
    InfoCode, Opcode, Operation, Request, Response, HEADER_SIZE, MAX_PACKET_SIZE,
};
use jbodstore::JbodError;

// =============================================================================
// Helper Types
// =============================================================================

fn patterned() -> Block {
    let mut block = [0u8; BLOCK_SIZE];
    for (i, b) in block.iter_mut().enumerate() {
        *b = (i * 7) as u8;
    }
    block
}

/// Reader that hands out at most `chunk` bytes per call
struct Trickle {
    data: Cursor<Vec<u8>>,
    chunk: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.data.read(&mut buf[..n])
    }
}

/// Writer that accepts at most `chunk` bytes per call, and nothing once
/// `limit` bytes have been written
struct Narrow {
    written: Vec<u8>,
    chunk: usize,
    limit: usize,
}

impl Write for Narrow {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit - self.written.len();
        let n = buf.len().min(self.chunk).min(room);
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader that is interrupted once before every successful read
struct Interrupting {
    data: Cursor<Vec<u8>>,
    interrupt_next: bool,
}

impl Read for Interrupting {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.interrupt_next = !self.interrupt_next;
        if self.interrupt_next {
            return Err(io::Error::new(ErrorKind::Interrupted, "signal"));
        }
        self.data.read(buf)
    }
}

fn is_transport(error: &JbodError, kind: ErrorKind) -> bool {
    matches!(error, JbodError::Transport(e) if e.kind() == kind)
}

// =============================================================================
// Request Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_request_without_payload() {
    let op = Operation::seek_to_disk(3).encode();
    let encoded = encode_request(&Request::new(op, None));

    assert_eq!(encoded.len(), HEADER_SIZE);
    assert_eq!(&encoded[..4], &op.to_be_bytes());
    assert_eq!(encoded[4], 0);
}

#[test]
fn test_encode_request_with_payload() {
    let op = Operation::bare(Opcode::WriteBlock).encode();
    let block = patterned();
    let encoded = encode_request(&Request::new(op, Some(block)));

    assert_eq!(encoded.len(), MAX_PACKET_SIZE);
    assert_eq!(&encoded[..4], &[0x00, 0x00, 0x50, 0x00]);
    assert_eq!(encoded[4], InfoCode::PAYLOAD);
    assert_eq!(&encoded[HEADER_SIZE..], &block[..]);
}

#[test]
fn test_decode_request() {
    let op = Operation::bare(Opcode::WriteBlock).encode();
    let block = patterned();
    let encoded = encode_request(&Request::new(op, Some(block)));

    let decoded = decode_request(&encoded).unwrap();

    assert_eq!(decoded.op, op);
    assert_eq!(decoded.payload, Some(block));
}

#[test]
fn test_decode_request_framed_by_info_byte() {
    // A block follows iff the payload bit is set, whatever the opcode
    let mount_op = Operation::bare(Opcode::Mount).encode();
    let mut bytes = mount_op.to_be_bytes().to_vec();
    bytes.push(InfoCode::PAYLOAD);
    bytes.extend_from_slice(&patterned());

    let decoded = decode_request(&bytes).unwrap();
    assert_eq!(decoded.payload, Some(patterned()));

    let write_op = Operation::bare(Opcode::WriteBlock).encode();
    let mut bytes = write_op.to_be_bytes().to_vec();
    bytes.push(0);

    let decoded = decode_request(&bytes).unwrap();
    assert_eq!(decoded.payload, None);
}

#[test]
fn test_decode_incomplete_header() {
    let result = decode_request(&[0x00, 0x00, 0x40]);
    assert!(matches!(result, Err(JbodError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_payload() {
    let mut bytes = vec![0x00, 0x00, 0x50, 0x00, InfoCode::PAYLOAD];
    bytes.extend_from_slice(&[0u8; 100]);

    let result = decode_request(&bytes);
    assert!(matches!(result, Err(JbodError::Protocol(_))));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_response_sets_payload_flag() {
    let op = Operation::bare(Opcode::ReadBlock).encode();
    let encoded = encode_response(&Response::ok(op, Some(patterned())));

    assert_eq!(encoded.len(), MAX_PACKET_SIZE);
    assert_eq!(encoded[4], InfoCode::PAYLOAD);
}

#[test]
fn test_encode_failed_response() {
    let op = Operation::seek_to_disk(0).encode();
    let encoded = encode_response(&Response::error(op, DeviceError::Unmounted));

    assert_eq!(encoded.len(), HEADER_SIZE);
    assert_eq!(encoded[4], InfoCode::failed(DeviceError::Unmounted).0);
}

#[test]
fn test_decode_response_with_payload() {
    let op = Operation::bare(Opcode::ReadBlock).encode();
    let block = patterned();
    let encoded = encode_response(&Response::ok(op, Some(block)));

    let decoded = decode_response(&encoded).unwrap();

    assert_eq!(decoded.op, op);
    assert!(decoded.is_ok());
    assert_eq!(decoded.payload, Some(block));
}

#[test]
fn test_decode_response_failure() {
    let op = Operation::bare(Opcode::WriteBlock).encode();
    let encoded = encode_response(&Response::error(op, DeviceError::WriteDenied));

    let decoded = decode_response(&encoded).unwrap();

    assert!(!decoded.is_ok());
    assert_eq!(decoded.device_error(), Some(DeviceError::WriteDenied));
    assert_eq!(decoded.payload, None);
}

#[test]
fn test_payload_follows_bit_not_exact_value() {
    // Failure bit plus payload bit: the block must still be consumed
    let mut bytes = vec![0x00, 0x00, 0x40, 0x00, InfoCode::PAYLOAD | InfoCode::FAILED];
    bytes.extend_from_slice(&patterned());

    let decoded = decode_response(&bytes).unwrap();
    assert_eq!(decoded.payload, Some(patterned()));
}

// =============================================================================
// Reliable I/O Tests
// =============================================================================

#[test]
fn test_read_full_accumulates_partial_reads() {
    let mut reader = Trickle {
        data: Cursor::new((0..=255u8).collect()),
        chunk: 3,
    };
    let mut buf = [0u8; 256];

    read_full(&mut reader, &mut buf).unwrap();

    assert!(buf.iter().enumerate().all(|(i, &b)| b == i as u8));
}

#[test]
fn test_read_full_fails_on_zero_read() {
    let mut reader = Trickle {
        data: Cursor::new(vec![1, 2, 3]),
        chunk: 2,
    };
    let mut buf = [0u8; 5];

    let err = read_full(&mut reader, &mut buf).unwrap_err();

    assert!(is_transport(&err, ErrorKind::UnexpectedEof));
    assert_eq!(&buf[..3], &[1, 2, 3]);
}

#[test]
fn test_read_full_retries_interrupted() {
    let mut reader = Interrupting {
        data: Cursor::new(vec![9; 10]),
        interrupt_next: false,
    };
    let mut buf = [0u8; 10];

    read_full(&mut reader, &mut buf).unwrap();

    assert_eq!(buf, [9; 10]);
}

#[test]
fn test_write_full_accumulates_partial_writes() {
    let mut writer = Narrow {
        written: Vec::new(),
        chunk: 7,
        limit: usize::MAX,
    };
    let data: Vec<u8> = (0..100).collect();

    write_full(&mut writer, &data).unwrap();

    assert_eq!(writer.written, data);
}

#[test]
fn test_write_full_fails_on_zero_write() {
    let mut writer = Narrow {
        written: Vec::new(),
        chunk: 4,
        limit: 10,
    };

    let err = write_full(&mut writer, &[0u8; 20]).unwrap_err();

    assert!(is_transport(&err, ErrorKind::WriteZero));
    assert_eq!(writer.written.len(), 10);
}

// =============================================================================
// Stream Helper Tests
// =============================================================================

#[test]
fn test_request_over_stream() {
    let op = Operation::bare(Opcode::WriteBlock).encode();
    let block = patterned();
    let mut wire = Vec::new();

    write_request(&mut wire, &Request::new(op, Some(block))).unwrap();
    let request = read_request(&mut Cursor::new(wire)).unwrap();

    assert_eq!(request.op, op);
    assert_eq!(request.payload, Some(block));
}

#[test]
fn test_requests_with_and_without_payload_stay_framed() {
    let mount_op = Operation::bare(Opcode::Mount).encode();
    let seek_op = Operation::seek_to_block(9).encode();
    let mut wire = Vec::new();
    write_request(&mut wire, &Request::new(mount_op, Some(patterned()))).unwrap();
    write_request(&mut wire, &Request::new(seek_op, None)).unwrap();
    assert_eq!(wire.len(), MAX_PACKET_SIZE + HEADER_SIZE);

    let mut cursor = Cursor::new(wire);
    let first = read_request(&mut cursor).unwrap();
    let second = read_request(&mut cursor).unwrap();

    assert_eq!(first.op, mount_op);
    assert_eq!(first.payload, Some(patterned()));
    assert_eq!(second.op, seek_op);
    assert_eq!(second.payload, None);
}

#[test]
fn test_response_over_trickling_stream() {
    let op = Operation::bare(Opcode::ReadBlock).encode();
    let block = patterned();
    let mut wire = Vec::new();
    write_response(&mut wire, &Response::ok(op, Some(block))).unwrap();

    let mut reader = Trickle {
        data: Cursor::new(wire),
        chunk: 1,
    };
    let response = read_response(&mut reader).unwrap();

    assert_eq!(response.op, op);
    assert_eq!(response.payload, Some(block));
}

#[test]
fn test_back_to_back_responses() {
    let read_op = Operation::bare(Opcode::ReadBlock).encode();
    let seek_op = Operation::seek_to_block(4).encode();
    let mut wire = Vec::new();
    write_response(&mut wire, &Response::ok(read_op, Some(patterned()))).unwrap();
    write_response(&mut wire, &Response::ok(seek_op, None)).unwrap();

    let mut cursor = Cursor::new(wire);
    let first = read_response(&mut cursor).unwrap();
    let second = read_response(&mut cursor).unwrap();

    assert_eq!(first.op, read_op);
    assert!(first.payload.is_some());
    assert_eq!(second.op, seek_op);
    assert!(second.payload.is_none());
}

#[test]
fn test_truncated_payload_on_stream() {
    let op = Operation::bare(Opcode::ReadBlock).encode();
    let mut wire = Vec::new();
    write_response(&mut wire, &Response::ok(op, Some(patterned()))).unwrap();
    wire.truncate(HEADER_SIZE + 10);

    let err = read_response(&mut Cursor::new(wire)).unwrap_err();
    assert!(is_transport(&err, ErrorKind::UnexpectedEof));
}
