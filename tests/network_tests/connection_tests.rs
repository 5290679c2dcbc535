//! Connection Tests
//!
//! Tests verify the client exchange over scripted streams:
//! - Request bytes on the wire
//! - Responses split across many short reads
//! - Peer close and short writes surface as transport failures
//! - Echo mismatch detection
//! - Device rejections are returned, not raised

use std::io::{self, Cursor, ErrorKind, Read, Write};

use jbodstore::geometry::{Block, BLOCK_SIZE};
use jbodstore::protocol::{
    encode_response, DeviceError, InfoCode, Opcode, Operation, Response, HEADER_SIZE,
};
use jbodstore::{CommandChannel, Connection, JbodError};

// =============================================================================
// Scripted Stream
// =============================================================================

/// Duplex stream replaying canned response bytes
struct ScriptedStream {
    incoming: Cursor<Vec<u8>>,
    outgoing: Vec<u8>,
    read_chunk: usize,
    write_chunk: usize,
    /// Writes stop being accepted after this many bytes
    write_limit: usize,
}

impl ScriptedStream {
    fn new(responses: &[Response]) -> Self {
        let mut incoming = Vec::new();
        for response in responses {
            incoming.extend_from_slice(&encode_response(response));
        }
        Self {
            incoming: Cursor::new(incoming),
            outgoing: Vec::new(),
            read_chunk: usize::MAX,
            write_chunk: usize::MAX,
            write_limit: usize::MAX,
        }
    }

    fn chunked(mut self, read_chunk: usize, write_chunk: usize) -> Self {
        self.read_chunk = read_chunk;
        self.write_chunk = write_chunk;
        self
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.read_chunk);
        self.incoming.read(&mut buf[..n])
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.write_limit - self.outgoing.len();
        let n = buf.len().min(self.write_chunk).min(room);
        self.outgoing.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn block_of(byte: u8) -> Block {
    [byte; BLOCK_SIZE]
}

fn connection(stream: ScriptedStream) -> Connection<ScriptedStream> {
    Connection::from_stream(stream, "scripted")
}

// =============================================================================
// Exchange Tests
// =============================================================================

#[test]
fn test_exchange_without_payload() {
    let op = Operation::seek_to_disk(2);
    let mut conn = connection(ScriptedStream::new(&[Response::ok(op.encode(), None)]));

    let response = conn.execute(op, None).unwrap();

    assert!(response.is_ok());
    assert_eq!(response.payload, None);

    let wire = conn.into_inner().outgoing;
    assert_eq!(wire.len(), HEADER_SIZE);
    assert_eq!(&wire[..4], &op.encode().to_be_bytes());
    assert_eq!(wire[4], 0);
}

#[test]
fn test_exchange_sends_write_payload() {
    let op = Operation::bare(Opcode::WriteBlock);
    let mut conn = connection(ScriptedStream::new(&[Response::ok(op.encode(), None)]));

    conn.execute(op, Some(&block_of(0xAB))).unwrap();

    let wire = conn.into_inner().outgoing;
    assert_eq!(wire.len(), HEADER_SIZE + BLOCK_SIZE);
    assert_eq!(wire[4], InfoCode::PAYLOAD);
    assert!(wire[HEADER_SIZE..].iter().all(|&b| b == 0xAB));
}

#[test]
fn test_exchange_flags_payload_on_any_opcode() {
    let op = Operation::bare(Opcode::Mount);
    let mut conn = connection(ScriptedStream::new(&[Response::ok(op.encode(), None)]));

    conn.execute(op, Some(&block_of(0x01))).unwrap();

    let wire = conn.into_inner().outgoing;
    assert_eq!(wire.len(), HEADER_SIZE + BLOCK_SIZE);
    assert_eq!(wire[4], InfoCode::PAYLOAD);
}

#[test]
fn test_exchange_receives_read_payload_in_fragments() {
    let op = Operation::bare(Opcode::ReadBlock);
    let stream = ScriptedStream::new(&[Response::ok(op.encode(), Some(block_of(0x5A)))])
        .chunked(1, 3);
    let mut conn = connection(stream);

    let response = conn.execute(op, None).unwrap();

    assert_eq!(response.payload, Some(block_of(0x5A)));
    assert_eq!(conn.into_inner().outgoing.len(), HEADER_SIZE);
}

#[test]
fn test_sequential_exchanges_stay_framed() {
    let seek = Operation::seek_to_block(7);
    let read = Operation::bare(Opcode::ReadBlock);
    let stream = ScriptedStream::new(&[
        Response::ok(seek.encode(), None),
        Response::ok(read.encode(), Some(block_of(3))),
        Response::ok(seek.encode(), None),
    ])
    .chunked(4, 2);
    let mut conn = connection(stream);

    assert!(conn.execute(seek, None).unwrap().payload.is_none());
    assert_eq!(conn.execute(read, None).unwrap().payload, Some(block_of(3)));
    assert!(conn.execute(seek, None).unwrap().payload.is_none());
}

#[test]
fn test_device_rejection_is_a_response() {
    let op = Operation::seek_to_disk(0);
    let mut conn = connection(ScriptedStream::new(&[Response::error(
        op.encode(),
        DeviceError::Unmounted,
    )]));

    let response = conn.execute(op, None).unwrap();

    assert!(!response.is_ok());
    assert_eq!(response.device_error(), Some(DeviceError::Unmounted));
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_peer_closed_before_response() {
    let mut conn = connection(ScriptedStream::new(&[]));

    let err = conn.execute(Operation::bare(Opcode::Mount), None).unwrap_err();

    assert!(matches!(err, JbodError::Transport(ref e) if e.kind() == ErrorKind::UnexpectedEof));
}

#[test]
fn test_peer_closed_mid_payload() {
    let op = Operation::bare(Opcode::ReadBlock);
    let mut stream = ScriptedStream::new(&[Response::ok(op.encode(), Some(block_of(1)))]);
    stream.incoming.get_mut().truncate(HEADER_SIZE + 100);
    let mut conn = connection(stream);

    let err = conn.execute(op, None).unwrap_err();

    assert!(matches!(err, JbodError::Transport(_)));
}

#[test]
fn test_short_write_is_transport_failure() {
    let op = Operation::bare(Opcode::WriteBlock);
    let mut stream = ScriptedStream::new(&[Response::ok(op.encode(), None)]);
    stream.write_limit = 50;
    let mut conn = connection(stream);

    let err = conn.execute(op, Some(&block_of(9))).unwrap_err();

    assert!(matches!(err, JbodError::Transport(ref e) if e.kind() == ErrorKind::WriteZero));
}

#[test]
fn test_echo_mismatch_is_protocol_error() {
    let sent = Operation::seek_to_block(1);
    let echoed = Operation::seek_to_block(2);
    let mut conn = connection(ScriptedStream::new(&[Response::ok(echoed.encode(), None)]));

    let err = conn.execute(sent, None).unwrap_err();

    assert!(matches!(err, JbodError::Protocol(_)));
}
