//! Device Connection
//!
//! The client side of the wire protocol: one duplex stream, one command in
//! flight at a time.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::config::Config;
use crate::error::{JbodError, Result};
use crate::geometry::Block;
use crate::protocol::{read_response, write_request, Operation, Request, Response};
use super::CommandChannel;

/// An open connection to the remote device
///
/// Generic over the stream so the exchange logic can run over any
/// `Read + Write` transport.
pub struct Connection<S = TcpStream> {
    stream: S,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection<TcpStream> {
    /// Connect to the device at `config.device_addr`
    pub fn connect(config: &Config) -> Result<Self> {
        let stream = TcpStream::connect(&config.device_addr)?;
        stream.set_nodelay(config.nodelay)?;

        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| config.device_addr.clone());

        tracing::debug!("Connected to device at {}", peer_addr);
        Ok(Self { stream, peer_addr })
    }

    /// Close the connection
    pub fn disconnect(self) -> Result<()> {
        tracing::debug!("Disconnecting from device at {}", self.peer_addr);
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Peer already gone
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an already-open stream
    pub fn from_stream(stream: S, peer_addr: impl Into<String>) -> Self {
        Self {
            stream,
            peer_addr: peer_addr.into(),
        }
    }

    /// Send one request and wait for its response
    ///
    /// Transport failures at either stage are returned as errors. A command
    /// the device rejects is still a successful exchange; its status is in
    /// the response info code.
    pub fn exchange(&mut self, op: u32, payload: Option<&Block>) -> Result<Response> {
        let request = Request::new(op, payload.copied());
        write_request(&mut self.stream, &request)?;

        let response = read_response(&mut self.stream)?;
        if response.op != op {
            tracing::warn!(
                "Response from {} echoed 0x{:08x}, expected 0x{:08x}",
                self.peer_addr,
                response.op,
                op
            );
            return Err(JbodError::Protocol(format!(
                "operation echo mismatch: sent 0x{:08x}, got 0x{:08x}",
                op, response.op
            )));
        }

        Ok(response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> CommandChannel for Connection<S> {
    fn execute(&mut self, op: Operation, payload: Option<&Block>) -> Result<Response> {
        tracing::trace!("-> {} {:?}", self.peer_addr, op);
        let response = self.exchange(op.encode(), payload)?;
        tracing::trace!("<- {} info=0x{:02x}", self.peer_addr, response.info.0);
        Ok(response)
    }
}
