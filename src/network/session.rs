//! Emulator Session Handler
//!
//! Serves one client connection against the shared device.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::JbodDevice;
use crate::error::{JbodError, Result};
use crate::protocol::{read_request, write_response, Request, Response};

/// Handles a single client connection
pub struct Session {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    device: Arc<Mutex<JbodDevice>>,

    /// Image saved when the session ends
    image_path: Option<PathBuf>,

    /// Peer address for logging
    peer_addr: String,
}

/// True for errors that just mean the client went away
fn is_disconnect(error: &JbodError) -> bool {
    match error {
        JbodError::Transport(e) => matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

impl Session {
    /// Create a new session handler
    pub fn new(
        stream: TcpStream,
        device: Arc<Mutex<JbodDevice>>,
        image_path: Option<PathBuf>,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            device,
            image_path,
            peer_addr,
        })
    }

    /// Serve requests until the client disconnects (blocking)
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Session established from {}", self.peer_addr);

        let result = self.serve();

        // Save whatever the session changed, even after an error
        self.persist();
        result
    }

    fn serve(&mut self) -> Result<()> {
        loop {
            // Read next request
            let request = match read_request(&mut self.reader) {
                Ok(request) => request,
                Err(ref e) if is_disconnect(e) => {
                    // Client went away between requests
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            // Execute against the shared device
            let response = self.execute(&request);

            // Send response
            if let Err(e) = write_response(&mut self.writer, &response) {
                if is_disconnect(&e) {
                    tracing::debug!(
                        "Client {} disconnected before response could be sent",
                        self.peer_addr
                    );
                    return Ok(());
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    fn execute(&self, request: &Request) -> Response {
        let response = self.device.lock().handle(request);
        tracing::trace!(
            "{}: op=0x{:08x} info=0x{:02x}",
            self.peer_addr,
            request.op,
            response.info.0
        );
        response
    }

    fn persist(&self) {
        if let Some(path) = &self.image_path {
            // Saves are serialized on the device lock
            let device = self.device.lock();
            if let Err(e) = device.to_image().save(path) {
                tracing::error!("Failed to save disk image {}: {}", path.display(), e);
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
