//! Network Module
//!
//! Client connection to the device, and the TCP emulator that stands in
//! for the device in tests and local runs.
//!
//! ## Architecture
//! - `Connection`: one stream, strictly one request/response at a time
//! - `DeviceServer`: acceptor thread, one thread per session
//! - Every session executes against one shared `JbodDevice`

mod connection;
mod server;
mod session;

pub use connection::Connection;
pub use server::{DeviceServer, ServerHandle};
pub use session::Session;

use crate::error::Result;
use crate::geometry::Block;
use crate::protocol::{Operation, Response};

/// Something that executes device operations one at a time
///
/// Implemented by the network `Connection` and by an in-process
/// `JbodDevice`. The returned response carries the device's verdict in its
/// info code; `Err` means the exchange itself failed.
pub trait CommandChannel {
    fn execute(&mut self, op: Operation, payload: Option<&Block>) -> Result<Response>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for Box<C> {
    fn execute(&mut self, op: Operation, payload: Option<&Block>) -> Result<Response> {
        (**self).execute(op, payload)
    }
}

impl CommandChannel for crate::device::JbodDevice {
    fn execute(&mut self, op: Operation, payload: Option<&Block>) -> Result<Response> {
        Ok(self.apply(op, payload, op.encode()))
    }
}
