//! Request and response definitions
//!
//! Packets exchanged with the device, plus the info byte that carries
//! payload presence and command status.

use thiserror::Error;

use crate::geometry::Block;

/// The info byte of a packet header
///
/// ```text
///   7           2   1         0
/// ┌───────────────┬─────────┬────────┐
/// │ error code (6)│ payload │ failed │
/// └───────────────┴─────────┴────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfoCode(pub u8);

impl InfoCode {
    pub const FAILED: u8 = 0b0000_0001;
    pub const PAYLOAD: u8 = 0b0000_0010;
    const CODE_SHIFT: u8 = 2;

    /// Info byte for a request
    pub fn request(has_payload: bool) -> Self {
        if has_payload {
            Self(Self::PAYLOAD)
        } else {
            Self(0)
        }
    }

    /// Info byte for a successful response
    pub fn ok(has_payload: bool) -> Self {
        Self::request(has_payload)
    }

    /// Info byte for a failed response
    pub fn failed(error: DeviceError) -> Self {
        Self(Self::FAILED | ((error as u8) << Self::CODE_SHIFT))
    }

    pub fn has_payload(&self) -> bool {
        self.0 & Self::PAYLOAD != 0
    }

    pub fn is_failure(&self) -> bool {
        self.0 & Self::FAILED != 0
    }

    /// Device error carried in the upper bits, if the command failed
    pub fn error(&self) -> Option<DeviceError> {
        if self.is_failure() {
            Some(DeviceError::from_code(self.0 >> Self::CODE_SHIFT))
        } else {
            None
        }
    }
}

/// Failure reasons reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(u8)]
pub enum DeviceError {
    #[error("unknown device error")]
    Unknown = 0,
    #[error("device not mounted")]
    Unmounted = 1,
    #[error("device already mounted")]
    AlreadyMounted = 2,
    #[error("device already unmounted")]
    AlreadyUnmounted = 3,
    #[error("bad command")]
    BadCommand = 4,
    #[error("bad disk number")]
    BadDisk = 5,
    #[error("bad block number")]
    BadBlock = 6,
    #[error("write permission not granted")]
    WriteDenied = 7,
    #[error("write permission already granted")]
    AlreadyGranted = 8,
    #[error("write permission already revoked")]
    AlreadyRevoked = 9,
}

impl DeviceError {
    /// Decode a 6-bit error code; unrecognised codes map to `Unknown`
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => DeviceError::Unmounted,
            2 => DeviceError::AlreadyMounted,
            3 => DeviceError::AlreadyUnmounted,
            4 => DeviceError::BadCommand,
            5 => DeviceError::BadDisk,
            6 => DeviceError::BadBlock,
            7 => DeviceError::WriteDenied,
            8 => DeviceError::AlreadyGranted,
            9 => DeviceError::AlreadyRevoked,
            _ => DeviceError::Unknown,
        }
    }
}

/// A request packet sent to the device
#[derive(Debug, Clone)]
pub struct Request {
    /// Packed operation word
    pub op: u32,

    /// Block payload (write-block only)
    pub payload: Option<Block>,
}

impl Request {
    pub fn new(op: u32, payload: Option<Block>) -> Self {
        Self { op, payload }
    }
}

/// A response packet received from the device
#[derive(Debug, Clone)]
pub struct Response {
    /// Echo of the request's operation word
    pub op: u32,

    pub info: InfoCode,

    /// Block payload (read-block only)
    pub payload: Option<Block>,
}

impl Response {
    /// Create a success response with optional payload
    pub fn ok(op: u32, payload: Option<Block>) -> Self {
        Self {
            op,
            info: InfoCode::ok(payload.is_some()),
            payload,
        }
    }

    /// Create a failure response
    pub fn error(op: u32, error: DeviceError) -> Self {
        Self {
            op,
            info: InfoCode::failed(error),
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.info.is_failure()
    }

    /// The device-reported failure, if any
    pub fn device_error(&self) -> Option<DeviceError> {
        self.info.error()
    }
}
