//! Protocol errors

use std::time::Duration;

use thiserror::Error;

use super::ResponseCode;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Packet header mismatch: expected 0xd5, got {0:#04x}")]
    HeaderMismatch(u8),

    #[error("Packet announces payload length {0}, maximum is 32")]
    LengthExceeded(usize),

    #[error("Payload of {0} bytes is too long to send, maximum is 32")]
    PayloadTooLong(usize),

    #[error("Packet length mismatch: more payload bytes than announced")]
    LengthMismatch,

    #[error("CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Incomplete packet: stream ended after {received} bytes")]
    IncompletePacket { received: usize },

    #[error("Invalid response from printer")]
    InvalidResponse,

    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    Timeout { operation: String, timeout: Duration },

    #[error("Printer returned {0}")]
    Device(ResponseCode),

    #[error("Link error: {0}")]
    Link(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Not connected to printer")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("A previous request was abandoned before its reply arrived; reset the transport")]
    RequestInFlight,

    #[error("Packet decoder must be reset before decoding more bytes")]
    DecoderNotReset,

    #[error("Port not found: {0}")]
    PortNotFound(String),
}

/// Broad category of a [`ProtocolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Corrupted or misaligned byte stream
    Framing,
    /// No complete valid packet arrived before the deadline
    Timeout,
    /// A well-formed reply reporting a device-side failure
    Device,
    /// The underlying byte stream failed
    Link,
    /// The API was used incorrectly
    Usage,
}

impl ProtocolError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::HeaderMismatch(_)
            | ProtocolError::LengthExceeded(_)
            | ProtocolError::LengthMismatch
            | ProtocolError::ChecksumMismatch { .. }
            | ProtocolError::IncompletePacket { .. }
            | ProtocolError::InvalidResponse => ErrorKind::Framing,
            ProtocolError::Timeout { .. } => ErrorKind::Timeout,
            ProtocolError::Device(_) => ErrorKind::Device,
            ProtocolError::Link(_) | ProtocolError::SerialError(_) => ErrorKind::Link,
            ProtocolError::NotConnected
            | ProtocolError::AlreadyConnected
            | ProtocolError::RequestInFlight
            | ProtocolError::DecoderNotReset
            | ProtocolError::PayloadTooLong(_)
            | ProtocolError::PortNotFound(_) => ErrorKind::Usage,
        }
    }

    /// Raw status byte for device errors
    pub fn device_code(&self) -> Option<u8> {
        match self {
            ProtocolError::Device(code) => Some(code.code()),
            _ => None,
        }
    }
}
