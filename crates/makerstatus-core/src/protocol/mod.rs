//! Serial Protocol Communication
//!
//! Implements the MakerBot s3g host protocol used to talk to the printer's
//! motherboard over USB serial.
//!
//! Every command is a single framed packet and is answered by exactly one
//! framed response packet.

pub mod commands;
mod connection;
pub mod crc;
mod error;
mod packet;
pub mod serial;
mod transport;

pub use commands::{HostQuery, ResponseCode, ToolQuery};
pub use connection::{Connection, ConnectionConfig, ConnectionState};
pub use error::{ErrorKind, ProtocolError};
pub use packet::{decode, encode, DecoderState, Packet, PacketBuilder, PacketDecoder};
pub use serial::{find_makerbot_ports, list_ports, open_port, PortInfo};
pub use transport::{CommandTransport, Link};

/// Default baud rate for the printer's USB serial port
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 250;

/// First byte of every packet
pub const START_BYTE: u8 = 0xD5;

/// Maximum payload length in bytes
pub const MAX_PAYLOAD_LENGTH: usize = 32;

/// Framing overhead: start byte, length byte and checksum
pub const PACKET_OVERHEAD: usize = 3;
