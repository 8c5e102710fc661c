//! # makerstatus Core Library
//!
//! Host-side client for the MakerBot s3g host protocol.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Packet framing with the iButton/Maxim CRC8 checksum
//! - An incremental, byte-at-a-time packet decoder
//! - A request/response transport with a per-request timeout
//! - Status queries (build name, build statistics, toolhead temperature)
//! - Serial port discovery for MakerBot devices
//!
//! ## Example
//!
//! ```rust,ignore
//! use makerstatus_core::protocol::{Connection, ConnectionConfig};
//!
//! let mut conn = Connection::new(ConnectionConfig {
//!     port_name: "/dev/ttyACM0".into(),
//!     ..Default::default()
//! });
//! conn.open()?;
//!
//! let name = conn.get_build_name().await?;
//! let stats = conn.get_build_statistics().await?;
//! println!("{}: {} ({}h{}m)", name.name, stats.state_label(), stats.hours, stats.minutes);
//! ```

pub mod protocol;
pub mod status;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        Connection, ConnectionConfig, ConnectionState, ErrorKind, ProtocolError, ResponseCode,
    };
    pub use crate::status::{BuildName, BuildState, BuildStatistics, ToolheadTemperature};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
