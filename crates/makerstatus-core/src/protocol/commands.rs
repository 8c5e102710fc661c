//! Protocol commands
//!
//! Opcodes and response codes of the s3g host protocol that this crate uses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-level query commands (first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostQuery {
    /// Forward a query to a tool (extruder) controller
    ToolQuery,

    /// Name of the current build
    GetBuildName,

    /// State and elapsed time of the current build
    GetBuildStatistics,
}

impl HostQuery {
    /// Get the opcode byte
    pub fn opcode(&self) -> u8 {
        match self {
            HostQuery::ToolQuery => 10,
            HostQuery::GetBuildName => 20,
            HostQuery::GetBuildStatistics => 24,
        }
    }

    /// Look up a query by opcode
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            10 => Some(HostQuery::ToolQuery),
            20 => Some(HostQuery::GetBuildName),
            24 => Some(HostQuery::GetBuildStatistics),
            _ => None,
        }
    }

    /// Human-readable operation name
    pub fn name(&self) -> &'static str {
        match self {
            HostQuery::ToolQuery => "tool query",
            HostQuery::GetBuildName => "get build name",
            HostQuery::GetBuildStatistics => "get build statistics",
        }
    }
}

/// Tool-level query commands, sent inside a [`HostQuery::ToolQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolQuery {
    /// Current toolhead temperature
    GetToolheadTemperature,

    /// Target toolhead temperature
    GetToolheadTargetTemperature,
}

impl ToolQuery {
    /// Get the sub-opcode byte
    pub fn opcode(&self) -> u8 {
        match self {
            ToolQuery::GetToolheadTemperature => 2,
            ToolQuery::GetToolheadTargetTemperature => 32,
        }
    }

    /// Look up a tool query by sub-opcode
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            2 => Some(ToolQuery::GetToolheadTemperature),
            32 => Some(ToolQuery::GetToolheadTargetTemperature),
            _ => None,
        }
    }

    /// Human-readable operation name
    pub fn name(&self) -> &'static str {
        match self {
            ToolQuery::GetToolheadTemperature => "get toolhead temperature",
            ToolQuery::GetToolheadTargetTemperature => "get toolhead target temperature",
        }
    }
}

/// Name the operation a request payload performs, for diagnostics.
///
/// Tool queries are `[10, tool, sub-opcode]`; the sub-opcode names them.
pub fn operation_name(payload: &[u8]) -> String {
    match payload.first().copied().and_then(HostQuery::from_opcode) {
        Some(HostQuery::ToolQuery) => match payload.get(2).copied().and_then(ToolQuery::from_opcode)
        {
            Some(query) => query.name().to_string(),
            None => HostQuery::ToolQuery.name().to_string(),
        },
        Some(query) => query.name().to_string(),
        None => match payload.first() {
            Some(opcode) => format!("command {}", opcode),
            None => "empty command".to_string(),
        },
    }
}

/// Response status byte (first byte of every reply payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    /// Generic packet error (0x80)
    GenericPacketError,
    /// Command succeeded (0x81)
    Success,
    /// Action buffer overflow (0x82)
    ActionBufferOverflow,
    /// Printer saw a CRC mismatch on our packet (0x83)
    CrcMismatch,
    /// Command not supported (0x85)
    CommandNotSupported,
    /// Downstream (tool) timeout (0x87)
    DownstreamTimeout,
    /// Tool lock timeout (0x88)
    ToolLockTimeout,
    /// Build was cancelled (0x89)
    CancelBuild,
    /// A build is running from the printer's own storage (0x8A)
    ActiveLocalBuild,
    /// Printer is in an overheat state (0x8B)
    OverheatState,
    /// Any other status byte
    Unknown(u8),
}

impl ResponseCode {
    /// Decode a status byte
    pub fn from_code(code: u8) -> Self {
        match code {
            0x80 => ResponseCode::GenericPacketError,
            0x81 => ResponseCode::Success,
            0x82 => ResponseCode::ActionBufferOverflow,
            0x83 => ResponseCode::CrcMismatch,
            0x85 => ResponseCode::CommandNotSupported,
            0x87 => ResponseCode::DownstreamTimeout,
            0x88 => ResponseCode::ToolLockTimeout,
            0x89 => ResponseCode::CancelBuild,
            0x8A => ResponseCode::ActiveLocalBuild,
            0x8B => ResponseCode::OverheatState,
            other => ResponseCode::Unknown(other),
        }
    }

    /// Get the raw status byte
    pub fn code(&self) -> u8 {
        match self {
            ResponseCode::GenericPacketError => 0x80,
            ResponseCode::Success => 0x81,
            ResponseCode::ActionBufferOverflow => 0x82,
            ResponseCode::CrcMismatch => 0x83,
            ResponseCode::CommandNotSupported => 0x85,
            ResponseCode::DownstreamTimeout => 0x87,
            ResponseCode::ToolLockTimeout => 0x88,
            ResponseCode::CancelBuild => 0x89,
            ResponseCode::ActiveLocalBuild => 0x8A,
            ResponseCode::OverheatState => 0x8B,
            ResponseCode::Unknown(code) => *code,
        }
    }

    /// Check if this is the success code
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseCode::Success)
    }

    fn description(&self) -> &'static str {
        match self {
            ResponseCode::GenericPacketError => "generic packet error",
            ResponseCode::Success => "success",
            ResponseCode::ActionBufferOverflow => "action buffer overflow",
            ResponseCode::CrcMismatch => "CRC mismatch",
            ResponseCode::CommandNotSupported => "command not supported",
            ResponseCode::DownstreamTimeout => "downstream timeout",
            ResponseCode::ToolLockTimeout => "tool lock timeout",
            ResponseCode::CancelBuild => "cancel build",
            ResponseCode::ActiveLocalBuild => "active local build",
            ResponseCode::OverheatState => "overheat state",
            ResponseCode::Unknown(_) => "unknown response code",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04x})", self.description(), self.code())
    }
}
