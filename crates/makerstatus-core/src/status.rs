//! Printer status queries
//!
//! Each query sends one fixed command payload and interprets the reply. A
//! reply whose status byte is anything but success becomes
//! [`ProtocolError::Device`] carrying the raw code; a reply too short for the
//! fields a query reads is [`ProtocolError::InvalidResponse`].

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::protocol::{
    Connection, HostQuery, Link, PacketBuilder, ProtocolError, ResponseCode, ToolQuery,
};

/// Name of the current build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildName {
    /// Build name with padding removed
    pub name: String,
}

/// Build state reported by the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildState {
    /// No build has been started since power-up
    NoBuildInitialized,
    /// Printing
    BuildRunning,
    /// Last build finished
    BuildFinishedNormally,
    /// Paused by the user
    BuildPaused,
    /// Last build was cancelled
    BuildCancelled,
    /// Sleeping between builds
    BuildSleeping,
}

impl BuildState {
    /// Decode a state code; `None` for codes newer firmware may add
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(BuildState::NoBuildInitialized),
            0x01 => Some(BuildState::BuildRunning),
            0x02 => Some(BuildState::BuildFinishedNormally),
            0x03 => Some(BuildState::BuildPaused),
            0x04 => Some(BuildState::BuildCancelled),
            0x05 => Some(BuildState::BuildSleeping),
            _ => None,
        }
    }

    /// Get the raw state code
    pub fn code(&self) -> u8 {
        match self {
            BuildState::NoBuildInitialized => 0x00,
            BuildState::BuildRunning => 0x01,
            BuildState::BuildFinishedNormally => 0x02,
            BuildState::BuildPaused => 0x03,
            BuildState::BuildCancelled => 0x04,
            BuildState::BuildSleeping => 0x05,
        }
    }

    /// Label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            BuildState::NoBuildInitialized => "Idle",
            BuildState::BuildRunning => "Build Running",
            BuildState::BuildFinishedNormally => "Build Complete",
            BuildState::BuildPaused => "Build Paused",
            BuildState::BuildCancelled => "Build Cancelled",
            BuildState::BuildSleeping => "No Build Active",
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State and elapsed time of the current build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatistics {
    /// Build state, `None` if the printer reported an unrecognized code
    pub state: Option<BuildState>,
    /// Elapsed hours
    pub hours: u8,
    /// Elapsed minutes
    pub minutes: u8,
}

impl BuildStatistics {
    /// State label; empty for an unrecognized state code
    pub fn state_label(&self) -> &'static str {
        self.state.map(|s| s.label()).unwrap_or("")
    }
}

/// Temperature of one toolhead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolheadTemperature {
    /// Tool index
    pub tool: u8,
    /// Whole degrees Celsius
    pub celsius: u16,
}

/// Check the status byte and return the reply body after it
pub fn check_response(reply: &[u8]) -> Result<&[u8], ProtocolError> {
    let (&status, body) = reply.split_first().ok_or(ProtocolError::InvalidResponse)?;
    let code = ResponseCode::from_code(status);
    if !code.is_success() {
        debug!(%code, "printer reported failure");
        return Err(ProtocolError::Device(code));
    }
    Ok(body)
}

/// Interpret a get-build-name reply.
///
/// The name is null padded; every non-zero byte is kept, in order.
pub fn parse_build_name(reply: &[u8]) -> Result<BuildName, ProtocolError> {
    let body = check_response(reply)?;
    let name = body
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    Ok(BuildName { name })
}

/// Interpret a get-build-statistics reply: state, hours, minutes
pub fn parse_build_statistics(reply: &[u8]) -> Result<BuildStatistics, ProtocolError> {
    let body = check_response(reply)?;
    match body {
        [state, hours, minutes, ..] => Ok(BuildStatistics {
            state: BuildState::from_code(*state),
            hours: *hours,
            minutes: *minutes,
        }),
        _ => Err(ProtocolError::InvalidResponse),
    }
}

/// Interpret a toolhead temperature reply: little-endian u16 degrees
pub fn parse_toolhead_temperature(
    tool: u8,
    reply: &[u8],
) -> Result<ToolheadTemperature, ProtocolError> {
    let body = check_response(reply)?;
    if body.len() < 2 {
        return Err(ProtocolError::InvalidResponse);
    }
    Ok(ToolheadTemperature {
        tool,
        celsius: LittleEndian::read_u16(&body[..2]),
    })
}

fn query_payload(query: HostQuery) -> Vec<u8> {
    PacketBuilder::new().query(query).into_payload()
}

fn tool_query_payload(tool: u8, query: ToolQuery) -> Vec<u8> {
    PacketBuilder::new().tool_query(tool, query).into_payload()
}

impl<L: Link> Connection<L> {
    /// Query the name of the current build
    pub async fn get_build_name(&mut self) -> Result<BuildName, ProtocolError> {
        let reply = self.send(&query_payload(HostQuery::GetBuildName)).await?;
        parse_build_name(&reply)
    }

    /// Query the state and elapsed time of the current build
    pub async fn get_build_statistics(&mut self) -> Result<BuildStatistics, ProtocolError> {
        let reply = self.send(&query_payload(HostQuery::GetBuildStatistics)).await?;
        parse_build_statistics(&reply)
    }

    /// Query the current temperature of a toolhead (tool 0 on single-extruder printers)
    pub async fn get_toolhead_temperature(
        &mut self,
        tool: u8,
    ) -> Result<ToolheadTemperature, ProtocolError> {
        let payload = tool_query_payload(tool, ToolQuery::GetToolheadTemperature);
        let reply = self.send(&payload).await?;
        parse_toolhead_temperature(tool, &reply)
    }

    /// Query the target temperature of a toolhead
    pub async fn get_toolhead_target_temperature(
        &mut self,
        tool: u8,
    ) -> Result<ToolheadTemperature, ProtocolError> {
        let payload = tool_query_payload(tool, ToolQuery::GetToolheadTargetTemperature);
        let reply = self.send(&payload).await?;
        parse_toolhead_temperature(tool, &reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_statistics_running() {
        let stats = parse_build_statistics(&[0x81, 0x01, 0x02, 0x1E]).unwrap();
        assert_eq!(
            stats,
            BuildStatistics {
                state: Some(BuildState::BuildRunning),
                hours: 2,
                minutes: 30,
            }
        );
        assert_eq!(stats.state_label(), "Build Running");
    }

    #[test]
    fn test_build_statistics_unknown_state() {
        let stats = parse_build_statistics(&[0x81, 0x09, 0x00, 0x05]).unwrap();
        assert_eq!(stats.state, None);
        assert_eq!(stats.state_label(), "");
        assert_eq!(stats.minutes, 5);
    }

    #[test]
    fn test_build_statistics_short_reply() {
        assert!(matches!(
            parse_build_statistics(&[0x81, 0x01, 0x02]).unwrap_err(),
            ProtocolError::InvalidResponse
        ));
    }

    #[test]
    fn test_build_name_skips_zero_bytes() {
        let name = parse_build_name(&[0x81, b'A', 0x00, b'B', 0x00]).unwrap();
        assert_eq!(name.name, "AB");
    }

    #[test]
    fn test_build_name_empty() {
        assert_eq!(parse_build_name(&[0x81]).unwrap().name, "");
        assert_eq!(parse_build_name(&[0x81, 0, 0, 0]).unwrap().name, "");
    }

    #[test]
    fn test_toolhead_temperature_little_endian() {
        let temp = parse_toolhead_temperature(0, &[0x81, 0x64, 0x00]).unwrap();
        assert_eq!(temp.celsius, 100);

        let temp = parse_toolhead_temperature(1, &[0x81, 0xE6, 0x00]).unwrap();
        assert_eq!(temp, ToolheadTemperature { tool: 1, celsius: 230 });

        let temp = parse_toolhead_temperature(0, &[0x81, 0x01, 0x01]).unwrap();
        assert_eq!(temp.celsius, 257);
    }

    #[test]
    fn test_device_error_carries_code() {
        let err = parse_build_name(&[0x85]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Device(ResponseCode::CommandNotSupported)
        ));
        assert_eq!(err.device_code(), Some(0x85));

        let err = parse_toolhead_temperature(0, &[0x8B, 0x64, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::Device(ResponseCode::OverheatState)));

        let err = parse_build_statistics(&[0x42, 0, 0, 0]).unwrap_err();
        assert_eq!(err.device_code(), Some(0x42));
    }

    #[test]
    fn test_empty_reply_is_invalid() {
        assert!(matches!(
            check_response(&[]).unwrap_err(),
            ProtocolError::InvalidResponse
        ));
    }

    #[test]
    fn test_build_state_codes() {
        for code in 0..=5u8 {
            let state = BuildState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert_eq!(BuildState::from_code(6), None);
        assert_eq!(BuildState::BuildSleeping.to_string(), "No Build Active");
    }

    #[test]
    fn test_query_payloads() {
        assert_eq!(query_payload(HostQuery::GetBuildName), vec![20]);
        assert_eq!(query_payload(HostQuery::GetBuildStatistics), vec![24]);
        assert_eq!(
            tool_query_payload(0, ToolQuery::GetToolheadTemperature),
            vec![10, 0, 2]
        );
        assert_eq!(
            tool_query_payload(1, ToolQuery::GetToolheadTargetTemperature),
            vec![10, 1, 32]
        );
    }
}
