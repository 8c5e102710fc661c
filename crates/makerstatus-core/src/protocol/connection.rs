//! Connection management
//!
//! Handles the connection lifecycle and owns the command transport.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_serial::SerialStream;
use tracing::{debug, info};

use super::{open_port, CommandTransport, Link, ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Opening the port
    Connecting,
    /// Connected and ready
    Connected,
    /// Opening the port failed
    Error,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Response timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    /// Response timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Printer connection.
///
/// Status queries (see [`crate::status`]) are methods on this type. Any
/// query on a closed connection fails with [`ProtocolError::NotConnected`].
#[derive(Debug)]
pub struct Connection<L = SerialStream> {
    config: ConnectionConfig,
    state: ConnectionState,
    transport: Option<CommandTransport<L>>,
}

impl Connection<SerialStream> {
    /// Create a closed connection for the configured serial port
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            transport: None,
        }
    }

    /// Open the configured serial port.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(&mut self) -> Result<(), ProtocolError> {
        if self.transport.is_some() {
            return Err(ProtocolError::AlreadyConnected);
        }

        self.state = ConnectionState::Connecting;
        match open_port(&self.config.port_name, Some(self.config.baud_rate)) {
            Ok(stream) => {
                self.transport = Some(CommandTransport::new(stream));
                self.state = ConnectionState::Connected;
                info!(
                    port = %self.config.port_name,
                    baud = self.config.baud_rate,
                    "connected to printer"
                );
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Error;
                Err(e)
            }
        }
    }

    /// Close and reopen the serial port
    pub async fn reset(&mut self) -> Result<(), ProtocolError> {
        self.close().await;
        self.open()
    }
}

impl<L: Link> Connection<L> {
    /// Create an open connection over an existing link
    pub fn with_link(link: L, config: ConnectionConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Connected,
            transport: Some(CommandTransport::new(link)),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check whether a link is attached
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Close the link. Closing a closed connection does nothing.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown().await {
                debug!(error = %e, "error shutting down link");
            }
            info!(port = %self.config.port_name, "disconnected from printer");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Clear an abandoned request and drop buffered input without reopening
    pub async fn resync(&mut self) -> Result<(), ProtocolError> {
        self.transport_mut()?.reset().await
    }

    /// Send a raw command payload and return the raw reply payload
    pub async fn send(&mut self, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let timeout = self.config.timeout();
        self.transport_mut()?.send(payload, timeout).await
    }

    fn transport_mut(&mut self) -> Result<&mut CommandTransport<L>, ProtocolError> {
        self.transport.as_mut().ok_or(ProtocolError::NotConnected)
    }
}
