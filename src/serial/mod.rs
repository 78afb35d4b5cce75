//! # Serial Communication Module
//!
//! Handles the serial link from the RC receiver.
//!
//! This module handles:
//! - Opening the receiver port with the framing of the selected protocol
//!   (iBUS 115200 8N2, S-Bus 100000 8E2)
//! - Async reads with a poll timeout
//! - Replaying recorded streams through the same interface

pub mod port_trait;

pub use port_trait::{ReplayTransport, Transport};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{Result, RoverError};
use crate::rc::protocol::Protocol;

/// Bytes requested from the port per read
const READ_CHUNK: usize = 256;

/// Line settings for a receiver protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
}

impl LineSettings {
    /// Standard framing of `protocol` at `baud_rate`
    #[must_use]
    pub fn for_protocol(protocol: Protocol, baud_rate: u32) -> Self {
        let parity = match protocol {
            Protocol::Ibus => tokio_serial::Parity::None,
            Protocol::Sbus => tokio_serial::Parity::Even,
        };
        Self {
            baud_rate,
            parity,
            stop_bits: tokio_serial::StopBits::Two,
        }
    }
}

/// RC receiver serial port
pub struct SerialTransport {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    poll_timeout: Duration,
    buf: BytesMut,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open the configured receiver port
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_rover::config::Config;
    /// use rc_rover::serial::SerialTransport;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let config = Config::default();
    ///     let serial = SerialTransport::open(&config.serial, config.receiver.protocol)?;
    ///     println!("Receiver on {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig, protocol: Protocol) -> Result<Self> {
        let line = LineSettings::for_protocol(protocol, config.effective_baud_rate(protocol));
        Self::open_with_paths(
            &[config.port.as_str()],
            line,
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Open the first of `paths` that succeeds
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::SerialPortNotFound`] listing every path tried
    pub fn open_with_paths(paths: &[&str], line: LineSettings, poll_timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, line) {
                Ok(port) => {
                    info!(
                        "Opened receiver at {} ({} baud, parity {:?}, stop bits {:?})",
                        path, line.baud_rate, line.parity, line.stop_bits
                    );
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                        poll_timeout,
                        buf: BytesMut::with_capacity(READ_CHUNK),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(RoverError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, line: LineSettings) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, line.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(line.parity)
            .stop_bits(line.stop_bits)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RoverError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Device path of the opened port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn read_available(&mut self) -> io::Result<Bytes> {
        self.buf.reserve(READ_CHUNK);
        match tokio::time::timeout(self.poll_timeout, self.port.read_buf(&mut self.buf)).await {
            Ok(Ok(0)) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "serial port closed")),
            Ok(Ok(_)) => Ok(self.buf.split().freeze()),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Bytes::new()),
        }
    }
}
