//! # RC Rover
//!
//! Drive a two-motor rover from an iBUS or S-Bus RC receiver.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the configuration
//!    - Set up logging with tracing subscriber
//!    - Open the receiver serial port (or a recorded stream with `--replay`)
//!
//! 2. **Main Loop**
//!    - Read whatever bytes the receiver produced
//!    - Decode frames and run one drive cycle per frame
//!    - Reopen the port after read failures, with motors stopped meanwhile
//!
//! 3. **Graceful Shutdown**
//!    - Stop both motors with brakes engaged
//!    - Log totals
//!
//! Expected output:
//! ```text
//! INFO rc_rover: RC Rover v0.1.0 starting...
//! INFO rc_rover::serial: Opened receiver at /dev/ttyUSB0 (115200 baud, parity None, stop bits Two)
//! INFO rc_rover: Processed 1000 frames
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rc_rover::config::Config;
use rc_rover::drive::{Actuator, TracingActuator};
use rc_rover::rc::protocol::Protocol;
use rc_rover::runtime::ControlContext;
use rc_rover::serial::{ReplayTransport, SerialTransport, Transport};
use rc_rover::telemetry::jsonl::JsonlSink;
use rc_rover::telemetry::{EventSink, FanoutSink, TracingSink};

/// Number of frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 1000;

/// Bytes handed to the decoder per read in replay mode
const REPLAY_CHUNK_BYTES: usize = 64;

/// File name prefix of the rolling application log
const LOG_FILE_PREFIX: &str = "rc-rover.log";

#[derive(Parser, Debug)]
#[command(name = "rc-rover", version, about)]
struct Cli {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Receiver serial port, overriding the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// Receiver protocol (ibus or sbus), overriding the configuration
    #[arg(long)]
    protocol: Option<Protocol>,

    /// Decode a recorded byte stream instead of opening the serial port
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Also write logs to a daily rolling file in the telemetry log directory
    #[arg(long)]
    log_file: bool,
}

impl Cli {
    /// Load the configuration and apply the command line overrides
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(protocol) = self.protocol {
            config.receiver.protocol = protocol;
            config.serial.baud_rate = None;
        }
        config.validate().context("Invalid configuration after command line overrides")?;
        Ok(config)
    }
}

fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}

fn build_sink(config: &Config) -> Result<FanoutSink> {
    let mut sink = FanoutSink::new().with(TracingSink);
    if config.telemetry.enabled {
        let jsonl = JsonlSink::new(&config.telemetry).context("Failed to open telemetry log")?;
        info!("Telemetry logging to {}", jsonl.current_path().display());
        sink.push(jsonl);
    }
    Ok(sink)
}

/// Main entry point for RC Rover
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or is invalid
/// - The telemetry log or replay file cannot be opened
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let log_dir = cli.log_file.then(|| PathBuf::from(&config.telemetry.log_dir));
    let _log_guard = init_logging(log_dir.as_deref());

    info!("RC Rover v{} starting...", env!("CARGO_PKG_VERSION"));

    let sink = build_sink(&config)?;
    let mut ctx = ControlContext::new(&config, TracingActuator::new(&config.motors), sink);
    ctx.force_safe();

    let frames = match &cli.replay {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read replay file {}", path.display()))?;
            info!("Replaying {} bytes from {}", data.len(), path.display());
            run_replay(&mut ctx, ReplayTransport::new(data, REPLAY_CHUNK_BYTES)).await?
        }
        None => run_serial(&mut ctx, &config).await,
    };

    ctx.force_safe();
    let stats = ctx.decoder_stats();
    info!(
        "Total frames: {} ({} rejected, {} bytes discarded)",
        frames, stats.rejected, stats.bytes_discarded
    );
    Ok(())
}

/// Decode a recorded stream to the end
async fn run_replay<A, S>(ctx: &mut ControlContext<A, S>, mut transport: ReplayTransport) -> Result<u64>
where
    A: Actuator,
    S: EventSink,
{
    let mut frames: u64 = 0;
    while !transport.is_finished() {
        let bytes = transport.read_available().await?;
        frames += ctx.ingest(&bytes, Instant::now()) as u64;
    }
    Ok(frames)
}

/// Read from the receiver until Ctrl+C, reopening the port after failures
async fn run_serial<A, S>(ctx: &mut ControlContext<A, S>, config: &Config) -> u64
where
    A: Actuator,
    S: EventSink,
{
    let reconnect = Duration::from_millis(config.serial.reconnect_interval_ms);
    let protocol = config.receiver.protocol;
    let mut frames: u64 = 0;
    let mut last_log_count: u64 = 0;

    info!("Press Ctrl+C to exit");

    loop {
        let mut transport = match SerialTransport::open(&config.serial, protocol) {
            Ok(transport) => transport,
            Err(e) => {
                warn!("{}; retrying in {}ms", e, reconnect.as_millis());
                tokio::select! {
                    _ = sleep(reconnect) => continue,
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                        return frames;
                    }
                }
            }
        };

        loop {
            let read = tokio::select! {
                read = transport.read_available() => Some(read),
                _ = tokio::signal::ctrl_c() => None,
            };

            match read {
                Some(Ok(bytes)) => {
                    frames += ctx.ingest(&bytes, Instant::now()) as u64;
                    if frames - last_log_count >= LOG_INTERVAL_FRAMES {
                        info!("Processed {} frames ({})", frames, ctx.arm_state());
                        last_log_count = frames;
                    }
                }
                Some(Err(e)) => {
                    warn!("Receiver read failed on {}: {}", transport.device_path(), e);
                    ctx.force_safe();
                    break;
                }
                None => {
                    info!("Received Ctrl+C, shutting down...");
                    return frames;
                }
            }
        }
    }
}
