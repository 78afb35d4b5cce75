//! JSONL telemetry writer with file rotation.
//!
//! One event per line, each prefixed with an RFC 3339 timestamp. A new file
//! is started after `max_records_per_file` records; only the newest
//! `max_files_to_keep` files are retained.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::event::Event;
use super::sink::EventSink;
use crate::config::TelemetryConfig;
use crate::error::Result;

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a Event,
}

/// Rotating JSONL event log.
pub struct JsonlSink {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: BufWriter<File>,
    current_path: PathBuf,
    records_in_file: usize,
    sequence: u32,
}

impl JsonlSink {
    /// Create the log directory if needed and open the first file
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;

        let (current_path, writer) = open_file(&dir, 0, Local::now())?;
        let mut sink = Self {
            dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer,
            current_path,
            records_in_file: 0,
            sequence: 0,
        };
        sink.prune()?;
        Ok(sink)
    }

    /// Path of the file currently being written
    #[must_use]
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Write one event as a JSON line
    ///
    /// # Errors
    ///
    /// Returns error if serialization, writing, or rotation fails
    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        if self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = Record {
            timestamp: Local::now().to_rfc3339(),
            event,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records_in_file += 1;
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.sequence = self.sequence.wrapping_add(1);
        let (path, writer) = open_file(&self.dir, self.sequence, Local::now())?;
        debug!("Telemetry rotated to {}", path.display());
        self.writer = writer;
        self.current_path = path;
        self.records_in_file = 0;
        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_log_file(path))
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        // Names embed a sortable timestamp and sequence number
        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            if path != self.current_path {
                fs::remove_file(&path)?;
                debug!("Removed old telemetry file {}", path.display());
            }
        }
        Ok(())
    }
}

impl EventSink for JsonlSink {
    fn emit(&mut self, event: &Event) {
        if let Err(e) = self.write_event(event) {
            warn!("Failed to write telemetry record: {}", e);
        }
    }
}

fn file_name(sequence: u32, now: DateTime<Local>) -> String {
    format!(
        "{}{}_{:04}.{}",
        FILE_PREFIX,
        now.format("%Y%m%d_%H%M%S"),
        sequence,
        FILE_EXTENSION
    )
}

fn open_file(dir: &Path, sequence: u32, now: DateTime<Local>) -> Result<(PathBuf, BufWriter<File>)> {
    let path = dir.join(file_name(sequence, now));
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, BufWriter::new(file)))
}

fn is_log_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
    name_ok && ext_ok
}
