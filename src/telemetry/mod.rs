//! # Telemetry Module
//!
//! Structured events emitted by the control core, and the sinks that
//! receive them.
//!
//! This module handles:
//! - Defining the events (intent changes, brake and arm transitions,
//!   advisories, tuning progress and results)
//! - Logging events through `tracing`
//! - Writing events to rotating JSONL (JSON Lines) files
//! - Retaining only the last M files

pub mod event;
pub mod jsonl;
pub mod sink;

pub use event::Event;
pub use sink::{EventSink, FanoutSink, MemorySink, TracingSink};
