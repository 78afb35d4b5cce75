//! Event sinks.

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::event::Event;

/// Receiver of control events
pub trait EventSink: Send {
    /// Deliver one event. Sinks never fail the caller.
    fn emit(&mut self, event: &Event);
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &Event) {
        (**self).emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &Event) {
        (**self).emit(event);
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &Event) {
        match event {
            Event::IntentChanged { intent } => info!("Intent: {}", intent),
            Event::RangeWarning(v) => warn!(
                "{} channel CH{} out of range ({}), read as neutral",
                v.role, v.channel, v.value
            ),
            Event::BrakeToggled { engaged, manual } => info!(
                "Brakes {}{}",
                if *engaged { "ENGAGED" } else { "RELEASED" },
                if *manual { " (manual override)" } else { "" }
            ),
            Event::ArmStateChanged(t) => match t.baseline {
                Some(baseline) => info!("Arm state {} -> {} (throttle baseline {})", t.from, t.to, baseline),
                None => info!("Arm state {} -> {}", t.from, t.to),
            },
            Event::ArmAdvisory { message } => warn!("{}", message),
            Event::RateSample { motor, duty, pps, rpm } => info!(
                "{} duty {:.1}%: {:.1} pulses/s, {:.1} RPM",
                motor,
                duty * 100.0,
                pps,
                rpm
            ),
            Event::TrialStarted { motor, kp } => info!("{} tuning trial Kp={:.2}", motor, kp),
            Event::TrialCompleted { motor, kp, samples, crossings } => info!(
                "{} trial Kp={:.2} done: {} samples, {} zero crossings",
                motor, kp, samples, crossings
            ),
            Event::OscillationDetected { motor, ku, pu, crossings } => info!(
                "{} oscillation at Kp={:.2}: Pu={:.3}s over {} crossings",
                motor, ku, pu, crossings
            ),
            Event::TuningResult { motor, ku, pu, gains } => info!(
                "{} tuned (Ku={:.2}, Pu={:.3}s): Kp={:.4} Ki={:.4} Kd={:.4}",
                motor, ku, pu, gains.kp, gains.ki, gains.kd
            ),
            Event::TuningFailed { motor, reason } => warn!("{} tuning failed: {}", motor, reason),
        }
    }
}

/// Collects events in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Remove and return the collected events
    pub fn drain(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    /// Number of collected events with the given name
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards every event to each contained sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Add a sink in place
    pub fn push(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&mut self, event: &Event) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }
}
