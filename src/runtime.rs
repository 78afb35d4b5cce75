//! # Control Runtime
//!
//! [`ControlContext`] owns everything one control loop needs: the frame
//! decoder, the channel mapper, the motion state machine, the actuator and
//! the event sink. Raw receiver bytes go in through
//! [`ingest`](ControlContext::ingest); motor writes and events come out.
//!
//! Tuning takes exclusive control of the motors through a [`TuningLease`],
//! which mutably borrows the context. While a lease exists no drive cycle
//! can run. The lease stops both motors with brakes engaged when it is
//! created and again when it is dropped, whatever the outcome.

use std::time::Instant;
use tracing::{debug, info};

use crate::config::Config;
use crate::controller::channel_mapper::{ChannelMapper, IntentTracker, RangeViolation};
use crate::drive::actuator::{apply_safe, Actuator};
use crate::drive::command::MotorId;
use crate::drive::{ArmState, DriveCommand, ManualOverrides, MotionStateMachine};
use crate::rc::decoder::{Decoder, DecoderStats, FrameDecoder};
use crate::rc::protocol::{ChannelSet, Frame, Protocol};
use crate::telemetry::{Event, EventSink};

/// The frame-to-motor pipeline, kept apart from the decoder so frames can
/// be processed while the decoder is still being drained.
struct Pipeline<A, S> {
    mapper: ChannelMapper,
    tracker: IntentTracker,
    machine: MotionStateMachine,
    actuator: A,
    sink: S,
    overrides: ManualOverrides,
    verbose: bool,
    last_good: Option<ChannelSet>,
    violations: Vec<RangeViolation>,
    reported: DecoderStats,
}

impl<A: Actuator, S: EventSink> Pipeline<A, S> {
    fn process(&mut self, frame: &Frame, now: Instant) -> DriveCommand {
        let channels = &frame.channels;

        let violations = self.mapper.range_violations(channels);
        for violation in &violations {
            if !self.violations.contains(violation) {
                self.sink.emit(&Event::RangeWarning(*violation));
            }
        }
        self.violations = violations;

        let intent = self.mapper.map(channels);
        if self.tracker.should_emit(&intent, self.verbose) {
            self.sink.emit(&Event::IntentChanged { intent });
        }

        let mut overrides = self.overrides;
        if frame.flags.is_some_and(|flags| flags.failsafe) {
            debug!("Receiver failsafe flag set, forcing brake");
            overrides.brake = true;
        }

        let command = self.machine.step(
            channels,
            &intent,
            overrides,
            now,
            &mut self.actuator,
            &mut self.sink,
        );
        self.last_good = Some(*channels);
        command
    }

    fn report_drops(&mut self, stats: DecoderStats) {
        let discarded = stats.bytes_discarded - self.reported.bytes_discarded;
        let overflowed = stats.bytes_overflowed - self.reported.bytes_overflowed;
        let rejected = stats.rejected - self.reported.rejected;
        if discarded > 0 || overflowed > 0 || rejected > 0 {
            debug!(
                "Decoder dropped {} bytes, overflowed {} bytes, rejected {} frames",
                discarded, overflowed, rejected
            );
        }
        self.reported = stats;
    }
}

/// Owner of the whole drive pipeline for one receiver.
pub struct ControlContext<A, S> {
    decoder: Decoder,
    pipeline: Pipeline<A, S>,
}

impl<A: Actuator, S: EventSink> ControlContext<A, S> {
    /// Build a context from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `actuator` - Motor outputs
    /// * `sink` - Event receiver
    pub fn new(config: &Config, actuator: A, sink: S) -> Self {
        Self::with_protocol(config, config.receiver.protocol, actuator, sink)
    }

    /// Build a context decoding `protocol` regardless of the configured one
    pub fn with_protocol(config: &Config, protocol: Protocol, actuator: A, sink: S) -> Self {
        info!(
            "Control context ready: {} receiver, {} warmup frames",
            protocol, config.receiver.warmup_frames
        );
        Self {
            decoder: Decoder::with_capacity(protocol, config.receiver.buffer_cap),
            pipeline: Pipeline {
                mapper: ChannelMapper::from_config(config),
                tracker: IntentTracker::new(),
                machine: MotionStateMachine::new(config),
                actuator,
                sink,
                overrides: ManualOverrides::default(),
                verbose: config.channels.verbose,
                last_good: None,
                violations: Vec::new(),
                reported: DecoderStats::default(),
            },
        }
    }

    /// Decode `bytes` and run one drive cycle per completed frame
    ///
    /// # Returns
    ///
    /// Number of frames processed
    pub fn ingest(&mut self, bytes: &[u8], now: Instant) -> usize {
        let Self { decoder, pipeline } = self;

        let mut frames = 0;
        for frame in decoder.feed(bytes) {
            pipeline.process(&frame, now);
            frames += 1;
        }
        pipeline.report_drops(decoder.stats());
        frames
    }

    /// Replace the manual override inputs used by subsequent cycles
    pub fn set_overrides(&mut self, overrides: ManualOverrides) {
        self.pipeline.overrides = overrides;
    }

    #[must_use]
    pub fn overrides(&self) -> ManualOverrides {
        self.pipeline.overrides
    }

    /// Channels of the most recent valid frame
    #[must_use]
    pub fn last_good(&self) -> Option<&ChannelSet> {
        self.pipeline.last_good.as_ref()
    }

    #[must_use]
    pub fn arm_state(&self) -> ArmState {
        self.pipeline.machine.arm_state()
    }

    /// Command applied by the most recent cycle
    #[must_use]
    pub fn last_command(&self) -> DriveCommand {
        self.pipeline.machine.last_command()
    }

    #[must_use]
    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    #[must_use]
    pub fn actuator(&self) -> &A {
        &self.pipeline.actuator
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.pipeline.sink
    }

    /// Stop both motors with brakes engaged
    pub fn force_safe(&mut self) {
        let pipeline = &mut self.pipeline;
        pipeline.machine.force_safe(&mut pipeline.actuator);
    }

    /// Take exclusive control of the motors for tuning `motor`
    ///
    /// Both motors are stopped with brakes engaged before the lease is
    /// returned.
    pub fn begin_tuning(&mut self, motor: MotorId) -> TuningLease<'_> {
        info!("Tuning lease taken for {} motor", motor);
        let pipeline = &mut self.pipeline;
        pipeline.machine.force_safe(&mut pipeline.actuator);
        TuningLease {
            motor,
            actuator: &mut pipeline.actuator,
            machine: &mut pipeline.machine,
            sink: &mut pipeline.sink,
        }
    }
}

/// Direct access to one motor's outputs.
pub struct MotorOutput<'a> {
    motor: MotorId,
    actuator: &'a mut dyn Actuator,
}

impl MotorOutput<'_> {
    #[must_use]
    pub fn motor(&self) -> MotorId {
        self.motor
    }

    /// Set the duty fraction, clamped to `0.0..=1.0`
    pub fn set_duty(&mut self, fraction: f32) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.actuator.set_duty(self.motor, fraction);
    }

    pub fn set_direction(&mut self, forward: bool) {
        self.actuator.set_direction(self.motor, forward);
    }

    pub fn release_brake(&mut self) {
        self.actuator.set_brake(self.motor, false);
    }

    /// Duty 0 with the brake engaged
    pub fn make_safe(&mut self) {
        apply_safe(&mut *self.actuator, self.motor);
    }
}

/// Exclusive motor control for tuning, borrowed from a [`ControlContext`].
pub struct TuningLease<'a> {
    motor: MotorId,
    actuator: &'a mut dyn Actuator,
    machine: &'a mut MotionStateMachine,
    sink: &'a mut dyn EventSink,
}

impl<'a> TuningLease<'a> {
    /// Motor being tuned
    #[must_use]
    pub fn motor(&self) -> MotorId {
        self.motor
    }

    /// Outputs of the leased motor
    pub fn output(&mut self) -> MotorOutput<'_> {
        MotorOutput {
            motor: self.motor,
            actuator: &mut *self.actuator,
        }
    }

    pub fn sink(&mut self) -> &mut (dyn EventSink + 'a) {
        &mut *self.sink
    }

    /// Motor outputs and event sink at the same time
    pub fn split(&mut self) -> (MotorOutput<'_>, &mut (dyn EventSink + 'a)) {
        (
            MotorOutput {
                motor: self.motor,
                actuator: &mut *self.actuator,
            },
            &mut *self.sink,
        )
    }

    /// Stop the leased motor with its brake engaged
    pub fn make_safe(&mut self) {
        apply_safe(&mut *self.actuator, self.motor);
    }
}

impl Drop for TuningLease<'_> {
    fn drop(&mut self) {
        self.machine.force_safe(&mut *self.actuator);
        self.machine.invalidate();
        info!("Tuning lease released for {} motor, drive outputs reset", self.motor);
    }
}
