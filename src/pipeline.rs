//! # Flight I/O Pipeline
//!
//! The face the control loop sees: one call per RC frame to read channels,
//! one call per control cycle to emit outputs.
//!
//! ```text
//! edges ──> Capture ──> RcInputState ──> Normalizer ──> RcSnapshot ──> (mixer)
//!                             ^                              │
//!                             │ JitterGate                   v
//!                       OutputScheduler <── gate_outputs <── SafetyGate
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::capture::{RcInputState, MAX_RC_CHANNELS};
use crate::output::{EmitReport, OutputFrame, OutputHardware, OutputLimits, OutputScheduler, OutputTiming};
use crate::rc::{Normalizer, NormalizerSettings, RcSnapshot};
use crate::safety::{gate_outputs, plan, ArmState, EmissionPlan, SafetyGate, SafetySettings, StatusFlags};
use crate::timing::Ticks;

/// Everything [`FlightIo`] needs, derived once from configuration.
#[derive(Debug, Clone, Default)]
pub struct FlightIoSettings {
    pub normalizer: NormalizerSettings,
    pub timing: OutputTiming,
    pub limits: OutputLimits,
    pub safety: SafetySettings,
}

/// Counters and raw widths for calibration and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Output frames emitted
    pub output_frames: u32,
    /// Output frames skipped by a fault
    pub suppressed_frames: u32,
    /// Frames whose pad was clamped to zero
    pub overruns: u32,
    /// Input edges that landed inside a synchronized output frame
    pub jitter_events: u32,
    /// Output frames during which at least one such edge landed
    pub jitter_frames: u32,
    /// Channel re-reads caused by capture writing mid-read
    pub torn_read_retries: u32,
    /// Channel reads that hit the retry cap
    pub torn_read_exhausted: u32,
    /// Receiver frames captured
    pub rx_frames: u32,
    pub raw_widths: [Ticks; MAX_RC_CHANNELS],
    pub flags: u8,
    pub arm_state: ArmState,
}

/// Capture, normalization, safety and output for one board.
#[derive(Debug)]
pub struct FlightIo<H> {
    hw: H,
    state: Arc<RcInputState>,
    normalizer: Normalizer,
    safety: SafetyGate,
    scheduler: OutputScheduler,
    limits: OutputLimits,
    suppressed: u32,
    jitter_frames: u32,
}

impl<H: OutputHardware> FlightIo<H> {
    /// Builds the pipeline. Capture must already publish into `state`.
    pub fn new(hw: H, state: Arc<RcInputState>, settings: &FlightIoSettings) -> Self {
        Self {
            hw,
            state,
            normalizer: Normalizer::new(&settings.normalizer),
            safety: SafetyGate::new(settings.safety),
            scheduler: OutputScheduler::new(settings.timing),
            limits: settings.limits,
            suppressed: 0,
            jitter_frames: 0,
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn state(&self) -> &Arc<RcInputState> {
        &self.state
    }

    pub fn safety(&self) -> &SafetyGate {
        &self.safety
    }

    pub fn safety_mut(&mut self) -> &mut SafetyGate {
        &mut self.safety
    }

    pub fn flags(&self) -> StatusFlags {
        self.safety.flags()
    }

    pub fn limits(&self) -> &OutputLimits {
        &self.limits
    }

    /// Replaces the zero offsets, e.g. with a centering result.
    pub fn set_zero_offsets(&mut self, offsets: [Ticks; MAX_RC_CHANNELS]) {
        self.normalizer.set_zero_offsets(offsets);
    }

    /// Normalizes the current raw widths and advances the safety gate.
    ///
    /// Call once per RC frame or scheduler tick.
    pub fn read_channels(&mut self) -> RcSnapshot {
        self.state.take_frame_complete();
        let snapshot = self.normalizer.snapshot(&*self.state);
        self.safety.update(&snapshot);
        snapshot
    }

    /// Emits one output frame under the current arm/failsafe/fault flags.
    ///
    /// Returns `None` when a fault suppresses the frame.
    pub fn emit_output(&mut self, frame: &OutputFrame) -> Option<EmitReport> {
        let flags = self.safety.flags();
        let report = match plan(flags) {
            EmissionPlan::Suppress => {
                self.suppressed = self.suppressed.wrapping_add(1);
                debug!("Output suppressed, state {}", ArmState::from(flags));
                None
            }
            EmissionPlan::Unsynchronized => {
                let gated = gate_outputs(flags, frame, &self.limits);
                let report = self.scheduler.emit_guarded(
                    &mut self.hw,
                    &gated,
                    |hw| hw.disable_interrupts(),
                    |hw| hw.enable_interrupts(),
                );
                Some(report)
            }
            EmissionPlan::Synchronized => {
                let gated = gate_outputs(flags, frame, &self.limits);
                let state = &self.state;
                let report = self.scheduler.emit_guarded(
                    &mut self.hw,
                    &gated,
                    |_| state.set_jitter_gate(true),
                    |_| state.set_jitter_gate(false),
                );
                Some(report)
            }
        };

        if self.state.take_jitter_flag() {
            self.jitter_frames = self.jitter_frames.wrapping_add(1);
            debug!(
                "Input edge during output frame {} ({} events total)",
                self.scheduler.frames(),
                self.state.jitter_events()
            );
        }

        if let Some(report) = &report {
            if report.overrun {
                warn!(
                    "Output overrun: {} us since last frame start, period {} us",
                    report.elapsed_us,
                    self.scheduler.timing().frame_period_us
                );
            }
        }

        report
    }

    /// Current counters and raw widths.
    pub fn diagnostics(&self) -> Diagnostics {
        let flags = self.safety.flags();
        Diagnostics {
            output_frames: self.scheduler.frames(),
            suppressed_frames: self.suppressed,
            overruns: self.scheduler.overruns(),
            jitter_events: self.state.jitter_events(),
            jitter_frames: self.jitter_frames,
            torn_read_retries: self.normalizer.retries(),
            torn_read_exhausted: self.normalizer.torn_read_exhausted(),
            rx_frames: self.state.frames(),
            raw_widths: self.state.raw_widths(),
            flags: flags.bits(),
            arm_state: ArmState::from(flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Capture, PwmCapture};
    use crate::output::OutputLimit;
    use crate::rc::Axis;
    use crate::sim::{SimBoard, SimReceiver};

    fn settings() -> FlightIoSettings {
        let mut limits = OutputLimits::default();
        limits.0[0] = OutputLimit::motor(1000, 2000);
        limits.0[1] = OutputLimit::servo(1100, 1900).with_failsafe(1500);
        FlightIoSettings {
            normalizer: NormalizerSettings {
                channel_count: 4,
                failsafe_frames: 3,
                ..NormalizerSettings::default()
            },
            limits,
            safety: SafetySettings {
                arm_hold_frames: 2,
                ..SafetySettings::default()
            },
            ..FlightIoSettings::default()
        }
    }

    fn flight_io() -> FlightIo<SimBoard> {
        let state = Arc::new(RcInputState::new());
        let mut board = SimBoard::new(1);
        board.attach_input(Capture::Pwm(PwmCapture::new(4, 3)), Arc::clone(&state));
        FlightIo::new(board, state, &settings())
    }

    /// Sends one PWM frame (roll, pitch, throttle, yaw) and reads it.
    fn rc_frame(io: &mut FlightIo<SimBoard>, widths: [u16; 4]) -> RcSnapshot {
        let start = io.hardware().time_us();
        let edges = SimReceiver::pwm(4).frame_edges(start, &widths);
        io.hardware_mut().schedule(edges);
        io.hardware_mut().advance(8_000);
        io.read_channels()
    }

    // ==================== Read Tests ====================

    #[test]
    fn test_read_channels_normalizes() {
        let mut io = flight_io();
        let snapshot = rc_frame(&mut io, [1750, 1500, 1100, 1500]);
        assert_eq!(snapshot.get(Axis::Roll), 250);
        assert_eq!(snapshot.throttle(), 0);
        assert!(snapshot.new_frame);
    }

    #[test]
    fn test_stick_gesture_arms() {
        let mut io = flight_io();
        rc_frame(&mut io, [1500, 1500, 1100, 2000]);
        assert!(!io.flags().armed());
        rc_frame(&mut io, [1500, 1500, 1100, 2000]);
        assert!(io.flags().armed());
    }

    // ==================== Emit Tests ====================

    #[test]
    fn test_disarmed_emits_motor_minimum() {
        let mut io = flight_io();
        rc_frame(&mut io, [1500, 1500, 1100, 1500]);

        let report = io.emit_output(&OutputFrame::uniform(1700));
        assert!(report.is_some());
        assert_eq!(io.hardware().pulse_width_us(0), Some(1000));
        assert_eq!(io.hardware().pulse_width_us(1), Some(1700));
    }

    #[test]
    fn test_fault_suppresses_output() {
        let mut io = flight_io();
        // Throttle high at power-up
        rc_frame(&mut io, [1500, 1500, 1800, 1500]);
        assert!(io.flags().fault());

        assert_eq!(io.emit_output(&OutputFrame::uniform(1500)), None);
        assert!(io.hardware().pin_edges().is_empty());
        assert_eq!(io.diagnostics().suppressed_frames, 1);
    }

    #[test]
    fn test_failsafe_emits_unsynchronized() {
        let mut io = flight_io();
        rc_frame(&mut io, [1500, 1500, 1100, 1500]);
        for _ in 0..3 {
            io.read_channels();
        }
        assert!(io.flags().failsafe());

        io.emit_output(&OutputFrame::uniform(1800));
        assert!(io.hardware().interrupts_enabled());
        assert_eq!(io.hardware().pulse_width_us(1), Some(1500));
        assert_eq!(io.diagnostics().arm_state, ArmState::Failsafe);
    }

    #[test]
    fn test_edge_during_synchronized_frame_is_flagged() {
        let mut io = flight_io();
        rc_frame(&mut io, [1500, 1500, 1100, 1500]);

        let now = io.hardware().time_us();
        let edges = SimReceiver::pwm(1).frame_edges(now + 500, &[800]);
        io.hardware_mut().schedule(edges);
        io.emit_output(&OutputFrame::uniform(1500));

        let diag = io.diagnostics();
        assert_eq!(diag.jitter_events, 2);
        assert_eq!(diag.jitter_frames, 1);
        // Captured anyway
        assert_eq!(diag.raw_widths[0], 800);
        assert!(!io.state().take_jitter_flag());
    }

    #[test]
    fn test_edges_outside_output_frame_not_flagged() {
        let mut io = flight_io();
        rc_frame(&mut io, [1500, 1500, 1100, 1500]);
        io.emit_output(&OutputFrame::uniform(1500));
        assert_eq!(io.diagnostics().jitter_events, 0);
    }

    #[test]
    fn test_diagnostics_serialize() {
        let io = flight_io();
        let json = serde_json::to_string(&io.diagnostics()).unwrap();
        assert!(json.contains("\"arm_state\":\"disarmed\""));
        assert!(json.contains("\"raw_widths\":[0,0,0,0,0,0,0,0]"));
    }
}
