//! # Output Pulse Scheduler
//!
//! Emits one frame of servo/ESC pulses. All enabled outputs rise together;
//! each falls at its own target width.
//!
//! ## Frame layout
//!
//! ```text
//! |<---------------------- frame period ---------------------->|
//! |  pad (spin)  |  base pulse  | step loop (falling edges)    |
//!                ^ frame start: all pins high
//! ```
//!
//! The pad is recomputed every frame from the measured time since the
//! previous frame start, so caller jitter never integrates into drift. If
//! the caller already used more than the period, the pad is zero and the
//! frame counts as an overrun.
//!
//! Once the pins go high the frame always runs to completion. Whether to
//! emit at all, and with which widths, is decided by the caller beforehand.
//! [`OutputScheduler::emit_guarded`] brackets only the pulse section (pins
//! high through the last falling edge); the pad always runs unguarded.

use super::{OutputFrame, OutputHardware, MAX_OUTPUTS};
use crate::timing::{elapsed, spin_wait, wait_step, Ticks, Timebase};

/// Default servo frame rate.
pub const DEFAULT_FRAME_RATE_HZ: u16 = 50;

/// Default pulse width common to every channel.
pub const DEFAULT_BASE_PULSE_US: u16 = 900;

/// Default falling-edge loop granularity.
pub const DEFAULT_STEP_US: u8 = 4;

/// Default widest pulse the step loop produces.
pub const DEFAULT_MAX_PULSE_US: u16 = 2100;

/// Timing parameters of the pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTiming {
    /// Frame start to frame start
    pub frame_period_us: u32,
    /// Width every pulse has before the step loop starts
    pub base_pulse_us: u16,
    /// Step loop granularity
    pub step_us: u8,
    /// Step loop end; every pin is low after this point
    pub max_pulse_us: u16,
    /// Bit mask of enabled outputs
    pub channel_mask: u8,
    /// Main clock rate
    pub timebase: Timebase,
}

impl Default for OutputTiming {
    fn default() -> Self {
        Self::from_frame_rate(DEFAULT_FRAME_RATE_HZ)
    }
}

impl OutputTiming {
    /// Timing for `hz` frames per second with default pulse geometry.
    #[must_use]
    pub fn from_frame_rate(hz: u16) -> Self {
        Self {
            frame_period_us: period_us(hz),
            base_pulse_us: DEFAULT_BASE_PULSE_US,
            step_us: DEFAULT_STEP_US,
            max_pulse_us: DEFAULT_MAX_PULSE_US,
            channel_mask: u8::MAX,
            timebase: Timebase::default(),
        }
    }

    /// Frame rate implied by the period, rounded down.
    #[must_use]
    pub fn frame_rate_hz(&self) -> u32 {
        1_000_000 / self.frame_period_us.max(1)
    }

    /// True if output `channel` is enabled.
    #[must_use]
    pub fn is_enabled(&self, channel: usize) -> bool {
        channel < MAX_OUTPUTS && self.channel_mask & (1 << channel) != 0
    }
}

/// Frame period for a frame rate. A rate of zero is treated as one hertz.
#[must_use]
pub fn period_us(hz: u16) -> u32 {
    1_000_000 / u32::from(hz.max(1))
}

/// What one call to [`OutputScheduler::emit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitReport {
    /// Measured time since the previous frame start
    pub elapsed_us: u32,
    /// Low time waited before this frame
    pub pad_us: u32,
    /// Previous frame plus caller work exceeded the period
    pub overrun: bool,
    /// Clock value when the pins went high
    pub frame_start: Ticks,
}

/// Fixed-rate simultaneous-start pulse generator.
#[derive(Debug, Clone)]
pub struct OutputScheduler {
    timing: OutputTiming,
    last_start: Option<Ticks>,
    frames: u32,
    overruns: u32,
}

impl OutputScheduler {
    #[must_use]
    pub fn new(timing: OutputTiming) -> Self {
        Self {
            timing,
            last_start: None,
            frames: 0,
            overruns: 0,
        }
    }

    #[must_use]
    pub fn timing(&self) -> &OutputTiming {
        &self.timing
    }

    /// Frames emitted so far.
    #[must_use]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Frames whose pad was clamped to zero.
    #[must_use]
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Low time needed before the next frame, given the measured time since
    /// the previous frame start. Never negative.
    #[inline]
    #[must_use]
    pub fn pad_for(&self, elapsed_us: u32) -> u32 {
        self.timing.frame_period_us.saturating_sub(elapsed_us)
    }

    /// Emits one frame of pulses. `frame` must already be gated and clamped.
    ///
    /// The first frame after construction starts immediately.
    pub fn emit<H: OutputHardware + ?Sized>(&mut self, hw: &mut H, frame: &OutputFrame) -> EmitReport {
        self.emit_guarded(hw, frame, |_| {}, |_| {})
    }

    /// Same as [`emit`](Self::emit), calling `enter` just before the pins go
    /// high and `exit` once every pin is low again.
    pub fn emit_guarded<H, E, X>(&mut self, hw: &mut H, frame: &OutputFrame, enter: E, exit: X) -> EmitReport
    where
        H: OutputHardware + ?Sized,
        E: FnOnce(&mut H),
        X: FnOnce(&mut H),
    {
        let timing = self.timing;

        let elapsed_us = match self.last_start {
            Some(start) => timing.timebase.ticks_to_us(elapsed(start, hw.now())),
            None => timing.frame_period_us,
        };
        let pad_us = self.pad_for(elapsed_us);
        let overrun = self.last_start.is_some() && elapsed_us > timing.frame_period_us;
        if overrun {
            self.overruns = self.overruns.wrapping_add(1);
        }

        spin_wait(hw, pad_us);

        enter(hw);
        let frame_start = hw.now();
        hw.set_high(timing.channel_mask);
        self.last_start = Some(frame_start);

        spin_wait(hw, u32::from(timing.base_pulse_us));

        // Falling edges in target order
        let mut order = [0usize; MAX_OUTPUTS];
        let mut count = 0;
        for channel in (0..MAX_OUTPUTS).filter(|&ch| timing.is_enabled(ch)) {
            order[count] = channel;
            count += 1;
        }
        let order = &mut order[..count];
        order.sort_unstable_by_key(|&ch| frame.0[ch]);

        let step = timing.step_us.max(1);
        let max_pulse = u32::from(timing.max_pulse_us);
        let mut position = u32::from(timing.base_pulse_us);
        let mut next = 0;
        loop {
            while next < order.len() && u32::from(frame.0[order[next]]) <= position {
                hw.set_low(order[next]);
                next += 1;
            }
            if next == order.len() || position >= max_pulse {
                break;
            }
            wait_step(hw, step);
            position += u32::from(step);
        }
        for &channel in &order[next..] {
            hw.set_low(channel);
        }
        exit(hw);

        self.frames = self.frames.wrapping_add(1);

        EmitReport {
            elapsed_us,
            pad_us,
            overrun,
            frame_start,
        }
    }
}
