//! Simulated flight-controller board.
//!
//! Time only moves when something polls the step timer or calls
//! [`SimBoard::advance`]. Input edges scheduled on the board are fed to the
//! attached capture strategy as time passes, exactly like edge interrupts:
//! stamped with the main clock at the moment they fire, or at unmask time if
//! interrupts were masked when they arrived.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::capture::{Capture, Level, RcInputState};
use crate::output::{InterruptControl, OutputPins, MAX_OUTPUTS};
use crate::timing::{HardwareClock, StepTimer, Ticks};

/// Step-timer counts before the 8-bit counter wraps.
const STEP_TIMER_RANGE: u64 = 256;

/// One recorded output pin transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEdge {
    pub time_us: u64,
    pub channel: usize,
    pub high: bool,
}

/// One input pin transition waiting to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEdge {
    pub time_us: u64,
    pub pin: usize,
    pub level: Level,
}

/// Board model implementing every hardware seam of the crate.
#[derive(Debug)]
pub struct SimBoard {
    time_us: u64,
    ticks_per_us: u16,
    poll_cost_us: u64,
    step_reset_at: u64,
    step_overflow: bool,
    pins: u8,
    pin_edges: Vec<PinEdge>,
    interrupts_enabled: bool,
    scheduled: VecDeque<ScheduledEdge>,
    deferred: Vec<ScheduledEdge>,
    input: Option<(Capture, Arc<RcInputState>)>,
    delivered: u32,
    late: u32,
}

impl SimBoard {
    /// Creates a board whose main clock runs at `ticks_per_us` (zero is treated as one).
    #[must_use]
    pub fn new(ticks_per_us: u16) -> Self {
        Self {
            time_us: 0,
            ticks_per_us: ticks_per_us.max(1),
            poll_cost_us: 1,
            step_reset_at: 0,
            step_overflow: false,
            pins: 0,
            pin_edges: Vec::new(),
            interrupts_enabled: true,
            scheduled: VecDeque::new(),
            deferred: Vec::new(),
            input: None,
            delivered: 0,
            late: 0,
        }
    }

    /// Sets how long one step-timer poll takes.
    #[must_use]
    pub fn with_poll_cost(mut self, us: u64) -> Self {
        self.poll_cost_us = us.max(1);
        self
    }

    /// Connects the capture strategy that services input edges.
    pub fn attach_input(&mut self, capture: Capture, state: Arc<RcInputState>) {
        self.input = Some((capture, state));
    }

    /// Simulated time since power-up.
    #[must_use]
    pub fn time_us(&self) -> u64 {
        self.time_us
    }

    /// Moves time forward, firing every input edge that falls due.
    pub fn advance(&mut self, us: u64) {
        self.advance_to(self.time_us + us);
    }

    /// Moves time forward to `target_us`. Targets in the past are ignored.
    pub fn advance_to(&mut self, target_us: u64) {
        while let Some(edge) = self.scheduled.front().copied() {
            if edge.time_us > target_us {
                break;
            }
            self.scheduled.pop_front();
            self.time_us = self.time_us.max(edge.time_us);
            if self.interrupts_enabled {
                self.fire(edge);
            } else {
                self.deferred.push(edge);
            }
        }
        self.time_us = self.time_us.max(target_us);
    }

    /// Queues input edges. Edges keep time order; equal times keep insertion order.
    pub fn schedule<I: IntoIterator<Item = ScheduledEdge>>(&mut self, edges: I) {
        for edge in edges {
            let at = self.scheduled.partition_point(|queued| queued.time_us <= edge.time_us);
            self.scheduled.insert(at, edge);
        }
    }

    /// Input edges not yet fired.
    #[must_use]
    pub fn pending_inputs(&self) -> usize {
        self.scheduled.len() + self.deferred.len()
    }

    /// Input edges handed to capture so far.
    #[must_use]
    pub fn delivered_inputs(&self) -> u32 {
        self.delivered
    }

    /// Input edges that waited for an interrupt unmask.
    #[must_use]
    pub fn late_inputs(&self) -> u32 {
        self.late
    }

    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Current output pin levels as a bit mask.
    #[must_use]
    pub fn pins(&self) -> u8 {
        self.pins
    }

    /// Recorded output transitions.
    #[must_use]
    pub fn pin_edges(&self) -> &[PinEdge] {
        &self.pin_edges
    }

    /// Returns and clears the recorded output transitions.
    pub fn take_pin_edges(&mut self) -> Vec<PinEdge> {
        std::mem::take(&mut self.pin_edges)
    }

    /// Width of the most recent complete pulse on `channel`.
    #[must_use]
    pub fn pulse_width_us(&self, channel: usize) -> Option<u64> {
        let mut edges = self.pin_edges.iter().rev().filter(|edge| edge.channel == channel);
        let fall = edges.find(|edge| !edge.high)?;
        let rise = edges.find(|edge| edge.high)?;
        Some(fall.time_us - rise.time_us)
    }

    fn clock_at(&self, time_us: u64) -> Ticks {
        time_us.wrapping_mul(u64::from(self.ticks_per_us)) as Ticks
    }

    fn fire(&mut self, edge: ScheduledEdge) {
        let now = self.clock_at(self.time_us);
        if let Some((capture, state)) = self.input.as_mut() {
            capture.on_edge(&**state, edge.pin, edge.level, now);
        }
        self.delivered += 1;
    }
}

impl HardwareClock for SimBoard {
    fn now(&self) -> Ticks {
        self.clock_at(self.time_us)
    }
}

impl StepTimer for SimBoard {
    fn reset(&mut self) {
        self.step_reset_at = self.time_us;
    }

    fn count(&mut self) -> u8 {
        self.advance(self.poll_cost_us);
        let counted = self.time_us - self.step_reset_at;
        if counted >= STEP_TIMER_RANGE {
            self.step_overflow = true;
        }
        (counted % STEP_TIMER_RANGE) as u8
    }

    fn overflowed(&self) -> bool {
        self.step_overflow
    }

    fn clear_overflow(&mut self) {
        self.step_overflow = false;
    }
}

impl OutputPins for SimBoard {
    fn set_high(&mut self, mask: u8) {
        for channel in 0..MAX_OUTPUTS {
            let bit = 1u8 << channel;
            if mask & bit != 0 && self.pins & bit == 0 {
                self.pin_edges.push(PinEdge {
                    time_us: self.time_us,
                    channel,
                    high: true,
                });
            }
        }
        self.pins |= mask;
    }

    fn set_low(&mut self, channel: usize) {
        if channel >= MAX_OUTPUTS {
            return;
        }
        let bit = 1u8 << channel;
        if self.pins & bit != 0 {
            self.pin_edges.push(PinEdge {
                time_us: self.time_us,
                channel,
                high: false,
            });
            self.pins &= !bit;
        }
    }
}

impl InterruptControl for SimBoard {
    fn disable_interrupts(&mut self) {
        self.interrupts_enabled = false;
    }

    fn enable_interrupts(&mut self) {
        self.interrupts_enabled = true;
        let deferred = std::mem::take(&mut self.deferred);
        for edge in deferred {
            self.late += 1;
            self.fire(edge);
        }
    }
}
