//! # Safety Module
//!
//! Arming, failsafe and fault state, and the single decision point where an
//! output frame is about to be emitted.
//!
//! This module handles:
//! - The status flag word shared with the mixer and diagnostics
//! - Choosing how a frame is emitted (suppressed, interrupts masked, or gated)
//! - Forcing motor outputs to minimum while disarmed and applying failsafe positions
//! - Stick-gesture arming with a throttle-high fault latch

pub mod arming;

pub use arming::{SafetyGate, SafetySettings};

use bitflags::bitflags;

use crate::output::{OutputFrame, OutputLimits};

bitflags! {
    /// Arm, failsafe and fault flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Motors may spin
        const ARMED = 1 << 0;
        /// RX frames lost
        const FAILSAFE = 1 << 1;
        /// Arming was attempted with throttle above idle
        const THROTTLE_HIGH_ERROR = 1 << 2;
        /// Camera-stabilization mode, outputs run free of RC sync
        const CAMSTAB = 1 << 3;
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl StatusFlags {
    #[must_use]
    pub fn armed(self) -> bool {
        self.contains(Self::ARMED)
    }

    #[must_use]
    pub fn failsafe(self) -> bool {
        self.contains(Self::FAILSAFE)
    }

    #[must_use]
    pub fn fault(self) -> bool {
        self.contains(Self::THROTTLE_HIGH_ERROR)
    }
}

/// Arm state derived from [`StatusFlags`]. Faults outrank failsafe, which outranks arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    Disarmed,
    Armed,
    Failsafe,
    FaultBlocked,
}

impl From<StatusFlags> for ArmState {
    fn from(flags: StatusFlags) -> Self {
        if flags.fault() {
            ArmState::FaultBlocked
        } else if flags.failsafe() {
            ArmState::Failsafe
        } else if flags.armed() {
            ArmState::Armed
        } else {
            ArmState::Disarmed
        }
    }
}

impl std::fmt::Display for ArmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArmState::Disarmed => "disarmed",
            ArmState::Armed => "armed",
            ArmState::Failsafe => "failsafe",
            ArmState::FaultBlocked => "fault",
        };
        f.write_str(name)
    }
}

/// How the next output frame is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionPlan {
    /// No pulses this frame; pins keep their state
    Suppress,
    /// Emit with interrupts masked from pins high to the last falling edge
    Unsynchronized,
    /// Emit with interrupts live and the JitterGate set over the pulse section
    Synchronized,
}

/// Decides how the next frame is emitted.
#[must_use]
pub fn plan(flags: StatusFlags) -> EmissionPlan {
    if flags.fault() {
        EmissionPlan::Suppress
    } else if flags.failsafe() || flags.contains(StatusFlags::CAMSTAB) {
        EmissionPlan::Unsynchronized
    } else {
        EmissionPlan::Synchronized
    }
}

/// Applies arm and failsafe policy to a mixer frame, then clamps to travel limits.
///
/// - Not armed, or in failsafe: motor channels go to their minimum.
/// - Failsafe: servo channels with a failsafe position take it.
/// - Everything else passes through.
#[must_use]
pub fn gate_outputs(flags: StatusFlags, frame: &OutputFrame, limits: &OutputLimits) -> OutputFrame {
    let mut gated = *frame;
    for (target, limit) in gated.0.iter_mut().zip(limits.0.iter()) {
        if limit.is_motor() {
            if !flags.armed() || flags.failsafe() {
                *target = limit.min_us;
            }
        } else if flags.failsafe() {
            if let Some(failsafe_us) = limit.failsafe_us {
                *target = failsafe_us;
            }
        }
    }
    limits.clamp(&gated)
}
