//! # Output Module
//!
//! Simultaneous-start servo/ESC pulse generation.
//!
//! This module handles:
//! - Output pin and interrupt-mask hardware seams
//! - Per-channel travel limits and motor/servo markers
//! - The fixed-rate pulse scheduler with its shared falling-edge step loop

pub mod limits;
pub mod scheduler;

pub use limits::{ChannelKind, OutputLimit, OutputLimits};
pub use scheduler::{EmitReport, OutputScheduler, OutputTiming};

use crate::timing::{HardwareClock, StepTimer};

/// Maximum number of output channels.
pub const MAX_OUTPUTS: usize = 8;

/// Output pin driver.
pub trait OutputPins {
    /// Drives every pin in `mask` high in one write.
    fn set_high(&mut self, mask: u8);

    /// Drives one pin low.
    fn set_low(&mut self, channel: usize);
}

/// Global interrupt masking.
pub trait InterruptControl {
    /// Masks interrupts. Edges arriving meanwhile are serviced at unmask.
    fn disable_interrupts(&mut self);

    /// Unmasks interrupts.
    fn enable_interrupts(&mut self);
}

/// Everything the scheduler needs from a board.
pub trait OutputHardware: HardwareClock + StepTimer + OutputPins + InterruptControl {}

impl<T: HardwareClock + StepTimer + OutputPins + InterruptControl + ?Sized> OutputHardware for T {}

/// Target pulse widths for one output frame, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFrame(pub [u16; MAX_OUTPUTS]);

impl Default for OutputFrame {
    fn default() -> Self {
        Self([1500; MAX_OUTPUTS])
    }
}

impl OutputFrame {
    /// Frame with every channel at `us`.
    #[must_use]
    pub fn uniform(us: u16) -> Self {
        Self([us; MAX_OUTPUTS])
    }

    /// Target of one channel, or `None` if out of range.
    #[must_use]
    pub fn get(&self, channel: usize) -> Option<u16> {
        self.0.get(channel).copied()
    }

    /// Sets the target of one channel. Out-of-range channels are ignored.
    pub fn set(&mut self, channel: usize, us: u16) {
        if let Some(slot) = self.0.get_mut(channel) {
            *slot = us;
        }
    }
}
