//! # Timing Module
//!
//! Hardware clock abstractions and the busy-wait primitives used by the
//! output scheduler.
//!
//! This module handles:
//! - Modular elapsed-time arithmetic on the 16-bit free-running counter
//! - Conversion between clock ticks and microseconds
//! - Deadline spin-waits against the secondary 8-bit step timer
//!
//! Nothing here sleeps. Every wait is a polling loop against a hardware
//! counter whose duration is computed up front.

pub mod spin;

pub use spin::{spin_wait, wait_step, SPIN_CHUNK};

/// Raw value of the free-running 16-bit counter.
pub type Ticks = u16;

/// Free-running hardware counter used to timestamp edges.
///
/// Wraps at 2^16. Callers must only ever compare two readings through
/// [`elapsed`].
pub trait HardwareClock {
    /// Current counter value.
    fn now(&self) -> Ticks;
}

/// Secondary 8-bit timer used for deadline spin-waits.
///
/// Counts one step per microsecond.
pub trait StepTimer {
    /// Reset the counter to zero.
    fn reset(&mut self);

    /// Current counter value.
    fn count(&mut self) -> u8;

    /// True when the counter wrapped since the last [`clear_overflow`](Self::clear_overflow).
    fn overflowed(&self) -> bool;

    /// Clear the overflow flag.
    fn clear_overflow(&mut self);
}

/// Ticks elapsed from `start` to `end`, modulo 2^16.
///
/// Correct across one counter rollover (`end < start` numerically).
///
/// # Examples
///
/// ```
/// use openaero_io::timing::elapsed;
///
/// assert_eq!(elapsed(1000, 2750), 1750);
/// assert_eq!(elapsed(65_000, 1214), 1750);
/// ```
#[inline]
#[must_use]
pub fn elapsed(start: Ticks, end: Ticks) -> Ticks {
    end.wrapping_sub(start)
}

/// Relationship between hardware clock ticks and microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    ticks_per_us: u16,
}

impl Default for Timebase {
    fn default() -> Self {
        Self { ticks_per_us: 1 }
    }
}

impl Timebase {
    /// Creates a timebase. A rate of zero is treated as one tick per microsecond.
    #[must_use]
    pub fn new(ticks_per_us: u16) -> Self {
        Self {
            ticks_per_us: ticks_per_us.max(1),
        }
    }

    /// Ticks per microsecond.
    #[must_use]
    pub fn ticks_per_us(&self) -> u16 {
        self.ticks_per_us
    }

    /// Converts a tick count to whole microseconds (truncating).
    #[inline]
    #[must_use]
    pub fn ticks_to_us(&self, ticks: Ticks) -> u32 {
        u32::from(ticks) / u32::from(self.ticks_per_us)
    }

    /// Converts microseconds to ticks.
    #[inline]
    #[must_use]
    pub fn us_to_ticks(&self, us: u32) -> u32 {
        us.saturating_mul(u32::from(self.ticks_per_us))
    }
}
