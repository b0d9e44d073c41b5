//! # RC Module
//!
//! Normalization of captured receiver widths into logical channel values.
//!
//! This module handles:
//! - Torn-read-free reads of interrupt-written raw widths
//! - Zero-offset subtraction, per-axis polarity and channel remapping
//! - Deadband and fixed-point expo curves
//! - RX activity and missed-frame failsafe detection
//! - Stick-centering calibration

pub mod activity;
pub mod calibration;
pub mod channel_mapper;
pub mod expo;
pub mod normalizer;

pub use activity::{ActivityStatus, RxActivity};
pub use calibration::CenterCalibrator;
pub use channel_mapper::{Axis, AxisMap, AxisSource, ChannelMapper, ExpoLevels, Polarity, AXIS_COUNT};
pub use normalizer::{Normalizer, NormalizerSettings, RcSnapshot};

pub use crate::capture::MAX_RC_CHANNELS;

use crate::timing::Ticks;

/// Largest magnitude of a logical channel value.
pub const RC_VALUE_LIMIT: i32 = 1250;

/// Read side of the interrupt-shared raw channel table.
///
/// Implemented by [`crate::capture::RcInputState`]; mocked in tests to
/// script capture interrupts landing mid-read.
#[cfg_attr(test, mockall::automock)]
pub trait RawChannelSource {
    /// Clears the updated flag of `channel`.
    fn clear_updated(&self, channel: usize);

    /// Most recent raw width of `channel`, in ticks.
    fn raw(&self, channel: usize) -> Ticks;

    /// True if capture published a new width since the last clear.
    fn was_updated(&self, channel: usize) -> bool;

    /// Number of complete receiver frames captured (wrapping).
    fn frame_count(&self) -> u32;
}
