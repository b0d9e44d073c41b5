//! # RX Activity Detection
//!
//! Two independent signals about the receiver:
//!
//! - **Activity**: the sum of roll, pitch, yaw and aux1 moved by more than
//!   the noise threshold since the previous frame. This tells "transmitter
//!   connected but sticks centered" apart from real stick input.
//! - **Failsafe**: no new capture frame arrived for `failsafe_frames`
//!   consecutive normalizer ticks. Cleared by the next new frame.
//!
//! Capture never decides that a receiver is lost; that policy lives here.

use super::channel_mapper::{Axis, AXIS_COUNT};

/// Delta-sum activity and missed-frame failsafe detector.
#[derive(Debug, Clone)]
pub struct RxActivity {
    noise_threshold: u16,
    failsafe_frames: u16,
    previous_sum: Option<i32>,
    last_frame: u32,
    missed: u16,
    failsafe: bool,
}

/// Result of one activity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityStatus {
    /// Stick sum moved by more than the noise threshold
    pub active: bool,
    /// Receiver frames stopped arriving
    pub failsafe: bool,
    /// A capture frame completed since the previous update
    pub new_frame: bool,
}

impl RxActivity {
    /// Creates a detector. A `failsafe_frames` of zero is treated as one.
    #[must_use]
    pub fn new(noise_threshold: u16, failsafe_frames: u16) -> Self {
        Self {
            noise_threshold,
            failsafe_frames: failsafe_frames.max(1),
            previous_sum: None,
            last_frame: 0,
            missed: 0,
            failsafe: false,
        }
    }

    /// Sum of the axes used for activity detection.
    #[must_use]
    pub fn activity_sum(values: &[i16; AXIS_COUNT]) -> i32 {
        [Axis::Roll, Axis::Pitch, Axis::Yaw, Axis::Aux1]
            .iter()
            .map(|&axis| i32::from(values[axis as usize]))
            .sum()
    }

    /// Updates both detectors from this tick's values and the capture frame counter.
    pub fn update(&mut self, values: &[i16; AXIS_COUNT], frame_count: u32) -> ActivityStatus {
        let sum = Self::activity_sum(values);
        let active = self
            .previous_sum
            .is_some_and(|previous| (sum - previous).unsigned_abs() > u32::from(self.noise_threshold));
        self.previous_sum = Some(sum);

        let new_frame = frame_count != self.last_frame;
        if new_frame {
            self.last_frame = frame_count;
            self.missed = 0;
            self.failsafe = false;
        } else {
            self.missed = self.missed.saturating_add(1);
            if self.missed >= self.failsafe_frames {
                self.failsafe = true;
            }
        }

        ActivityStatus {
            active,
            failsafe: self.failsafe,
            new_frame,
        }
    }

    /// Current failsafe state.
    #[must_use]
    pub fn failsafe(&self) -> bool {
        self.failsafe
    }

    /// Consecutive ticks without a new frame.
    #[must_use]
    pub fn missed_frames(&self) -> u16 {
        self.missed
    }
}
