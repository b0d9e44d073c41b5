//! # Calibration Module
//!
//! Stick-centering routine that derives zero offsets from live raw widths.
//!
//! With the transmitter sticks (and trims) centered, the routine averages
//! a fixed number of complete receiver frames per channel. The averages
//! become the new zero offsets, which the configuration subsystem persists.
//!
//! ## Usage
//!
//! ```
//! use openaero_io::rc::calibration::CenterCalibrator;
//! use openaero_io::rc::MAX_RC_CHANNELS;
//!
//! let mut cal = CenterCalibrator::new(4);
//! for width in [1498, 1502, 1500, 1500] {
//!     cal.add_frame(&[width; MAX_RC_CHANNELS]);
//! }
//!
//! assert_eq!(cal.offsets(), Some([1500; MAX_RC_CHANNELS]));
//! ```

use super::MAX_RC_CHANNELS;
use crate::timing::Ticks;

/// Default number of frames averaged by the centering routine.
pub const DEFAULT_CENTER_FRAMES: u16 = 32;

/// Averages raw channel widths over a fixed number of frames.
#[derive(Debug, Clone)]
pub struct CenterCalibrator {
    sums: [u32; MAX_RC_CHANNELS],
    frames: u16,
    target: u16,
}

impl Default for CenterCalibrator {
    fn default() -> Self {
        Self::new(DEFAULT_CENTER_FRAMES)
    }
}

impl CenterCalibrator {
    /// Creates a calibrator averaging `frames` frames (at least one).
    #[must_use]
    pub fn new(frames: u16) -> Self {
        Self {
            sums: [0; MAX_RC_CHANNELS],
            frames: 0,
            target: frames.max(1),
        }
    }

    /// Adds one frame of raw widths. Frames beyond the target are ignored.
    ///
    /// Returns `true` once enough frames have been collected.
    pub fn add_frame(&mut self, raw: &[Ticks; MAX_RC_CHANNELS]) -> bool {
        if !self.is_complete() {
            for (sum, &width) in self.sums.iter_mut().zip(raw.iter()) {
                *sum += u32::from(width);
            }
            self.frames += 1;
        }
        self.is_complete()
    }

    /// Frames collected so far.
    #[must_use]
    pub fn frames(&self) -> u16 {
        self.frames
    }

    /// True once the target frame count was reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.frames >= self.target
    }

    /// Rounded per-channel averages, available once complete.
    #[must_use]
    pub fn offsets(&self) -> Option<[Ticks; MAX_RC_CHANNELS]> {
        if !self.is_complete() {
            return None;
        }
        let frames = u32::from(self.frames);
        Some(std::array::from_fn(|ch| {
            ((self.sums[ch] + frames / 2) / frames) as Ticks
        }))
    }

    /// Discards collected frames.
    pub fn reset(&mut self) {
        self.sums = [0; MAX_RC_CHANNELS];
        self.frames = 0;
    }
}
