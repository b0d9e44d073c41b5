//! # Discrete PWM Capture
//!
//! One input pin and one edge interrupt per RC channel. A rising edge
//! stamps the pulse start; the matching falling edge publishes the width.
//! Channels are independent of each other.

use super::state::{RcInputState, MAX_RC_CHANNELS};
use super::Level;
use crate::timing::{elapsed, Ticks};

/// Per-channel edge timestamping for discrete PWM receivers.
#[derive(Debug, Clone)]
pub struct PwmCapture {
    start: [Ticks; MAX_RC_CHANNELS],
    channel_count: usize,
    frame_channel: usize,
}

impl PwmCapture {
    /// Creates a PWM capture for `channel_count` channels.
    ///
    /// `frame_channel` is the channel whose falling edge ends a receiver
    /// frame (the last one the receiver emits). Out-of-range values fall back
    /// to the last channel.
    #[must_use]
    pub fn new(channel_count: usize, frame_channel: usize) -> Self {
        let channel_count = channel_count.clamp(1, MAX_RC_CHANNELS);
        let frame_channel = if frame_channel < channel_count {
            frame_channel
        } else {
            channel_count - 1
        };
        Self {
            start: [0; MAX_RC_CHANNELS],
            channel_count,
            frame_channel,
        }
    }

    /// Number of captured channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Edge interrupt handler for `channel`.
    ///
    /// `now` is the free-running counter value read on entry.
    #[inline]
    pub fn on_edge(&mut self, state: &RcInputState, channel: usize, level: Level, now: Ticks) {
        if channel >= self.channel_count {
            return;
        }
        state.note_edge();

        match level {
            Level::High => self.start[channel] = now,
            Level::Low => {
                state.store_width(channel, elapsed(self.start[channel], now));
                if channel == self.frame_channel {
                    state.complete_frame();
                }
            }
        }
    }
}
