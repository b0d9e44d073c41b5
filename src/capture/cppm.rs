//! # Combined PPM Demultiplexer
//!
//! A single pin carries every channel as a train of pulses. The time from
//! one active edge to the next is the width of the current channel; a gap
//! longer than the sync threshold marks the start of a new frame.
//!
//! ```text
//!   sync gap        ch0      ch1      ch2          chN-1     sync gap
//! ___________|‾|_______|‾|______|‾|_______ ... |‾|_______|‾|______________|‾|
//!            ^ index=0 ^ raw[0] ^ raw[1]                 ^ frame complete
//! ```
//!
//! ## State machine
//!
//! | Event | Condition | Action |
//! |-------|-----------|--------|
//! | active edge | gap > sync threshold | index = 0, synced |
//! | active edge | synced, index < count | raw[order[index]] = gap, index += 1 |
//! | active edge | index reaches count | frame complete, wait for next sync |
//! | active edge | not synced | ignore |

use super::state::{RcInputState, MAX_RC_CHANNELS};
use super::Level;
use crate::timing::{elapsed, Ticks};

/// Demultiplexer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CppmPhase {
    /// Waiting for a sync gap. Edges are ignored.
    Searching,
    /// Collecting channel `index` of the current frame.
    Collecting(usize),
}

/// CPPM frame demultiplexer.
#[derive(Debug, Clone)]
pub struct CppmDecoder {
    last_edge: Ticks,
    seen_edge: bool,
    phase: CppmPhase,
    channel_count: usize,
    sync_threshold: Ticks,
    active_level: Level,
    order: [usize; MAX_RC_CHANNELS],
}

impl CppmDecoder {
    /// Creates a decoder expecting `channel_count` pulses per frame.
    ///
    /// `sync_threshold` is in clock ticks and must be longer than the
    /// widest valid channel slot. `active_level` selects which edge of the
    /// separator pulse is timed.
    #[must_use]
    pub fn new(channel_count: usize, sync_threshold: Ticks, active_level: Level) -> Self {
        Self {
            last_edge: 0,
            seen_edge: false,
            phase: CppmPhase::Searching,
            channel_count: channel_count.clamp(1, MAX_RC_CHANNELS),
            sync_threshold,
            active_level,
            order: std::array::from_fn(|slot| slot),
        }
    }

    /// Maps frame slot `n` to physical channel `order[n]`.
    ///
    /// Entries outside the channel table are replaced by the identity slot.
    #[must_use]
    pub fn with_order(mut self, order: &[usize]) -> Self {
        for (slot, &channel) in order.iter().enumerate().take(MAX_RC_CHANNELS) {
            self.order[slot] = if channel < MAX_RC_CHANNELS { channel } else { slot };
        }
        self
    }

    /// Current demultiplexer phase.
    #[must_use]
    pub fn phase(&self) -> CppmPhase {
        self.phase
    }

    /// Number of channel slots per frame.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Edge interrupt handler for the CPPM pin.
    #[inline]
    pub fn on_edge(&mut self, state: &RcInputState, level: Level, now: Ticks) {
        if level != self.active_level {
            return;
        }
        state.note_edge();

        let gap = elapsed(self.last_edge, now);
        let first = !self.seen_edge;
        self.last_edge = now;
        self.seen_edge = true;
        if first {
            return;
        }

        if gap > self.sync_threshold {
            self.phase = CppmPhase::Collecting(0);
            return;
        }

        if let CppmPhase::Collecting(index) = self.phase {
            state.store_width(self.order[index], gap);
            let next = index + 1;
            if next >= self.channel_count {
                state.complete_frame();
                self.phase = CppmPhase::Searching;
            } else {
                self.phase = CppmPhase::Collecting(next);
            }
        }
    }
}
