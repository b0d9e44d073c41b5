//! # Shared RC Input State
//!
//! The only state shared between interrupt context and the main loop.
//!
//! | Field | Writer | Readers |
//! |-------|--------|---------|
//! | `raw[ch]` | capture (ISR) | normalizer, calibration, diagnostics |
//! | `updated[ch]` | capture sets, normalizer clears | normalizer |
//! | `frame_complete` | capture sets, normalizer clears | normalizer |
//! | `frames` | capture | normalizer, diagnostics |
//! | `jitter_gate` | output scheduler | capture |
//! | `jitter_flag` | capture sets, pipeline clears | pipeline |
//! | `jitter_events` | capture | diagnostics |
//!
//! Every field is an atomic so a reader can never observe a half-written
//! word. Multi-field consistency for a channel comes from the retry protocol
//! in [`crate::rc::Normalizer`], not from locking.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::rc::RawChannelSource;
use crate::timing::Ticks;

/// Maximum number of physical RC input channels.
pub const MAX_RC_CHANNELS: usize = 8;

/// Interrupt-shared RC input state.
#[derive(Debug)]
pub struct RcInputState {
    raw: [AtomicU16; MAX_RC_CHANNELS],
    updated: [AtomicBool; MAX_RC_CHANNELS],
    frame_complete: AtomicBool,
    frames: AtomicU32,
    jitter_gate: AtomicBool,
    jitter_flag: AtomicBool,
    jitter_events: AtomicU32,
}

impl Default for RcInputState {
    fn default() -> Self {
        Self::new()
    }
}

impl RcInputState {
    /// Creates state with every raw width at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: std::array::from_fn(|_| AtomicU16::new(0)),
            updated: std::array::from_fn(|_| AtomicBool::new(false)),
            frame_complete: AtomicBool::new(false),
            frames: AtomicU32::new(0),
            jitter_gate: AtomicBool::new(false),
            jitter_flag: AtomicBool::new(false),
            jitter_events: AtomicU32::new(0),
        }
    }

    // ==================== Capture side ====================

    /// Publishes a measured pulse width for `channel`. Out-of-range channels are ignored.
    #[inline]
    pub fn store_width(&self, channel: usize, width: Ticks) {
        if let (Some(raw), Some(updated)) = (self.raw.get(channel), self.updated.get(channel)) {
            raw.store(width, Ordering::Release);
            updated.store(true, Ordering::Release);
        }
    }

    /// Marks a complete receiver frame.
    #[inline]
    pub fn complete_frame(&self) {
        self.frames.fetch_add(1, Ordering::AcqRel);
        self.frame_complete.store(true, Ordering::Release);
    }

    /// Called by capture on every edge. Raises the JitterFlag when an
    /// output frame is being generated.
    #[inline]
    pub fn note_edge(&self) {
        if self.jitter_gate.load(Ordering::Acquire) {
            self.jitter_flag.store(true, Ordering::Release);
            self.jitter_events.fetch_add(1, Ordering::AcqRel);
        }
    }

    // ==================== Main-loop side ====================

    /// Most recent width captured for `channel`, or zero if out of range.
    #[must_use]
    pub fn raw_width(&self, channel: usize) -> Ticks {
        self.raw
            .get(channel)
            .map_or(0, |raw| raw.load(Ordering::Acquire))
    }

    /// All raw widths. Each value is individually consistent; the set is not a snapshot.
    #[must_use]
    pub fn raw_widths(&self) -> [Ticks; MAX_RC_CHANNELS] {
        std::array::from_fn(|ch| self.raw_width(ch))
    }

    /// Number of complete receiver frames captured so far (wrapping).
    #[must_use]
    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::Acquire)
    }

    /// Returns and clears the frame-complete flag.
    pub fn take_frame_complete(&self) -> bool {
        self.frame_complete.swap(false, Ordering::AcqRel)
    }

    /// Opens or closes the JitterGate around a synchronized output frame.
    pub fn set_jitter_gate(&self, open: bool) {
        self.jitter_gate.store(open, Ordering::Release);
    }

    /// True while an output frame is being generated.
    #[must_use]
    pub fn jitter_gate(&self) -> bool {
        self.jitter_gate.load(Ordering::Acquire)
    }

    /// Returns and clears the JitterFlag.
    pub fn take_jitter_flag(&self) -> bool {
        self.jitter_flag.swap(false, Ordering::AcqRel)
    }

    /// Total edges that arrived while the JitterGate was set.
    #[must_use]
    pub fn jitter_events(&self) -> u32 {
        self.jitter_events.load(Ordering::Acquire)
    }
}

impl RawChannelSource for RcInputState {
    fn clear_updated(&self, channel: usize) {
        if let Some(updated) = self.updated.get(channel) {
            updated.store(false, Ordering::Release);
        }
    }

    fn raw(&self, channel: usize) -> Ticks {
        self.raw_width(channel)
    }

    fn was_updated(&self, channel: usize) -> bool {
        self.updated
            .get(channel)
            .is_some_and(|updated| updated.load(Ordering::Acquire))
    }

    fn frame_count(&self) -> u32 {
        self.frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_zeroed() {
        let state = RcInputState::new();
        assert_eq!(state.raw_widths(), [0; MAX_RC_CHANNELS]);
        assert_eq!(state.frames(), 0);
        assert!(!state.jitter_gate());
        assert_eq!(state.jitter_events(), 0);
    }

    #[test]
    fn test_store_width_sets_updated() {
        let state = RcInputState::new();
        state.store_width(2, 1500);
        assert_eq!(state.raw_width(2), 1500);
        assert!(state.was_updated(2));
        assert!(!state.was_updated(1));

        state.clear_updated(2);
        assert!(!state.was_updated(2));
        assert_eq!(state.raw(2), 1500);
    }

    #[test]
    fn test_store_width_out_of_range_ignored() {
        let state = RcInputState::new();
        state.store_width(MAX_RC_CHANNELS, 1500);
        assert_eq!(state.raw_width(MAX_RC_CHANNELS), 0);
        assert!(!state.was_updated(MAX_RC_CHANNELS));
    }

    #[test]
    fn test_frame_complete_flag() {
        let state = RcInputState::new();
        assert!(!state.take_frame_complete());
        state.complete_frame();
        assert_eq!(state.frames(), 1);
        assert!(state.take_frame_complete());
        assert!(!state.take_frame_complete());
    }

    #[test]
    fn test_edge_without_gate_is_not_jitter() {
        let state = RcInputState::new();
        state.note_edge();
        assert!(!state.take_jitter_flag());
        assert_eq!(state.jitter_events(), 0);
    }

    #[test]
    fn test_edge_with_gate_raises_jitter_flag() {
        let state = RcInputState::new();
        state.set_jitter_gate(true);
        state.note_edge();
        state.note_edge();
        state.set_jitter_gate(false);

        assert_eq!(state.jitter_events(), 2);
        assert!(state.take_jitter_flag());
        assert!(!state.take_jitter_flag());
    }
}
