//! # Channel Normalizer
//!
//! Turns raw pulse widths into one consistent snapshot of logical channel
//! values per RC frame.
//!
//! ## Read protocol
//!
//! The capture interrupt may overwrite a raw width at any time. For each
//! channel the normalizer:
//!
//! 1. clears the channel's updated flag,
//! 2. reads the raw width and computes the offset value,
//! 3. checks the updated flag; if capture fired meanwhile, starts over.
//!
//! A published value therefore always comes from a single raw sample. The
//! retry loop is capped; when the cap is hit the channel keeps its previous
//! value for this frame and the event is counted.

use tracing::{debug, warn};

use super::activity::RxActivity;
use super::channel_mapper::{Axis, AxisMap, ChannelMapper, ExpoLevels, AXIS_COUNT};
use super::{RawChannelSource, MAX_RC_CHANNELS, RC_VALUE_LIMIT};
use crate::timing::Ticks;

/// Default retry cap for one channel read.
pub const DEFAULT_MAX_READ_RETRIES: u32 = 16;

/// Normalizer settings derived from configuration at startup.
#[derive(Debug, Clone)]
pub struct NormalizerSettings {
    /// Center pulse width per physical channel, in ticks
    pub zero_offsets: [Ticks; MAX_RC_CHANNELS],
    /// Number of physical channels read each frame
    pub channel_count: usize,
    /// Retries allowed after the first attempt of a channel read
    pub max_read_retries: u32,
    /// Logical axis assignment
    pub axis_map: AxisMap,
    /// Stick deadband in ticks
    pub deadband: u16,
    /// Expo levels per stick axis
    pub expo: ExpoLevels,
    /// Activity noise threshold in ticks
    pub noise_threshold: u16,
    /// Ticks without a new frame before failsafe
    pub failsafe_frames: u16,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            zero_offsets: [1500; MAX_RC_CHANNELS],
            channel_count: MAX_RC_CHANNELS,
            max_read_retries: DEFAULT_MAX_READ_RETRIES,
            axis_map: AxisMap::default(),
            deadband: 0,
            expo: ExpoLevels::default(),
            noise_threshold: 20,
            failsafe_frames: 25,
        }
    }
}

/// Logical channel values for one RC frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcSnapshot {
    /// Values indexed by [`Axis`]
    pub values: [i16; AXIS_COUNT],
    /// Sticks moved beyond the noise threshold since the previous frame
    pub active: bool,
    /// Receiver frames stopped arriving
    pub failsafe: bool,
    /// A capture frame completed since the previous snapshot
    pub new_frame: bool,
    /// Capture frame counter at snapshot time
    pub frame: u32,
}

impl Default for RcSnapshot {
    fn default() -> Self {
        Self {
            values: [0; AXIS_COUNT],
            active: false,
            failsafe: false,
            new_frame: false,
            frame: 0,
        }
    }
}

impl RcSnapshot {
    /// Value of one axis.
    #[inline]
    #[must_use]
    pub fn get(&self, axis: Axis) -> i16 {
        self.values[axis as usize]
    }

    /// Throttle as an unsigned quantity.
    #[must_use]
    pub fn throttle(&self) -> u16 {
        self.get(Axis::Throttle).max(0) as u16
    }
}

/// Per-frame channel normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    zero_offsets: [Ticks; MAX_RC_CHANNELS],
    channel_count: usize,
    max_read_retries: u32,
    mapper: ChannelMapper,
    activity: RxActivity,
    physical: [i32; MAX_RC_CHANNELS],
    retries: u32,
    torn_read_exhausted: u32,
    last: RcSnapshot,
}

impl Normalizer {
    /// Creates a normalizer from settings.
    #[must_use]
    pub fn new(settings: &NormalizerSettings) -> Self {
        let mapper = ChannelMapper::new(settings.axis_map)
            .with_deadband(settings.deadband)
            .with_expo(settings.expo);
        Self {
            zero_offsets: settings.zero_offsets,
            channel_count: settings.channel_count.clamp(1, MAX_RC_CHANNELS),
            max_read_retries: settings.max_read_retries,
            mapper,
            activity: RxActivity::new(settings.noise_threshold, settings.failsafe_frames),
            physical: [0; MAX_RC_CHANNELS],
            retries: 0,
            torn_read_exhausted: 0,
            last: RcSnapshot::default(),
        }
    }

    /// Replaces the zero offsets, e.g. after a centering run.
    pub fn set_zero_offsets(&mut self, offsets: [Ticks; MAX_RC_CHANNELS]) {
        self.zero_offsets = offsets;
    }

    /// Current zero offsets.
    #[must_use]
    pub fn zero_offsets(&self) -> &[Ticks; MAX_RC_CHANNELS] {
        &self.zero_offsets
    }

    /// `raw - zero_offset`, clamped to the logical value range.
    #[inline]
    #[must_use]
    pub fn offset_value(&self, channel: usize, raw: Ticks) -> i32 {
        let zero = self.zero_offsets.get(channel).copied().unwrap_or(0);
        (i32::from(raw) - i32::from(zero)).clamp(-RC_VALUE_LIMIT, RC_VALUE_LIMIT)
    }

    /// Reads one channel with the clear/read/check retry protocol.
    ///
    /// Returns `None` if capture kept overwriting the channel for more than
    /// the configured number of retries.
    pub fn read_channel<S: RawChannelSource + ?Sized>(&mut self, source: &S, channel: usize) -> Option<i32> {
        for attempt in 0..=self.max_read_retries {
            if attempt > 0 {
                self.retries = self.retries.wrapping_add(1);
            }
            source.clear_updated(channel);
            let raw = source.raw(channel);
            let value = self.offset_value(channel, raw);
            if !source.was_updated(channel) {
                return Some(value);
            }
        }
        None
    }

    /// Reads every channel and produces this frame's snapshot.
    pub fn snapshot<S: RawChannelSource + ?Sized>(&mut self, source: &S) -> RcSnapshot {
        for channel in 0..self.channel_count {
            match self.read_channel(source, channel) {
                Some(value) => self.physical[channel] = value,
                None => {
                    self.torn_read_exhausted = self.torn_read_exhausted.wrapping_add(1);
                    warn!(
                        "Channel {} changed on every read attempt, keeping previous value {}",
                        channel, self.physical[channel]
                    );
                }
            }
        }

        let values = self.mapper.map_to_axes(&self.physical);
        let was_failsafe = self.activity.failsafe();
        let status = self.activity.update(&values, source.frame_count());

        if status.failsafe && !was_failsafe {
            warn!("RX failsafe: no receiver frame for {} ticks", self.activity.missed_frames());
        } else if !status.failsafe && was_failsafe {
            debug!("RX frames resumed, failsafe cleared");
        }

        self.last = RcSnapshot {
            values,
            active: status.active,
            failsafe: status.failsafe,
            new_frame: status.new_frame,
            frame: source.frame_count(),
        };
        self.last
    }

    /// Most recent snapshot.
    #[must_use]
    pub fn last(&self) -> &RcSnapshot {
        &self.last
    }

    /// Total retries performed across all reads.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Channel reads that hit the retry cap.
    #[must_use]
    pub fn torn_read_exhausted(&self) -> u32 {
        self.torn_read_exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RcInputState;
    use crate::rc::channel_mapper::Polarity;
    use crate::rc::MockRawChannelSource;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn settings() -> NormalizerSettings {
        NormalizerSettings {
            zero_offsets: [1500; MAX_RC_CHANNELS],
            channel_count: 4,
            ..NormalizerSettings::default()
        }
    }

    // ==================== Offset Tests ====================

    #[test]
    fn test_offset_value() {
        let normalizer = Normalizer::new(&settings());
        assert_eq!(normalizer.offset_value(0, 1750), 250);
        assert_eq!(normalizer.offset_value(0, 1250), -250);
        assert_eq!(normalizer.offset_value(0, 1500), 0);
    }

    #[test]
    fn test_offset_value_clamped() {
        let normalizer = Normalizer::new(&settings());
        assert_eq!(normalizer.offset_value(0, 0), -RC_VALUE_LIMIT);
        assert_eq!(normalizer.offset_value(0, u16::MAX), RC_VALUE_LIMIT);
    }

    #[test]
    fn test_snapshot_from_state() {
        let state = RcInputState::new();
        state.store_width(0, 1750);
        state.store_width(1, 1400);
        state.store_width(2, 1100);
        state.store_width(3, 1500);
        state.complete_frame();

        let mut s = settings();
        s.zero_offsets[2] = 1100;
        let mut normalizer = Normalizer::new(&s);
        let snapshot = normalizer.snapshot(&state);

        assert_eq!(snapshot.get(Axis::Roll), 250);
        assert_eq!(snapshot.get(Axis::Pitch), -100);
        assert_eq!(snapshot.throttle(), 0);
        assert_eq!(snapshot.get(Axis::Yaw), 0);
        assert!(snapshot.new_frame);
        assert_eq!(snapshot.frame, 1);
        assert_eq!(normalizer.last(), &snapshot);
    }

    #[test]
    fn test_snapshot_aliased_flaperon() {
        let state = RcInputState::new();
        state.store_width(0, 1700);

        let mut s = settings();
        s.axis_map = AxisMap::default().with_second_aileron(0, Polarity::Reversed);
        let mut normalizer = Normalizer::new(&s);
        let snapshot = normalizer.snapshot(&state);

        assert_eq!(snapshot.get(Axis::Roll), 200);
        assert_eq!(snapshot.get(Axis::SecondAileron), -200);
    }

    #[test]
    fn test_set_zero_offsets() {
        let mut normalizer = Normalizer::new(&settings());
        normalizer.set_zero_offsets([1520; MAX_RC_CHANNELS]);
        assert_eq!(normalizer.zero_offsets()[3], 1520);
        assert_eq!(normalizer.offset_value(3, 1520), 0);
    }

    // ==================== Retry Protocol Tests ====================

    #[test]
    fn test_clean_read_takes_one_attempt() {
        let mut source = MockRawChannelSource::new();
        source.expect_clear_updated().with(eq(0)).times(1).return_const(());
        source.expect_raw().with(eq(0)).times(1).return_const(1750u16);
        source.expect_was_updated().with(eq(0)).times(1).return_const(false);

        let mut normalizer = Normalizer::new(&settings());
        assert_eq!(normalizer.read_channel(&source, 0), Some(250));
        assert_eq!(normalizer.retries(), 0);
    }

    #[test]
    fn test_torn_read_is_retried() {
        let mut source = MockRawChannelSource::new();
        let mut seq = Sequence::new();

        // First attempt: capture fires between the read and the check
        source.expect_clear_updated().times(1).in_sequence(&mut seq).return_const(());
        source.expect_raw().times(1).in_sequence(&mut seq).return_const(1700u16);
        source.expect_was_updated().times(1).in_sequence(&mut seq).return_const(true);
        // Second attempt is clean
        source.expect_clear_updated().times(1).in_sequence(&mut seq).return_const(());
        source.expect_raw().times(1).in_sequence(&mut seq).return_const(1750u16);
        source.expect_was_updated().times(1).in_sequence(&mut seq).return_const(false);

        let mut normalizer = Normalizer::new(&settings());
        assert_eq!(normalizer.read_channel(&source, 0), Some(250));
        assert_eq!(normalizer.retries(), 1);
    }

    #[test]
    fn test_retry_cap_terminates() {
        let mut source = MockRawChannelSource::new();
        source.expect_clear_updated().times(4).return_const(());
        source.expect_raw().times(4).return_const(1600u16);
        source.expect_was_updated().times(4).return_const(true);

        let mut s = settings();
        s.max_read_retries = 3;
        let mut normalizer = Normalizer::new(&s);
        assert_eq!(normalizer.read_channel(&source, 0), None);
        assert_eq!(normalizer.retries(), 3);
    }

    #[test]
    fn test_exhausted_channel_keeps_previous_value() {
        let state = RcInputState::new();
        state.store_width(0, 1800);
        let mut s = settings();
        s.channel_count = 1;
        s.max_read_retries = 2;
        let mut normalizer = Normalizer::new(&s);
        assert_eq!(normalizer.snapshot(&state).get(Axis::Roll), 300);

        let mut source = MockRawChannelSource::new();
        source.expect_clear_updated().return_const(());
        source.expect_raw().return_const(1000u16);
        source.expect_was_updated().return_const(true);
        source.expect_frame_count().return_const(1u32);

        let snapshot = normalizer.snapshot(&source);
        assert_eq!(snapshot.get(Axis::Roll), 300);
        assert_eq!(normalizer.torn_read_exhausted(), 1);
    }

    #[test]
    fn test_concurrent_writer_never_yields_torn_value() {
        let state = Arc::new(RcInputState::new());
        let stop = Arc::new(AtomicBool::new(false));
        state.store_width(0, 1600);

        let writer = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut toggle = false;
                while !stop.load(Ordering::Relaxed) {
                    state.store_width(0, if toggle { 1800 } else { 1600 });
                    toggle = !toggle;
                    std::thread::yield_now();
                }
            })
        };

        let mut s = settings();
        s.max_read_retries = 1_000;
        let mut normalizer = Normalizer::new(&s);
        let mut clean_reads = 0;
        for _ in 0..2_000 {
            if let Some(value) = normalizer.read_channel(&*state, 0) {
                assert!(value == 100 || value == 300, "torn value {}", value);
                clean_reads += 1;
            }
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        assert!(clean_reads > 0);
    }

    // ==================== Activity Tests ====================

    #[test]
    fn test_snapshot_failsafe_after_missed_frames() {
        let state = RcInputState::new();
        let mut s = settings();
        s.failsafe_frames = 3;
        let mut normalizer = Normalizer::new(&s);

        state.complete_frame();
        assert!(!normalizer.snapshot(&state).failsafe);
        for _ in 0..2 {
            assert!(!normalizer.snapshot(&state).failsafe);
        }
        assert!(normalizer.snapshot(&state).failsafe);

        state.complete_frame();
        assert!(!normalizer.snapshot(&state).failsafe);
    }

    #[test]
    fn test_snapshot_activity() {
        let state = RcInputState::new();
        state.store_width(0, 1500);
        let mut normalizer = Normalizer::new(&settings());
        assert!(!normalizer.snapshot(&state).active);

        state.store_width(0, 1600);
        assert!(normalizer.snapshot(&state).active);
        assert!(!normalizer.snapshot(&state).active);
    }
}
