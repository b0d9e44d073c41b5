//! Per-channel travel limits and motor/servo markers.

use serde::{Deserialize, Serialize};

use super::{OutputFrame, MAX_OUTPUTS};

/// What an output drives. Decides how the safety gate treats the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// ESC input; forced to minimum whenever the craft is not armed
    Motor,
    /// Control surface or gimbal; follows the mixer regardless of arm state
    #[default]
    Servo,
}

/// Limits for one output channel, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimit {
    /// Shortest pulse ever emitted
    pub min_us: u16,
    /// Longest pulse ever emitted
    pub max_us: u16,
    /// Motor or servo
    pub kind: ChannelKind,
    /// Position held while in RX failsafe; `None` keeps mixing (servos only)
    pub failsafe_us: Option<u16>,
}

impl Default for OutputLimit {
    fn default() -> Self {
        Self::servo(1000, 2000)
    }
}

impl OutputLimit {
    /// Servo channel with travel `[min_us, max_us]`.
    #[must_use]
    pub fn servo(min_us: u16, max_us: u16) -> Self {
        Self {
            min_us,
            max_us,
            kind: ChannelKind::Servo,
            failsafe_us: None,
        }
    }

    /// Motor channel with travel `[min_us, max_us]`.
    #[must_use]
    pub fn motor(min_us: u16, max_us: u16) -> Self {
        Self {
            min_us,
            max_us,
            kind: ChannelKind::Motor,
            failsafe_us: None,
        }
    }

    /// Sets the position held in RX failsafe.
    #[must_use]
    pub fn with_failsafe(mut self, us: u16) -> Self {
        self.failsafe_us = Some(us);
        self
    }

    /// Narrows the travel onto the falling-edge grid `base_us + k * step_us`.
    ///
    /// The step loop drops a pin at the first grid position at or past its
    /// target, so with both limits on the grid a clamped pulse never leaves
    /// `[min_us, max_us]`. Limits below `base_us` snap to `base_us`.
    #[must_use]
    pub fn on_step_grid(mut self, base_us: u16, step_us: u8) -> Self {
        let base = u32::from(base_us);
        let step = u32::from(step_us.max(1));
        let to_u16 = |us: u32| u16::try_from(us).unwrap_or(u16::MAX);
        let above = |us: u16| u32::from(us).saturating_sub(base);

        self.min_us = to_u16(base + above(self.min_us).div_ceil(step) * step);
        self.max_us = to_u16(base + above(self.max_us) / step * step);
        self
    }

    /// Clamps `us` into `[min_us, max_us]`.
    #[inline]
    #[must_use]
    pub fn clamp(&self, us: u16) -> u16 {
        us.clamp(self.min_us, self.max_us.max(self.min_us))
    }

    /// True for ESC channels.
    #[must_use]
    pub fn is_motor(&self) -> bool {
        self.kind == ChannelKind::Motor
    }
}

/// Limits for every output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputLimits(pub [OutputLimit; MAX_OUTPUTS]);

impl OutputLimits {
    /// Limit of one channel.
    #[must_use]
    pub fn get(&self, channel: usize) -> Option<&OutputLimit> {
        self.0.get(channel)
    }

    /// Clamps every channel of `frame` to its travel limits.
    #[must_use]
    pub fn clamp(&self, frame: &OutputFrame) -> OutputFrame {
        OutputFrame(std::array::from_fn(|ch| self.0[ch].clamp(frame.0[ch])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_single() {
        let limit = OutputLimit::servo(1100, 1900);
        assert_eq!(limit.clamp(900), 1100);
        assert_eq!(limit.clamp(1500), 1500);
        assert_eq!(limit.clamp(2400), 1900);
    }

    #[test]
    fn test_clamp_inverted_limits_does_not_panic() {
        let limit = OutputLimit::servo(1500, 1200);
        assert_eq!(limit.clamp(1000), 1500);
        assert_eq!(limit.clamp(2000), 1500);
    }

    #[test]
    fn test_clamp_frame_never_exceeds_limits() {
        let mut limits = OutputLimits::default();
        limits.0[0] = OutputLimit::motor(1000, 1950);
        limits.0[1] = OutputLimit::servo(1200, 1800);

        for us in [0u16, 500, 999, 1000, 1500, 1950, 1951, 3000, u16::MAX] {
            let clamped = limits.clamp(&OutputFrame::uniform(us));
            for (ch, &value) in clamped.0.iter().enumerate() {
                let limit = limits.get(ch).unwrap();
                assert!(value >= limit.min_us && value <= limit.max_us);
            }
        }
    }

    #[test]
    fn test_step_grid_narrows_inward() {
        let limit = OutputLimit::servo(1001, 1950).on_step_grid(900, 4);
        assert_eq!(limit.min_us, 1004);
        assert_eq!(limit.max_us, 1948);

        let on_grid = OutputLimit::motor(1000, 2000).on_step_grid(900, 4);
        assert_eq!((on_grid.min_us, on_grid.max_us), (1000, 2000));
        assert!(on_grid.is_motor());
    }

    #[test]
    fn test_step_grid_floor_is_base() {
        let limit = OutputLimit::servo(700, 2000).on_step_grid(900, 4);
        assert_eq!(limit.min_us, 900);
    }

    #[test]
    fn test_channel_kind_markers() {
        assert!(OutputLimit::motor(1000, 2000).is_motor());
        assert!(!OutputLimit::servo(1000, 2000).is_motor());
        assert_eq!(OutputLimit::servo(1000, 2000).with_failsafe(1500).failsafe_us, Some(1500));
    }

    #[test]
    fn test_channel_kind_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ChannelKind,
        }
        let w: Wrapper = toml::from_str("kind = \"motor\"").unwrap();
        assert_eq!(w.kind, ChannelKind::Motor);
    }
}
