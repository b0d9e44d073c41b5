//! Synthetic RC receiver edge trains.

use super::board::ScheduledEdge;
use crate::capture::{InputMode, Level, MAX_RC_CHANNELS};

/// Separator pulse width of a CPPM train.
pub const CPPM_SEPARATOR_US: u16 = 300;

/// Default frame period of a PWM receiver.
pub const PWM_FRAME_PERIOD_US: u32 = 20_000;

/// Default frame period of a CPPM receiver.
pub const CPPM_FRAME_PERIOD_US: u32 = 22_500;

/// Generates the input edges of one receiver frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimReceiver {
    mode: InputMode,
    channel_count: usize,
    frame_period_us: u32,
    active_level: Level,
}

impl SimReceiver {
    /// Discrete PWM receiver emitting its channels one after another.
    #[must_use]
    pub fn pwm(channel_count: usize) -> Self {
        Self {
            mode: InputMode::Pwm,
            channel_count: channel_count.clamp(1, MAX_RC_CHANNELS),
            frame_period_us: PWM_FRAME_PERIOD_US,
            active_level: Level::High,
        }
    }

    /// CPPM receiver on input pin 0.
    #[must_use]
    pub fn cppm(channel_count: usize) -> Self {
        Self {
            mode: InputMode::Cppm,
            channel_count: channel_count.clamp(1, MAX_RC_CHANNELS),
            frame_period_us: CPPM_FRAME_PERIOD_US,
            active_level: Level::High,
        }
    }

    /// Receiver for a configured input mode.
    #[must_use]
    pub fn for_mode(mode: InputMode, channel_count: usize) -> Self {
        match mode {
            InputMode::Pwm => Self::pwm(channel_count),
            InputMode::Cppm => Self::cppm(channel_count),
        }
    }

    /// Level of the CPPM separator pulse; `Low` models an inverted train.
    #[must_use]
    pub fn with_active_level(mut self, level: Level) -> Self {
        self.active_level = level;
        self
    }

    #[must_use]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    #[must_use]
    pub fn frame_period_us(&self) -> u32 {
        self.frame_period_us
    }

    /// Edges of one frame starting at `start_us`. Missing widths are sent as 1500 µs.
    #[must_use]
    pub fn frame_edges(&self, start_us: u64, widths_us: &[u16]) -> Vec<ScheduledEdge> {
        let width = |ch: usize| u64::from(widths_us.get(ch).copied().unwrap_or(1500));
        match self.mode {
            InputMode::Pwm => self.pwm_edges(start_us, width),
            InputMode::Cppm => self.cppm_edges(start_us, width),
        }
    }

    fn pwm_edges(&self, start_us: u64, width: impl Fn(usize) -> u64) -> Vec<ScheduledEdge> {
        let mut edges = Vec::with_capacity(self.channel_count * 2);
        let mut t = start_us;
        for pin in 0..self.channel_count {
            edges.push(ScheduledEdge { time_us: t, pin, level: Level::High });
            t += width(pin);
            edges.push(ScheduledEdge { time_us: t, pin, level: Level::Low });
        }
        edges
    }

    fn cppm_edges(&self, start_us: u64, width: impl Fn(usize) -> u64) -> Vec<ScheduledEdge> {
        let inactive = match self.active_level {
            Level::High => Level::Low,
            Level::Low => Level::High,
        };
        let separator = |time_us: u64, edges: &mut Vec<ScheduledEdge>| {
            edges.push(ScheduledEdge { time_us, pin: 0, level: self.active_level });
            edges.push(ScheduledEdge {
                time_us: time_us + u64::from(CPPM_SEPARATOR_US),
                pin: 0,
                level: inactive,
            });
        };

        let mut edges = Vec::with_capacity((self.channel_count + 1) * 2);
        let mut t = start_us;
        for slot in 0..self.channel_count {
            separator(t, &mut edges);
            t += width(slot);
        }
        // Closing separator ends the last slot
        separator(t, &mut edges);
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwm_edges_staggered() {
        let rx = SimReceiver::pwm(3);
        let edges = rx.frame_edges(1_000, &[1_100, 1_500, 1_900]);

        assert_eq!(edges.len(), 6);
        assert_eq!(edges[0], ScheduledEdge { time_us: 1_000, pin: 0, level: Level::High });
        assert_eq!(edges[1], ScheduledEdge { time_us: 2_100, pin: 0, level: Level::Low });
        assert_eq!(edges[2].time_us, 2_100);
        assert_eq!(edges[5], ScheduledEdge { time_us: 5_500, pin: 2, level: Level::Low });
    }

    #[test]
    fn test_missing_widths_default_to_center() {
        let rx = SimReceiver::pwm(2);
        let edges = rx.frame_edges(0, &[1_200]);
        assert_eq!(edges[3].time_us - edges[2].time_us, 1_500);
    }

    #[test]
    fn test_cppm_active_edges_span_widths() {
        let rx = SimReceiver::cppm(4);
        let edges = rx.frame_edges(0, &[1_000, 1_250, 1_500, 2_000]);

        let active: Vec<u64> = edges
            .iter()
            .filter(|edge| edge.level == Level::High)
            .map(|edge| edge.time_us)
            .collect();
        assert_eq!(active, vec![0, 1_000, 2_250, 3_750, 5_750]);
        assert!(edges.iter().all(|edge| edge.pin == 0));
    }

    #[test]
    fn test_cppm_inverted_train() {
        let rx = SimReceiver::cppm(1).with_active_level(Level::Low);
        let edges = rx.frame_edges(0, &[1_500]);
        assert_eq!(edges[0].level, Level::Low);
        assert_eq!(edges[1], ScheduledEdge { time_us: 300, pin: 0, level: Level::High });
    }

    #[test]
    fn test_for_mode() {
        assert_eq!(SimReceiver::for_mode(InputMode::Cppm, 8).frame_period_us(), CPPM_FRAME_PERIOD_US);
        assert_eq!(SimReceiver::for_mode(InputMode::Pwm, 8).mode(), InputMode::Pwm);
    }
}
