//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The real-time core never reads [`Config`] directly. Once validated, it is
//! turned into the plain settings structs each subsystem takes at startup.
//!
//! Units: `[channels]`, `[input]` and `[rx]` values are hardware clock ticks
//! (see `[clock] ticks_per_us`); `[output]` values are microseconds.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::capture::{Capture, CppmDecoder, InputMode, Level, PwmCapture, MAX_RC_CHANNELS};
use crate::error::{RcIoError, Result};
use crate::output::{ChannelKind, OutputLimit, OutputLimits, OutputTiming, MAX_OUTPUTS};
use crate::output::scheduler::period_us;
use crate::pipeline::FlightIoSettings;
use crate::rc::expo::MAX_EXPO_LEVEL;
use crate::rc::{Axis, AxisMap, AxisSource, ExpoLevels, NormalizerSettings};
use crate::safety::SafetySettings;
use crate::timing::{Ticks, Timebase};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub clock: ClockConfig,
    pub input: InputConfig,
    pub channels: ChannelConfig,
    pub mapping: MappingConfig,
    pub expo: ExpoConfig,
    pub rx: RxConfig,
    pub output: OutputConfig,
    pub safety: SafetyConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

/// Hardware clock configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClockConfig {
    #[serde(default = "default_ticks_per_us")]
    pub ticks_per_us: u16,
}

/// Receiver input configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_input_mode")]
    pub mode: InputMode,

    #[serde(default = "default_channel_count")]
    pub channel_count: usize,

    /// PWM only: channel whose falling edge ends a receiver frame (default: last)
    #[serde(default)]
    pub frame_channel: Option<usize>,

    #[serde(default = "default_cppm_sync_threshold")]
    pub cppm_sync_threshold: Ticks,

    #[serde(default = "default_cppm_active_level")]
    pub cppm_active_level: Level,

    /// CPPM only: physical channel of each frame slot (default: identity)
    #[serde(default)]
    pub cppm_order: Vec<usize>,
}

/// Physical channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "default_zero_offsets")]
    pub zero_offsets: Vec<Ticks>,

    #[serde(default)]
    pub deadband: u16,

    #[serde(default = "default_max_read_retries")]
    pub max_read_retries: u32,
}

/// Logical axis assignment
#[derive(Debug, Deserialize, Clone)]
pub struct MappingConfig {
    #[serde(default = "default_roll_source")]
    pub roll: Option<AxisSource>,

    #[serde(default = "default_pitch_source")]
    pub pitch: Option<AxisSource>,

    #[serde(default = "default_yaw_source")]
    pub yaw: Option<AxisSource>,

    #[serde(default = "default_throttle_source")]
    pub throttle: Option<AxisSource>,

    #[serde(default = "default_aux1_source")]
    pub aux1: Option<AxisSource>,

    #[serde(default = "default_aux2_source")]
    pub aux2: Option<AxisSource>,

    #[serde(default = "default_aux3_source")]
    pub aux3: Option<AxisSource>,

    #[serde(default)]
    pub second_aileron: Option<AxisSource>,
}

/// Expo levels (0-100)
#[derive(Debug, Deserialize, Clone)]
pub struct ExpoConfig {
    #[serde(default)]
    pub roll: u8,

    #[serde(default)]
    pub pitch: u8,

    #[serde(default)]
    pub yaw: u8,
}

/// RX activity, failsafe and centering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RxConfig {
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: u16,

    #[serde(default = "default_failsafe_frames")]
    pub failsafe_frames: u16,

    #[serde(default = "default_center_frames")]
    pub center_frames: u16,

    #[serde(default)]
    pub calibrate_on_start: bool,
}

/// Output pulse train configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: u16,

    #[serde(default = "default_base_pulse_us")]
    pub base_pulse_us: u16,

    #[serde(default = "default_step_us")]
    pub step_us: u8,

    #[serde(default = "default_max_pulse_us")]
    pub max_pulse_us: u16,

    #[serde(default = "default_output_channels")]
    pub channels: Vec<OutputChannelConfig>,
}

/// One output channel
#[derive(Debug, Deserialize, Clone)]
pub struct OutputChannelConfig {
    #[serde(default)]
    pub kind: ChannelKind,

    #[serde(default = "default_min_us")]
    pub min_us: u16,

    #[serde(default = "default_max_us")]
    pub max_us: u16,

    #[serde(default)]
    pub failsafe_us: Option<u16>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Arming configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "default_arm_hold_frames")]
    pub arm_hold_frames: u16,

    #[serde(default = "default_arm_idle_threshold")]
    pub arm_idle_threshold: u16,

    #[serde(default = "default_stick_threshold")]
    pub stick_threshold: i16,

    #[serde(default)]
    pub auto_disarm_frames: u32,

    #[serde(default)]
    pub camstab: bool,
}

/// Diagnostics file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_diagnostics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_frames")]
    pub log_interval_frames: u32,
}

/// Console and file logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Mirror logs to a daily-rolling file in this directory
    #[serde(default)]
    pub file_dir: Option<String>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_ticks_per_us() -> u16 { 1 }

fn default_input_mode() -> InputMode { InputMode::Pwm }
fn default_channel_count() -> usize { MAX_RC_CHANNELS }
fn default_cppm_sync_threshold() -> Ticks { 3000 }
fn default_cppm_active_level() -> Level { Level::High }

fn default_zero_offsets() -> Vec<Ticks> { vec![1500; MAX_RC_CHANNELS] }
fn default_max_read_retries() -> u32 { 16 }

fn default_roll_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Roll) }
fn default_pitch_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Pitch) }
fn default_yaw_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Yaw) }
fn default_throttle_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Throttle) }
fn default_aux1_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Aux1) }
fn default_aux2_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Aux2) }
fn default_aux3_source() -> Option<AxisSource> { AxisMap::default().source(Axis::Aux3) }

fn default_noise_threshold() -> u16 { 20 }
fn default_failsafe_frames() -> u16 { 25 }
fn default_center_frames() -> u16 { 32 }

fn default_frame_rate_hz() -> u16 { 50 }
fn default_base_pulse_us() -> u16 { 900 }
fn default_step_us() -> u8 { 4 }
fn default_max_pulse_us() -> u16 { 2100 }
fn default_min_us() -> u16 { 1000 }
fn default_max_us() -> u16 { 2000 }
fn default_enabled() -> bool { true }

fn default_output_channels() -> Vec<OutputChannelConfig> {
    (0..MAX_OUTPUTS)
        .map(|ch| OutputChannelConfig {
            kind: if ch == 0 { ChannelKind::Motor } else { ChannelKind::Servo },
            min_us: default_min_us(),
            max_us: default_max_us(),
            failsafe_us: None,
            enabled: default_enabled(),
        })
        .collect()
}

fn default_arm_hold_frames() -> u16 { 50 }
fn default_arm_idle_threshold() -> u16 { 50 }
fn default_stick_threshold() -> i16 { 400 }

fn default_diagnostics_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_frames() -> u32 { 50 }

fn default_log_level() -> String { "info".to_string() }
fn default_file_prefix() -> String { "openaero-io.log".to_string() }

fn invalid(message: impl std::fmt::Display) -> RcIoError {
    RcIoError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use openaero_io::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate clock
        if self.clock.ticks_per_us == 0 || self.clock.ticks_per_us > 16 {
            return Err(invalid("ticks_per_us must be between 1 and 16"));
        }

        // Validate input
        let channel_count = self.input.channel_count;
        if channel_count == 0 || channel_count > MAX_RC_CHANNELS {
            return Err(invalid(format!("channel_count must be between 1 and {}", MAX_RC_CHANNELS)));
        }

        if let Some(frame_channel) = self.input.frame_channel {
            if frame_channel >= channel_count {
                return Err(RcIoError::InvalidChannel(frame_channel));
            }
        }

        if self.input.cppm_sync_threshold == 0 {
            return Err(invalid("cppm_sync_threshold must be greater than 0"));
        }

        if self.input.cppm_order.len() > channel_count {
            return Err(invalid("cppm_order cannot list more slots than channel_count"));
        }

        for &channel in &self.input.cppm_order {
            if channel >= MAX_RC_CHANNELS {
                return Err(RcIoError::InvalidChannel(channel));
            }
        }

        // Validate channels
        if self.channels.zero_offsets.len() > MAX_RC_CHANNELS {
            return Err(invalid(format!("zero_offsets cannot have more than {} entries", MAX_RC_CHANNELS)));
        }

        if self.channels.max_read_retries > 1000 {
            return Err(invalid("max_read_retries must be at most 1000"));
        }

        // Validate mapping
        for (name, source) in self.mapping.entries() {
            if let Some(source) = source {
                if source.channel >= channel_count {
                    return Err(invalid(format!(
                        "mapping.{} channel {} is out of range (must be below channel_count {})",
                        name, source.channel, channel_count
                    )));
                }
            }
        }

        // Validate expo levels
        for (name, value) in [
            ("roll", self.expo.roll),
            ("pitch", self.expo.pitch),
            ("yaw", self.expo.yaw),
        ] {
            if value > MAX_EXPO_LEVEL {
                return Err(invalid(format!("expo.{} must be between 0 and {}", name, MAX_EXPO_LEVEL)));
            }
        }

        // Validate RX detection
        if self.rx.failsafe_frames == 0 {
            return Err(invalid("failsafe_frames must be greater than 0"));
        }

        if self.rx.center_frames == 0 {
            return Err(invalid("center_frames must be greater than 0"));
        }

        // Validate output timing
        if self.output.frame_rate_hz == 0 || self.output.frame_rate_hz > 500 {
            return Err(invalid("frame_rate_hz must be between 1 and 500"));
        }

        let period = period_us(self.output.frame_rate_hz);
        if Timebase::new(self.clock.ticks_per_us).us_to_ticks(period) > u32::from(Ticks::MAX) {
            return Err(invalid("frame period does not fit the 16-bit clock; lower ticks_per_us or raise frame_rate_hz"));
        }

        if self.output.step_us == 0 {
            return Err(invalid("step_us must be greater than 0"));
        }

        if self.output.base_pulse_us >= self.output.max_pulse_us {
            return Err(invalid("base_pulse_us must be less than max_pulse_us"));
        }

        if u32::from(self.output.max_pulse_us) >= period {
            return Err(invalid("max_pulse_us must be shorter than the frame period"));
        }

        // Validate output channels
        if self.output.channels.len() > MAX_OUTPUTS {
            return Err(invalid(format!("at most {} output channels can be configured", MAX_OUTPUTS)));
        }

        for (index, channel) in self.output.channels.iter().enumerate() {
            if channel.min_us >= channel.max_us {
                return Err(invalid(format!("output channel {}: min_us must be less than max_us", index)));
            }

            if channel.min_us < self.output.base_pulse_us || channel.max_us > self.output.max_pulse_us {
                return Err(invalid(format!(
                    "output channel {}: min_us..=max_us must lie within base_pulse_us..=max_pulse_us",
                    index
                )));
            }

            let snapped = OutputLimit::servo(channel.min_us, channel.max_us)
                .on_step_grid(self.output.base_pulse_us, self.output.step_us);
            if snapped.min_us > snapped.max_us {
                return Err(invalid(format!(
                    "output channel {}: no {} us step lies between min_us and max_us",
                    index, self.output.step_us
                )));
            }

            if let Some(failsafe_us) = channel.failsafe_us {
                if failsafe_us < channel.min_us || failsafe_us > channel.max_us {
                    return Err(invalid(format!(
                        "output channel {}: failsafe_us must be within min_us..=max_us",
                        index
                    )));
                }
            }
        }

        // Validate safety
        if self.safety.arm_hold_frames == 0 {
            return Err(invalid("arm_hold_frames must be greater than 0"));
        }

        if self.safety.stick_threshold <= 0 {
            return Err(invalid("stick_threshold must be greater than 0"));
        }

        // Validate diagnostics
        if self.diagnostics.enabled && self.diagnostics.log_dir.is_empty() {
            return Err(invalid("diagnostics log_dir cannot be empty when enabled"));
        }

        if self.diagnostics.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.diagnostics.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.diagnostics.log_interval_frames == 0 {
            return Err(invalid("log_interval_frames must be greater than 0"));
        }

        // Validate logging
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }

    /// Main clock rate
    #[must_use]
    pub fn timebase(&self) -> Timebase {
        Timebase::new(self.clock.ticks_per_us)
    }

    /// Capture strategy for the configured input mode
    #[must_use]
    pub fn capture(&self) -> Capture {
        let count = self.input.channel_count;
        match self.input.mode {
            InputMode::Pwm => {
                let frame_channel = self.input.frame_channel.unwrap_or(count.saturating_sub(1));
                Capture::Pwm(PwmCapture::new(count, frame_channel))
            }
            InputMode::Cppm => Capture::Cppm(
                CppmDecoder::new(count, self.input.cppm_sync_threshold, self.input.cppm_active_level)
                    .with_order(&self.input.cppm_order),
            ),
        }
    }

    /// Logical axis assignment table
    #[must_use]
    pub fn axis_map(&self) -> AxisMap {
        let m = &self.mapping;
        AxisMap::empty()
            .with(Axis::Roll, m.roll)
            .with(Axis::Pitch, m.pitch)
            .with(Axis::Yaw, m.yaw)
            .with(Axis::Throttle, m.throttle)
            .with(Axis::Aux1, m.aux1)
            .with(Axis::Aux2, m.aux2)
            .with(Axis::Aux3, m.aux3)
            .with(Axis::SecondAileron, m.second_aileron)
    }

    /// Zero offsets per physical channel; unlisted channels center at 1500 µs
    #[must_use]
    pub fn zero_offsets(&self) -> [Ticks; MAX_RC_CHANNELS] {
        let center = self.timebase().us_to_ticks(1500).min(u32::from(Ticks::MAX)) as Ticks;
        std::array::from_fn(|ch| self.channels.zero_offsets.get(ch).copied().unwrap_or(center))
    }

    /// Normalizer settings
    #[must_use]
    pub fn normalizer_settings(&self) -> NormalizerSettings {
        NormalizerSettings {
            zero_offsets: self.zero_offsets(),
            channel_count: self.input.channel_count,
            max_read_retries: self.channels.max_read_retries,
            axis_map: self.axis_map(),
            deadband: self.channels.deadband,
            expo: ExpoLevels {
                roll: self.expo.roll,
                pitch: self.expo.pitch,
                yaw: self.expo.yaw,
            },
            noise_threshold: self.rx.noise_threshold,
            failsafe_frames: self.rx.failsafe_frames,
        }
    }

    /// Output scheduler timing
    #[must_use]
    pub fn output_timing(&self) -> OutputTiming {
        let channel_mask = self
            .output
            .channels
            .iter()
            .enumerate()
            .filter(|(_, channel)| channel.enabled)
            .fold(0u8, |mask, (index, _)| mask | (1 << index));

        OutputTiming {
            frame_period_us: period_us(self.output.frame_rate_hz),
            base_pulse_us: self.output.base_pulse_us,
            step_us: self.output.step_us,
            max_pulse_us: self.output.max_pulse_us,
            channel_mask,
            timebase: self.timebase(),
        }
    }

    /// Travel limits and motor/servo markers, narrowed onto the output step grid
    #[must_use]
    pub fn output_limits(&self) -> OutputLimits {
        let mut limits = OutputLimits::default();
        for (limit, channel) in limits.0.iter_mut().zip(self.output.channels.iter()) {
            *limit = OutputLimit {
                min_us: channel.min_us,
                max_us: channel.max_us,
                kind: channel.kind,
                failsafe_us: channel.failsafe_us,
            }
            .on_step_grid(self.output.base_pulse_us, self.output.step_us);
        }
        limits
    }

    /// Arming settings
    #[must_use]
    pub fn safety_settings(&self) -> SafetySettings {
        SafetySettings {
            arm_hold_frames: self.safety.arm_hold_frames,
            arm_idle_threshold: self.safety.arm_idle_threshold,
            stick_threshold: self.safety.stick_threshold,
            auto_disarm_frames: self.safety.auto_disarm_frames,
            camstab: self.safety.camstab,
        }
    }

    /// Everything the flight I/O pipeline needs
    #[must_use]
    pub fn flight_io_settings(&self) -> FlightIoSettings {
        FlightIoSettings {
            normalizer: self.normalizer_settings(),
            timing: self.output_timing(),
            limits: self.output_limits(),
            safety: self.safety_settings(),
        }
    }
}

impl MappingConfig {
    fn entries(&self) -> [(&'static str, Option<AxisSource>); 8] {
        [
            ("roll", self.roll),
            ("pitch", self.pitch),
            ("yaw", self.yaw),
            ("throttle", self.throttle),
            ("aux1", self.aux1),
            ("aux2", self.aux2),
            ("aux3", self.aux3),
            ("second_aileron", self.second_aileron),
        ]
    }
}
