//! # RC Channel Mapper Module
//!
//! Maps zero-offset physical channel values onto logical flight axes.
//!
//! ## Default Assignments
//!
//! | Axis | Physical channel | Shaping |
//! |------|------------------|---------|
//! | Roll | CH1 | deadband, roll expo |
//! | Pitch | CH2 | deadband, pitch expo |
//! | Throttle | CH3 | floored at zero |
//! | Yaw | CH4 | deadband, yaw expo |
//! | Aux1 | CH5 | none |
//! | Aux2 | CH6 | none |
//! | Aux3 | CH7 | none |
//! | Second aileron | unassigned | deadband, roll expo |
//!
//! ## Aliasing
//!
//! Several axes may read the same physical channel (flaperons: one aileron
//! input driving two logical outputs). Each axis applies its own polarity to
//! the *unreversed* physical value, so reversing one alias never flips the
//! other.
//!
//! ## Usage
//!
//! ```
//! use openaero_io::rc::channel_mapper::{Axis, AxisMap, ChannelMapper, Polarity};
//! use openaero_io::rc::MAX_RC_CHANNELS;
//!
//! let map = AxisMap::default().with_second_aileron(0, Polarity::Reversed);
//! let mapper = ChannelMapper::new(map);
//!
//! let mut physical = [0i32; MAX_RC_CHANNELS];
//! physical[0] = 250;
//! let axes = mapper.map_to_axes(&physical);
//!
//! assert_eq!(axes[Axis::Roll as usize], 250);
//! assert_eq!(axes[Axis::SecondAileron as usize], -250);
//! ```

use serde::Deserialize;

use super::expo::get_expo;
use super::{RC_VALUE_LIMIT, MAX_RC_CHANNELS};

/// Number of logical axes.
pub const AXIS_COUNT: usize = 8;

/// Logical flight axes, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Aileron
    Roll = 0,
    /// Elevator
    Pitch = 1,
    /// Rudder
    Yaw = 2,
    /// Throttle / collective, unipolar
    Throttle = 3,
    /// First auxiliary (gear / mode switch)
    Aux1 = 4,
    /// Second auxiliary
    Aux2 = 5,
    /// Third auxiliary
    Aux3 = 6,
    /// Second aileron for flaperon setups
    SecondAileron = 7,
}

impl Axis {
    /// All axes in snapshot order.
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::Roll,
        Axis::Pitch,
        Axis::Yaw,
        Axis::Throttle,
        Axis::Aux1,
        Axis::Aux2,
        Axis::Aux3,
        Axis::SecondAileron,
    ];

    /// True for axes that represent a unipolar quantity.
    #[must_use]
    pub fn is_unipolar(self) -> bool {
        matches!(self, Axis::Throttle)
    }
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Value passes through.
    #[default]
    Normal,
    /// Value is negated.
    Reversed,
}

impl Polarity {
    /// Applies this polarity to a value.
    #[inline]
    #[must_use]
    pub fn apply(self, value: i32) -> i32 {
        match self {
            Polarity::Normal => value,
            Polarity::Reversed => -value,
        }
    }
}

/// Physical channel and polarity feeding one logical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AxisSource {
    /// Physical channel index (0-based).
    pub channel: usize,
    /// Polarity applied for this axis only.
    #[serde(default)]
    pub polarity: Polarity,
}

impl AxisSource {
    /// Normal-polarity source.
    #[must_use]
    pub fn normal(channel: usize) -> Self {
        Self { channel, polarity: Polarity::Normal }
    }
}

/// Logical-axis assignment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMap {
    sources: [Option<AxisSource>; AXIS_COUNT],
}

impl Default for AxisMap {
    fn default() -> Self {
        let mut sources = [None; AXIS_COUNT];
        sources[Axis::Roll as usize] = Some(AxisSource::normal(0));
        sources[Axis::Pitch as usize] = Some(AxisSource::normal(1));
        sources[Axis::Throttle as usize] = Some(AxisSource::normal(2));
        sources[Axis::Yaw as usize] = Some(AxisSource::normal(3));
        sources[Axis::Aux1 as usize] = Some(AxisSource::normal(4));
        sources[Axis::Aux2 as usize] = Some(AxisSource::normal(5));
        sources[Axis::Aux3 as usize] = Some(AxisSource::normal(6));
        Self { sources }
    }
}

impl AxisMap {
    /// Map with no axis assigned.
    #[must_use]
    pub fn empty() -> Self {
        Self { sources: [None; AXIS_COUNT] }
    }

    /// Assigns `axis` to a physical source. `None` unassigns it.
    #[must_use]
    pub fn with(mut self, axis: Axis, source: Option<AxisSource>) -> Self {
        self.sources[axis as usize] = source;
        self
    }

    /// Feeds the second aileron from `channel` with its own polarity.
    #[must_use]
    pub fn with_second_aileron(self, channel: usize, polarity: Polarity) -> Self {
        self.with(Axis::SecondAileron, Some(AxisSource { channel, polarity }))
    }

    /// Source of `axis`, if assigned.
    #[must_use]
    pub fn source(&self, axis: Axis) -> Option<AxisSource> {
        self.sources[axis as usize]
    }
}

/// Expo level per stick axis (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpoLevels {
    /// Roll (and second aileron) expo
    pub roll: u8,
    /// Pitch expo
    pub pitch: u8,
    /// Yaw expo
    pub yaw: u8,
}

/// Maps physical values to logical axes with polarity, deadband and expo.
#[derive(Debug, Clone)]
pub struct ChannelMapper {
    map: AxisMap,
    deadband: i32,
    expo: ExpoLevels,
}

impl Default for ChannelMapper {
    fn default() -> Self {
        Self::new(AxisMap::default())
    }
}

impl ChannelMapper {
    /// Creates a mapper with no deadband and linear response.
    #[must_use]
    pub fn new(map: AxisMap) -> Self {
        Self {
            map,
            deadband: 0,
            expo: ExpoLevels::default(),
        }
    }

    /// Sets the stick deadband (ticks either side of center).
    #[must_use]
    pub fn with_deadband(mut self, deadband: u16) -> Self {
        self.deadband = i32::from(deadband);
        self
    }

    /// Sets per-axis expo levels.
    #[must_use]
    pub fn with_expo(mut self, expo: ExpoLevels) -> Self {
        self.expo = expo;
        self
    }

    /// Axis assignment table.
    #[must_use]
    pub fn axis_map(&self) -> &AxisMap {
        &self.map
    }

    /// Maps zero-offset, unreversed physical values to logical axes.
    ///
    /// Unassigned axes, and axes whose source is outside `physical`, read 0.
    #[must_use]
    pub fn map_to_axes(&self, physical: &[i32; MAX_RC_CHANNELS]) -> [i16; AXIS_COUNT] {
        let mut axes = [0i16; AXIS_COUNT];
        for axis in Axis::ALL {
            let Some(source) = self.map.source(axis) else {
                continue;
            };
            let Some(&value) = physical.get(source.channel) else {
                continue;
            };
            let shaped = self.shape(axis, source.polarity.apply(value));
            axes[axis as usize] = shaped.clamp(-RC_VALUE_LIMIT, RC_VALUE_LIMIT) as i16;
        }
        axes
    }

    /// Deadband and expo for stick axes, zero floor for unipolar axes.
    fn shape(&self, axis: Axis, value: i32) -> i32 {
        match axis {
            Axis::Throttle => value.max(0),
            Axis::Roll | Axis::SecondAileron => get_expo(self.apply_deadband(value), self.expo.roll),
            Axis::Pitch => get_expo(self.apply_deadband(value), self.expo.pitch),
            Axis::Yaw => get_expo(self.apply_deadband(value), self.expo.yaw),
            Axis::Aux1 | Axis::Aux2 | Axis::Aux3 => value,
        }
    }

    /// Zeroes values inside the deadband and shifts the rest toward center.
    #[inline]
    fn apply_deadband(&self, value: i32) -> i32 {
        if value.abs() <= self.deadband {
            0
        } else {
            value - value.signum() * self.deadband
        }
    }
}
