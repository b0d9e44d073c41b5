//! # Capture Module
//!
//! Interrupt-context timestamping of RC receiver edges.
//!
//! This module handles:
//! - Discrete PWM capture (one pin per channel)
//! - Combined PPM demultiplexing (one pin, sync-gap framed)
//! - Publishing raw widths into the shared [`RcInputState`]
//! - Flagging edges that land inside a synchronized output frame
//!
//! Capture never filters, clamps or validates widths, and never logs. A
//! channel whose pulse is missing keeps its previous width; deciding that a
//! receiver has gone quiet belongs to [`crate::rc::RxActivity`].

pub mod cppm;
pub mod pwm;
pub mod state;

pub use cppm::{CppmDecoder, CppmPhase};
pub use pwm::PwmCapture;
pub use state::{RcInputState, MAX_RC_CHANNELS};

use serde::Deserialize;

use crate::timing::Ticks;

/// Logic level after a pin transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Rising edge.
    High,
    /// Falling edge.
    Low,
}

/// Receiver input wiring, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// One wire per channel.
    Pwm,
    /// All channels multiplexed on one wire.
    Cppm,
}

/// Capture strategy selected from [`InputMode`].
#[derive(Debug, Clone)]
pub enum Capture {
    /// Discrete PWM capture.
    Pwm(PwmCapture),
    /// CPPM demultiplexer.
    Cppm(CppmDecoder),
}

impl Capture {
    /// Dispatches a pin edge to the active strategy.
    ///
    /// `pin` is the input pin index. In CPPM mode only pin 0 carries signal
    /// and edges on any other pin are ignored.
    #[inline]
    pub fn on_edge(&mut self, state: &RcInputState, pin: usize, level: Level, now: Ticks) {
        match self {
            Capture::Pwm(capture) => capture.on_edge(state, pin, level, now),
            Capture::Cppm(decoder) => {
                if pin == 0 {
                    decoder.on_edge(state, level, now);
                }
            }
        }
    }

    /// Input mode of this strategy.
    #[must_use]
    pub fn mode(&self) -> InputMode {
        match self {
            Capture::Pwm(_) => InputMode::Pwm,
            Capture::Cppm(_) => InputMode::Cppm,
        }
    }

    /// Number of channels this strategy fills.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        match self {
            Capture::Pwm(capture) => capture.channel_count(),
            Capture::Cppm(decoder) => decoder.channel_count(),
        }
    }
}
