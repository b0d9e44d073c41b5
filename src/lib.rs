//! # OpenAero IO
//!
//! Receiver capture, channel normalization and synchronized PWM output for
//! small fixed-wing and multirotor flight controllers.
//!
//! Pin edges from a PWM or CPPM receiver are timestamped against a 16-bit
//! free-running counter, turned into signed stick values and handed to the
//! control loop. Output pulses for motors and servos are generated in one
//! steady frame, gated by arming and failsafe state.

pub mod capture;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod rc;
pub mod safety;
pub mod sim;
pub mod telemetry;
pub mod timing;
