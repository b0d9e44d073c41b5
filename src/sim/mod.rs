//! # Sim Module
//!
//! A software board for the bench binary and the test suite.
//!
//! This module handles:
//! - A 16-bit main clock, 8-bit step timer, output pins and interrupt mask
//! - Delivering scheduled receiver edges to capture as simulated time passes
//! - Generating PWM and CPPM receiver frames

pub mod board;
pub mod receiver;

pub use board::{PinEdge, ScheduledEdge, SimBoard};
pub use receiver::{SimReceiver, CPPM_SEPARATOR_US};
