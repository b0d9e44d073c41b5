//! # Telemetry Module
//!
//! Diagnostics logging to JSONL files with rotation.
//!
//! This module handles:
//! - Snapshotting pipeline counters and channel values into records
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

pub mod logger;
pub mod types;

pub use logger::DiagnosticsLogger;
pub use types::DiagnosticsRecord;
