//! Diagnostics record written one per line.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::Diagnostics;
use crate::rc::{RcSnapshot, AXIS_COUNT};

/// One JSONL diagnostics line.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsRecord {
    pub timestamp: DateTime<Utc>,
    /// Loop iteration the record was taken at
    pub sequence: u64,
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
    /// Logical channel values indexed by axis
    pub values: [i16; AXIS_COUNT],
    pub active: bool,
    pub failsafe: bool,
}

impl DiagnosticsRecord {
    /// Stamps a record with the current time.
    #[must_use]
    pub fn new(sequence: u64, diagnostics: Diagnostics, snapshot: &RcSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            sequence,
            diagnostics,
            values: snapshot.values,
            active: snapshot.active,
            failsafe: snapshot.failsafe,
        }
    }
}
