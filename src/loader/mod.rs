//! Readers for meter measurement exports.
//!
//! Two export layouts are supported: the single-file transformer export with
//! pre-summed active/apparent power, and the outlet exports that come as a
//! current file and a voltage file per day. Both produce a [`LoadedTable`]:
//! the typed records plus diagnostics for every row that had to be dropped.

mod outlet;
mod source;
mod transformer;

pub use outlet::{
    OutletFileKind, OutletFileTemplate, load_outlet_pair, load_outlet_range, parse_outlet_pair,
    parse_outlet_time,
};
pub use source::{DecimalSeparator, parse_number, read_text};
pub use transformer::{
    TRANSFORMER_TIMESTAMP_FORMAT, load_transformer_export, parse_transformer_export,
    parse_transformer_timestamp,
};

use crate::error::Diagnostic;
use chrono::NaiveDateTime;

/// Which quantities a record carries, and therefore how metrics are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Per-phase voltage/current plus pre-summed active and apparent power.
    SummedPower,
    /// Per-phase total and active current with a single measured voltage.
    ActiveCurrent,
}

/// One sampled instant. Every electrical quantity may be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub timestamp: NaiveDateTime,
    pub source: SourceKind,
    /// Volts, L1..L3.
    pub voltage: [Option<f64>; 3],
    /// Amps, L1..L3.
    pub current: [Option<f64>; 3],
    /// Active component of the phase current in amps, L1..L3.
    pub active_current: [Option<f64>; 3],
    /// Watts.
    pub active_power_sum: Option<f64>,
    /// Volt-amperes.
    pub apparent_power_sum: Option<f64>,
}

impl MeasurementRecord {
    /// A record with no measured values.
    pub fn empty(timestamp: NaiveDateTime, source: SourceKind) -> Self {
        Self {
            timestamp,
            source,
            voltage: [None; 3],
            current: [None; 3],
            active_current: [None; 3],
            active_power_sum: None,
            apparent_power_sum: None,
        }
    }
}

/// Records that loaded cleanly plus the rows that were excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTable {
    pub records: Vec<MeasurementRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadedTable {
    /// Appends another table, keeping records sorted by timestamp.
    pub fn extend(&mut self, other: LoadedTable) {
        self.records.extend(other.records);
        self.diagnostics.extend(other.diagnostics);
        self.records.sort_by_key(|r| r.timestamp);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
