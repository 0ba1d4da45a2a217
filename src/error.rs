//! Error types shared by the loader, calendar and pipeline stages.
//!
//! Row-level defects (unparseable timestamps, non-numeric cells) are not
//! errors here: they become [`Diagnostic`]s or missing values and the batch
//! keeps going.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to answer a holiday lookup for a date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    /// The built-in rules do not cover this year.
    #[error("no holiday rules for {date} (supported years {min}-{max})")]
    OutOfRange { date: NaiveDate, min: i32, max: i32 },

    /// The calendar could not answer for another reason.
    #[error("holiday lookup failed for {date}: {reason}")]
    Lookup { date: NaiveDate, reason: String },
}

/// Structural problems with an input file. Individual bad rows never
/// produce one of these.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: required column `{column}` not found in header")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: malformed delimited data: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("calendar classification failed at {timestamp}: {source}")]
    Calendar {
        timestamp: NaiveDateTime,
        #[source]
        source: CalendarError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// What kind of row-level problem a [`Diagnostic`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Timestamp text did not parse; the row was excluded.
    RowParse,
    /// Holiday lookup failed and the caller chose to skip the record.
    CalendarSkipped,
}

/// A recovered row-level defect, reported instead of failing the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// 1-based line number in the source file, header included. `None` when
    /// the record no longer maps to a single source line.
    pub line: Option<usize>,
    pub raw: String,
    pub reason: String,
}

impl Diagnostic {
    pub fn row_parse(line: usize, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::RowParse,
            line: Some(line),
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn calendar_skipped(timestamp: NaiveDateTime, err: &CalendarError) -> Self {
        Self {
            kind: DiagnosticKind::CalendarSkipped,
            line: None,
            raw: timestamp.to_string(),
            reason: err.to_string(),
        }
    }
}
