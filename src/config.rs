//! Run configuration: one struct covering every variant of the analysis.
//!
//! Stored as a JSON object on disk; every field is optional and falls back
//! to its default:
//! ```json
//! {
//!   "season_rule": "fine",
//!   "holiday_adjustment": true,
//!   "region": "NW",
//!   "smoothing": { "kind": "moving_average", "window": 4, "min_periods": 1 },
//!   "output_format": "xlsx",
//!   "interval_minutes": 15
//! }
//! ```

use crate::analyzers::smoothing::Smoothing;
use crate::analyzers::types::ProfileGrouping;
use crate::calendar::{
    CalendarOptions, GermanHolidays, HolidayCalendar, HolidayList, NoHolidays, Region, SeasonRule,
};
use crate::error::PipelineError;
use crate::loader::DecimalSeparator;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// What to do when a holiday lookup fails for a record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CalendarErrorPolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Drop the record and report it as a diagnostic.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub season_rule: SeasonRule,
    /// Relabel holidays as Sunday and Dec 24/31 as Saturday.
    pub holiday_adjustment: bool,
    /// Built-in holiday rules to use when no `holidays_file` is given.
    pub region: Region,
    /// CSV list of holiday dates, replacing the built-in rules.
    pub holidays_file: Option<PathBuf>,
    pub smoothing: Smoothing,
    pub output_format: OutputFormat,
    /// Resampling bucket width. Must divide a day.
    pub interval_minutes: u32,
    pub grouping: ProfileGrouping,
    pub calendar_errors: CalendarErrorPolicy,
    pub decimal: DecimalSeparator,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            season_rule: SeasonRule::default(),
            holiday_adjustment: true,
            region: Region::default(),
            holidays_file: None,
            smoothing: Smoothing::default(),
            output_format: OutputFormat::default(),
            interval_minutes: 15,
            grouping: ProfileGrouping::default(),
            calendar_errors: CalendarErrorPolicy::default(),
            decimal: DecimalSeparator::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let interval = self.interval_secs();
        if interval == 0 || SECONDS_PER_DAY % interval != 0 {
            return Err(PipelineError::Config(format!(
                "interval_minutes must divide a day evenly, got {}",
                self.interval_minutes
            )));
        }
        self.smoothing.validate().map_err(PipelineError::Config)
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval_minutes.saturating_mul(60)
    }

    pub fn calendar_options(&self) -> CalendarOptions {
        CalendarOptions {
            season_rule: self.season_rule,
            holiday_adjustment: self.holiday_adjustment,
        }
    }

    /// Builds the holiday calendar this config asks for.
    pub fn holiday_calendar(&self) -> Result<Box<dyn HolidayCalendar>> {
        if !self.holiday_adjustment {
            return Ok(Box::new(NoHolidays));
        }
        match &self.holidays_file {
            Some(path) => Ok(Box::new(HolidayList::load(path)?)),
            None => Ok(Box::new(GermanHolidays::new(self.region))),
        }
    }
}
