//! Data types used by the aggregation pipeline.

use crate::calendar::{CalendarLabel, DayType, Season, WeekdayBucket};
use crate::loader::MeasurementRecord;
use crate::metrics::DerivedMetrics;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A record with its derived metrics and calendar attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub record: MeasurementRecord,
    pub metrics: DerivedMetrics,
    pub calendar: CalendarLabel,
}

/// How rows are split into daily profiles.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ProfileGrouping {
    /// One profile per weekday bucket.
    Weekday,
    /// Workday, Saturday and Sunday profiles.
    #[default]
    DayType,
    /// A single profile over all days.
    All,
}

/// The group a profile or season mean belongs to. Orders by calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProfileGroup {
    Weekday(WeekdayBucket),
    DayType(DayType),
    All,
}

impl ProfileGroup {
    pub fn of(grouping: ProfileGrouping, calendar: &CalendarLabel) -> Self {
        match grouping {
            ProfileGrouping::Weekday => ProfileGroup::Weekday(calendar.weekday),
            ProfileGrouping::DayType => ProfileGroup::DayType(calendar.day_type()),
            ProfileGrouping::All => ProfileGroup::All,
        }
    }
}

impl fmt::Display for ProfileGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileGroup::Weekday(day) => fmt::Display::fmt(day, f),
            ProfileGroup::DayType(day_type) => fmt::Display::fmt(day_type, f),
            ProfileGroup::All => f.write_str("All days"),
        }
    }
}

/// Mean active power of one time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub time_of_day: NaiveTime,
    /// Contributing samples with a defined active power.
    pub samples: usize,
    pub mean_kw: f64,
    /// Smoothed mean, kept next to the raw mean. `None` when smoothing is
    /// off or the window had too few samples.
    pub smoothed_kw: Option<f64>,
}

/// Daily active-power profile of one group, times ascending. Buckets
/// without data are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub group: ProfileGroup,
    pub points: Vec<ProfilePoint>,
}

impl Profile {
    pub fn point_at(&self, time_of_day: NaiveTime) -> Option<&ProfilePoint> {
        self.points.iter().find(|p| p.time_of_day == time_of_day)
    }
}

/// Mean active power of one group within one season.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonMean {
    pub group: ProfileGroup,
    pub season: Season,
    pub samples: usize,
    pub mean_kw: f64,
}
