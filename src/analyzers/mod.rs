//! Resampling and calendar-bucketed aggregation of enriched rows.
//!
//! Rows are averaged into fixed time buckets, then grouped by weekday
//! bucket (or day type) and time of day to build daily active-power
//! profiles, optionally smoothed, and by season for seasonal means.

pub mod aggregate;
pub mod resample;
pub mod smoothing;
pub mod types;
pub mod utility;
