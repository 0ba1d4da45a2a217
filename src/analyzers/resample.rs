use crate::analyzers::types::EnrichedRow;
use crate::analyzers::utility::{MeanAccumulator, floor_to_interval};
use crate::loader::MeasurementRecord;
use crate::metrics::DerivedMetrics;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

fn mean_of<F>(rows: &[&EnrichedRow], field: F) -> Option<f64>
where
    F: Fn(&EnrichedRow) -> Option<f64>,
{
    let mut acc = MeanAccumulator::default();
    for row in rows {
        acc.push(field(*row));
    }
    acc.mean()
}

fn phase_means<F>(rows: &[&EnrichedRow], field: F) -> [Option<f64>; 3]
where
    F: Fn(&EnrichedRow) -> [Option<f64>; 3],
{
    [0, 1, 2].map(|phase| mean_of(rows, |r| field(r)[phase]))
}

/// Resamples rows to fixed `interval_secs` buckets.
///
/// Every measured and derived column is averaged over the rows falling in a
/// bucket, ignoring missing cells; a cell stays missing when the bucket has
/// no value for it. Buckets without rows are absent. The interval must
/// divide a day evenly so a bucket never spans two dates, which lets each
/// bucket keep the calendar label of its rows.
pub fn resample(rows: &[EnrichedRow], interval_secs: u32) -> Vec<EnrichedRow> {
    let mut buckets: BTreeMap<NaiveDateTime, Vec<&EnrichedRow>> = BTreeMap::new();
    for row in rows {
        buckets
            .entry(floor_to_interval(row.record.timestamp, interval_secs))
            .or_default()
            .push(row);
    }

    buckets
        .into_iter()
        .filter_map(|(start, members)| {
            let first = *members.first()?;

            let record = MeasurementRecord {
                timestamp: start,
                source: first.record.source,
                voltage: phase_means(&members, |r| r.record.voltage),
                current: phase_means(&members, |r| r.record.current),
                active_current: phase_means(&members, |r| r.record.active_current),
                active_power_sum: mean_of(&members, |r| r.record.active_power_sum),
                apparent_power_sum: mean_of(&members, |r| r.record.apparent_power_sum),
            };

            let metrics = DerivedMetrics {
                power_factor: mean_of(&members, |r| r.metrics.power_factor),
                phase_power_factor: phase_means(&members, |r| r.metrics.phase_power_factor),
                active_power_kw: mean_of(&members, |r| r.metrics.active_power_kw),
                apparent_power_kw: mean_of(&members, |r| r.metrics.apparent_power_kw),
                reactive_power_kw: mean_of(&members, |r| r.metrics.reactive_power_kw),
            };

            Some(EnrichedRow {
                record,
                metrics,
                calendar: first.calendar,
            })
        })
        .collect()
}
