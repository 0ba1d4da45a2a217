use chrono::{NaiveDateTime, NaiveTime, Timelike};

/// Running mean that ignores missing samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Floors a timestamp to the start of its `interval_secs` bucket within the
/// day. `interval_secs` must divide a day evenly.
pub fn floor_to_interval(ts: NaiveDateTime, interval_secs: u32) -> NaiveDateTime {
    let secs = ts.time().num_seconds_from_midnight();
    let floored = secs - secs % interval_secs.max(1);
    let time = NaiveTime::from_num_seconds_from_midnight_opt(floored, 0).unwrap_or(ts.time());
    ts.date().and_time(time)
}
