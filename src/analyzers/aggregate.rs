use crate::analyzers::smoothing::Smoothing;
use crate::analyzers::types::{
    EnrichedRow, Profile, ProfileGroup, ProfileGrouping, ProfilePoint, SeasonMean,
};
use crate::analyzers::utility::MeanAccumulator;
use crate::calendar::Season;
use chrono::NaiveTime;
use std::collections::BTreeMap;

/// Averages active power per `(group, time of day)`.
///
/// Rows without an active power value do not contribute, so a bucket whose
/// rows are all missing is absent rather than zero. Profiles come back in
/// calendar order of their group with times ascending; smoothing runs per
/// profile across the present buckets and is stored next to the means.
pub fn profile_by_time_of_day(
    rows: &[EnrichedRow],
    grouping: ProfileGrouping,
    smoothing: &Smoothing,
) -> Vec<Profile> {
    let mut buckets: BTreeMap<(ProfileGroup, NaiveTime), MeanAccumulator> = BTreeMap::new();

    for row in rows {
        let Some(kw) = row.metrics.active_power_kw else {
            continue;
        };
        buckets
            .entry((
                ProfileGroup::of(grouping, &row.calendar),
                row.record.timestamp.time(),
            ))
            .or_default()
            .push(Some(kw));
    }

    let mut profiles: Vec<Profile> = Vec::new();
    for ((group, time_of_day), acc) in buckets {
        let Some(mean_kw) = acc.mean() else {
            continue;
        };
        let point = ProfilePoint {
            time_of_day,
            samples: acc.count(),
            mean_kw,
            smoothed_kw: None,
        };

        match profiles.last_mut() {
            Some(profile) if profile.group == group => profile.points.push(point),
            _ => profiles.push(Profile {
                group,
                points: vec![point],
            }),
        }
    }

    for profile in &mut profiles {
        let means: Vec<f64> = profile.points.iter().map(|p| p.mean_kw).collect();
        for (point, smoothed) in profile.points.iter_mut().zip(smoothing.apply(&means)) {
            point.smoothed_kw = smoothed;
        }
    }

    profiles
}

/// Averages active power per `(group, season)`, in calendar order.
pub fn season_means(rows: &[EnrichedRow], grouping: ProfileGrouping) -> Vec<SeasonMean> {
    let mut buckets: BTreeMap<(ProfileGroup, Season), MeanAccumulator> = BTreeMap::new();

    for row in rows {
        if row.metrics.active_power_kw.is_none() {
            continue;
        }
        buckets
            .entry((ProfileGroup::of(grouping, &row.calendar), row.calendar.season))
            .or_default()
            .push(row.metrics.active_power_kw);
    }

    buckets
        .into_iter()
        .filter_map(|((group, season), acc)| {
            Some(SeasonMean {
                group,
                season,
                samples: acc.count(),
                mean_kw: acc.mean()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarLabel, DayType, WeekdayBucket};
    use crate::loader::{MeasurementRecord, SourceKind};
    use crate::metrics::DerivedMetrics;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 12, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn row(ts: NaiveDateTime, weekday: WeekdayBucket, season: Season, kw: Option<f64>) -> EnrichedRow {
        EnrichedRow {
            record: MeasurementRecord::empty(ts, SourceKind::SummedPower),
            metrics: DerivedMetrics {
                active_power_kw: kw,
                ..Default::default()
            },
            calendar: CalendarLabel {
                weekday,
                season,
                holiday: false,
            },
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_mean_across_days_for_same_time() {
        let rows = vec![
            row(at(1, 0, 0), WeekdayBucket::Friday, Season::Winter, Some(0.69)),
            row(at(4, 0, 0), WeekdayBucket::Monday, Season::Winter, Some(1.38)),
            row(at(4, 0, 15), WeekdayBucket::Monday, Season::Winter, Some(2.0)),
        ];

        let profiles = profile_by_time_of_day(&rows, ProfileGrouping::DayType, &Smoothing::None);

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].group, ProfileGroup::DayType(DayType::Workday));
        let midnight = profiles[0].point_at(t(0, 0)).unwrap();
        assert_eq!(midnight.samples, 2);
        assert!((midnight.mean_kw - 1.035).abs() < 1e-12);
        assert_eq!(midnight.smoothed_kw, None);
    }

    #[test]
    fn test_missing_values_are_skipped_not_zeroed() {
        let rows = vec![
            row(at(2, 0, 0), WeekdayBucket::Saturday, Season::Winter, Some(4.0)),
            row(at(9, 0, 0), WeekdayBucket::Saturday, Season::Winter, None),
            row(at(9, 0, 15), WeekdayBucket::Saturday, Season::Winter, None),
        ];

        let profiles = profile_by_time_of_day(&rows, ProfileGrouping::Weekday, &Smoothing::None);

        let saturday = &profiles[0];
        assert_eq!(saturday.point_at(t(0, 0)).unwrap().mean_kw, 4.0);
        assert_eq!(saturday.point_at(t(0, 0)).unwrap().samples, 1);
        // only missing values at 00:15, so the bucket is absent
        assert!(saturday.point_at(t(0, 15)).is_none());
    }

    #[test]
    fn test_zero_is_a_measured_value() {
        let rows = vec![row(at(3, 0, 0), WeekdayBucket::Sunday, Season::Winter, Some(0.0))];

        let profiles = profile_by_time_of_day(&rows, ProfileGrouping::All, &Smoothing::None);

        assert_eq!(profiles[0].group, ProfileGroup::All);
        assert_eq!(profiles[0].points[0].mean_kw, 0.0);
    }

    #[test]
    fn test_deterministic_order() {
        let rows = vec![
            row(at(3, 0, 30), WeekdayBucket::Sunday, Season::Winter, Some(1.0)),
            row(at(1, 0, 15), WeekdayBucket::Friday, Season::Winter, Some(1.0)),
            row(at(3, 0, 0), WeekdayBucket::Sunday, Season::Winter, Some(1.0)),
            row(at(2, 0, 0), WeekdayBucket::Saturday, Season::Winter, Some(1.0)),
            row(at(1, 0, 0), WeekdayBucket::Friday, Season::Winter, Some(1.0)),
        ];

        let profiles = profile_by_time_of_day(&rows, ProfileGrouping::Weekday, &Smoothing::None);

        let groups: Vec<_> = profiles.iter().map(|p| p.group).collect();
        assert_eq!(
            groups,
            vec![
                ProfileGroup::Weekday(WeekdayBucket::Friday),
                ProfileGroup::Weekday(WeekdayBucket::Saturday),
                ProfileGroup::Weekday(WeekdayBucket::Sunday),
            ]
        );
        let sunday_times: Vec<_> = profiles[2].points.iter().map(|p| p.time_of_day).collect();
        assert_eq!(sunday_times, vec![t(0, 0), t(0, 30)]);
    }

    #[test]
    fn test_smoothing_keeps_means() {
        let rows: Vec<EnrichedRow> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, kw)| {
                row(
                    at(1, 0, 15 * i as u32),
                    WeekdayBucket::Friday,
                    Season::Winter,
                    Some(*kw),
                )
            })
            .collect();
        let smoothing = Smoothing::MovingAverage {
            window: 4,
            min_periods: 1,
        };

        let profiles = profile_by_time_of_day(&rows, ProfileGrouping::DayType, &smoothing);

        let points = &profiles[0].points;
        let means: Vec<f64> = points.iter().map(|p| p.mean_kw).collect();
        assert_eq!(means, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(points[0].smoothed_kw, Some(1.5));
        assert_eq!(points[2].smoothed_kw, Some(2.5));
    }

    #[test]
    fn test_single_bucket_smoothing_is_identity() {
        let rows = vec![row(at(1, 12, 0), WeekdayBucket::Friday, Season::Winter, Some(7.25))];
        let smoothing = Smoothing::MovingAverage {
            window: 4,
            min_periods: 1,
        };

        let profiles = profile_by_time_of_day(&rows, ProfileGrouping::DayType, &smoothing);

        assert_eq!(profiles[0].points[0].smoothed_kw, Some(7.25));
    }

    #[test]
    fn test_season_means() {
        let rows = vec![
            row(at(1, 0, 0), WeekdayBucket::Friday, Season::Winter, Some(2.0)),
            row(at(4, 0, 0), WeekdayBucket::Monday, Season::Winter, Some(4.0)),
            row(at(5, 0, 0), WeekdayBucket::Tuesday, Season::Summer, Some(1.0)),
            row(at(2, 0, 0), WeekdayBucket::Saturday, Season::Winter, None),
        ];

        let means = season_means(&rows, ProfileGrouping::DayType);

        assert_eq!(means.len(), 2);
        assert_eq!(means[0].season, Season::Winter);
        assert_eq!(means[0].mean_kw, 3.0);
        assert_eq!(means[0].samples, 2);
        assert_eq!(means[1].season, Season::Summer);
        assert!(means.iter().all(|m| m.group == ProfileGroup::DayType(DayType::Workday)));
    }
}
