//! Calendar classification of measurement timestamps: weekday bucket with
//! holiday substitution, and season.

pub mod holidays;
pub mod season;

pub use holidays::{GermanHolidays, HolidayCalendar, HolidayList, NoHolidays, Region};
pub use season::{Season, SeasonRule};

use crate::error::CalendarError;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day-of-week bucket after holiday substitution. Declared in calendar
/// order, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeekdayBucket {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekdayBucket {
    pub fn label(&self) -> &'static str {
        match self {
            WeekdayBucket::Monday => "Monday",
            WeekdayBucket::Tuesday => "Tuesday",
            WeekdayBucket::Wednesday => "Wednesday",
            WeekdayBucket::Thursday => "Thursday",
            WeekdayBucket::Friday => "Friday",
            WeekdayBucket::Saturday => "Saturday",
            WeekdayBucket::Sunday => "Sunday",
        }
    }

    pub fn day_type(&self) -> DayType {
        match self {
            WeekdayBucket::Saturday => DayType::Saturday,
            WeekdayBucket::Sunday => DayType::Sunday,
            _ => DayType::Workday,
        }
    }
}

impl From<Weekday> for WeekdayBucket {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => WeekdayBucket::Monday,
            Weekday::Tue => WeekdayBucket::Tuesday,
            Weekday::Wed => WeekdayBucket::Wednesday,
            Weekday::Thu => WeekdayBucket::Thursday,
            Weekday::Fri => WeekdayBucket::Friday,
            Weekday::Sat => WeekdayBucket::Saturday,
            Weekday::Sun => WeekdayBucket::Sunday,
        }
    }
}

impl fmt::Display for WeekdayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Monday to Friday collapsed into one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayType {
    Workday,
    Saturday,
    Sunday,
}

impl DayType {
    pub fn label(&self) -> &'static str {
        match self {
            DayType::Workday => "Workday",
            DayType::Saturday => "Saturday",
            DayType::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar attributes of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarLabel {
    pub weekday: WeekdayBucket,
    pub season: Season,
    /// The date is a public holiday in the configured calendar.
    pub holiday: bool,
}

impl CalendarLabel {
    pub fn day_type(&self) -> DayType {
        self.weekday.day_type()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarOptions {
    pub season_rule: SeasonRule,
    pub holiday_adjustment: bool,
}

fn is_year_end_eve(date: NaiveDate) -> bool {
    date.month() == 12 && matches!(date.day(), 24 | 31)
}

/// Applies holiday substitution to the base weekday of `date`.
///
/// A holiday that is not already a Sunday becomes Sunday. December 24 and 31
/// become Saturday when they are neither a holiday nor a Sunday. Every other
/// day keeps its weekday. Returns the bucket and whether the date is a holiday.
pub fn substitute_holiday(
    date: NaiveDate,
    holidays: &dyn HolidayCalendar,
) -> Result<(WeekdayBucket, bool), CalendarError> {
    let base = WeekdayBucket::from(date.weekday());
    let holiday = holidays.is_holiday(date)?;

    let bucket = if base == WeekdayBucket::Sunday {
        base
    } else if holiday {
        WeekdayBucket::Sunday
    } else if is_year_end_eve(date) {
        WeekdayBucket::Saturday
    } else {
        base
    };

    Ok((bucket, holiday))
}

/// Classifies a timestamp. Only the date part matters.
pub fn classify(
    timestamp: NaiveDateTime,
    options: &CalendarOptions,
    holidays: &dyn HolidayCalendar,
) -> Result<CalendarLabel, CalendarError> {
    let date = timestamp.date();

    let (weekday, holiday) = if options.holiday_adjustment {
        substitute_holiday(date, holidays)?
    } else {
        (WeekdayBucket::from(date.weekday()), false)
    };

    Ok(CalendarLabel {
        weekday,
        season: options.season_rule.season(date),
        holiday,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn adjusted() -> CalendarOptions {
        CalendarOptions {
            season_rule: SeasonRule::Fine,
            holiday_adjustment: true,
        }
    }

    struct Failing;

    impl HolidayCalendar for Failing {
        fn holiday_name(&self, date: NaiveDate) -> Result<Option<String>, CalendarError> {
            Err(CalendarError::Lookup {
                date,
                reason: "calendar unavailable".into(),
            })
        }
    }

    #[test]
    fn test_plain_weekday() {
        // 2023-12-01 is a Friday
        let label = classify(noon(2023, 12, 1), &adjusted(), &GermanHolidays::default()).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Friday);
        assert_eq!(label.day_type(), DayType::Workday);
        assert_eq!(label.season, Season::Winter);
        assert!(!label.holiday);
    }

    #[test]
    fn test_weekday_holiday_becomes_sunday() {
        // Easter Monday 2024
        let label = classify(noon(2024, 4, 1), &adjusted(), &GermanHolidays::default()).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Sunday);
        assert!(label.holiday);
    }

    #[test]
    fn test_saturday_holiday_becomes_sunday() {
        // 2021-12-25 is a Saturday
        let label = classify(noon(2021, 12, 25), &adjusted(), &GermanHolidays::default()).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Sunday);
    }

    #[test]
    fn test_christmas_eve_on_weekday_becomes_saturday() {
        // 2024-12-24 is a Tuesday, not a public holiday
        let label = classify(noon(2024, 12, 24), &adjusted(), &GermanHolidays::default()).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Saturday);
        assert!(!label.holiday);

        // 2024-12-31 is a Tuesday as well
        let label = classify(noon(2024, 12, 31), &adjusted(), &GermanHolidays::default()).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Saturday);
    }

    #[test]
    fn test_christmas_eve_on_sunday_stays_sunday() {
        // 2023-12-24 is a Sunday
        let label = classify(noon(2023, 12, 24), &adjusted(), &GermanHolidays::default()).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Sunday);
    }

    #[test]
    fn test_christmas_eve_listed_as_holiday_becomes_sunday() {
        let list = HolidayList::new([(
            NaiveDate::from_ymd_opt(2024, 12, 24).unwrap(),
            "Christmas Eve".to_string(),
        )]);
        let label = classify(noon(2024, 12, 24), &adjusted(), &list).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Sunday);
        assert!(label.holiday);
    }

    #[test]
    fn test_adjustment_disabled_keeps_weekday() {
        let options = CalendarOptions {
            season_rule: SeasonRule::Coarse,
            holiday_adjustment: false,
        };
        let label = classify(noon(2024, 12, 24), &options, &Failing).unwrap();
        assert_eq!(label.weekday, WeekdayBucket::Tuesday);
        assert!(!label.holiday);
    }

    #[test]
    fn test_lookup_failure_is_surfaced() {
        let err = classify(noon(2024, 6, 3), &adjusted(), &Failing).unwrap_err();
        assert!(matches!(err, CalendarError::Lookup { .. }));
    }

    #[test]
    fn test_day_type_grouping() {
        assert_eq!(WeekdayBucket::Wednesday.day_type(), DayType::Workday);
        assert_eq!(WeekdayBucket::Saturday.day_type(), DayType::Saturday);
        assert_eq!(WeekdayBucket::Sunday.day_type(), DayType::Sunday);
        assert!(WeekdayBucket::Monday < WeekdayBucket::Sunday);
    }
}
