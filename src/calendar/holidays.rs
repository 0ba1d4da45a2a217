//! Regional public-holiday lookups.

use crate::error::CalendarError;
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Answers whether a date is a public holiday.
pub trait HolidayCalendar: Send + Sync {
    /// Name of the holiday on `date`, or `None` on an ordinary day.
    fn holiday_name(&self, date: NaiveDate) -> Result<Option<String>, CalendarError>;

    fn is_holiday(&self, date: NaiveDate) -> Result<bool, CalendarError> {
        Ok(self.holiday_name(date)?.is_some())
    }
}

/// Calendar without holidays, used when holiday substitution is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn holiday_name(&self, _date: NaiveDate) -> Result<Option<String>, CalendarError> {
        Ok(None)
    }
}

/// German federal level or one of the 16 states.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    /// Nationwide holidays only.
    De,
    Bw,
    By,
    Be,
    Bb,
    Hb,
    Hh,
    He,
    Mv,
    Ni,
    #[default]
    Nw,
    Rp,
    Sl,
    Sn,
    St,
    Sh,
    Th,
}

/// Rule-based German public holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct GermanHolidays {
    region: Region,
}

impl GermanHolidays {
    pub const MIN_YEAR: i32 = 1990;
    pub const MAX_YEAR: i32 = 2099;

    pub fn new(region: Region) -> Self {
        Self { region }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// All holidays of `year` in date order.
    pub fn holidays_in_year(&self, year: i32) -> Result<Vec<(NaiveDate, &'static str)>, CalendarError> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(CalendarError::OutOfRange {
                date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default(),
                min: Self::MIN_YEAR,
                max: Self::MAX_YEAR,
            });
        }

        use Region::*;
        let region = self.region;
        let in_region = |regions: &[Region]| regions.contains(&region);

        let fixed = |month, day| NaiveDate::from_ymd_opt(year, month, day);
        let easter = easter_sunday(year);
        let from_easter = |offset: i64| {
            easter.and_then(|e| {
                if offset >= 0 {
                    e.checked_add_days(Days::new(offset as u64))
                } else {
                    e.checked_sub_days(Days::new(offset.unsigned_abs()))
                }
            })
        };

        let mut days: Vec<(Option<NaiveDate>, &'static str)> = vec![
            (fixed(1, 1), "New Year's Day"),
            (from_easter(-2), "Good Friday"),
            (from_easter(1), "Easter Monday"),
            (fixed(5, 1), "Labour Day"),
            (from_easter(39), "Ascension Day"),
            (from_easter(50), "Whit Monday"),
            (fixed(10, 3), "German Unity Day"),
            (fixed(12, 25), "Christmas Day"),
            (fixed(12, 26), "Second Day of Christmas"),
        ];

        if in_region(&[Bw, By, St]) {
            days.push((fixed(1, 6), "Epiphany"));
        }
        if (region == Be && year >= 2019) || (region == Mv && year >= 2023) {
            days.push((fixed(3, 8), "International Women's Day"));
        }
        if region == Bb {
            days.push((easter, "Easter Sunday"));
            days.push((from_easter(49), "Whit Sunday"));
        }
        if in_region(&[Bw, By, He, Nw, Rp, Sl]) {
            days.push((from_easter(60), "Corpus Christi"));
        }
        if region == Sl {
            days.push((fixed(8, 15), "Assumption Day"));
        }
        if region == Th && year >= 2019 {
            days.push((fixed(9, 20), "World Children's Day"));
        }
        if in_region(&[Bb, Mv, Sn, St, Th]) || (in_region(&[Hb, Hh, Ni, Sh]) && year >= 2018) || year == 2017 {
            days.push((fixed(10, 31), "Reformation Day"));
        }
        if in_region(&[Bw, By, Nw, Rp, Sl]) {
            days.push((fixed(11, 1), "All Saints' Day"));
        }
        if region == Sn {
            days.push((repentance_day(year), "Day of Repentance and Prayer"));
        }

        let mut resolved: Vec<(NaiveDate, &'static str)> = days
            .into_iter()
            .filter_map(|(date, name)| date.map(|d| (d, name)))
            .collect();
        resolved.sort_by_key(|(date, _)| *date);
        Ok(resolved)
    }
}

impl HolidayCalendar for GermanHolidays {
    fn holiday_name(&self, date: NaiveDate) -> Result<Option<String>, CalendarError> {
        Ok(self
            .holidays_in_year(date.year())?
            .into_iter()
            .find(|(d, _)| *d == date)
            .map(|(_, name)| name.to_string()))
    }
}

/// Gregorian Easter Sunday (anonymous Gregorian computus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// The Wednesday before November 23.
fn repentance_day(year: i32) -> Option<NaiveDate> {
    let nov_22 = NaiveDate::from_ymd_opt(year, 11, 22)?;
    let back = (nov_22.weekday().num_days_from_monday() + 7
        - Weekday::Wed.num_days_from_monday())
        % 7;
    nov_22.checked_sub_days(Days::new(back as u64))
}

/// Explicit holiday dates, for regions without built-in rules.
#[derive(Debug, Clone, Default)]
pub struct HolidayList {
    dates: BTreeMap<NaiveDate, String>,
}

impl HolidayList {
    pub fn new(dates: impl IntoIterator<Item = (NaiveDate, String)>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Loads a CSV file with a header row. The first column is the date
    /// (`YYYY-MM-DD`, `DD.MM.YYYY` or `YYYYMMDD`), an optional second column
    /// the holiday name.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading holiday list");
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("opening holiday list {}", path.display()))?;

        let mut dates = BTreeMap::new();
        for record in reader.records() {
            let r = record?;
            debug!(record = ?r, "holiday list record");
            let text = r.get(0).unwrap_or("").trim();
            let date = parse_holiday_date(text).ok_or_else(|| {
                anyhow!("{}: unrecognised holiday date `{}`", path.display(), text)
            })?;
            let name = r.get(1).map(str::trim).filter(|n| !n.is_empty()).unwrap_or("Holiday");
            dates.insert(date, name.to_string());
        }

        Ok(Self { dates })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

fn parse_holiday_date(text: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%d.%m.%Y", "%Y%m%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

impl HolidayCalendar for HolidayList {
    fn holiday_name(&self, date: NaiveDate) -> Result<Option<String>, CalendarError> {
        Ok(self.dates.get(&date).cloned())
    }
}
