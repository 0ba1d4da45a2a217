use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Load-profile season. Declared in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Transition,
    Summer,
}

impl Season {
    pub const ALL: [Season; 3] = [Season::Winter, Season::Transition, Season::Summer];

    pub fn label(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Transition => "Transition",
            Season::Summer => "Summer",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Season boundary convention. One rule applies to a whole run.
///
/// | Rule     | Winter          | Transition                       | Summer         |
/// |----------|-----------------|----------------------------------|----------------|
/// | `Coarse` | Nov – Mar       | Apr, Oct                         | May – Sep      |
/// | `Fine`   | Nov 1 – Mar 20  | Mar 21 – Apr 30, Sep 15 – Oct 31 | May 1 – Sep 14 |
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SeasonRule {
    Coarse,
    #[default]
    Fine,
}

impl SeasonRule {
    pub fn season(&self, date: NaiveDate) -> Season {
        match self {
            SeasonRule::Coarse => match date.month() {
                11 | 12 | 1 | 2 | 3 => Season::Winter,
                5..=9 => Season::Summer,
                _ => Season::Transition,
            },
            SeasonRule::Fine => {
                let md = (date.month(), date.day());
                if md >= (11, 1) || md <= (3, 20) {
                    Season::Winter
                } else if (5, 1) <= md && md <= (9, 14) {
                    Season::Summer
                } else {
                    Season::Transition
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn test_coarse_month_cutoffs() {
        let rule = SeasonRule::Coarse;
        assert_eq!(rule.season(d(1, 15)), Season::Winter);
        assert_eq!(rule.season(d(3, 31)), Season::Winter);
        assert_eq!(rule.season(d(4, 1)), Season::Transition);
        assert_eq!(rule.season(d(4, 30)), Season::Transition);
        assert_eq!(rule.season(d(5, 1)), Season::Summer);
        assert_eq!(rule.season(d(9, 30)), Season::Summer);
        assert_eq!(rule.season(d(10, 15)), Season::Transition);
        assert_eq!(rule.season(d(11, 1)), Season::Winter);
        assert_eq!(rule.season(d(12, 31)), Season::Winter);
    }

    #[test]
    fn test_fine_day_cutoffs() {
        let rule = SeasonRule::Fine;
        assert_eq!(rule.season(d(3, 20)), Season::Winter);
        assert_eq!(rule.season(d(3, 21)), Season::Transition);
        assert_eq!(rule.season(d(4, 30)), Season::Transition);
        assert_eq!(rule.season(d(5, 1)), Season::Summer);
        assert_eq!(rule.season(d(5, 14)), Season::Summer);
        assert_eq!(rule.season(d(9, 14)), Season::Summer);
        assert_eq!(rule.season(d(9, 15)), Season::Transition);
        assert_eq!(rule.season(d(10, 31)), Season::Transition);
        assert_eq!(rule.season(d(11, 1)), Season::Winter);
        assert_eq!(rule.season(d(2, 29)), Season::Winter);
    }

    #[test]
    fn test_rules_disagree_on_boundary_days() {
        assert_ne!(
            SeasonRule::Coarse.season(d(3, 25)),
            SeasonRule::Fine.season(d(3, 25))
        );
        assert_ne!(
            SeasonRule::Coarse.season(d(9, 20)),
            SeasonRule::Fine.season(d(9, 20))
        );
    }

    #[test]
    fn test_both_rules_start_summer_in_may() {
        for rule in [SeasonRule::Coarse, SeasonRule::Fine] {
            assert_eq!(rule.season(d(5, 1)), Season::Summer);
            assert_eq!(rule.season(d(4, 25)), Season::Transition);
        }
    }
}
