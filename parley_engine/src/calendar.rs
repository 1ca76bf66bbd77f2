//! In-game calendar arithmetic.
//!
//! Timestamps are stored in flags as `-`-joined integers (`year-month-day-hour-minute`).
//! Month, day and hour lengths are configurable, so elapsed time is computed with
//! field-wise borrow subtraction against the configured `Calendar`.

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// A point in in-game time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}
impl GameTime {
    pub fn new(year: u32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
        }
    }
}
impl Display for GameTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}
impl FromStr for GameTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields = s
            .split('-')
            .map(|f| f.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("parsing timestamp '{s}'"))?;
        let [year, month, day, hour, minute] = fields[..] else {
            bail!("timestamp '{s}' needs exactly five fields, found {}", fields.len());
        };
        Ok(Self::new(year, month, day, hour, minute))
    }
}

/// A length of in-game time. Fields need not be normalized (48 hours is fine).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameSpan {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}
impl GameSpan {
    pub fn new(years: u32, months: u32, days: u32, hours: u32, minutes: u32) -> Self {
        Self {
            years,
            months,
            days,
            hours,
            minutes,
        }
    }

    pub fn days(days: u32) -> Self {
        Self::new(0, 0, days, 0, 0)
    }

    /// Total length in minutes under `calendar`, carrying every field upward.
    pub fn total_minutes(&self, calendar: &Calendar) -> u64 {
        let months = u64::from(self.years) * u64::from(calendar.months_per_year) + u64::from(self.months);
        let days = months * u64::from(calendar.days_per_month) + u64::from(self.days);
        let hours = days * u64::from(calendar.hours_per_day) + u64::from(self.hours);
        hours * u64::from(calendar.minutes_per_hour) + u64::from(self.minutes)
    }

    pub fn to_fields(&self) -> [u32; 5] {
        [self.years, self.months, self.days, self.hours, self.minutes]
    }
}

/// Unit lengths of the game world's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calendar {
    pub months_per_year: u32,
    pub days_per_month: u32,
    pub hours_per_day: u32,
    pub minutes_per_hour: u32,
}
impl Default for Calendar {
    fn default() -> Self {
        Self {
            months_per_year: 17,
            days_per_month: 28,
            hours_per_day: 28,
            minutes_per_hour: 60,
        }
    }
}
impl Calendar {
    /// Time elapsed from `from` to `to`, or `None` if `from` lies in the future.
    pub fn elapsed(&self, from: &GameTime, to: &GameTime) -> Option<GameSpan> {
        if from > to {
            return None;
        }
        let mut minutes = i64::from(to.minute) - i64::from(from.minute);
        let mut hours = i64::from(to.hour) - i64::from(from.hour);
        let mut days = i64::from(to.day) - i64::from(from.day);
        let mut months = i64::from(to.month) - i64::from(from.month);
        let mut years = i64::from(to.year) - i64::from(from.year);

        if minutes < 0 {
            minutes += i64::from(self.minutes_per_hour);
            hours -= 1;
        }
        if hours < 0 {
            hours += i64::from(self.hours_per_day);
            days -= 1;
        }
        if days < 0 {
            days += i64::from(self.days_per_month);
            months -= 1;
        }
        if months < 0 {
            months += i64::from(self.months_per_year);
            years -= 1;
        }

        let field = |v: i64| u32::try_from(v).ok();
        Some(GameSpan {
            years: field(years)?,
            months: field(months)?,
            days: field(days)?,
            hours: field(hours)?,
            minutes: field(minutes)?,
        })
    }

    /// True if at least `threshold` has passed between `from` and `to`.
    pub fn has_elapsed(&self, from: &GameTime, to: &GameTime, threshold: &GameSpan) -> bool {
        self.elapsed(from, to)
            .is_some_and(|span| span.total_minutes(self) >= threshold.total_minutes(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earth_like() -> Calendar {
        Calendar {
            months_per_year: 12,
            days_per_month: 30,
            hours_per_day: 24,
            minutes_per_hour: 60,
        }
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let t = GameTime::new(301, 4, 17, 9, 5);
        assert_eq!(t.to_string(), "301-4-17-9-5");
        assert_eq!("301-4-17-9-5".parse::<GameTime>().unwrap(), t);
        assert!("301-4-17".parse::<GameTime>().is_err());
        assert!("a-b-c-d-e".parse::<GameTime>().is_err());
    }

    #[test]
    fn borrow_crosses_every_field() {
        let cal = earth_like();
        let from = GameTime::new(10, 11, 29, 23, 59);
        let to = GameTime::new(11, 0, 0, 0, 0);
        assert_eq!(cal.elapsed(&from, &to), Some(GameSpan::new(0, 0, 0, 0, 1)));
    }

    #[test]
    fn one_day_twenty_three_hours_is_not_two_days() {
        let cal = earth_like();
        let stamped = GameTime::new(100, 3, 10, 12, 0);
        let now = GameTime::new(100, 3, 12, 11, 0);
        assert_eq!(cal.elapsed(&stamped, &now), Some(GameSpan::new(0, 0, 1, 23, 0)));
        assert!(!cal.has_elapsed(&stamped, &now, &GameSpan::days(2)));
        assert!(cal.has_elapsed(&stamped, &now, &GameSpan::days(1)));
    }

    #[test]
    fn unnormalized_thresholds_compare_by_length() {
        let cal = earth_like();
        let stamped = GameTime::new(1, 0, 0, 0, 0);
        let now = GameTime::new(1, 0, 2, 0, 0);
        assert!(cal.has_elapsed(&stamped, &now, &GameSpan::new(0, 0, 0, 48, 0)));
        assert!(!cal.has_elapsed(&stamped, &now, &GameSpan::new(0, 0, 0, 48, 1)));
    }

    #[test]
    fn future_timestamps_never_elapse() {
        let cal = Calendar::default();
        let now = GameTime::new(5, 1, 1, 1, 1);
        let later = GameTime::new(5, 1, 1, 1, 2);
        assert_eq!(cal.elapsed(&later, &now), None);
        assert!(!cal.has_elapsed(&later, &now, &GameSpan::default()));
    }
}
