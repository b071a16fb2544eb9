//! Warehouse week identifiers.
//!
//! The warehouse addresses weeks as `YYYYWW` integers where `WW` is the
//! Monday-start week of the year: days before the first Monday of January
//! belong to week `00`. The integer is not an arithmetic space, so all shifts
//! go through the Monday calendar date.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

const MAX_WEEK: u32 = 53;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct WeekId {
    year: i32,
    week: u32,
}

impl WeekId {
    /// Parses a raw `YYYYWW` value. A single-digit week (`YYYYW`) is accepted
    /// the same way the warehouse export tooling accepts it.
    pub fn from_raw(raw: i64) -> Result<Self, RetrievalError> {
        let digits = raw.to_string();
        let invalid = || RetrievalError::Format(digits.clone());

        if !(5..=6).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let (year, week) = digits.split_at(4);
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        if week > MAX_WEEK {
            return Err(invalid());
        }

        Ok(Self { year, week })
    }

    /// The week containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        let week = (date.ordinal0() + 7 - date.weekday().num_days_from_monday()) / 7;
        Self {
            year: date.year(),
            week,
        }
    }

    pub fn raw(self) -> i64 {
        i64::from(self.year) * 100 + i64::from(self.week)
    }

    /// Monday that starts this week. Week 00 resolves to the Monday on or
    /// before January 1, which may fall in the previous year.
    pub fn monday(self) -> NaiveDate {
        // Year comes from four parsed digits or a valid date, so January 1 exists.
        let jan_first = NaiveDate::from_ymd_opt(self.year, 1, 1).unwrap_or(NaiveDate::MIN);
        let first_weekday = i64::from(jan_first.weekday().num_days_from_monday());

        if self.week == 0 {
            return jan_first - Duration::days(first_weekday);
        }

        let week_zero_len = (7 - first_weekday) % 7;
        jan_first + Duration::days(week_zero_len + 7 * (i64::from(self.week) - 1))
    }

    pub fn shift_weeks(self, weeks: i64) -> Self {
        Self::from_date(self.monday() + Duration::weeks(weeks))
    }
}

impl TryFrom<i64> for WeekId {
    type Error = RetrievalError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

impl From<WeekId> for i64 {
    fn from(week: WeekId) -> Self {
        week.raw()
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.year, self.week)
    }
}

/// A validated `[start, end]` week range with `end` strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    start: WeekId,
    end: WeekId,
}

impl WeekRange {
    pub fn new(start: WeekId, end: WeekId) -> Result<Self, RetrievalError> {
        if end <= start {
            return Err(RetrievalError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> WeekId {
        self.start
    }

    pub fn end(&self) -> WeekId {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(raw: i64) -> WeekId {
        WeekId::from_raw(raw).expect("valid week")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn monday_follows_first_monday_of_year() {
        // 2022-01-01 is a Saturday, so week 01 starts on January 3.
        assert_eq!(week(202201).monday(), date(2022, 1, 3));
        assert_eq!(week(202228).monday(), date(2022, 7, 11));
    }

    #[test]
    fn week_zero_reaches_back_into_previous_year() {
        assert_eq!(week(202300).monday(), date(2022, 12, 26));
        // 2024 starts on a Monday, so week 00 and week 01 coincide.
        assert_eq!(week(202400).monday(), date(2024, 1, 1));
        assert_eq!(week(202401).monday(), date(2024, 1, 1));
    }

    #[test]
    fn from_date_matches_monday_start_numbering() {
        assert_eq!(WeekId::from_date(date(2022, 1, 1)).raw(), 202200);
        assert_eq!(WeekId::from_date(date(2022, 1, 3)).raw(), 202201);
        assert_eq!(WeekId::from_date(date(2022, 5, 30)).raw(), 202222);
        assert_eq!(WeekId::from_date(date(2022, 12, 26)).raw(), 202252);
    }

    #[test]
    fn shift_crosses_year_boundary_through_dates() {
        assert_eq!(week(202228).shift_weeks(-6).raw(), 202222);
        assert_eq!(week(202302).shift_weeks(-6).raw(), 202248);
        assert_eq!(week(202250).shift_weeks(3).raw(), 202301);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for raw in [2022, 2022100, 202254, -202201, 0] {
            assert!(
                matches!(WeekId::from_raw(raw), Err(RetrievalError::Format(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn single_digit_week_is_accepted() {
        let parsed = week(20223);
        assert_eq!(parsed.raw(), 202203);
        assert_eq!(parsed.to_string(), "202203");
    }

    #[test]
    fn range_requires_end_after_start() {
        assert!(WeekRange::new(week(202201), week(202202)).is_ok());
        assert!(matches!(
            WeekRange::new(week(202202), week(202202)),
            Err(RetrievalError::InvalidRange { .. })
        ));
        assert!(matches!(
            WeekRange::new(week(202210), week(202202)),
            Err(RetrievalError::InvalidRange { .. })
        ));
    }

    #[test]
    fn deserializes_from_integer() {
        let parsed: WeekId = serde_json::from_str("202230").expect("week");
        assert_eq!(parsed, week(202230));
        assert!(serde_json::from_str::<WeekId>("202299").is_err());
    }
}
