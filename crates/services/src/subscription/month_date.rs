//! Month-granularity dates written as `MM-YYYY`.
//!
//! A [`MonthDate`] always sits on the first day of its month, so comparisons
//! and differences only ever see whole months.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonthDateError {
    #[error("invalid date format, expected MM-YYYY: {0}")]
    InvalidFormat(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthDate(NaiveDate);

impl MonthDate {
    /// Build from a year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Truncate any calendar date to the first of its month.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists for every month chrono can represent.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.date_naive())
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Month boundaries crossed going from `self` to `end`.
    ///
    /// Two dates in the same month yield 0; the result is negative when `end`
    /// precedes `self`.
    pub fn months_until(&self, end: MonthDate) -> i64 {
        let years = i64::from(end.year()) - i64::from(self.year());
        let months = i64::from(end.month()) - i64::from(self.month());
        years * 12 + months
    }
}

impl FromStr for MonthDate {
    type Err = MonthDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let [month_part, year_part] = parts.as_slice() else {
            return Err(MonthDateError::InvalidFormat(s.to_string()));
        };

        let invalid = || MonthDateError::InvalidDate(s.to_string());

        if month_part.len() != 2 || !month_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if year_part.len() != 4 || !year_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let month: u32 = month_part.parse().map_err(|_| invalid())?;
        let year: i32 = year_part.parse().map_err(|_| invalid())?;

        // Years are written unpadded, so a leading zero could not round-trip.
        if !(1..=12).contains(&month) || year < 1000 {
            return Err(invalid());
        }

        MonthDate::new(year, month).ok_or_else(invalid)
    }
}

impl fmt::Display for MonthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{}", self.month(), self.year())
    }
}

impl From<NaiveDate> for MonthDate {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl From<MonthDate> for NaiveDate {
    fn from(date: MonthDate) -> Self {
        date.0
    }
}

impl Serialize for MonthDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
