//! Calendar-month arithmetic and the analysis window.

use crate::error::{InsightsError, InsightsResult};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, the key of a cohort. Orders by year then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CohortMonth {
    year: i32,
    month: u32,
}

impl CohortMonth {
    pub fn new(year: i32, month: u32) -> InsightsResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(InsightsError::Config(format!(
                "month {month} out of range for {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Truncate a timestamp to its calendar month.
    pub fn of(ts: &DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Whole calendar months from `self` to `later`. Negative when `later`
    /// precedes `self`.
    pub fn months_until(&self, later: &CohortMonth) -> i32 {
        (later.year - self.year) * 12 + later.month as i32 - self.month as i32
    }

    /// The month `n` months after this one.
    pub fn plus_months(&self, n: u32) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        Self {
            year: zero_based.div_euclid(12) as i32,
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated on every construction path
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for CohortMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CohortMonth {
    type Err = InsightsError;

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD` date, which is truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::of_date(date));
        }
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| InsightsError::Config(format!("invalid month '{s}', expected YYYY-MM")))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| InsightsError::Config(format!("invalid year in '{s}'")))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| InsightsError::Config(format!("invalid month in '{s}'")))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for CohortMonth {
    type Error = InsightsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CohortMonth> for String {
    fn from(m: CohortMonth) -> Self {
        m.to_string()
    }
}

/// Inclusive-start, exclusive-end range of order timestamps considered by a
/// run. Dates are taken as UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> InsightsResult<Self> {
        if start >= end {
            return Err(InsightsError::Config(format!(
                "analysis window start {start} must precede end {end}"
            )));
        }
        Ok(Self {
            start: midnight(start),
            end: midnight(end),
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts < self.end
    }

    /// Last calendar month with any instant inside the window.
    pub fn last_month(&self) -> CohortMonth {
        let last_instant = self.end - chrono::Duration::nanoseconds(1);
        CohortMonth::of(&last_instant)
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Parse an order or item timestamp. Accepts RFC 3339, and naive
/// `YYYY-MM-DD HH:MM:SS[.f]` with an optional trailing ` UTC`, taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix(" UTC").unwrap_or(raw);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map(|n| Utc.from_utc_datetime(&n))
}

/// Serde adapter over [`parse_timestamp`].
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> CohortMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_months_until() {
        assert_eq!(month("2023-01").months_until(&month("2023-01")), 0);
        assert_eq!(month("2023-01").months_until(&month("2023-02")), 1);
        assert_eq!(month("2023-11").months_until(&month("2024-01")), 2);
        assert_eq!(month("2023-01").months_until(&month("2024-01")), 12);
        assert_eq!(month("2023-03").months_until(&month("2023-01")), -2);
    }

    #[test]
    fn test_plus_months_wraps_year() {
        assert_eq!(month("2023-11").plus_months(3), month("2024-02"));
        assert_eq!(month("2023-01").plus_months(12), month("2024-01"));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(month("2023-7").to_string(), "2023-07");
        assert_eq!(month("2023-07-19").to_string(), "2023-07");
        assert!("2023-13".parse::<CohortMonth>().is_err());
        assert!("garbage".parse::<CohortMonth>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&month("2023-01")).unwrap();
        assert_eq!(json, "\"2023-01\"");
        let back: CohortMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month("2023-01"));
    }

    #[test]
    fn test_window_bounds() {
        let window = AnalysisWindow::new(
            NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        )
        .unwrap();
        assert!(window.contains(&parse_timestamp("2019-01-01 00:00:00").unwrap()));
        assert!(window.contains(&parse_timestamp("2024-12-31 23:59:59").unwrap()));
        assert!(!window.contains(&parse_timestamp("2025-01-01 00:00:00").unwrap()));
        assert_eq!(window.last_month(), month("2024-12"));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let d = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(AnalysisWindow::new(d, d).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(parse_timestamp("2023-02-03T04:05:06Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-02-03 04:05:06 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2023-02-03 04:05:06"), Some(expected));
        assert!(parse_timestamp("yesterday").is_none());
    }
}
