//! Date windows and pagination for record queries.

use crate::core::error::{FinHealthError, Result};
use chrono::{Days, NaiveDate};
use serde::Serialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest default window a configuration may ask for.
pub const MAX_WINDOW_DAYS: i64 = 36_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FinHealthError::InvalidWindow(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(TimeWindow { start, end })
    }

    /// The `days` days ending on `today`.
    pub fn trailing(today: NaiveDate, days: i64) -> Result<Self> {
        Ok(TimeWindow {
            start: days_before(today, days)?,
            end: today,
        })
    }

    /// Builds a window from optional caller supplied bounds. A missing start is
    /// `today - default_days`, a missing end is `today`.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
        default_days: i64,
    ) -> Result<Self> {
        let start = match start.filter(|s| !s.is_empty()) {
            Some(s) => parse_date(s)?,
            None => days_before(today, default_days)?,
        };
        let end = match end.filter(|s| !s.is_empty()) {
            Some(s) => parse_date(s)?,
            None => today,
        };
        TimeWindow::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn days_before(today: NaiveDate, days: i64) -> Result<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|d| today.checked_sub_days(Days::new(d)))
        .ok_or_else(|| {
            FinHealthError::InvalidWindow(format!("cannot go back {days} days from {today}"))
        })
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| FinHealthError::InvalidWindow(format!("bad date '{value}': {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Clamps the limit into `[1, max_limit]`.
    pub fn clamped(limit: u32, offset: u32, max_limit: u32) -> Self {
        Page {
            limit: limit.clamp(1, max_limit.max(1)),
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_window_is_trailing_thirty_days() {
        let today = date(2024, 3, 31);
        let window = TimeWindow::resolve(None, None, today, 30).unwrap();
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.end, today);
        assert!(window.contains(date(2024, 3, 1)));
        assert!(window.contains(today));
        assert!(!window.contains(date(2024, 2, 29)));
        assert!(!window.contains(date(2024, 4, 1)));
    }

    #[test]
    fn test_empty_strings_use_defaults() {
        let today = date(2024, 3, 31);
        let window = TimeWindow::resolve(Some(""), Some(""), today, 30).unwrap();
        assert_eq!(window, TimeWindow::trailing(today, 30).unwrap());
    }

    #[test]
    fn test_explicit_bounds() {
        let window =
            TimeWindow::resolve(Some("2024-01-01"), Some("2024-01-31"), date(2024, 6, 1), 30)
                .unwrap();
        assert_eq!(window.start, date(2024, 1, 1));
        assert_eq!(window.end, date(2024, 1, 31));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let err = TimeWindow::resolve(Some("2024-02-01"), Some("2024-01-01"), date(2024, 6, 1), 30)
            .unwrap_err();
        assert!(matches!(err, FinHealthError::InvalidWindow(_)));
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let err = TimeWindow::resolve(Some("01/02/2024"), None, date(2024, 6, 1), 30).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_out_of_range_default_days_is_an_error() {
        let today = date(2024, 5, 31);
        for days in [1_000_000_000, i64::MAX, -1] {
            let err = TimeWindow::resolve(None, None, today, days).unwrap_err();
            assert!(matches!(err, FinHealthError::InvalidWindow(_)), "{days}");
        }
        assert!(TimeWindow::trailing(today, i64::MAX).is_err());
        // Explicit bounds don't need the default.
        assert!(TimeWindow::resolve(Some("2024-05-01"), None, today, -1).is_ok());
    }

    #[test]
    fn test_page_is_clamped() {
        assert_eq!(Page::clamped(0, 5, 100), Page { limit: 1, offset: 5 });
        assert_eq!(Page::clamped(500, 0, 100), Page { limit: 100, offset: 0 });
        assert_eq!(Page::clamped(20, 40, 100), Page { limit: 20, offset: 40 });
    }
}
