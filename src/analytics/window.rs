//! Calendar and time windows used by the metric queries

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::StatsError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inclusive range of calendar days, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, StatsError> {
        if start > end {
            return Err(StatsError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` days before `today`, through `today`
    pub fn trailing(today: NaiveDate, days: i64) -> Self {
        Self {
            start: today - Duration::days(days),
            end: today,
        }
    }

    /// Fill whichever bound is missing from the trailing window, then validate
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
        default_days: i64,
    ) -> Result<Self, StatsError> {
        let fallback = Self::trailing(today, default_days);
        Self::new(start.unwrap_or(fallback.start), end.unwrap_or(fallback.end))
    }

    /// Whole-day timestamp bounds: `start 00:00:00` through `end 23:59:59`
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: start_of_day(self.start),
            end: end_of_day(self.end),
        }
    }
}

/// Inclusive timestamp window matched with SQL `BETWEEN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn instant(at: NaiveDateTime) -> Self {
        Self { start: at, end: at }
    }

    /// Parse request bounds; date-only values expand to whole days
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self {
            start: parse_start_bound(start)?,
            end: parse_end_bound(end)?,
        })
    }

    pub fn start_param(&self) -> String {
        format_timestamp(self.start)
    }

    pub fn end_param(&self) -> String {
        format_timestamp(self.end)
    }
}

/// First through last day of the calendar month before `today`
pub fn previous_month(today: NaiveDate) -> DateRange {
    let first_of_month = today - Duration::days(i64::from(today.day0()));
    let end = first_of_month - Duration::days(1);
    let start = end - Duration::days(i64::from(end.day0()));
    DateRange { start, end }
}

/// The hour leading up to `now`
pub fn last_hour(now: NaiveDateTime) -> TimeWindow {
    TimeWindow::new(now - Duration::hours(1), now)
}

/// The single instant exactly one week before `now`.
///
/// Start and end coincide, so only a row stamped at that exact second
/// matches. Callers relying on a week-long window must not use this.
pub fn week_ago_instant(now: NaiveDateTime) -> TimeWindow {
    TimeWindow::instant(now - Duration::days(7))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn parse_start_bound(value: &str) -> Option<NaiveDateTime> {
    parse_timestamp(value).or_else(|| parse_date(value).map(start_of_day))
}

fn parse_end_bound(value: &str) -> Option<NaiveDateTime> {
    parse_timestamp(value).or_else(|| parse_date(value).map(end_of_day))
}

fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    start_of_day(day) + Duration::seconds(86_399)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn rejects_start_after_end() {
        let err = DateRange::new(date(2024, 6, 3), date(2024, 6, 1)).unwrap_err();
        assert_eq!(
            err,
            StatsError::InvalidRange {
                start: date(2024, 6, 3),
                end: date(2024, 6, 1)
            }
        );
        assert!(DateRange::new(date(2024, 6, 1), date(2024, 6, 1)).is_ok());
    }

    #[test]
    fn resolve_defaults_each_missing_bound() {
        let today = date(2024, 6, 15);
        let range = DateRange::resolve(None, None, today, 10).unwrap();
        assert_eq!(range.start, date(2024, 6, 5));
        assert_eq!(range.end, today);

        let range = DateRange::resolve(Some(date(2024, 6, 1)), None, today, 10).unwrap();
        assert_eq!(range.start, date(2024, 6, 1));
        assert_eq!(range.end, today);

        assert!(DateRange::resolve(Some(date(2024, 7, 1)), None, today, 10).is_err());
    }

    #[test]
    fn window_covers_whole_days() {
        let range = DateRange::new(date(2024, 6, 1), date(2024, 6, 3)).unwrap();
        let window = range.window();
        assert_eq!(window.start_param(), "2024-06-01 00:00:00");
        assert_eq!(window.end_param(), "2024-06-03 23:59:59");
    }

    #[test]
    fn previous_month_mid_year() {
        let range = previous_month(date(2024, 7, 15));
        assert_eq!(range.start, date(2024, 6, 1));
        assert_eq!(range.end, date(2024, 6, 30));
    }

    #[test]
    fn previous_month_across_year_boundary() {
        let range = previous_month(date(2025, 1, 1));
        assert_eq!(range.start, date(2024, 12, 1));
        assert_eq!(range.end, date(2024, 12, 31));
    }

    #[test]
    fn previous_month_in_leap_year() {
        let range = previous_month(date(2024, 3, 31));
        assert_eq!(range.start, date(2024, 2, 1));
        assert_eq!(range.end, date(2024, 2, 29));
    }

    #[test]
    fn hour_and_week_windows() {
        let now = at(2024, 6, 15, 14, 30);
        let hour = last_hour(now);
        assert_eq!(hour.start, at(2024, 6, 15, 13, 30));
        assert_eq!(hour.end, now);

        let week = week_ago_instant(now);
        assert_eq!(week.start, week.end);
        assert_eq!(week.start, at(2024, 6, 8, 14, 30));
    }

    #[test]
    fn parses_dates_and_timestamps() {
        let window = TimeWindow::parse("2024-06-01", "2024-06-02 12:00:00").unwrap();
        assert_eq!(window.start, at(2024, 6, 1, 0, 0));
        assert_eq!(window.end, at(2024, 6, 2, 12, 0));

        let window = TimeWindow::parse("2024-06-01T08:15:00.000", "2024-06-01").unwrap();
        assert_eq!(window.start, at(2024, 6, 1, 8, 15));
        assert_eq!(window.end_param(), "2024-06-01 23:59:59");

        assert!(TimeWindow::parse("June 1st", "2024-06-01").is_none());
        assert!(parse_date("2024-13-01").is_none());
    }
}
