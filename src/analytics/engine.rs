//! Store performance computation
//!
//! Fans out the windowed metric queries for one store, then combines them
//! into a single [`DerivedStats`] record. Either every query succeeds or the
//! whole computation fails.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, info};

use super::fetch::FetchPolicy;
use super::ranking::{max_visited_day, sum_visitors, top_days};
use super::source::{CounterRow, DayTotal, HourlyCount, MetricSource, PeakDay, PeakHour};
use super::window::{last_hour, previous_month, week_ago_instant, DateRange};
use crate::error::StatsError;

/// Placeholder shown for values the data cannot provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Comparison and ranking metrics for one store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub total_visitors: i64,
    pub total_visitors_last_month: i64,
    /// Sum over the unranged top days report, not bounded to a calendar month
    pub total_visitors_this_month: i64,
    pub total_visitors_till_date: i64,
    #[serde(serialize_with = "or_not_available")]
    pub best_performing_day: Option<NaiveDate>,
    #[serde(serialize_with = "or_not_available")]
    pub best_performing_hour: Option<u32>,
    #[serde(serialize_with = "or_not_available")]
    pub max_visited_day: Option<NaiveDate>,
    pub performance_vs_last_month: Option<f64>,
    pub performance_vs_last_hour: Option<f64>,
    pub performance_vs_last_week: Option<f64>,
    #[serde(serialize_with = "or_not_available")]
    pub comparison_today_vs_yesterday: Option<f64>,
    pub top_days: Vec<DayTotal>,
}

fn or_not_available<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

/// Raw query results a [`DerivedStats`] is built from
#[derive(Debug, Clone, Default)]
pub struct Observations {
    pub live: Option<CounterRow>,
    pub peak_hour: Option<PeakHour>,
    pub peak_day: Option<PeakDay>,
    pub daily_report: Vec<DayTotal>,
    pub last_month_report: Vec<DayTotal>,
    pub last_hour: Vec<HourlyCount>,
    pub last_week: Vec<HourlyCount>,
}

/// Percentage change from `prior` to `current`; absent unless `prior > 0`
pub fn percent_change(current: i64, prior: i64) -> Option<f64> {
    if prior > 0 {
        Some((current - prior) as f64 / prior as f64 * 100.0)
    } else {
        None
    }
}

fn hourly_entries(rows: &[HourlyCount]) -> i64 {
    rows.iter().map(|r| r.hour_enter_count).sum()
}

fn visitors_on(report: &[DayTotal], day: NaiveDate) -> Option<i64> {
    report.iter().find(|d| d.day == day).map(|d| d.total_visitors)
}

impl DerivedStats {
    /// Combine query results observed on `today`
    pub fn derive(obs: &Observations, today: NaiveDate) -> Self {
        let total_visitors = obs.live.as_ref().map_or(0, |row| row.total_enter_count);

        let this_month = sum_visitors(&obs.daily_report);
        let last_month = sum_visitors(&obs.last_month_report);

        let last_hour_visitors = hourly_entries(&obs.last_hour);
        let last_week_visitors = hourly_entries(&obs.last_week);

        let yesterday = today - Duration::days(1);
        let comparison_today_vs_yesterday = match visitors_on(&obs.daily_report, yesterday) {
            Some(prior) => {
                let current = visitors_on(&obs.daily_report, today).unwrap_or(0);
                percent_change(current, prior)
            }
            None => None,
        };

        Self {
            total_visitors,
            total_visitors_last_month: last_month,
            total_visitors_this_month: this_month,
            total_visitors_till_date: total_visitors,
            best_performing_day: obs.peak_day.map(|p| p.day),
            best_performing_hour: obs.peak_hour.map(|p| p.hour),
            max_visited_day: max_visited_day(&obs.daily_report).map(|d| d.day),
            performance_vs_last_month: percent_change(this_month, last_month),
            performance_vs_last_hour: percent_change(total_visitors, last_hour_visitors),
            performance_vs_last_week: percent_change(total_visitors, last_week_visitors),
            comparison_today_vs_yesterday,
            top_days: top_days(&obs.daily_report),
        }
    }
}

/// Computes [`DerivedStats`] from a [`MetricSource`]
#[derive(Clone)]
pub struct StatsEngine {
    source: Arc<dyn MetricSource>,
    policy: FetchPolicy,
}

impl StatsEngine {
    pub fn new(source: Arc<dyn MetricSource>, policy: FetchPolicy) -> Self {
        Self { source, policy }
    }

    /// Gather every windowed query for `store_id` as of `now`
    pub async fn observe(
        &self,
        store_id: &str,
        range: DateRange,
        now: NaiveDateTime,
    ) -> Result<Observations, StatsError> {
        if store_id.trim().is_empty() {
            return Err(StatsError::MissingStore);
        }

        let source = self.source.as_ref();
        let policy = &self.policy;
        let selected = range.window();
        let last_month = previous_month(now.date()).window();
        let hour = last_hour(now);
        let week = week_ago_instant(now);

        debug!(store = store_id, start = %range.start, end = %range.end, "Fetching store metrics");

        let (live, peak_hour, peak_day, daily_report, last_month_report, last_hour_rows, last_week_rows) = tokio::try_join!(
            policy.run("live_stats", || source.live_stats(store_id)),
            policy.run("peak_hour", || source.peak_hour(store_id)),
            policy.run("peak_day", || source.peak_day(store_id, selected)),
            policy.run("top_performing_days", || source.top_performing_days(store_id, None)),
            policy.run("last_month_days", || source.top_performing_days(store_id, Some(last_month))),
            policy.run("last_hour", || source.hourly_range(store_id, hour)),
            policy.run("last_week", || source.hourly_range(store_id, week)),
        )?;

        Ok(Observations {
            live,
            peak_hour,
            peak_day,
            daily_report,
            last_month_report,
            last_hour: last_hour_rows,
            last_week: last_week_rows,
        })
    }

    /// Compute the performance record for `store_id` over `range`
    pub async fn compute(
        &self,
        store_id: &str,
        range: DateRange,
        now: NaiveDateTime,
    ) -> Result<DerivedStats, StatsError> {
        let observations = self.observe(store_id, range, now).await?;
        let stats = DerivedStats::derive(&observations, now.date());

        info!(
            store = store_id,
            total_visitors = stats.total_visitors,
            top_days = stats.top_days.len(),
            "Computed store performance"
        );

        Ok(stats)
    }
}
