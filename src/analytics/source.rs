//! Read-only metric source consumed by the stats engine

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::window::TimeWindow;

/// One timestamped counter measurement for a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterRow {
    #[serde(rename = "date")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "hr_enter_count")]
    pub hour_enter_count: i64,
    #[serde(rename = "hr_exit_count")]
    pub hour_exit_count: i64,
    #[serde(rename = "today_enter_count")]
    pub day_enter_count: i64,
    #[serde(rename = "today_exit_count")]
    pub day_exit_count: i64,
    pub total_enter_count: i64,
    pub total_exit_count: i64,
}

/// Hourly entries/exits at one timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    #[serde(rename = "date")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "hr_enter_count")]
    pub hour_enter_count: i64,
    #[serde(rename = "hr_exit_count")]
    pub hour_exit_count: i64,
}

/// Hour of day with the most summed entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeakHour {
    pub hour: u32,
    pub total_enter: i64,
    pub total_exit: i64,
}

/// Calendar day with the most summed daily entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeakDay {
    pub day: NaiveDate,
    pub total_enter: i64,
    pub total_exit: i64,
}

/// Visitors summed over one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    pub day: NaiveDate,
    pub total_visitors: i64,
}

impl DayTotal {
    /// Sum hourly entries per calendar day, days in order of first appearance
    pub fn rollup(rows: &[HourlyCount]) -> Vec<DayTotal> {
        let mut days: Vec<DayTotal> = Vec::new();
        for row in rows {
            let day = row.timestamp.date();
            match days.iter_mut().find(|d| d.day == day) {
                Some(total) => total.total_visitors += row.hour_enter_count,
                None => days.push(DayTotal {
                    day,
                    total_visitors: row.hour_enter_count,
                }),
            }
        }
        days
    }
}

/// The five query shapes the stats engine needs from storage.
///
/// Implementations are read-only; "no data" is `None` or an empty `Vec`,
/// never an error.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Latest cumulative counters for the store
    async fn live_stats(&self, store_id: &str) -> Result<Option<CounterRow>>;

    /// All-time busiest hour of day
    async fn peak_hour(&self, store_id: &str) -> Result<Option<PeakHour>>;

    /// Busiest day inside `window`
    async fn peak_day(&self, store_id: &str, window: TimeWindow) -> Result<Option<PeakDay>>;

    /// Up to ten best days, inside `window` when given, otherwise all history
    async fn top_performing_days(
        &self,
        store_id: &str,
        window: Option<TimeWindow>,
    ) -> Result<Vec<DayTotal>>;

    /// Hourly rows inside `window`, oldest first
    async fn hourly_range(&self, store_id: &str, window: TimeWindow) -> Result<Vec<HourlyCount>>;
}
