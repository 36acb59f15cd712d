//! Database module

mod schema;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::analytics::{CounterRow, DayTotal, HourlyCount, MetricSource, PeakDay, PeakHour, TimeWindow, TOP_DAYS};
use crate::config::DatabaseConfig;

type CounterTuple = (NaiveDateTime, i64, i64, i64, i64, i64, i64);

fn counter_row((timestamp, hr_enter, hr_exit, today_enter, today_exit, total_enter, total_exit): CounterTuple) -> CounterRow {
    CounterRow {
        timestamp,
        hour_enter_count: hr_enter,
        hour_exit_count: hr_exit,
        day_enter_count: today_enter,
        day_exit_count: today_exit,
        total_enter_count: total_enter,
        total_exit_count: total_exit,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    instance: Uuid,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&format!("sqlite:{}?mode=rwc", config.url))
            .await?;
        Ok(Self {
            pool,
            instance: Uuid::new_v4(),
        })
    }

    /// Distinguishes pools when keying shared caches
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub async fn run_migrations(&self) -> Result<()> {
        // Enable WAL mode so sensor writes don't block dashboard reads
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(schema::CREATE_STORE_PC_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_LIVE_PC_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_STORE_DATE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_DATE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_hourly_data(&self, store_id: &str, window: TimeWindow) -> Result<Vec<HourlyCount>> {
        let rows: Vec<(NaiveDateTime, i64, i64)> = sqlx::query_as(
            r#"
            SELECT date, COALESCE(hr_enter_count, 0), COALESCE(hr_exit_count, 0)
            FROM store_pc
            WHERE storeID = ? AND date BETWEEN ? AND ?
            ORDER BY date ASC
            "#,
        )
        .bind(store_id)
        .bind(window.start_param())
        .bind(window.end_param())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, hour_enter_count, hour_exit_count)| HourlyCount {
                timestamp,
                hour_enter_count,
                hour_exit_count,
            })
            .collect())
    }

    pub async fn get_daily_totals(&self, store_id: &str, window: Option<TimeWindow>) -> Result<Vec<DailyCount>> {
        let start = window.map(|w| w.start_param());
        let end = window.map(|w| w.end_param());
        let rows: Vec<(NaiveDateTime, i64, i64)> = sqlx::query_as(
            r#"
            SELECT date, COALESCE(today_enter_count, 0), COALESCE(today_exit_count, 0)
            FROM store_pc
            WHERE storeID = ? AND (? IS NULL OR date BETWEEN ? AND ?)
            ORDER BY date DESC
            "#,
        )
        .bind(store_id)
        .bind(start.clone())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, today_enter_count, today_exit_count)| DailyCount {
                timestamp,
                today_enter_count,
                today_exit_count,
            })
            .collect())
    }

    /// All-time busiest hour of day across hourly readings
    pub async fn get_peak_hours(&self, store_id: &str) -> Result<Option<PeakHour>> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT CAST(strftime('%H', date) AS INTEGER) AS hour,
                   COALESCE(SUM(hr_enter_count), 0) AS total_enter,
                   COALESCE(SUM(hr_exit_count), 0) AS total_exit
            FROM store_pc
            WHERE storeID = ? AND type = 'Hour'
            GROUP BY hour
            ORDER BY total_enter DESC, hour ASC
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(hour, total_enter, total_exit)| PeakHour {
            hour: hour as u32,
            total_enter,
            total_exit,
        }))
    }

    /// Busiest hour of day inside a window
    pub async fn get_peak_hour_in(&self, store_id: &str, window: TimeWindow) -> Result<Option<HourVisitors>> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT CAST(strftime('%H', date) AS INTEGER) AS hour,
                   COALESCE(SUM(hr_enter_count), 0) AS total_visitors
            FROM store_pc
            WHERE storeID = ? AND date BETWEEN ? AND ?
            GROUP BY hour
            ORDER BY total_visitors DESC, hour ASC
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .bind(window.start_param())
        .bind(window.end_param())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(hour, total_visitors)| HourVisitors {
            hour: hour as u32,
            total_visitors,
        }))
    }

    pub async fn get_peak_day(&self, store_id: &str, window: TimeWindow) -> Result<Option<PeakDay>> {
        let row: Option<(NaiveDate, i64, i64)> = sqlx::query_as(
            r#"
            SELECT DATE(date) AS day,
                   COALESCE(SUM(today_enter_count), 0) AS total_enter,
                   COALESCE(SUM(today_exit_count), 0) AS total_exit
            FROM store_pc
            WHERE storeID = ? AND date BETWEEN ? AND ?
            GROUP BY day
            ORDER BY total_enter DESC, day ASC
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .bind(window.start_param())
        .bind(window.end_param())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(day, total_enter, total_exit)| PeakDay {
            day,
            total_enter,
            total_exit,
        }))
    }

    pub async fn get_live_stats(&self, store_id: &str) -> Result<Option<CounterRow>> {
        let row: Option<CounterTuple> = sqlx::query_as(
            r#"
            SELECT date,
                   COALESCE(hr_enter_count, 0), COALESCE(hr_exit_count, 0),
                   COALESCE(today_enter_count, 0), COALESCE(today_exit_count, 0),
                   COALESCE(total_enter_count, 0), COALESCE(total_exit_count, 0)
            FROM live_pc
            WHERE storeID = ?
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(counter_row))
    }

    /// Live snapshots for every store, used by the live feed poller
    pub async fn get_all_live_stats(&self) -> Result<Vec<LiveSnapshot>> {
        let rows: Vec<(String, NaiveDateTime, i64, i64, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT storeID, date,
                   COALESCE(hr_enter_count, 0), COALESCE(hr_exit_count, 0),
                   COALESCE(today_enter_count, 0), COALESCE(today_exit_count, 0),
                   COALESCE(total_enter_count, 0), COALESCE(total_exit_count, 0)
            FROM live_pc
            ORDER BY storeID
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(store_id, ts, hr_enter, hr_exit, today_enter, today_exit, total_enter, total_exit)| LiveSnapshot {
                store_id,
                counters: counter_row((ts, hr_enter, hr_exit, today_enter, today_exit, total_enter, total_exit)),
            })
            .collect())
    }

    pub async fn get_stores(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT storeID FROM store_pc ORDER BY storeID")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(store_id,)| store_id).collect())
    }

    /// Ten stores with the lowest peak cumulative count, ascending
    pub async fn get_store_report(&self) -> Result<Vec<StoreMax>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT storeID, COALESCE(MAX(total_enter_count), 0) AS max_visitors
            FROM store_pc
            GROUP BY storeID
            ORDER BY max_visitors ASC
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(store_id, max_visitors)| StoreMax { store_id, max_visitors })
            .collect())
    }

    pub async fn get_best_store(&self, window: TimeWindow) -> Result<Option<StoreMax>> {
        let row: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT storeID, COALESCE(MAX(total_enter_count), 0) AS max_visitors
            FROM store_pc
            WHERE date BETWEEN ? AND ?
            GROUP BY storeID
            ORDER BY max_visitors DESC
            LIMIT 1
            "#,
        )
        .bind(window.start_param())
        .bind(window.end_param())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(store_id, max_visitors)| StoreMax { store_id, max_visitors }))
    }

    /// Best days by summed daily entries; all history unless a window is given
    pub async fn get_top_performing_days(&self, store_id: &str, window: Option<TimeWindow>) -> Result<Vec<DayTotal>> {
        let rows: Vec<(NaiveDate, i64)> = match window {
            Some(w) => {
                sqlx::query_as(
                    r#"
                    SELECT DATE(date) AS day, COALESCE(SUM(today_enter_count), 0) AS total_visitors
                    FROM store_pc
                    WHERE storeID = ? AND date BETWEEN ? AND ?
                    GROUP BY day
                    ORDER BY total_visitors DESC, day ASC
                    LIMIT ?
                    "#,
                )
                .bind(store_id)
                .bind(w.start_param())
                .bind(w.end_param())
                .bind(TOP_DAYS as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT DATE(date) AS day, COALESCE(SUM(today_enter_count), 0) AS total_visitors
                    FROM store_pc
                    WHERE storeID = ?
                    GROUP BY day
                    ORDER BY total_visitors DESC, day ASC
                    LIMIT ?
                    "#,
                )
                .bind(store_id)
                .bind(TOP_DAYS as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|(day, total_visitors)| DayTotal { day, total_visitors })
            .collect())
    }

    pub async fn get_monthly_total(&self, store_id: &str, window: TimeWindow) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(today_enter_count), 0) AS total_visitors
            FROM store_pc
            WHERE storeID = ? AND date BETWEEN ? AND ?
            "#,
        )
        .bind(store_id)
        .bind(window.start_param())
        .bind(window.end_param())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// One row per located store with its highest cumulative count
    pub async fn get_store_locations(&self) -> Result<Vec<StoreLocation>> {
        let rows: Vec<(String, String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT geo_loc, storeID, location, COALESCE(MAX(total_enter_count), 0) AS total_enter_count
            FROM store_pc
            WHERE geo_loc IS NOT NULL AND TRIM(geo_loc) != ''
            GROUP BY storeID, geo_loc, location
            ORDER BY storeID
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(geo_loc, store_id, location, total_enter_count)| StoreLocation {
                geo_loc: geo_loc.trim().to_string(),
                store_id,
                location: location.unwrap_or_default().trim().to_lowercase(),
                total_enter_count,
            })
            .collect())
    }

    pub async fn get_predictive(&self, store_id: &str, kind: PredictionKind) -> Result<Forecast> {
        match kind {
            PredictionKind::Daily => {
                let rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
                    r#"
                    SELECT DATE(date) AS day, COALESCE(AVG(today_enter_count), 0.0) AS avg_enter
                    FROM store_pc
                    WHERE storeID = ?
                    GROUP BY day
                    ORDER BY day DESC
                    LIMIT 30
                    "#,
                )
                .bind(store_id)
                .fetch_all(&self.pool)
                .await?;

                Ok(Forecast::Daily(
                    rows.into_iter()
                        .map(|(day, avg)| DailyAverage { day, avg_enter: round2(avg) })
                        .collect(),
                ))
            }
            PredictionKind::Hourly => {
                let rows: Vec<(i64, f64)> = sqlx::query_as(
                    r#"
                    SELECT CAST(strftime('%H', date) AS INTEGER) AS hour,
                           COALESCE(AVG(hr_enter_count), 0.0) AS avg_enter
                    FROM store_pc
                    WHERE storeID = ?
                    GROUP BY hour
                    ORDER BY hour ASC
                    "#,
                )
                .bind(store_id)
                .fetch_all(&self.pool)
                .await?;

                Ok(Forecast::Hourly(
                    rows.into_iter()
                        .map(|(hour, avg)| HourlyAverage {
                            hour: hour as u32,
                            avg_enter: round2(avg),
                        })
                        .collect(),
                ))
            }
        }
    }

    /// Hours of `day` whose entries or exits exceed `threshold`
    pub async fn get_alerts(&self, store_id: &str, day: NaiveDate, threshold: i64) -> Result<Vec<HourAlert>> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT CAST(strftime('%H', date) AS INTEGER) AS hour,
                   COALESCE(SUM(hr_enter_count), 0) AS total_enter,
                   COALESCE(SUM(hr_exit_count), 0) AS total_exit
            FROM store_pc
            WHERE storeID = ? AND DATE(date) = ?
            GROUP BY hour
            HAVING total_enter > ? OR total_exit > ?
            ORDER BY hour ASC
            "#,
        )
        .bind(store_id)
        .bind(day.format("%Y-%m-%d").to_string())
        .bind(threshold)
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(hour, total_enter, total_exit)| HourAlert {
                hour: hour as u32,
                total_enter,
                total_exit,
            })
            .collect())
    }
}

#[async_trait]
impl MetricSource for Database {
    async fn live_stats(&self, store_id: &str) -> Result<Option<CounterRow>> {
        self.get_live_stats(store_id).await
    }

    async fn peak_hour(&self, store_id: &str) -> Result<Option<PeakHour>> {
        self.get_peak_hours(store_id).await
    }

    async fn peak_day(&self, store_id: &str, window: TimeWindow) -> Result<Option<PeakDay>> {
        self.get_peak_day(store_id, window).await
    }

    async fn top_performing_days(&self, store_id: &str, window: Option<TimeWindow>) -> Result<Vec<DayTotal>> {
        self.get_top_performing_days(store_id, window).await
    }

    async fn hourly_range(&self, store_id: &str, window: TimeWindow) -> Result<Vec<HourlyCount>> {
        self.get_hourly_data(store_id, window).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    #[serde(rename = "date")]
    pub timestamp: NaiveDateTime,
    pub today_enter_count: i64,
    pub today_exit_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourVisitors {
    pub hour: u32,
    pub total_visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreMax {
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub max_visitors: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreLocation {
    #[serde(rename = "geoLoc")]
    pub geo_loc: String,
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub location: String,
    pub total_enter_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyAverage {
    pub day: NaiveDate,
    pub avg_enter: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyAverage {
    pub hour: u32,
    pub avg_enter: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Forecast {
    Daily(Vec<DailyAverage>),
    Hourly(Vec<HourlyAverage>),
}

#[derive(Debug, Clone, Serialize)]
pub struct HourAlert {
    pub hour: u32,
    pub total_enter: i64,
    pub total_exit: i64,
}

/// Latest counters of one store, as broadcast on the live feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveSnapshot {
    #[serde(rename = "storeID")]
    pub store_id: String,
    #[serde(flatten)]
    pub counters: CounterRow,
}

/// Builders for seeded in-memory databases
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    impl Database {
        pub(crate) async fn in_memory() -> Result<Self> {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;
            let db = Self {
                pool,
                instance: Uuid::new_v4(),
            };
            db.run_migrations().await?;
            Ok(db)
        }
    }

    /// One `store_pc` row; counts default to zero
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Reading {
        pub store: &'static str,
        pub at: &'static str,
        pub hr_enter: i64,
        pub hr_exit: i64,
        pub today_enter: i64,
        pub today_exit: i64,
        pub total_enter: i64,
        pub total_exit: i64,
        pub geo_loc: Option<&'static str>,
        pub location: Option<&'static str>,
        pub day_row: bool,
    }

    pub(crate) async fn insert(db: &Database, reading: &Reading) {
        sqlx::query(
            r#"
            INSERT INTO store_pc (storeID, date, type, hr_enter_count, hr_exit_count, today_enter_count,
                                  today_exit_count, total_enter_count, total_exit_count, geo_loc, location)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reading.store)
        .bind(reading.at)
        .bind(if reading.day_row { "Day" } else { "Hour" })
        .bind(reading.hr_enter)
        .bind(reading.hr_exit)
        .bind(reading.today_enter)
        .bind(reading.today_exit)
        .bind(reading.total_enter)
        .bind(reading.total_exit)
        .bind(reading.geo_loc)
        .bind(reading.location)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    pub(crate) async fn set_live(db: &Database, store: &str, row: &CounterRow) {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO live_pc (storeID, date, hr_enter_count, hr_exit_count, today_enter_count,
                                            today_exit_count, total_enter_count, total_exit_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(store)
        .bind(row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .bind(row.hour_enter_count)
        .bind(row.hour_exit_count)
        .bind(row.day_enter_count)
        .bind(row.day_exit_count)
        .bind(row.total_enter_count)
        .bind(row.total_exit_count)
        .execute(&db.pool)
        .await
        .unwrap();
    }
}
