//! HTTP routes for the raw metric queries, store performance and pages

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    Json,
};
use cached::proc_macro::cached;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::analytics::{parse_date, CounterRow, DateRange, DayTotal, DerivedStats, HourlyCount, PeakDay, PeakHour, ReportProjection, TimeWindow};
use crate::db::{DailyCount, Database, Forecast, HourAlert, HourVisitors, PredictionKind, StoreLocation, StoreMax};
use crate::error::{ApiError, ApiResult, StatsError};
use crate::pages::{display_date, display_time, Page, PageKind, PageView};

/// `Query` whose rejections answer with the JSON error body
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    #[serde(rename = "storeID")]
    pub store_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(rename = "storeID")]
    pub store_id: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PredictiveQuery {
    #[serde(rename = "storeID")]
    pub store_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PredictionKind>,
}

fn require_store(store_id: Option<String>) -> ApiResult<String> {
    match store_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(StatsError::MissingStore.into()),
    }
}

impl RangeQuery {
    fn store(&self) -> ApiResult<String> {
        require_store(self.store_id.clone())
    }

    /// Both bounds, or neither
    fn optional_window(&self) -> ApiResult<Option<TimeWindow>> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => TimeWindow::parse(start, end)
                .map(Some)
                .ok_or_else(|| ApiError::bad_request("startDate and endDate must be YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")),
            _ => Ok(None),
        }
    }

    fn window(&self) -> ApiResult<TimeWindow> {
        self.optional_window()?
            .ok_or_else(|| ApiError::bad_request("startDate and endDate are required"))
    }

    /// Calendar range, missing bounds filled from the trailing default window
    fn date_range(&self, today: NaiveDate, default_days: i64) -> ApiResult<DateRange> {
        let start = self.start_date.as_deref().map(parse_day).transpose()?;
        let end = self.end_date.as_deref().map(parse_day).transpose()?;
        Ok(DateRange::resolve(start, end, today, default_days)?)
    }
}

fn parse_day(value: &str) -> ApiResult<NaiveDate> {
    parse_date(value)
        .or_else(|| value.get(..10).and_then(parse_date))
        .ok_or_else(|| ApiError::bad_request(format!("invalid date '{value}'")))
}

/// Store ids change rarely; 60 second TTL
#[cached(time = 60, key = "Uuid", convert = r#"{ db.instance() }"#, result = true)]
async fn get_cached_stores(db: Database) -> Result<Vec<String>, anyhow::Error> {
    db.get_stores().await
}

/// Sensor positions change rarely; 5 minute TTL
#[cached(time = 300, key = "Uuid", convert = r#"{ db.instance() }"#, result = true)]
async fn get_cached_locations(db: Database) -> Result<Vec<StoreLocation>, anyhow::Error> {
    db.get_store_locations().await
}

pub async fn api_hourly_data(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Vec<HourlyCount>>> {
    let store = query.store()?;
    Ok(Json(state.db.get_hourly_data(&store, query.window()?).await?))
}

pub async fn api_daily_totals(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Vec<DailyCount>>> {
    let store = query.store()?;
    Ok(Json(state.db.get_daily_totals(&store, query.optional_window()?).await?))
}

pub async fn api_peak_hours(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Option<PeakHour>>> {
    let store = require_store(query.store_id)?;
    Ok(Json(state.db.get_peak_hours(&store).await?))
}

pub async fn api_peak_hour(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Option<HourVisitors>>> {
    let store = query.store()?;
    Ok(Json(state.db.get_peak_hour_in(&store, query.window()?).await?))
}

pub async fn api_peak_day(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Option<PeakDay>>> {
    let store = query.store()?;
    Ok(Json(state.db.get_peak_day(&store, query.window()?).await?))
}

/// Live counters with the display date and time replacing the raw timestamp
#[derive(Debug, Clone, Serialize)]
pub struct LiveStats {
    pub date: String,
    pub time: String,
    pub hr_enter_count: i64,
    pub hr_exit_count: i64,
    pub today_enter_count: i64,
    pub today_exit_count: i64,
    pub total_enter_count: i64,
    pub total_exit_count: i64,
}

impl From<CounterRow> for LiveStats {
    fn from(row: CounterRow) -> Self {
        Self {
            date: display_date(row.timestamp),
            time: display_time(row.timestamp),
            hr_enter_count: row.hour_enter_count,
            hr_exit_count: row.hour_exit_count,
            today_enter_count: row.day_enter_count,
            today_exit_count: row.day_exit_count,
            total_enter_count: row.total_enter_count,
            total_exit_count: row.total_exit_count,
        }
    }
}

pub async fn api_live_stats(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Option<LiveStats>>> {
    let store = require_store(query.store_id)?;
    let row = state.db.get_live_stats(&store).await?;
    Ok(Json(row.map(LiveStats::from)))
}

pub async fn api_stores(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(get_cached_stores(state.db.clone()).await?))
}

pub async fn api_report(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<StoreMax>>> {
    Ok(Json(state.db.get_store_report().await?))
}

pub async fn api_last_month_best_store(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Option<StoreMax>>> {
    Ok(Json(state.db.get_best_store(query.window()?).await?))
}

pub async fn api_top_performing_days(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Vec<DayTotal>>> {
    let store = query.store()?;
    Ok(Json(state.db.get_top_performing_days(&store, query.optional_window()?).await?))
}

#[derive(Debug, Serialize)]
pub struct MonthlyTotal {
    pub total_visitors: i64,
}

pub async fn api_monthly_data(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<MonthlyTotal>> {
    let store = query.store()?;
    let total_visitors = state.db.get_monthly_total(&store, query.window()?).await?;
    Ok(Json(MonthlyTotal { total_visitors }))
}

pub async fn api_store_locations(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<StoreLocation>>> {
    Ok(Json(get_cached_locations(state.db.clone()).await?))
}

pub async fn api_predictive(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PredictiveQuery>,
) -> ApiResult<Json<Forecast>> {
    let store = require_store(query.store_id)?;
    let kind = query
        .kind
        .ok_or_else(|| ApiError::bad_request("type must be 'daily' or 'hourly'"))?;
    Ok(Json(state.db.get_predictive(&store, kind).await?))
}

pub async fn api_alerts(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<StoreQuery>,
) -> ApiResult<Json<Vec<HourAlert>>> {
    let store = require_store(query.store_id)?;
    let alerts = state
        .db
        .get_alerts(&store, now().date(), state.analytics.alert_threshold)
        .await?;
    if !alerts.is_empty() {
        tracing::info!(store = %store, hours = alerts.len(), "Traffic alerts raised");
    }
    Ok(Json(alerts))
}

pub async fn api_store_stats(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<DerivedStats>> {
    let now = now();
    let range = query.date_range(now.date(), state.analytics.default_window_days)?;
    let store = query.store_id.unwrap_or_default();
    Ok(Json(state.engine.compute(&store, range, now).await?))
}

pub async fn api_store_report(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<ReportProjection>> {
    let now = now();
    let range = query.date_range(now.date(), state.analytics.default_window_days)?;
    let store = query.store_id.unwrap_or_default();
    let stats = state.engine.compute(&store, range, now).await?;
    Ok(Json(ReportProjection::new(&store, range, &stats)))
}

/// Render one dashboard page; the store defaults to the configured one
pub async fn api_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<PageView>> {
    let kind: PageKind = slug.parse()?;
    let now = now();
    let range = query.date_range(now.date(), state.analytics.default_window_days)?;
    let store = query
        .store_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| state.analytics.default_store.clone());

    let view = Page::new(kind, store, range)
        .render(&state.db, &state.engine, now)
        .await?;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: Option<&str>, end: Option<&str>) -> RangeQuery {
        RangeQuery {
            store_id: Some("S1".to_string()),
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
        }
    }

    fn day(value: &str) -> NaiveDate {
        parse_date(value).unwrap()
    }

    #[test]
    fn store_is_required() {
        assert!(matches!(require_store(None), Err(ApiError::Stats(StatsError::MissingStore))));
        assert!(matches!(require_store(Some("  ".to_string())), Err(ApiError::Stats(StatsError::MissingStore))));
        assert_eq!(require_store(Some("S1".to_string())).unwrap(), "S1");
    }

    #[test]
    fn optional_window_needs_both_bounds() {
        assert!(query(Some("2024-06-01"), None).optional_window().unwrap().is_none());
        let window = query(Some("2024-06-01"), Some("2024-06-02")).optional_window().unwrap().unwrap();
        assert_eq!(window.start_param(), "2024-06-01 00:00:00");
        assert_eq!(window.end_param(), "2024-06-02 23:59:59");
        assert!(matches!(query(Some("June"), Some("2024-06-02")).window(), Err(ApiError::BadRequest(_))));
        assert!(matches!(query(None, None).window(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn date_range_defaults_and_validates() {
        let today = day("2024-06-15");
        let range = query(None, None).date_range(today, 10).unwrap();
        assert_eq!(range.start, day("2024-06-05"));
        assert_eq!(range.end, today);

        let range = query(Some("2024-06-01 08:00:00"), Some("2024-06-03")).date_range(today, 10).unwrap();
        assert_eq!(range.start, day("2024-06-01"));

        assert!(matches!(
            query(Some("2024-06-10"), Some("2024-06-01")).date_range(today, 10),
            Err(ApiError::Stats(StatsError::InvalidRange { .. }))
        ));
    }

    #[test]
    fn live_stats_use_display_formats() {
        let row = CounterRow {
            timestamp: NaiveDateTime::parse_from_str("2024-06-03 07:45:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            hour_enter_count: 1,
            hour_exit_count: 2,
            day_enter_count: 3,
            day_exit_count: 4,
            total_enter_count: 5,
            total_exit_count: 6,
        };
        let json = serde_json::to_value(LiveStats::from(row)).unwrap();
        assert_eq!(json["date"], "06-03-2024");
        assert_eq!(json["time"], "07-45");
        assert_eq!(json["today_exit_count"], 4);
    }
}
