//! Dashboard pages
//!
//! Each page is a variant carrying exactly the parameters it needs. The
//! store and date range arrive with every request; nothing is remembered
//! between requests.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::analytics::{CounterRow, DateRange, DayTotal, DerivedStats, HourlyCount, PeakDay, PeakHour, ReportProjection, StatsEngine};
use crate::db::{DailyCount, Database, StoreMax};
use crate::error::{ApiError, ApiResult};
use crate::geo::{markers, Coordinates, RegionTotals, StoreMarker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Dashboard,
    StoreOptimizer,
    Live,
    MapView,
    StoreWise,
}

impl FromStr for PageKind {
    type Err = ApiError;

    fn from_str(slug: &str) -> Result<Self, Self::Err> {
        match slug {
            "dashboard" => Ok(Self::Dashboard),
            "store-optimizer" => Ok(Self::StoreOptimizer),
            "live" => Ok(Self::Live),
            "map-view" => Ok(Self::MapView),
            "store-wise" => Ok(Self::StoreWise),
            other => Err(ApiError::not_found(format!("unknown page '{other}'"))),
        }
    }
}

/// A page request with its resolved parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Dashboard { store_id: String, range: DateRange },
    StoreOptimizer { store_id: String, range: DateRange },
    Live { store_id: String },
    MapView,
    StoreWise { store_id: String, range: DateRange },
}

impl Page {
    pub fn new(kind: PageKind, store_id: String, range: DateRange) -> Self {
        match kind {
            PageKind::Dashboard => Self::Dashboard { store_id, range },
            PageKind::StoreOptimizer => Self::StoreOptimizer { store_id, range },
            PageKind::Live => Self::Live { store_id },
            PageKind::MapView => Self::MapView,
            PageKind::StoreWise => Self::StoreWise { store_id, range },
        }
    }

    pub async fn render(self, db: &Database, engine: &StatsEngine, now: NaiveDateTime) -> ApiResult<PageView> {
        match self {
            Self::Dashboard { store_id, range } => render_dashboard(db, store_id, range).await,
            Self::StoreOptimizer { store_id, range } => {
                let totals = db.get_daily_totals(&store_id, Some(range.window())).await?;
                Ok(PageView::StoreOptimizer(OptimizerView {
                    store_id,
                    range,
                    cells: totals.into_iter().map(HeatCell::from).collect(),
                }))
            }
            Self::Live { store_id } => {
                let stats = db.get_live_stats(&store_id).await?;
                Ok(PageView::Live(LiveView::new(store_id, stats)))
            }
            Self::MapView => render_map(db).await,
            Self::StoreWise { store_id, range } => {
                let stats = engine.compute(&store_id, range, now).await?;
                let report = ReportProjection::new(&store_id, range, &stats);
                Ok(PageView::StoreWise(StoreWiseView { stats, report }))
            }
        }
    }
}

/// Rendered page data, tagged with the page name
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "page", rename_all = "kebab-case")]
pub enum PageView {
    Dashboard(DashboardView),
    StoreOptimizer(OptimizerView),
    Live(LiveView),
    MapView(MapView),
    StoreWise(StoreWiseView),
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub range: DateRange,
    pub hourly: Vec<HourlyCount>,
    pub daily: Vec<DayTotal>,
    pub peak_hour: Option<PeakHour>,
    pub peak_day: Option<PeakDay>,
    pub markers: Vec<StoreMarker>,
    pub selected_coordinates: Option<Coordinates>,
}

async fn render_dashboard(db: &Database, store_id: String, range: DateRange) -> ApiResult<PageView> {
    let window = range.window();
    let (hourly, peak_hour, peak_day, locations) = tokio::try_join!(
        db.get_hourly_data(&store_id, window),
        db.get_peak_hours(&store_id),
        db.get_peak_day(&store_id, window),
        db.get_store_locations(),
    )?;

    let hourly = dedupe_by_timestamp(hourly);
    let markers = markers(&locations);
    let selected_coordinates = markers
        .iter()
        .find(|m| m.store_id == store_id)
        .map(|m| m.coordinates);

    Ok(PageView::Dashboard(DashboardView {
        daily: DayTotal::rollup(&hourly),
        store_id,
        range,
        hourly,
        peak_hour,
        peak_day,
        markers,
        selected_coordinates,
    }))
}

/// One row per timestamp; a later duplicate replaces the earlier value in place
fn dedupe_by_timestamp(rows: Vec<HourlyCount>) -> Vec<HourlyCount> {
    let mut index: HashMap<NaiveDateTime, usize> = HashMap::new();
    let mut unique: Vec<HourlyCount> = Vec::with_capacity(rows.len());
    for row in rows {
        match index.get(&row.timestamp) {
            Some(&i) => unique[i] = row,
            None => {
                index.insert(row.timestamp, unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

/// Heat-map intensity of one day's entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatLevel {
    High,
    Elevated,
    Moderate,
    Low,
}

impl HeatLevel {
    pub fn for_entries(entries: i64) -> Self {
        if entries > 50 {
            Self::High
        } else if entries > 30 {
            Self::Elevated
        } else if entries > 10 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatCell {
    pub date: NaiveDateTime,
    pub today_enter_count: i64,
    pub today_exit_count: i64,
    pub heat: HeatLevel,
}

impl From<DailyCount> for HeatCell {
    fn from(count: DailyCount) -> Self {
        Self {
            date: count.timestamp,
            today_enter_count: count.today_enter_count,
            today_exit_count: count.today_exit_count,
            heat: HeatLevel::for_entries(count.today_enter_count),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizerView {
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub range: DateRange,
    pub cells: Vec<HeatCell>,
}

/// `MM-DD-YYYY`
pub fn display_date(at: NaiveDateTime) -> String {
    at.format("%m-%d-%Y").to_string()
}

/// `HH-MM`
pub fn display_time(at: NaiveDateTime) -> String {
    format!("{:02}-{:02}", at.hour(), at.minute())
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveView {
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub stats: Option<CounterRow>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl LiveView {
    pub fn new(store_id: String, stats: Option<CounterRow>) -> Self {
        let date = stats.as_ref().map(|s| display_date(s.timestamp));
        let time = stats.as_ref().map(|s| display_time(s.timestamp));
        Self {
            store_id,
            stats,
            date,
            time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub total_stores: usize,
    pub total_visitors: i64,
    pub regions: RegionTotals,
    pub top_stores: Vec<StoreMax>,
    pub markers: Vec<StoreMarker>,
}

async fn render_map(db: &Database) -> ApiResult<PageView> {
    let (stores, locations, top_stores) = tokio::try_join!(
        db.get_stores(),
        db.get_store_locations(),
        db.get_store_report(),
    )?;

    Ok(PageView::MapView(MapView {
        total_stores: stores.len(),
        total_visitors: locations.iter().map(|l| l.total_enter_count).sum(),
        regions: RegionTotals::from_locations(&locations),
        top_stores,
        markers: markers(&locations),
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreWiseView {
    pub stats: DerivedStats,
    pub report: ReportProjection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 5, 0)
            .unwrap()
    }

    fn hourly(day: u32, hour: u32, enter: i64) -> HourlyCount {
        HourlyCount {
            timestamp: ts(day, hour),
            hour_enter_count: enter,
            hour_exit_count: 0,
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn parses_page_slugs() {
        assert_eq!("dashboard".parse::<PageKind>().unwrap(), PageKind::Dashboard);
        assert_eq!("store-optimizer".parse::<PageKind>().unwrap(), PageKind::StoreOptimizer);
        assert_eq!("live".parse::<PageKind>().unwrap(), PageKind::Live);
        assert_eq!("map-view".parse::<PageKind>().unwrap(), PageKind::MapView);
        assert_eq!("store-wise".parse::<PageKind>().unwrap(), PageKind::StoreWise);
        assert!(matches!("Settings".parse::<PageKind>(), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn pages_carry_only_their_parameters() {
        let page = Page::new(PageKind::Live, "S1".to_string(), range());
        assert_eq!(page, Page::Live { store_id: "S1".to_string() });

        let page = Page::new(PageKind::MapView, "S1".to_string(), range());
        assert_eq!(page, Page::MapView);

        let page = Page::new(PageKind::StoreWise, "S1".to_string(), range());
        assert_eq!(page, Page::StoreWise { store_id: "S1".to_string(), range: range() });
    }

    #[test]
    fn dedupe_keeps_position_and_last_value() {
        let rows = vec![hourly(1, 9, 1), hourly(1, 10, 2), hourly(1, 9, 3)];
        let unique = dedupe_by_timestamp(rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].timestamp, ts(1, 9));
        assert_eq!(unique[0].hour_enter_count, 3);
        assert_eq!(unique[1].hour_enter_count, 2);
    }

    #[test]
    fn heat_levels() {
        assert_eq!(HeatLevel::for_entries(51), HeatLevel::High);
        assert_eq!(HeatLevel::for_entries(50), HeatLevel::Elevated);
        assert_eq!(HeatLevel::for_entries(31), HeatLevel::Elevated);
        assert_eq!(HeatLevel::for_entries(30), HeatLevel::Moderate);
        assert_eq!(HeatLevel::for_entries(11), HeatLevel::Moderate);
        assert_eq!(HeatLevel::for_entries(10), HeatLevel::Low);
    }

    #[test]
    fn live_view_formats_timestamp() {
        let row = CounterRow {
            timestamp: ts(3, 18),
            hour_enter_count: 1,
            hour_exit_count: 1,
            day_enter_count: 2,
            day_exit_count: 2,
            total_enter_count: 3,
            total_exit_count: 3,
        };
        let view = LiveView::new("S1".to_string(), Some(row));
        assert_eq!(view.date.as_deref(), Some("06-03-2024"));
        assert_eq!(view.time.as_deref(), Some("18-05"));

        let empty = LiveView::new("S1".to_string(), None);
        assert!(empty.date.is_none() && empty.stats.is_none());
    }

    #[test]
    fn views_are_tagged_by_page() {
        let view = PageView::Live(LiveView::new("S1".to_string(), None));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["page"], "live");
        assert_eq!(json["storeID"], "S1");
    }
}
