//! Store performance analytics
//!
//! - `source`: the read-only query seam implemented by the database
//! - `engine`: windowed query fan-out and derived comparisons
//! - `ranking`: top-N day selection
//! - `export`: report projection with display formatting

mod engine;
mod export;
mod fetch;
mod ranking;
mod source;
mod window;

pub use engine::{DerivedStats, StatsEngine};
pub use export::ReportProjection;
pub use fetch::FetchPolicy;
pub use ranking::TOP_DAYS;
pub use source::{CounterRow, DayTotal, HourlyCount, MetricSource, PeakDay, PeakHour};
pub use window::{parse_date, DateRange, TimeWindow};
