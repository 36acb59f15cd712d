//! Report projection of a [`DerivedStats`] record
//!
//! Produces the two tables of the store performance report: labelled
//! summary metrics and the ranked top days. Formatting only; values are
//! never recomputed here.

use chrono::NaiveDate;
use serde::Serialize;

use super::engine::{DerivedStats, NOT_AVAILABLE};
use super::window::DateRange;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedDay {
    pub rank: usize,
    pub date: String,
    pub visitors: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportProjection {
    pub title: &'static str,
    pub store_id: String,
    pub range: DateRange,
    pub file_name: String,
    pub summary: Vec<SummaryRow>,
    pub top_days: Vec<RankedDay>,
}

/// Whole number with `,` thousands separators
pub fn format_count(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Two decimals and a trailing `%`, or the placeholder
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}%"),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_date(value: Option<NaiveDate>) -> String {
    match value {
        Some(d) => d.format("%m/%d/%Y").to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn format_hour(value: Option<u32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |h| h.to_string())
}

fn row(label: &'static str, value: String) -> SummaryRow {
    SummaryRow { label, value }
}

impl ReportProjection {
    pub fn new(store_id: &str, range: DateRange, stats: &DerivedStats) -> Self {
        let summary = vec![
            row("Total Visitors", format_count(stats.total_visitors)),
            row("Total Visitors Last Month", format_count(stats.total_visitors_last_month)),
            row("Total Visitors This Month", format_count(stats.total_visitors_this_month)),
            row("Total Visitors Till Date", format_count(stats.total_visitors_till_date)),
            row("Best Performing Day", format_date(stats.best_performing_day)),
            row("Best Performing Hour", format_hour(stats.best_performing_hour)),
            row("Maximum Visited Day", format_date(stats.max_visited_day)),
            row("Performance Compared to Last Month", format_percent(stats.performance_vs_last_month)),
            row("Performance Compared to Last Hour", format_percent(stats.performance_vs_last_hour)),
            row("Performance Compared to Last Week", format_percent(stats.performance_vs_last_week)),
            row(
                "Comparison Between Today & Yesterday",
                format_percent(stats.comparison_today_vs_yesterday),
            ),
        ];

        let top_days = stats
            .top_days
            .iter()
            .enumerate()
            .map(|(i, day)| RankedDay {
                rank: i + 1,
                date: format_date(Some(day.day)),
                visitors: format_count(day.total_visitors),
            })
            .collect();

        Self {
            title: "Store Performance Report",
            store_id: store_id.to_string(),
            range,
            file_name: format!("{store_id}-performance-report.pdf"),
            summary,
            top_days,
        }
    }

    #[cfg(test)]
    pub fn value_of(&self, label: &str) -> Option<&str> {
        self.summary
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::source::DayTotal;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn stats() -> DerivedStats {
        DerivedStats {
            total_visitors: 1_234_567,
            total_visitors_last_month: 0,
            total_visitors_this_month: 980,
            total_visitors_till_date: 1_234_567,
            best_performing_day: Some(date(6, 12)),
            best_performing_hour: Some(18),
            max_visited_day: None,
            performance_vs_last_month: None,
            performance_vs_last_hour: Some(25.0),
            performance_vs_last_week: Some(-12.3456),
            comparison_today_vs_yesterday: Some(1.0 / 3.0 * 100.0),
            top_days: vec![
                DayTotal {
                    day: date(6, 2),
                    total_visitors: 1500,
                },
                DayTotal {
                    day: date(6, 3),
                    total_visitors: 90,
                },
            ],
        }
    }

    fn parse_count(value: &str) -> Option<i64> {
        value.replace(',', "").parse().ok()
    }

    fn parse_percent(value: &str) -> Option<f64> {
        value.strip_suffix('%')?.parse().ok()
    }

    #[test]
    fn formats_counts_with_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_count(-45_000), "-45,000");
    }

    #[test]
    fn formats_percentages() {
        assert_eq!(format_percent(Some(25.0)), "25.00%");
        assert_eq!(format_percent(Some(-12.3456)), "-12.35%");
        assert_eq!(format_percent(None), "N/A");
    }

    #[test]
    fn summary_rows_follow_report_order() {
        let report = ReportProjection::new("ASWAQ Barsha", DateRange::new(date(6, 5), date(6, 15)).unwrap(), &stats());
        let labels: Vec<_> = report.summary.iter().map(|r| r.label).collect();
        assert_eq!(labels.len(), 11);
        assert_eq!(labels[0], "Total Visitors");
        assert_eq!(labels[10], "Comparison Between Today & Yesterday");

        assert_eq!(report.value_of("Total Visitors"), Some("1,234,567"));
        assert_eq!(report.value_of("Best Performing Day"), Some("06/12/2024"));
        assert_eq!(report.value_of("Best Performing Hour"), Some("18"));
        assert_eq!(report.value_of("Maximum Visited Day"), Some("N/A"));
        assert_eq!(report.value_of("Performance Compared to Last Month"), Some("N/A"));
        assert_eq!(report.value_of("Comparison Between Today & Yesterday"), Some("33.33%"));
        assert_eq!(report.file_name, "ASWAQ Barsha-performance-report.pdf");
    }

    #[test]
    fn ranks_top_days_from_one() {
        let report = ReportProjection::new("S1", DateRange::new(date(6, 1), date(6, 1)).unwrap(), &stats());
        assert_eq!(
            report.top_days,
            vec![
                RankedDay {
                    rank: 1,
                    date: "06/02/2024".to_string(),
                    visitors: "1,500".to_string()
                },
                RankedDay {
                    rank: 2,
                    date: "06/03/2024".to_string(),
                    visitors: "90".to_string()
                },
            ]
        );
    }

    #[test]
    fn numeric_values_survive_formatting() {
        let stats = stats();
        let report = ReportProjection::new("S1", DateRange::new(date(6, 1), date(6, 1)).unwrap(), &stats);

        let total = report.value_of("Total Visitors").and_then(parse_count);
        assert_eq!(total, Some(stats.total_visitors));
        let this_month = report.value_of("Total Visitors This Month").and_then(parse_count);
        assert_eq!(this_month, Some(stats.total_visitors_this_month));

        let pairs = [
            ("Performance Compared to Last Hour", stats.performance_vs_last_hour),
            ("Performance Compared to Last Week", stats.performance_vs_last_week),
            ("Comparison Between Today & Yesterday", stats.comparison_today_vs_yesterday),
        ];
        for (label, original) in pairs {
            let parsed = report.value_of(label).and_then(parse_percent).unwrap();
            assert!((parsed - original.unwrap()).abs() <= 0.005, "{label}");
        }

        for (ranked, day) in report.top_days.iter().zip(&stats.top_days) {
            assert_eq!(parse_count(&ranked.visitors), Some(day.total_visitors));
        }
    }
}
