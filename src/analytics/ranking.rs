//! Top-N selection over daily visitor totals

use super::source::DayTotal;

/// Number of days kept in a ranking
pub const TOP_DAYS: usize = 10;

/// Best days first; ties keep their input order. Never padded.
pub fn top_days(days: &[DayTotal]) -> Vec<DayTotal> {
    let mut ranked = days.to_vec();
    ranked.sort_by(|a, b| b.total_visitors.cmp(&a.total_visitors));
    ranked.truncate(TOP_DAYS);
    ranked
}

/// First day with the strictly highest total. Days with no visitors never win.
pub fn max_visited_day(days: &[DayTotal]) -> Option<DayTotal> {
    days.iter()
        .fold(None, |best: Option<&DayTotal>, day| match best {
            Some(b) if day.total_visitors <= b.total_visitors => Some(b),
            _ if day.total_visitors > 0 => Some(day),
            _ => best,
        })
        .copied()
}

pub fn sum_visitors(days: &[DayTotal]) -> i64 {
    days.iter().map(|d| d.total_visitors).sum()
}
