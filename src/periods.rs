// ⏰ Period Math - Calendar bucketing shared by analytics, budgets, insights
//
// All windows are half-open [start, end): a date belongs to the window when
// start <= date < end. Weeks start Monday, months on the 1st, years on Jan 1.

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::BudgetPeriod;

/// Bucket key for a calendar month, e.g. "2025-03"
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Move a date by whole months, clamping the day to the target month's length
/// (Jan 31 + 1 month = Feb 28, or Feb 29 in a leap year).
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let zero_based = date.year() * 12 + date.month() as i32 - 1 + months;
    let year = zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) as u32 + 1;

    let mut day = date.day();
    loop {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            return d;
        }
        // Day does not exist in the target month, clamp down
        day -= 1;
    }
}

/// First day of the date's month
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // The 1st always exists
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap()
}

/// Half-open window covering the date's calendar month
pub fn month_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = month_start(date);
    (start, add_months(start, 1))
}

/// Half-open window for a budget period containing `today`
pub fn budget_window(period: BudgetPeriod, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match period {
        BudgetPeriod::Weekly => {
            let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            (start, start + Duration::days(7))
        }
        BudgetPeriod::Monthly => month_window(today),
        BudgetPeriod::Yearly => {
            let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap();
            let end = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap();
            (start, end)
        }
    }
}

/// True when `date` falls inside the half-open window
pub fn in_window(date: NaiveDate, window: (NaiveDate, NaiveDate)) -> bool {
    date >= window.0 && date < window.1
}

/// Month keys for the last `n` months ending at `today`'s month,
/// oldest first (e.g. n=3 at 2025-03-15: ["2025-01", "2025-02", "2025-03"])
pub fn last_n_month_keys(today: NaiveDate, n: u32) -> Vec<String> {
    let current = month_start(today);
    (0..n)
        .rev()
        .map(|back| month_key(add_months(current, -(back as i32))))
        .collect()
}
