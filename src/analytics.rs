// 📊 Analytics Engine
// Overview, monthly trend, category breakdown, and budget performance.
//
// Everything here is a pure function over an already-loaded transaction
// slice: request-scoped arithmetic, no store access, no shared state. The
// server, CLI, and insight engine all call this one implementation.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Budget, Category, Transaction};
use crate::periods::{budget_window, in_window, last_n_month_keys, month_key};

/// Label used for expenses with no category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Percent of a budget at which it counts as "near limit"
pub const NEAR_LIMIT_PERCENT: f64 = 80.0;

// ============================================================================
// OVERVIEW
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub income: f64,
    pub expenses: f64,
    /// income - expenses
    pub net: f64,
    /// net / income, 0 when there is no income
    pub savings_rate: f64,
    pub transaction_count: usize,
    pub average_expense: f64,
    pub largest_expense: f64,
}

/// Totals over the given transactions (callers pre-filter by date range)
pub fn overview(transactions: &[Transaction]) -> Overview {
    let mut income = 0.0;
    let mut expenses = 0.0;
    let mut expense_count = 0usize;
    let mut largest_expense = 0.0f64;

    for tx in transactions {
        if tx.is_expense() {
            expenses += tx.amount;
            expense_count += 1;
            if tx.amount > largest_expense {
                largest_expense = tx.amount;
            }
        } else {
            income += tx.amount;
        }
    }

    let net = income - expenses;

    Overview {
        income,
        expenses,
        net,
        savings_rate: if income > 0.0 { net / income } else { 0.0 },
        transaction_count: transactions.len(),
        average_expense: if expense_count > 0 { expenses / expense_count as f64 } else { 0.0 },
        largest_expense,
    }
}

// ============================================================================
// SPENDING TREND
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    /// Month bucket, e.g. "2025-03"
    pub month: String,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
}

/// Per-month totals for the last `months` calendar months ending at `today`,
/// oldest first. Months with no transactions appear zero-filled.
pub fn spending_trend(transactions: &[Transaction], today: NaiveDate, months: u32) -> Vec<TrendPoint> {
    let keys = last_n_month_keys(today, months);

    let mut buckets: HashMap<&str, (f64, f64)> = keys.iter().map(|k| (k.as_str(), (0.0, 0.0))).collect();

    for tx in transactions {
        let key = month_key(tx.date);
        if let Some(entry) = buckets.get_mut(key.as_str()) {
            if tx.is_expense() {
                entry.1 += tx.amount;
            } else {
                entry.0 += tx.amount;
            }
        }
    }

    keys.iter()
        .map(|key| {
            let (income, expenses) = buckets[key.as_str()];
            TrendPoint {
                month: key.clone(),
                income,
                expenses,
                net: income - expenses,
            }
        })
        .collect()
}

// ============================================================================
// CATEGORY BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CategorySlice {
    pub category_id: Option<String>,
    pub category_name: String,
    pub total: f64,
    pub transaction_count: usize,
    /// Share of total expenses, 0-100
    pub percent: f64,
}

/// Expense totals per category, sorted largest first. Transactions without a
/// category (or whose category no longer exists) fall under "Uncategorized".
pub fn category_breakdown(transactions: &[Transaction], categories: &[Category]) -> Vec<CategorySlice> {
    let names: HashMap<&str, &str> = categories.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();

    // key: category id or "" for uncategorized
    let mut buckets: HashMap<String, (f64, usize)> = HashMap::new();
    let mut total_expenses = 0.0;

    for tx in transactions.iter().filter(|t| t.is_expense()) {
        let key = tx
            .category_id
            .as_deref()
            .filter(|id| names.contains_key(id))
            .unwrap_or("")
            .to_string();
        let entry = buckets.entry(key).or_insert((0.0, 0));
        entry.0 += tx.amount;
        entry.1 += 1;
        total_expenses += tx.amount;
    }

    let mut slices: Vec<CategorySlice> = buckets
        .into_iter()
        .map(|(key, (total, count))| CategorySlice {
            category_name: if key.is_empty() {
                UNCATEGORIZED.to_string()
            } else {
                names[key.as_str()].to_string()
            },
            category_id: if key.is_empty() { None } else { Some(key) },
            total,
            transaction_count: count,
            percent: if total_expenses > 0.0 { total / total_expenses * 100.0 } else { 0.0 },
        })
        .collect();

    slices.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
    slices
}

// ============================================================================
// BUDGET PERFORMANCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Under 80% of the cap
    OnTrack,
    /// 80% up to and including 100%
    NearLimit,
    /// Strictly over the cap
    Exceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub budget_id: String,
    pub category_id: Option<String>,
    pub category_name: String,
    pub period: crate::models::BudgetPeriod,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub limit: f64,
    pub spent: f64,
    /// limit - spent; negative once exceeded
    pub remaining: f64,
    /// spent / limit * 100
    pub percent_used: f64,
    pub status: BudgetStatus,
}

/// Evaluate every budget against the expenses inside its current window.
/// A budget with no category caps all expenses.
pub fn budget_performance(
    transactions: &[Transaction],
    budgets: &[Budget],
    categories: &[Category],
    today: NaiveDate,
) -> Vec<BudgetReport> {
    let names: HashMap<&str, &str> = categories.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();

    budgets
        .iter()
        .map(|budget| {
            let window = budget_window(budget.period, today);

            let spent: f64 = transactions
                .iter()
                .filter(|t| t.is_expense() && in_window(t.date, window))
                .filter(|t| match &budget.category_id {
                    Some(cat) => t.category_id.as_deref() == Some(cat.as_str()),
                    None => true,
                })
                .map(|t| t.amount)
                .sum();

            // budget.amount is validated > 0 on the way in
            let percent_used = if budget.amount > 0.0 { spent / budget.amount * 100.0 } else { 0.0 };

            let status = if percent_used > 100.0 {
                BudgetStatus::Exceeded
            } else if percent_used >= NEAR_LIMIT_PERCENT {
                BudgetStatus::NearLimit
            } else {
                BudgetStatus::OnTrack
            };

            let category_name = match &budget.category_id {
                Some(id) => names.get(id.as_str()).copied().unwrap_or(UNCATEGORIZED).to_string(),
                None => "All spending".to_string(),
            };

            BudgetReport {
                budget_id: budget.id.clone(),
                category_id: budget.category_id.clone(),
                category_name,
                period: budget.period,
                window_start: window.0,
                window_end: window.1,
                limit: budget.amount,
                spent,
                remaining: budget.amount - spent,
                percent_used,
                status,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetPeriod, CategoryKind, TransactionKind};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(kind: TransactionKind, amount: f64, date: NaiveDate, category_id: Option<&str>) -> Transaction {
        Transaction::new(
            "u1".to_string(),
            category_id.map(|s| s.to_string()),
            kind,
            amount,
            "test".to_string(),
            date,
        )
    }

    fn cat(id: &str, name: &str) -> Category {
        let mut c = Category::new("u1".to_string(), name.to_string(), CategoryKind::Expense);
        c.id = id.to_string();
        c
    }

    #[test]
    fn test_overview_totals() {
        let txs = vec![
            tx(TransactionKind::Income, 1000.0, d(2025, 3, 1), None),
            tx(TransactionKind::Expense, 200.0, d(2025, 3, 5), None),
            tx(TransactionKind::Expense, 100.0, d(2025, 3, 8), None),
        ];

        let o = overview(&txs);
        assert_eq!(o.income, 1000.0);
        assert_eq!(o.expenses, 300.0);
        assert_eq!(o.net, 700.0);
        assert!((o.savings_rate - 0.7).abs() < 1e-9);
        assert_eq!(o.transaction_count, 3);
        assert_eq!(o.average_expense, 150.0);
        assert_eq!(o.largest_expense, 200.0);
    }

    #[test]
    fn test_overview_empty_and_no_income() {
        let o = overview(&[]);
        assert_eq!(o.income, 0.0);
        assert_eq!(o.savings_rate, 0.0);
        assert_eq!(o.average_expense, 0.0);

        // All expenses, no income: savings rate stays 0, not -inf
        let txs = vec![tx(TransactionKind::Expense, 50.0, d(2025, 3, 1), None)];
        let o = overview(&txs);
        assert_eq!(o.savings_rate, 0.0);
        assert_eq!(o.net, -50.0);
    }

    #[test]
    fn test_trend_zero_fills_months() {
        let txs = vec![
            tx(TransactionKind::Expense, 100.0, d(2025, 1, 15), None),
            tx(TransactionKind::Income, 900.0, d(2025, 3, 1), None),
            tx(TransactionKind::Expense, 50.0, d(2025, 3, 2), None),
            // Outside the window, ignored
            tx(TransactionKind::Expense, 999.0, d(2024, 11, 2), None),
        ];

        let trend = spending_trend(&txs, d(2025, 3, 20), 3);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0], TrendPoint { month: "2025-01".to_string(), income: 0.0, expenses: 100.0, net: -100.0 });
        assert_eq!(trend[1], TrendPoint { month: "2025-02".to_string(), income: 0.0, expenses: 0.0, net: 0.0 });
        assert_eq!(trend[2], TrendPoint { month: "2025-03".to_string(), income: 900.0, expenses: 50.0, net: 850.0 });
    }

    #[test]
    fn test_breakdown_percentages_and_uncategorized() {
        let cats = vec![cat("c1", "Food"), cat("c2", "Transport")];
        let txs = vec![
            tx(TransactionKind::Expense, 300.0, d(2025, 3, 1), Some("c1")),
            tx(TransactionKind::Expense, 100.0, d(2025, 3, 2), Some("c2")),
            tx(TransactionKind::Expense, 100.0, d(2025, 3, 3), None),
            // Dangling category id counts as uncategorized
            tx(TransactionKind::Expense, 100.0, d(2025, 3, 4), Some("gone")),
            // Income never shows up in the breakdown
            tx(TransactionKind::Income, 5000.0, d(2025, 3, 5), None),
        ];

        let slices = category_breakdown(&txs, &cats);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].category_name, "Food");
        assert_eq!(slices[0].total, 300.0);
        assert!((slices[0].percent - 50.0).abs() < 1e-9);

        let uncat = slices.iter().find(|s| s.category_id.is_none()).unwrap();
        assert_eq!(uncat.category_name, UNCATEGORIZED);
        assert_eq!(uncat.total, 200.0);
        assert_eq!(uncat.transaction_count, 2);
    }

    #[test]
    fn test_breakdown_empty() {
        assert!(category_breakdown(&[], &[]).is_empty());
    }

    #[test]
    fn test_budget_status_thresholds() {
        let cats = vec![cat("c1", "Food")];
        let today = d(2025, 3, 15);
        let budget = |amount| Budget::new("u1".to_string(), Some("c1".to_string()), amount, BudgetPeriod::Monthly);

        // Spend exactly 79/80/100/101 against a 100 cap
        for (spent, expected) in [
            (79.0, BudgetStatus::OnTrack),
            (80.0, BudgetStatus::NearLimit),
            (100.0, BudgetStatus::NearLimit),
            (101.0, BudgetStatus::Exceeded),
        ] {
            let txs = vec![tx(TransactionKind::Expense, spent, d(2025, 3, 10), Some("c1"))];
            let reports = budget_performance(&txs, &[budget(100.0)], &cats, today);
            assert_eq!(reports[0].status, expected, "spent {}", spent);
        }
    }

    #[test]
    fn test_budget_window_filters_spend() {
        let cats = vec![cat("c1", "Food")];
        let budget = Budget::new("u1".to_string(), Some("c1".to_string()), 100.0, BudgetPeriod::Monthly);
        let txs = vec![
            tx(TransactionKind::Expense, 40.0, d(2025, 3, 10), Some("c1")),
            // Previous month, outside the window
            tx(TransactionKind::Expense, 500.0, d(2025, 2, 28), Some("c1")),
            // Other category
            tx(TransactionKind::Expense, 30.0, d(2025, 3, 10), Some("c2")),
        ];

        let reports = budget_performance(&txs, &[budget], &cats, d(2025, 3, 15));
        assert_eq!(reports[0].spent, 40.0);
        assert_eq!(reports[0].remaining, 60.0);
        assert_eq!(reports[0].window_start, d(2025, 3, 1));
        assert_eq!(reports[0].window_end, d(2025, 4, 1));
        assert_eq!(reports[0].status, BudgetStatus::OnTrack);
    }

    #[test]
    fn test_overall_budget_sums_everything() {
        let overall = Budget::new("u1".to_string(), None, 100.0, BudgetPeriod::Monthly);
        let txs = vec![
            tx(TransactionKind::Expense, 60.0, d(2025, 3, 10), Some("c1")),
            tx(TransactionKind::Expense, 50.0, d(2025, 3, 12), None),
            tx(TransactionKind::Income, 1000.0, d(2025, 3, 1), None),
        ];

        let reports = budget_performance(&txs, &[overall], &[], d(2025, 3, 15));
        assert_eq!(reports[0].spent, 110.0);
        assert_eq!(reports[0].status, BudgetStatus::Exceeded);
        assert_eq!(reports[0].category_name, "All spending");
        assert!((reports[0].percent_used - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_empty_window_reports_zero() {
        let budget = Budget::new("u1".to_string(), None, 100.0, BudgetPeriod::Weekly);
        let reports = budget_performance(&[], &[budget], &[], d(2025, 3, 12));
        assert_eq!(reports[0].spent, 0.0);
        assert_eq!(reports[0].percent_used, 0.0);
        assert_eq!(reports[0].status, BudgetStatus::OnTrack);
    }
}
