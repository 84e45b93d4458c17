// 💡 Insight Engine - rule-based observations over the transaction history
//
// A fixed sequence of threshold rules, each a pure function of the loaded
// transaction list (plus precomputed budget reports). No persistence, no
// retries, no partial results: the whole set is recomputed per request.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{BudgetReport, BudgetStatus};
use crate::models::{Category, Severity, Transaction};
use crate::periods::{add_months, in_window, month_key, month_start, month_window};

/// Rules 1-5 only run once the user has this many transactions
pub const MIN_TRANSACTIONS: usize = 5;

/// Spending spike threshold: current month vs trailing average
pub const SPIKE_RATIO: f64 = 1.2;

/// Spending drop threshold
pub const DROP_RATIO: f64 = 0.8;

/// Savings rate considered healthy
pub const HEALTHY_SAVINGS_RATE: f64 = 0.2;

/// Minimum samples before the IQR outlier rule runs
pub const MIN_OUTLIER_SAMPLES: usize = 8;

/// At most this many outlier insights per run
pub const MAX_OUTLIER_INSIGHTS: usize = 3;

/// A dominant category holds more than this share of the month's expenses
pub const DOMINANT_SHARE: f64 = 0.4;

// ============================================================================
// INSIGHT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    NotEnoughData,
    SpendingSpike,
    SpendingDown,
    HealthySavings,
    NegativeSavings,
    BudgetExceeded,
    BudgetNearLimit,
    OutlierExpense,
    DominantCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Rule-specific numbers for the UI (ratios, amounts, ids)
    pub data: serde_json::Value,
}

// ============================================================================
// GENERATION
// ============================================================================

/// Run every rule in order and collect the insights they emit.
pub fn generate_insights(
    transactions: &[Transaction],
    budget_reports: &[BudgetReport],
    categories: &[Category],
    today: NaiveDate,
) -> Vec<Insight> {
    if transactions.len() < MIN_TRANSACTIONS {
        return vec![Insight {
            kind: InsightKind::NotEnoughData,
            severity: Severity::Info,
            title: "Keep tracking".to_string(),
            message: format!(
                "Record at least {} transactions to unlock spending insights.",
                MIN_TRANSACTIONS
            ),
            data: serde_json::json!({ "transaction_count": transactions.len() }),
        }];
    }

    let mut insights = Vec::new();

    monthly_spending_rule(&mut insights, transactions, today);
    savings_rate_rule(&mut insights, transactions, today);
    budget_rules(&mut insights, budget_reports);
    outlier_rule(&mut insights, transactions, today);
    dominant_category_rule(&mut insights, transactions, categories, today);

    insights
}

/// Rule 1: current month's spending vs the average of the prior months
/// (up to 6, at least 2 with tracked history required).
fn monthly_spending_rule(insights: &mut Vec<Insight>, transactions: &[Transaction], today: NaiveDate) {
    let current_key = month_key(today);
    let current: f64 = transactions
        .iter()
        .filter(|t| t.is_expense() && month_key(t.date) == current_key)
        .map(|t| t.amount)
        .sum();

    // Prior months, newest first, limited to months the user was tracking
    let earliest = match transactions.iter().map(|t| t.date).min() {
        Some(date) => month_start(date),
        None => return,
    };

    let mut prior_totals = Vec::new();
    for back in 1..=6 {
        let month = add_months(month_start(today), -back);
        if month < earliest {
            break;
        }
        let key = month_key(month);
        let total: f64 = transactions
            .iter()
            .filter(|t| t.is_expense() && month_key(t.date) == key)
            .map(|t| t.amount)
            .sum();
        prior_totals.push(total);
    }

    if prior_totals.len() < 2 {
        return;
    }

    let average = prior_totals.iter().sum::<f64>() / prior_totals.len() as f64;
    if average <= 0.0 {
        return;
    }

    let ratio = current / average;
    let data = serde_json::json!({
        "current_month": current,
        "trailing_average": average,
        "months_compared": prior_totals.len(),
        "ratio": ratio,
    });

    if ratio > SPIKE_RATIO {
        insights.push(Insight {
            kind: InsightKind::SpendingSpike,
            severity: Severity::Warning,
            title: "Spending is up this month".to_string(),
            message: format!(
                "You've spent {:.2} this month, {:.0}% above your {}-month average of {:.2}.",
                current,
                (ratio - 1.0) * 100.0,
                prior_totals.len(),
                average
            ),
            data,
        });
    } else if ratio < DROP_RATIO {
        insights.push(Insight {
            kind: InsightKind::SpendingDown,
            severity: Severity::Info,
            title: "Spending is down this month".to_string(),
            message: format!(
                "You've spent {:.2} this month, {:.0}% below your {}-month average of {:.2}.",
                current,
                (1.0 - ratio) * 100.0,
                prior_totals.len(),
                average
            ),
            data,
        });
    }
}

/// Rule 2: savings rate over the trailing 3 months (including the current one)
fn savings_rate_rule(insights: &mut Vec<Insight>, transactions: &[Transaction], today: NaiveDate) {
    let window_start = month_start(add_months(today, -2));

    let mut income = 0.0;
    let mut expenses = 0.0;
    for tx in transactions.iter().filter(|t| t.date >= window_start && t.date <= today) {
        if tx.is_expense() {
            expenses += tx.amount;
        } else {
            income += tx.amount;
        }
    }

    if income <= 0.0 {
        return;
    }

    let rate = (income - expenses) / income;
    let data = serde_json::json!({ "income": income, "expenses": expenses, "savings_rate": rate });

    if rate >= HEALTHY_SAVINGS_RATE {
        insights.push(Insight {
            kind: InsightKind::HealthySavings,
            severity: Severity::Info,
            title: "Healthy savings rate".to_string(),
            message: format!(
                "You've saved {:.0}% of your income over the last three months. Keep it up!",
                rate * 100.0
            ),
            data,
        });
    } else if rate < 0.0 {
        insights.push(Insight {
            kind: InsightKind::NegativeSavings,
            severity: Severity::Warning,
            title: "Spending exceeds income".to_string(),
            message: format!(
                "Over the last three months you spent {:.2} against {:.2} of income.",
                expenses, income
            ),
            data,
        });
    }
}

/// Rule 3: one insight per budget that is near its limit or over it
fn budget_rules(insights: &mut Vec<Insight>, reports: &[BudgetReport]) {
    for report in reports {
        match report.status {
            BudgetStatus::Exceeded => insights.push(Insight {
                kind: InsightKind::BudgetExceeded,
                severity: Severity::Critical,
                title: format!("{} budget exceeded", report.category_name),
                message: format!(
                    "You've spent {:.2} of your {:.2} {} budget ({:.0}%).",
                    report.spent,
                    report.limit,
                    report.period.as_str(),
                    report.percent_used
                ),
                data: serde_json::json!({
                    "budget_id": report.budget_id,
                    "spent": report.spent,
                    "limit": report.limit,
                    "percent_used": report.percent_used,
                }),
            }),
            BudgetStatus::NearLimit => insights.push(Insight {
                kind: InsightKind::BudgetNearLimit,
                severity: Severity::Warning,
                title: format!("{} budget almost used up", report.category_name),
                message: format!(
                    "You've used {:.0}% of your {:.2} {} budget with {:.2} remaining.",
                    report.percent_used,
                    report.limit,
                    report.period.as_str(),
                    report.remaining
                ),
                data: serde_json::json!({
                    "budget_id": report.budget_id,
                    "spent": report.spent,
                    "limit": report.limit,
                    "percent_used": report.percent_used,
                }),
            }),
            BudgetStatus::OnTrack => {}
        }
    }
}

/// Linear-interpolation quantile (R-7 convention) over a sorted sample
fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    if lo + 1 < sorted.len() {
        sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
    } else {
        sorted[lo]
    }
}

/// Rule 4: IQR outlier detection (Tukey fence, Q3 + 1.5 * IQR, strict)
/// over the trailing 3 months of expenses.
fn outlier_rule(insights: &mut Vec<Insight>, transactions: &[Transaction], today: NaiveDate) {
    let window_start = month_start(add_months(today, -2));

    let mut expenses: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.is_expense() && t.date >= window_start && t.date <= today)
        .collect();

    if expenses.len() < MIN_OUTLIER_SAMPLES {
        return;
    }

    let mut amounts: Vec<f64> = expenses.iter().map(|t| t.amount).collect();
    amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q1 = quantile(&amounts, 0.25);
    let q3 = quantile(&amounts, 0.75);
    let fence = q3 + 1.5 * (q3 - q1);

    expenses.retain(|t| t.amount > fence);
    expenses.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));

    for tx in expenses.into_iter().take(MAX_OUTLIER_INSIGHTS) {
        insights.push(Insight {
            kind: InsightKind::OutlierExpense,
            severity: Severity::Info,
            title: "Unusually large expense".to_string(),
            message: format!(
                "{:.2} on {:?} ({}) is well above your typical spending.",
                tx.amount, tx.description, tx.date
            ),
            data: serde_json::json!({
                "transaction_id": tx.id,
                "amount": tx.amount,
                "fence": fence,
                "date": tx.date.to_string(),
            }),
        });
    }
}

/// Rule 5: one category dominating the current month's spending
fn dominant_category_rule(
    insights: &mut Vec<Insight>,
    transactions: &[Transaction],
    categories: &[Category],
    today: NaiveDate,
) {
    let window = month_window(today);
    let names: HashMap<&str, &str> = categories.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();

    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
    let mut month_total = 0.0;

    for tx in transactions.iter().filter(|t| t.is_expense() && in_window(t.date, window)) {
        month_total += tx.amount;
        if let Some(id) = tx.category_id.as_deref() {
            if names.contains_key(id) {
                let entry = totals.entry(id).or_insert((0.0, 0));
                entry.0 += tx.amount;
                entry.1 += 1;
            }
        }
    }

    if month_total <= 0.0 {
        return;
    }

    let top = totals
        .iter()
        .max_by(|a, b| a.1 .0.partial_cmp(&b.1 .0).unwrap_or(std::cmp::Ordering::Equal));

    if let Some((id, (total, count))) = top {
        let share = total / month_total;
        if share > DOMINANT_SHARE && *count >= 2 {
            insights.push(Insight {
                kind: InsightKind::DominantCategory,
                severity: Severity::Info,
                title: format!("{} dominates this month", names[id]),
                message: format!(
                    "{:.0}% of this month's spending ({:.2}) went to {}.",
                    share * 100.0,
                    total,
                    names[id]
                ),
                data: serde_json::json!({
                    "category_id": id,
                    "total": total,
                    "share": share,
                }),
            });
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::budget_performance;
    use crate::models::{Budget, BudgetPeriod, CategoryKind, TransactionKind};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn expense(amount: f64, date: NaiveDate) -> Transaction {
        Transaction::new("u1".to_string(), None, TransactionKind::Expense, amount, "x".to_string(), date)
    }

    fn income(amount: f64, date: NaiveDate) -> Transaction {
        Transaction::new("u1".to_string(), None, TransactionKind::Income, amount, "pay".to_string(), date)
    }

    fn kinds(insights: &[Insight]) -> Vec<InsightKind> {
        insights.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_not_enough_data_short_circuits() {
        let txs = vec![expense(10.0, d(2025, 3, 1)), expense(20.0, d(2025, 3, 2))];
        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 15));
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::NotEnoughData);
    }

    #[test]
    fn test_spike_fires_strictly_above_threshold() {
        let today = d(2025, 3, 15);

        // Two prior months at 100 each; current month at exactly 120 = 1.2x: no spike
        let txs = vec![
            expense(100.0, d(2025, 1, 10)),
            expense(100.0, d(2025, 2, 10)),
            expense(120.0, d(2025, 3, 10)),
            income(1.0, d(2025, 1, 1)),
            income(1.0, d(2025, 2, 1)),
        ];
        let insights = generate_insights(&txs, &[], &[], today);
        assert!(!kinds(&insights).contains(&InsightKind::SpendingSpike));

        // 121 > 1.2 * 100: spike
        let txs = vec![
            expense(100.0, d(2025, 1, 10)),
            expense(100.0, d(2025, 2, 10)),
            expense(121.0, d(2025, 3, 10)),
            income(1.0, d(2025, 1, 1)),
            income(1.0, d(2025, 2, 1)),
        ];
        let insights = generate_insights(&txs, &[], &[], today);
        assert!(kinds(&insights).contains(&InsightKind::SpendingSpike));
    }

    #[test]
    fn test_spike_needs_two_tracked_months() {
        // Only one month of history before the current month
        let txs = vec![
            expense(100.0, d(2025, 2, 10)),
            expense(500.0, d(2025, 3, 10)),
            expense(10.0, d(2025, 3, 11)),
            expense(10.0, d(2025, 3, 12)),
            expense(10.0, d(2025, 3, 13)),
        ];
        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 15));
        assert!(!kinds(&insights).contains(&InsightKind::SpendingSpike));
    }

    #[test]
    fn test_spending_down() {
        let txs = vec![
            expense(100.0, d(2025, 1, 10)),
            expense(100.0, d(2025, 2, 10)),
            expense(50.0, d(2025, 3, 10)),
            income(1.0, d(2025, 1, 1)),
            income(1.0, d(2025, 2, 1)),
        ];
        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 15));
        assert!(kinds(&insights).contains(&InsightKind::SpendingDown));
    }

    #[test]
    fn test_savings_rate_rules() {
        // 1000 income, 700 expense: 30% saved
        let txs = vec![
            income(1000.0, d(2025, 3, 1)),
            expense(200.0, d(2025, 3, 5)),
            expense(200.0, d(2025, 3, 6)),
            expense(200.0, d(2025, 3, 7)),
            expense(100.0, d(2025, 3, 8)),
        ];
        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 15));
        assert!(kinds(&insights).contains(&InsightKind::HealthySavings));

        // Spending beyond income
        let txs = vec![
            income(100.0, d(2025, 3, 1)),
            expense(80.0, d(2025, 3, 5)),
            expense(80.0, d(2025, 3, 6)),
            expense(80.0, d(2025, 3, 7)),
            expense(80.0, d(2025, 3, 8)),
        ];
        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 15));
        assert!(kinds(&insights).contains(&InsightKind::NegativeSavings));
    }

    #[test]
    fn test_budget_insights_from_reports() {
        let budget = Budget::new("u1".to_string(), None, 100.0, BudgetPeriod::Monthly);
        let txs: Vec<Transaction> = (0..5).map(|i| expense(30.0, d(2025, 3, 5 + i))).collect();

        let reports = budget_performance(&txs, &[budget], &[], d(2025, 3, 15));
        let insights = generate_insights(&txs, &reports, &[], d(2025, 3, 15));

        let exceeded: Vec<_> = insights.iter().filter(|i| i.kind == InsightKind::BudgetExceeded).collect();
        assert_eq!(exceeded.len(), 1);
        assert_eq!(exceeded[0].severity, Severity::Critical);
    }

    #[test]
    fn test_quantile_interpolation() {
        // Known sample: quartiles of 1..=4 under R-7 are 1.75 and 3.25
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-9);
        assert!((quantile(&sorted, 0.75) - 3.25).abs() < 1e-9);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn test_outlier_detection() {
        // Eleven ordinary expenses around 20, one at 500
        let mut txs: Vec<Transaction> =
            (0..11).map(|i| expense(18.0 + i as f64, d(2025, 3, 1 + i as u32))).collect();
        txs.push(expense(500.0, d(2025, 3, 14)));
        txs.push(income(2000.0, d(2025, 3, 1)));

        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 20));
        let outliers: Vec<_> = insights.iter().filter(|i| i.kind == InsightKind::OutlierExpense).collect();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].data["amount"], 500.0);
    }

    #[test]
    fn test_outlier_needs_samples() {
        // Seven expenses: below the sample floor, even with a wild one
        let mut txs: Vec<Transaction> =
            (0..6).map(|i| expense(20.0, d(2025, 3, 1 + i as u32))).collect();
        txs.push(expense(500.0, d(2025, 3, 10)));

        let insights = generate_insights(&txs, &[], &[], d(2025, 3, 20));
        assert!(!kinds(&insights).contains(&InsightKind::OutlierExpense));
    }

    #[test]
    fn test_dominant_category() {
        let mut food = Category::new("u1".to_string(), "Food".to_string(), CategoryKind::Expense);
        food.id = "c1".to_string();

        let with_cat = |amount: f64, day: u32| {
            Transaction::new(
                "u1".to_string(),
                Some("c1".to_string()),
                TransactionKind::Expense,
                amount,
                "meal".to_string(),
                d(2025, 3, day),
            )
        };

        let txs = vec![
            with_cat(100.0, 2),
            with_cat(100.0, 3),
            expense(50.0, d(2025, 3, 4)),
            expense(50.0, d(2025, 3, 5)),
            expense(50.0, d(2025, 3, 6)),
        ];

        // Food holds 200 of 350 = 57%
        let insights = generate_insights(&txs, &[], &[food], d(2025, 3, 15));
        let dominant: Vec<_> = insights.iter().filter(|i| i.kind == InsightKind::DominantCategory).collect();
        assert_eq!(dominant.len(), 1);
        assert!(dominant[0].title.contains("Food"));
    }
}
