// 🔔 Notification Engine
// Turns computed state (budget reports, outlier insights) into durable
// notifications. Dedupe keys make the sync idempotent: recomputing the same
// state inserts nothing new, so a budget alerts once per window per status.

use anyhow::Result;
use rusqlite::Connection;

use crate::analytics::{BudgetReport, BudgetStatus};
use crate::db;
use crate::insights::{Insight, InsightKind};
use crate::models::{Notification, NotificationKind, Severity};

/// Sync budget alerts for the given reports. Returns how many notifications
/// were actually inserted (deduped re-runs return 0).
pub fn sync_budget_alerts(conn: &Connection, user_id: &str, reports: &[BudgetReport]) -> Result<usize> {
    let mut inserted = 0;

    for report in reports {
        let notification = match report.status {
            BudgetStatus::Exceeded => Notification::new(
                user_id.to_string(),
                NotificationKind::BudgetExceeded,
                Severity::Critical,
                format!("{} budget exceeded", report.category_name),
                format!(
                    "You've spent {:.2} of your {:.2} {} budget.",
                    report.spent,
                    report.limit,
                    report.period.as_str()
                ),
                format!("budget_exceeded:{}:{}", report.budget_id, report.window_start),
            ),
            BudgetStatus::NearLimit => Notification::new(
                user_id.to_string(),
                NotificationKind::BudgetNearLimit,
                Severity::Warning,
                format!("{} budget almost used up", report.category_name),
                format!(
                    "You've used {:.0}% of your {:.2} {} budget.",
                    report.percent_used,
                    report.limit,
                    report.period.as_str()
                ),
                format!("budget_near_limit:{}:{}", report.budget_id, report.window_start),
            ),
            BudgetStatus::OnTrack => continue,
        };

        if db::insert_notification(conn, &notification)? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// Sync large-expense alerts from outlier insights. One notification per
/// flagged transaction, ever (the dedupe key is the transaction id).
pub fn sync_outlier_alerts(conn: &Connection, user_id: &str, insights: &[Insight]) -> Result<usize> {
    let mut inserted = 0;

    for insight in insights.iter().filter(|i| i.kind == InsightKind::OutlierExpense) {
        let tx_id = match insight.data["transaction_id"].as_str() {
            Some(id) => id.to_string(),
            None => continue,
        };

        let notification = Notification::new(
            user_id.to_string(),
            NotificationKind::LargeExpense,
            Severity::Info,
            insight.title.clone(),
            insight.message.clone(),
            format!("outlier:{}", tx_id),
        );

        if db::insert_notification(conn, &notification)? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

// ============================================================================
// TESTS
// ============================================================================
