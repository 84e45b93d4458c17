// 🔔 Notification Entity
// Durable alerts derived from budgets and insights

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SEVERITY
// ============================================================================

/// Shared by notifications and insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,     // Worth knowing, no action needed
    Warning,  // Heading toward a problem
    Critical, // Limit already breached
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

// ============================================================================
// NOTIFICATION KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A budget's spending crossed 80% of its cap
    BudgetNearLimit,

    /// A budget's cap was exceeded
    BudgetExceeded,

    /// An unusually large expense was detected
    LargeExpense,

    /// Anything else (account events, announcements)
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BudgetNearLimit => "budget_near_limit",
            NotificationKind::BudgetExceeded => "budget_exceeded",
            NotificationKind::LargeExpense => "large_expense",
            NotificationKind::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "budget_near_limit" => Some(NotificationKind::BudgetNearLimit),
            "budget_exceeded" => Some(NotificationKind::BudgetExceeded),
            "large_expense" => Some(NotificationKind::LargeExpense),
            "system" => Some(NotificationKind::System),
            _ => None,
        }
    }
}

// ============================================================================
// NOTIFICATION ENTITY
// ============================================================================

/// A stored alert for one user.
///
/// `dedupe_key` makes derivation idempotent: re-running the sync for the
/// same budget window inserts nothing new (unique per user in the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Stable identity (UUID) - never changes
    pub id: String,

    /// Owning user
    pub user_id: String,

    pub kind: NotificationKind,
    pub severity: Severity,

    pub title: String,
    pub message: String,

    /// Stable key identifying what this alert is about
    /// (e.g. "budget_exceeded:<budget_id>:2025-03-01")
    pub dedupe_key: String,

    pub read: bool,

    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: String,
        kind: NotificationKind,
        severity: Severity,
        title: String,
        message: String,
        dedupe_key: String,
    ) -> Self {
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            kind,
            severity,
            title,
            message,
            dedupe_key,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            NotificationKind::BudgetNearLimit,
            NotificationKind::BudgetExceeded,
            NotificationKind::LargeExpense,
            NotificationKind::System,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("fatal"), None);
    }
}
