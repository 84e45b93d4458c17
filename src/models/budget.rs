// 🎯 Budget Entity
// A spending cap over a recurring calendar window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// BUDGET PERIOD
// ============================================================================

/// Recurring window a budget applies to.
/// Windows are calendar-aligned: weeks start Monday, months on the 1st,
/// years on Jan 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(BudgetPeriod::Weekly),
            "monthly" => Some(BudgetPeriod::Monthly),
            "yearly" => Some(BudgetPeriod::Yearly),
            _ => None,
        }
    }
}

// ============================================================================
// BUDGET ENTITY
// ============================================================================

/// A cap on spending for one category (or overall) per period.
///
/// Identity: UUID (never changes)
/// At most one budget per (user, category, period) - enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    /// Stable identity (UUID) - never changes
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Category the cap applies to (None = all expenses)
    pub category_id: Option<String>,

    /// Cap amount, always positive
    pub amount: f64,

    pub period: BudgetPeriod,

    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(user_id: String, category_id: Option<String>, amount: f64, period: BudgetPeriod) -> Self {
        Budget {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            category_id,
            amount,
            period,
            created_at: Utc::now(),
        }
    }

    /// True when this budget caps all spending rather than one category
    pub fn is_overall(&self) -> bool {
        self.category_id.is_none()
    }
}
