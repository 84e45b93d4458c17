// 🏷️ Category Entity
// User-defined spending/income buckets, unique per user by name

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Expense category (money going out)
    Expense,

    /// Income category (money coming in)
    Income,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Expense => "expense",
            CategoryKind::Income => "income",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expense" => Some(CategoryKind::Expense),
            "income" => Some(CategoryKind::Income),
            _ => None,
        }
    }
}

// ============================================================================
// CATEGORY ENTITY
// ============================================================================

/// A named bucket transactions are filed under.
///
/// Identity: UUID (never changes)
/// Renaming a category does not break historical transactions, which
/// reference the UUID, not the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Stable identity (UUID) - never changes
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Category name (e.g. "Groceries"), unique per user
    pub name: String,

    pub kind: CategoryKind,

    /// Optional icon for UI (e.g. "🛒")
    pub icon: Option<String>,

    /// Optional color for UI (e.g. "#FF5733")
    pub color: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(user_id: String, name: String, kind: CategoryKind) -> Self {
        Category {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            name,
            kind,
            icon: None,
            color: None,
            created_at: Utc::now(),
        }
    }

    /// Create category with icon and color
    pub fn with_display(
        user_id: String,
        name: String,
        kind: CategoryKind,
        icon: Option<String>,
        color: Option<String>,
    ) -> Self {
        let mut category = Self::new(user_id, name, kind);
        category.icon = icon;
        category.color = color;
        category
    }
}

/// Default category set seeded for new users
pub fn default_categories(user_id: &str) -> Vec<Category> {
    let expense = |name: &str, icon: &str, color: &str| {
        Category::with_display(
            user_id.to_string(),
            name.to_string(),
            CategoryKind::Expense,
            Some(icon.to_string()),
            Some(color.to_string()),
        )
    };
    let income = |name: &str, icon: &str, color: &str| {
        Category::with_display(
            user_id.to_string(),
            name.to_string(),
            CategoryKind::Income,
            Some(icon.to_string()),
            Some(color.to_string()),
        )
    };

    vec![
        expense("Food & Dining", "🍽️", "#FF5733"),
        expense("Groceries", "🛒", "#2ECC71"),
        expense("Transportation", "🚗", "#3498DB"),
        expense("Housing", "🏠", "#9B59B6"),
        expense("Entertainment", "🎬", "#E67E22"),
        expense("Health", "💊", "#E74C3C"),
        expense("Shopping", "🛍️", "#F1C40F"),
        income("Salary", "💼", "#27AE60"),
        income("Other Income", "💰", "#16A085"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(CategoryKind::parse("expense"), Some(CategoryKind::Expense));
        assert_eq!(CategoryKind::parse("income"), Some(CategoryKind::Income));
        assert_eq!(CategoryKind::parse("Expense"), None);
    }

    #[test]
    fn test_default_categories_belong_to_user() {
        let cats = default_categories("u1");
        assert!(cats.len() >= 8);
        assert!(cats.iter().all(|c| c.user_id == "u1"));
        assert!(cats.iter().any(|c| c.kind == CategoryKind::Income));
    }
}
