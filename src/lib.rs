// Cash Compass - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod analytics;
pub mod auth;
pub mod db;
pub mod export;
pub mod insights;
pub mod models;
pub mod notifications;
pub mod periods;
pub mod validation;

// Re-export commonly used types
pub use analytics::{
    budget_performance, category_breakdown, overview, spending_trend,
    BudgetReport, BudgetStatus, CategorySlice, Overview, TrendPoint,
};
pub use db::{setup_database, Conflict, TransactionFilter};
pub use insights::{generate_insights, Insight, InsightKind};
pub use models::{
    Budget, BudgetPeriod, Category, CategoryKind, Notification, NotificationKind,
    Severity, Transaction, TransactionKind, User,
};
pub use validation::{ValidationError, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Database path from the environment, with a local default
pub fn database_path() -> String {
    std::env::var("CASH_COMPASS_DB").unwrap_or_else(|_| "cash-compass.db".to_string())
}
