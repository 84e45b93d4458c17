// Entity models for Cash Compass
// Plain records with stable UUID identity, serialized with serde

pub mod budget;
pub mod category;
pub mod notification;
pub mod transaction;
pub mod user;

pub use budget::{Budget, BudgetPeriod};
pub use category::{Category, CategoryKind};
pub use notification::{Notification, NotificationKind, Severity};
pub use transaction::{Transaction, TransactionKind};
pub use user::User;
