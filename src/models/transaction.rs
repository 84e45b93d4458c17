// 💸 Transaction Entity
// A single income or expense record, always owned by a user

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// TRANSACTION KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in
    Income,

    /// Money going out
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    /// Parse from the wire/storage form ("income" / "expense")
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(TransactionKind::Income),
            "expense" => Some(TransactionKind::Expense),
            _ => None,
        }
    }
}

// ============================================================================
// TRANSACTION ENTITY
// ============================================================================

/// A money movement on a given calendar date.
///
/// Identity: UUID (never changes)
/// `amount` is always positive; direction comes from `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable identity (UUID) - never changes
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Category this transaction belongs to (None = uncategorized)
    pub category_id: Option<String>,

    pub kind: TransactionKind,

    /// Positive amount in the user's currency
    pub amount: f64,

    /// Short description (e.g. "Weekly groceries")
    pub description: String,

    /// Calendar date the money moved (business time, not ingestion time)
    pub date: NaiveDate,

    /// Optional free-form notes
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: String,
        category_id: Option<String>,
        kind: TransactionKind,
        amount: f64,
        description: String,
        date: NaiveDate,
    ) -> Self {
        let now = Utc::now();

        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            category_id,
            kind,
            amount,
            description,
            date,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Signed amount: income positive, expense negative
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }
}
