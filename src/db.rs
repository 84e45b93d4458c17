// SQLite store for Cash Compass
// Every query touching user data is scoped by user_id: ownership enforcement
// lives in the SQL, not in the handlers. A foreign id simply comes back as
// "not found".

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::models::{
    Budget, BudgetPeriod, Category, CategoryKind, Notification, NotificationKind, Severity,
    Transaction, TransactionKind, User,
};

// ============================================================================
// CONFLICT ERROR
// ============================================================================

/// A uniqueness rule was violated (duplicate email, category name, budget).
/// Handlers downcast to this to answer 409 instead of 500.
#[derive(Debug)]
pub struct Conflict(pub String);

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Conflict {}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            display_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            icon TEXT,
            color TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            kind TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Budget uniqueness per (user, category, period) is checked in
    // create_budget: SQLite UNIQUE treats NULL category_id rows as distinct,
    // which would allow duplicate overall budgets.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS budgets (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            category_id TEXT REFERENCES categories(id) ON DELETE CASCADE,
            amount REAL NOT NULL,
            period TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            dedupe_key TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, dedupe_key)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_user_date ON transactions(user_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_category ON transactions(category_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_budgets_user ON budgets(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, read)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING HELPERS
// ============================================================================

#[derive(Debug)]
struct BadColumn(String);

impl std::fmt::Display for BadColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadColumn {}

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(BadColumn(msg)))
}

fn get_utc(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| bad_column(idx, format!("bad timestamp {:?}: {}", raw, e)))
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| bad_column(idx, format!("bad date {:?}: {}", raw, e)))
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        password_hash: row.get(3)?,
        password_salt: row.get(4)?,
        created_at: get_utc(row, 5)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    let kind_raw: String = row.get(3)?;
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: CategoryKind::parse(&kind_raw)
            .ok_or_else(|| bad_column(3, format!("bad category kind {:?}", kind_raw)))?,
        icon: row.get(4)?,
        color: row.get(5)?,
        created_at: get_utc(row, 6)?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let kind_raw: String = row.get(3)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        kind: TransactionKind::parse(&kind_raw)
            .ok_or_else(|| bad_column(3, format!("bad transaction kind {:?}", kind_raw)))?,
        amount: row.get(4)?,
        description: row.get(5)?,
        date: get_date(row, 6)?,
        notes: row.get(7)?,
        created_at: get_utc(row, 8)?,
        updated_at: get_utc(row, 9)?,
    })
}

fn budget_from_row(row: &Row) -> rusqlite::Result<Budget> {
    let period_raw: String = row.get(4)?;
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        amount: row.get(3)?,
        period: BudgetPeriod::parse(&period_raw)
            .ok_or_else(|| bad_column(4, format!("bad budget period {:?}", period_raw)))?,
        created_at: get_utc(row, 5)?,
    })
}

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    let kind_raw: String = row.get(2)?;
    let severity_raw: String = row.get(3)?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: NotificationKind::parse(&kind_raw)
            .ok_or_else(|| bad_column(2, format!("bad notification kind {:?}", kind_raw)))?,
        severity: Severity::parse(&severity_raw)
            .ok_or_else(|| bad_column(3, format!("bad severity {:?}", severity_raw)))?,
        title: row.get(4)?,
        message: row.get(5)?,
        dedupe_key: row.get(6)?,
        read: row.get::<_, i64>(7)? != 0,
        created_at: get_utc(row, 8)?,
    })
}

// ============================================================================
// USERS
// ============================================================================

pub fn create_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, display_name, password_hash, password_salt, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.email,
            user.display_name,
            user.password_hash,
            user.password_salt,
            user.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            anyhow::Error::new(Conflict(format!("Email {} is already registered", user.email)))
        } else {
            anyhow::Error::new(e).context("Failed to insert user")
        }
    })?;

    Ok(())
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, display_name, password_hash, password_salt, created_at
         FROM users WHERE email = ?1",
    )?;
    let mut rows = stmt.query_map(params![email], user_from_row)?;
    rows.next().transpose().context("Failed to read user")
}

pub fn get_user_by_id(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, display_name, password_hash, password_salt, created_at
         FROM users WHERE id = ?1",
    )?;
    let mut rows = stmt.query_map(params![user_id], user_from_row)?;
    rows.next().transpose().context("Failed to read user")
}

// ============================================================================
// SESSIONS
// ============================================================================

pub fn create_session(
    conn: &Connection,
    token: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, user_id, Utc::now().to_rfc3339(), expires_at.to_rfc3339()],
    )
    .context("Failed to insert session")?;
    Ok(())
}

/// Resolve a bearer token to its user. Expired sessions resolve to None.
pub fn get_session_user(conn: &Connection, token: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.display_name, u.password_hash, u.password_salt, u.created_at
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > ?2",
    )?;
    let mut rows = stmt.query_map(params![token, Utc::now().to_rfc3339()], user_from_row)?;
    rows.next().transpose().context("Failed to read session")
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(n > 0)
}

// ============================================================================
// CATEGORIES
// ============================================================================

pub fn create_category(conn: &Connection, category: &Category) -> Result<()> {
    conn.execute(
        "INSERT INTO categories (id, user_id, name, kind, icon, color, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            category.id,
            category.user_id,
            category.name,
            category.kind.as_str(),
            category.icon,
            category.color,
            category.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            anyhow::Error::new(Conflict(format!("Category {:?} already exists", category.name)))
        } else {
            anyhow::Error::new(e).context("Failed to insert category")
        }
    })?;

    Ok(())
}

pub fn get_category(conn: &Connection, user_id: &str, category_id: &str) -> Result<Option<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, kind, icon, color, created_at
         FROM categories WHERE user_id = ?1 AND id = ?2",
    )?;
    let mut rows = stmt.query_map(params![user_id, category_id], category_from_row)?;
    rows.next().transpose().context("Failed to read category")
}

pub fn list_categories(conn: &Connection, user_id: &str) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, kind, icon, color, created_at
         FROM categories WHERE user_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map(params![user_id], category_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list categories")
}

pub fn update_category(
    conn: &Connection,
    user_id: &str,
    category_id: &str,
    name: &str,
    icon: Option<&str>,
    color: Option<&str>,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE categories SET name = ?1, icon = ?2, color = ?3
             WHERE user_id = ?4 AND id = ?5",
            params![name, icon, color, user_id, category_id],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                anyhow::Error::new(Conflict(format!("Category {:?} already exists", name)))
            } else {
                anyhow::Error::new(e).context("Failed to update category")
            }
        })?;
    Ok(n > 0)
}

/// Delete a category: its transactions are detached (category_id set NULL by
/// the FK), and budgets pinned to it are removed (FK cascade).
pub fn delete_category(conn: &Connection, user_id: &str, category_id: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM categories WHERE user_id = ?1 AND id = ?2",
        params![user_id, category_id],
    )?;
    Ok(n > 0)
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Optional filters for transaction listings
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>, // inclusive
    pub kind: Option<TransactionKind>,
    pub category_id: Option<String>,
    pub limit: Option<u32>,
}

pub fn create_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions
             (id, user_id, category_id, kind, amount, description, date, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            tx.id,
            tx.user_id,
            tx.category_id,
            tx.kind.as_str(),
            tx.amount,
            tx.description,
            tx.date.to_string(),
            tx.notes,
            tx.created_at.to_rfc3339(),
            tx.updated_at.to_rfc3339(),
        ],
    )
    .context("Failed to insert transaction")?;
    Ok(())
}

pub fn get_transaction(conn: &Connection, user_id: &str, tx_id: &str) -> Result<Option<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category_id, kind, amount, description, date, notes, created_at, updated_at
         FROM transactions WHERE user_id = ?1 AND id = ?2",
    )?;
    let mut rows = stmt.query_map(params![user_id, tx_id], transaction_from_row)?;
    rows.next().transpose().context("Failed to read transaction")
}

pub fn list_transactions(
    conn: &Connection,
    user_id: &str,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT id, user_id, category_id, kind, amount, description, date, notes, created_at, updated_at
         FROM transactions WHERE user_id = ?",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(from) = filter.from {
        sql.push_str(" AND date >= ?");
        args.push(Box::new(from.to_string()));
    }
    if let Some(to) = filter.to {
        sql.push_str(" AND date <= ?");
        args.push(Box::new(to.to_string()));
    }
    if let Some(kind) = filter.kind {
        sql.push_str(" AND kind = ?");
        args.push(Box::new(kind.as_str().to_string()));
    }
    if let Some(category_id) = &filter.category_id {
        sql.push_str(" AND category_id = ?");
        args.push(Box::new(category_id.clone()));
    }

    sql.push_str(" ORDER BY date DESC, created_at DESC");

    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter().map(|a| a.as_ref())), transaction_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list transactions")
}

pub fn update_transaction(conn: &Connection, tx: &Transaction) -> Result<bool> {
    let n = conn.execute(
        "UPDATE transactions
         SET category_id = ?1, kind = ?2, amount = ?3, description = ?4,
             date = ?5, notes = ?6, updated_at = ?7
         WHERE user_id = ?8 AND id = ?9",
        params![
            tx.category_id,
            tx.kind.as_str(),
            tx.amount,
            tx.description,
            tx.date.to_string(),
            tx.notes,
            Utc::now().to_rfc3339(),
            tx.user_id,
            tx.id,
        ],
    )?;
    Ok(n > 0)
}

pub fn delete_transaction(conn: &Connection, user_id: &str, tx_id: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM transactions WHERE user_id = ?1 AND id = ?2",
        params![user_id, tx_id],
    )?;
    Ok(n > 0)
}

// ============================================================================
// BUDGETS
// ============================================================================

pub fn create_budget(conn: &Connection, budget: &Budget) -> Result<()> {
    // Uniqueness check here because UNIQUE in SQL treats NULL category_id
    // rows as distinct
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM budgets
         WHERE user_id = ?1 AND category_id IS ?2 AND period = ?3",
        params![budget.user_id, budget.category_id, budget.period.as_str()],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Err(anyhow::Error::new(Conflict(format!(
            "A {} budget for that category already exists",
            budget.period.as_str()
        ))));
    }

    conn.execute(
        "INSERT INTO budgets (id, user_id, category_id, amount, period, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            budget.id,
            budget.user_id,
            budget.category_id,
            budget.amount,
            budget.period.as_str(),
            budget.created_at.to_rfc3339(),
        ],
    )
    .context("Failed to insert budget")?;
    Ok(())
}

pub fn get_budget(conn: &Connection, user_id: &str, budget_id: &str) -> Result<Option<Budget>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category_id, amount, period, created_at
         FROM budgets WHERE user_id = ?1 AND id = ?2",
    )?;
    let mut rows = stmt.query_map(params![user_id, budget_id], budget_from_row)?;
    rows.next().transpose().context("Failed to read budget")
}

pub fn list_budgets(conn: &Connection, user_id: &str) -> Result<Vec<Budget>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category_id, amount, period, created_at
         FROM budgets WHERE user_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![user_id], budget_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list budgets")
}

pub fn update_budget(
    conn: &Connection,
    user_id: &str,
    budget_id: &str,
    amount: f64,
    period: BudgetPeriod,
) -> Result<bool> {
    let n = conn.execute(
        "UPDATE budgets SET amount = ?1, period = ?2 WHERE user_id = ?3 AND id = ?4",
        params![amount, period.as_str(), user_id, budget_id],
    )?;
    Ok(n > 0)
}

pub fn delete_budget(conn: &Connection, user_id: &str, budget_id: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM budgets WHERE user_id = ?1 AND id = ?2",
        params![user_id, budget_id],
    )?;
    Ok(n > 0)
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Insert a notification; silently a no-op when the same dedupe_key was
/// already stored for this user. Returns true when a row was inserted.
pub fn insert_notification(conn: &Connection, notification: &Notification) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO notifications
             (id, user_id, kind, severity, title, message, dedupe_key, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            notification.id,
            notification.user_id,
            notification.kind.as_str(),
            notification.severity.as_str(),
            notification.title,
            notification.message,
            notification.dedupe_key,
            notification.read as i64,
            notification.created_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to insert notification")),
    }
}

pub fn list_notifications(conn: &Connection, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
    let sql = if unread_only {
        "SELECT id, user_id, kind, severity, title, message, dedupe_key, read, created_at
         FROM notifications WHERE user_id = ?1 AND read = 0 ORDER BY created_at DESC"
    } else {
        "SELECT id, user_id, kind, severity, title, message, dedupe_key, read, created_at
         FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![user_id], notification_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list notifications")
}

pub fn mark_notification_read(conn: &Connection, user_id: &str, notification_id: &str) -> Result<bool> {
    let n = conn.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND id = ?2",
        params![user_id, notification_id],
    )?;
    Ok(n > 0)
}

pub fn mark_all_read(conn: &Connection, user_id: &str) -> Result<usize> {
    let n = conn.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
        params![user_id],
    )?;
    Ok(n)
}

pub fn delete_notification(conn: &Connection, user_id: &str, notification_id: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM notifications WHERE user_id = ?1 AND id = ?2",
        params![user_id, notification_id],
    )?;
    Ok(n > 0)
}

pub fn unread_count(conn: &Connection, user_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
        params![user_id],
        |row| row.get(0),
    )
    .context("Failed to count notifications")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn test_user(conn: &Connection, email: &str) -> User {
        let user = User::new(
            email.to_string(),
            "Test".to_string(),
            "hash".to_string(),
            "salt".to_string(),
        );
        create_user(conn, &user).unwrap();
        user
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_user_round_trip_and_duplicate_email() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");

        let found = get_user_by_email(&conn, "a@b.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(get_user_by_email(&conn, "nobody@b.com").unwrap().is_none());

        let dup = User::new("a@b.com".to_string(), "Two".to_string(), "h".to_string(), "s".to_string());
        let err = create_user(&conn, &dup).unwrap_err();
        assert!(err.downcast_ref::<Conflict>().is_some());
    }

    #[test]
    fn test_session_expiry() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");

        create_session(&conn, "live", &user.id, Utc::now() + Duration::days(1)).unwrap();
        create_session(&conn, "dead", &user.id, Utc::now() - Duration::days(1)).unwrap();

        assert!(get_session_user(&conn, "live").unwrap().is_some());
        assert!(get_session_user(&conn, "dead").unwrap().is_none());
        assert!(get_session_user(&conn, "unknown").unwrap().is_none());

        assert!(delete_session(&conn, "live").unwrap());
        assert!(get_session_user(&conn, "live").unwrap().is_none());
    }

    #[test]
    fn test_category_crud_and_duplicate_name() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");

        let cat = Category::new(user.id.clone(), "Food".to_string(), CategoryKind::Expense);
        create_category(&conn, &cat).unwrap();

        let dup = Category::new(user.id.clone(), "Food".to_string(), CategoryKind::Expense);
        assert!(create_category(&conn, &dup).unwrap_err().downcast_ref::<Conflict>().is_some());

        assert!(update_category(&conn, &user.id, &cat.id, "Dining", None, Some("#112233")).unwrap());
        let listed = list_categories(&conn, &user.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Dining");
        assert_eq!(listed[0].color.as_deref(), Some("#112233"));

        assert!(delete_category(&conn, &user.id, &cat.id).unwrap());
        assert!(list_categories(&conn, &user.id).unwrap().is_empty());
    }

    #[test]
    fn test_transaction_crud_and_filters() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");
        let cat = Category::new(user.id.clone(), "Food".to_string(), CategoryKind::Expense);
        create_category(&conn, &cat).unwrap();

        let t1 = Transaction::new(
            user.id.clone(),
            Some(cat.id.clone()),
            TransactionKind::Expense,
            20.0,
            "Lunch".to_string(),
            d(2025, 3, 10),
        );
        let t2 = Transaction::new(
            user.id.clone(),
            None,
            TransactionKind::Income,
            1000.0,
            "Salary".to_string(),
            d(2025, 3, 1),
        );
        create_transaction(&conn, &t1).unwrap();
        create_transaction(&conn, &t2).unwrap();

        let all = list_transactions(&conn, &user.id, &TransactionFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        // Newest date first
        assert_eq!(all[0].id, t1.id);

        let expenses = list_transactions(
            &conn,
            &user.id,
            &TransactionFilter { kind: Some(TransactionKind::Expense), ..Default::default() },
        )
        .unwrap();
        assert_eq!(expenses.len(), 1);

        let march_10_on = list_transactions(
            &conn,
            &user.id,
            &TransactionFilter { from: Some(d(2025, 3, 5)), ..Default::default() },
        )
        .unwrap();
        assert_eq!(march_10_on.len(), 1);
        assert_eq!(march_10_on[0].description, "Lunch");

        let by_cat = list_transactions(
            &conn,
            &user.id,
            &TransactionFilter { category_id: Some(cat.id.clone()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_cat.len(), 1);

        let mut updated = t1.clone();
        updated.amount = 25.0;
        updated.description = "Long lunch".to_string();
        assert!(update_transaction(&conn, &updated).unwrap());
        let got = get_transaction(&conn, &user.id, &t1.id).unwrap().unwrap();
        assert_eq!(got.amount, 25.0);

        assert!(delete_transaction(&conn, &user.id, &t1.id).unwrap());
        assert!(get_transaction(&conn, &user.id, &t1.id).unwrap().is_none());
    }

    #[test]
    fn test_ownership_isolation() {
        let conn = test_conn();
        let alice = test_user(&conn, "alice@b.com");
        let bob = test_user(&conn, "bob@b.com");

        let tx = Transaction::new(
            alice.id.clone(),
            None,
            TransactionKind::Expense,
            10.0,
            "Coffee".to_string(),
            d(2025, 3, 10),
        );
        create_transaction(&conn, &tx).unwrap();

        // Bob cannot see, update, or delete Alice's transaction
        assert!(get_transaction(&conn, &bob.id, &tx.id).unwrap().is_none());
        assert!(!delete_transaction(&conn, &bob.id, &tx.id).unwrap());
        assert!(list_transactions(&conn, &bob.id, &TransactionFilter::default()).unwrap().is_empty());

        // Still there for Alice
        assert!(get_transaction(&conn, &alice.id, &tx.id).unwrap().is_some());
    }

    #[test]
    fn test_budget_uniqueness_includes_overall() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");

        let overall = Budget::new(user.id.clone(), None, 500.0, BudgetPeriod::Monthly);
        create_budget(&conn, &overall).unwrap();

        // Second overall monthly budget is a conflict
        let dup = Budget::new(user.id.clone(), None, 700.0, BudgetPeriod::Monthly);
        assert!(create_budget(&conn, &dup).unwrap_err().downcast_ref::<Conflict>().is_some());

        // Same scope, different period is fine
        let yearly = Budget::new(user.id.clone(), None, 5000.0, BudgetPeriod::Yearly);
        create_budget(&conn, &yearly).unwrap();

        assert_eq!(list_budgets(&conn, &user.id).unwrap().len(), 2);
        assert!(update_budget(&conn, &user.id, &overall.id, 600.0, BudgetPeriod::Monthly).unwrap());
        assert!(delete_budget(&conn, &user.id, &yearly.id).unwrap());
    }

    #[test]
    fn test_category_delete_detaches_and_drops_budgets() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");
        let cat = Category::new(user.id.clone(), "Food".to_string(), CategoryKind::Expense);
        create_category(&conn, &cat).unwrap();

        let tx = Transaction::new(
            user.id.clone(),
            Some(cat.id.clone()),
            TransactionKind::Expense,
            10.0,
            "Lunch".to_string(),
            d(2025, 3, 10),
        );
        create_transaction(&conn, &tx).unwrap();

        let budget = Budget::new(user.id.clone(), Some(cat.id.clone()), 100.0, BudgetPeriod::Monthly);
        create_budget(&conn, &budget).unwrap();

        assert!(delete_category(&conn, &user.id, &cat.id).unwrap());

        // Transaction survives, detached
        let got = get_transaction(&conn, &user.id, &tx.id).unwrap().unwrap();
        assert!(got.category_id.is_none());

        // Budget is gone
        assert!(list_budgets(&conn, &user.id).unwrap().is_empty());
    }

    #[test]
    fn test_notification_dedupe_and_lifecycle() {
        let conn = test_conn();
        let user = test_user(&conn, "a@b.com");

        let n = Notification::new(
            user.id.clone(),
            NotificationKind::BudgetExceeded,
            Severity::Critical,
            "Over budget".to_string(),
            "Food budget exceeded".to_string(),
            "budget_exceeded:b1:2025-03-01".to_string(),
        );
        assert!(insert_notification(&conn, &n).unwrap());

        // Same dedupe key again: no-op
        let again = Notification::new(
            user.id.clone(),
            NotificationKind::BudgetExceeded,
            Severity::Critical,
            "Over budget".to_string(),
            "Food budget exceeded".to_string(),
            "budget_exceeded:b1:2025-03-01".to_string(),
        );
        assert!(!insert_notification(&conn, &again).unwrap());

        assert_eq!(unread_count(&conn, &user.id).unwrap(), 1);
        let listed = list_notifications(&conn, &user.id, true).unwrap();
        assert_eq!(listed.len(), 1);

        assert!(mark_notification_read(&conn, &user.id, &listed[0].id).unwrap());
        assert_eq!(unread_count(&conn, &user.id).unwrap(), 0);
        assert!(list_notifications(&conn, &user.id, true).unwrap().is_empty());
        assert_eq!(list_notifications(&conn, &user.id, false).unwrap().len(), 1);
    }
}
