// Cash Compass - REST API Server
// JSON API over the SQLite store. Every data route requires a bearer token;
// ownership is enforced by the user-scoped queries in the db module.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use cash_compass::models::category::default_categories;
use cash_compass::{
    auth, budget_performance, category_breakdown, db, export, generate_insights, overview,
    spending_trend, Budget, Category, Conflict, Transaction, TransactionFilter, TransactionKind,
    User, ValidationError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

// ============================================================================
// Response plumbing
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn ok_json<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn created_json<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ApiResponse {
        success: false,
        data: serde_json::Value::Null,
        error: Some(message.to_string()),
    };
    (status, Json(body)).into_response()
}

/// 400 with the field-level error list
fn validation_response(errors: Vec<ValidationError>) -> Response {
    let body = ApiResponse {
        success: false,
        data: serde_json::json!({ "validation_errors": errors }),
        error: Some("Validation failed".to_string()),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

/// Map store errors: uniqueness conflicts answer 409, anything else 500
fn store_error(e: anyhow::Error) -> Response {
    if let Some(conflict) = e.downcast_ref::<Conflict>() {
        return error_response(StatusCode::CONFLICT, &conflict.0);
    }
    tracing::error!("store error: {:#}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

// ============================================================================
// Authentication
// ============================================================================

/// Resolve the bearer token to a user, or answer 401
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;

    let conn = state.db.lock().unwrap();
    match db::get_session_user(&conn, token) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, "Invalid or expired token")),
        Err(e) => Err(store_error(e)),
    }
}

// ============================================================================
// Auth handlers
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    display_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    token: String,
    user: User,
}

/// POST /api/auth/register
/// New users get the default category set so the app is usable immediately.
async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> Response {
    if let Err(errors) =
        cash_compass::validation::validate_registration(&req.email, &req.password, &req.display_name)
    {
        return validation_response(errors);
    }

    let conn = state.db.lock().unwrap();

    let user = match auth::register_user(&conn, &req.email, &req.password, &req.display_name) {
        Ok(user) => user,
        Err(e) => return store_error(e),
    };

    for category in default_categories(&user.id) {
        if let Err(e) = db::create_category(&conn, &category) {
            return store_error(e);
        }
    }

    match auth::issue_session(&conn, &user.id) {
        Ok(session) => created_json(AuthResponse { token: session.token, user }),
        Err(e) => store_error(e),
    }
}

/// POST /api/auth/login
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    let conn = state.db.lock().unwrap();

    match auth::login(&conn, &req.email, &req.password) {
        Ok(Some(user)) => match auth::issue_session(&conn, &user.id) {
            Ok(session) => ok_json(AuthResponse { token: session.token, user }),
            Err(e) => store_error(e),
        },
        Ok(None) => error_response(StatusCode::UNAUTHORIZED, "Invalid email or password"),
        Err(e) => store_error(e),
    }
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match authenticate(&state, &headers) {
        Ok(user) => ok_json(user),
        Err(resp) => resp,
    }
}

// ============================================================================
// Transaction handlers
// ============================================================================

#[derive(Deserialize)]
struct TransactionRequest {
    kind: String,
    amount: f64,
    description: String,
    date: String,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize, Default)]
struct ListQuery {
    from: Option<String>,
    to: Option<String>,
    kind: Option<String>,
    category_id: Option<String>,
    limit: Option<u32>,
}

fn parse_filter(query: &ListQuery) -> Result<TransactionFilter, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut filter = TransactionFilter {
        category_id: query.category_id.clone(),
        limit: query.limit,
        ..Default::default()
    };

    if let Some(raw) = &query.from {
        filter.from = cash_compass::validation::check_date(&mut errors, "from", raw);
    }
    if let Some(raw) = &query.to {
        filter.to = cash_compass::validation::check_date(&mut errors, "to", raw);
    }
    if let Some(raw) = &query.kind {
        match TransactionKind::parse(raw) {
            Some(kind) => filter.kind = Some(kind),
            None => errors.push(ValidationError::new("kind", "Expected \"income\" or \"expense\"")),
        }
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(errors)
    }
}

/// Resolve an optional category id to one owned by this user
fn check_category_owned(
    conn: &Connection,
    user_id: &str,
    category_id: &Option<String>,
) -> Result<(), Response> {
    if let Some(id) = category_id {
        match db::get_category(conn, user_id, id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(validation_response(vec![ValidationError::new(
                    "category_id",
                    "Unknown category",
                )]))
            }
            Err(e) => return Err(store_error(e)),
        }
    }
    Ok(())
}

/// GET /api/transactions
async fn list_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let filter = match parse_filter(&query) {
        Ok(filter) => filter,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();
    match db::list_transactions(&conn, &user.id, &filter) {
        Ok(transactions) => ok_json(transactions),
        Err(e) => store_error(e),
    }
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let (kind, date) = match cash_compass::validation::validate_transaction(
        &req.kind,
        req.amount,
        &req.description,
        &req.date,
        req.notes.as_deref(),
    ) {
        Ok(parsed) => parsed,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();
    if let Err(resp) = check_category_owned(&conn, &user.id, &req.category_id) {
        return resp;
    }

    let mut tx = Transaction::new(
        user.id.clone(),
        req.category_id,
        kind,
        req.amount,
        req.description.trim().to_string(),
        date,
    );
    tx.notes = req.notes;

    match db::create_transaction(&conn, &tx) {
        Ok(()) => created_json(tx),
        Err(e) => store_error(e),
    }
}

/// GET /api/transactions/:id
async fn get_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::get_transaction(&conn, &user.id, &id) {
        Ok(Some(tx)) => ok_json(tx),
        Ok(None) => not_found(),
        Err(e) => store_error(e),
    }
}

/// PUT /api/transactions/:id
async fn update_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<TransactionRequest>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let (kind, date) = match cash_compass::validation::validate_transaction(
        &req.kind,
        req.amount,
        &req.description,
        &req.date,
        req.notes.as_deref(),
    ) {
        Ok(parsed) => parsed,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();

    let mut tx = match db::get_transaction(&conn, &user.id, &id) {
        Ok(Some(tx)) => tx,
        Ok(None) => return not_found(),
        Err(e) => return store_error(e),
    };

    if let Err(resp) = check_category_owned(&conn, &user.id, &req.category_id) {
        return resp;
    }

    tx.kind = kind;
    tx.amount = req.amount;
    tx.description = req.description.trim().to_string();
    tx.date = date;
    tx.category_id = req.category_id;
    tx.notes = req.notes;

    match db::update_transaction(&conn, &tx) {
        Ok(true) => ok_json(tx),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

/// DELETE /api/transactions/:id
async fn delete_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::delete_transaction(&conn, &user.id, &id) {
        Ok(true) => ok_json(serde_json::json!({ "deleted": id })),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: Option<String>,
}

/// GET /api/transactions/export?format=csv|json
async fn export_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    let transactions = match db::list_transactions(&conn, &user.id, &TransactionFilter::default()) {
        Ok(t) => t,
        Err(e) => return store_error(e),
    };
    let categories = match db::list_categories(&conn, &user.id) {
        Ok(c) => c,
        Err(e) => return store_error(e),
    };

    match query.format.as_deref().unwrap_or("csv") {
        "csv" => match export::transactions_to_csv(&transactions, &categories) {
            Ok(csv) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"transactions.csv\""),
                ],
                csv,
            )
                .into_response(),
            Err(e) => store_error(e),
        },
        "json" => match export::transactions_to_json(&transactions, &categories) {
            Ok(json) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
                .into_response(),
            Err(e) => store_error(e),
        },
        other => error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unknown export format {:?}, expected \"csv\" or \"json\"", other),
        ),
    }
}

// ============================================================================
// Category handlers
// ============================================================================

#[derive(Deserialize)]
struct CategoryRequest {
    name: String,
    kind: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

/// GET /api/categories
async fn list_categories(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::list_categories(&conn, &user.id) {
        Ok(categories) => ok_json(categories),
        Err(e) => store_error(e),
    }
}

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CategoryRequest>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let kind = match cash_compass::validation::validate_category(&req.name, &req.kind, req.color.as_deref()) {
        Ok(kind) => kind,
        Err(errors) => return validation_response(errors),
    };

    let category = Category::with_display(
        user.id.clone(),
        req.name.trim().to_string(),
        kind,
        req.icon,
        req.color,
    );

    let conn = state.db.lock().unwrap();
    match db::create_category(&conn, &category) {
        Ok(()) => created_json(category),
        Err(e) => store_error(e),
    }
}

#[derive(Deserialize)]
struct CategoryUpdateRequest {
    name: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

/// PUT /api/categories/:id (kind is immutable, historical data depends on it)
async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CategoryUpdateRequest>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut errors = Vec::new();
    cash_compass::validation::check_text(&mut errors, "name", &req.name, 60);
    if let Some(color) = &req.color {
        cash_compass::validation::check_color(&mut errors, "color", color);
    }
    if !errors.is_empty() {
        return validation_response(errors);
    }

    let conn = state.db.lock().unwrap();
    match db::update_category(
        &conn,
        &user.id,
        &id,
        req.name.trim(),
        req.icon.as_deref(),
        req.color.as_deref(),
    ) {
        Ok(true) => match db::get_category(&conn, &user.id, &id) {
            Ok(Some(category)) => ok_json(category),
            Ok(None) => not_found(),
            Err(e) => store_error(e),
        },
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

/// DELETE /api/categories/:id
async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::delete_category(&conn, &user.id, &id) {
        Ok(true) => ok_json(serde_json::json!({ "deleted": id })),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

// ============================================================================
// Budget handlers
// ============================================================================

#[derive(Deserialize)]
struct BudgetRequest {
    amount: f64,
    period: String,
    #[serde(default)]
    category_id: Option<String>,
}

/// GET /api/budgets
async fn list_budgets(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::list_budgets(&conn, &user.id) {
        Ok(budgets) => ok_json(budgets),
        Err(e) => store_error(e),
    }
}

/// POST /api/budgets
async fn create_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BudgetRequest>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let period = match cash_compass::validation::validate_budget(req.amount, &req.period) {
        Ok(period) => period,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();
    if let Err(resp) = check_category_owned(&conn, &user.id, &req.category_id) {
        return resp;
    }

    let budget = Budget::new(user.id.clone(), req.category_id, req.amount, period);
    match db::create_budget(&conn, &budget) {
        Ok(()) => created_json(budget),
        Err(e) => store_error(e),
    }
}

#[derive(Deserialize)]
struct BudgetUpdateRequest {
    amount: f64,
    period: String,
}

/// PUT /api/budgets/:id
async fn update_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<BudgetUpdateRequest>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let period = match cash_compass::validation::validate_budget(req.amount, &req.period) {
        Ok(period) => period,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();
    match db::update_budget(&conn, &user.id, &id, req.amount, period) {
        Ok(true) => match db::get_budget(&conn, &user.id, &id) {
            Ok(Some(budget)) => ok_json(budget),
            Ok(None) => not_found(),
            Err(e) => store_error(e),
        },
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

/// DELETE /api/budgets/:id
async fn delete_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::delete_budget(&conn, &user.id, &id) {
        Ok(true) => ok_json(serde_json::json!({ "deleted": id })),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

/// GET /api/budgets/performance
async fn budget_performance_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    let loaded = load_user_data(&conn, &user.id);
    let (transactions, categories, budgets) = match loaded {
        Ok(data) => data,
        Err(e) => return store_error(e),
    };

    let today = Utc::now().date_naive();
    let reports = budget_performance(&transactions, &budgets, &categories, today);

    // Crossing a threshold is also when the user should be notified
    if let Err(e) = cash_compass::notifications::sync_budget_alerts(&conn, &user.id, &reports) {
        return store_error(e);
    }

    ok_json(reports)
}

// ============================================================================
// Notification handlers
// ============================================================================

#[derive(Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread: Option<bool>,
}

/// GET /api/notifications?unread=true
async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::list_notifications(&conn, &user.id, query.unread.unwrap_or(false)) {
        Ok(notifications) => ok_json(notifications),
        Err(e) => store_error(e),
    }
}

/// PUT /api/notifications/:id/read
async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::mark_notification_read(&conn, &user.id, &id) {
        Ok(true) => ok_json(serde_json::json!({ "read": id })),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

/// PUT /api/notifications/read-all
async fn mark_all_notifications_read(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::mark_all_read(&conn, &user.id) {
        Ok(count) => ok_json(serde_json::json!({ "marked_read": count })),
        Err(e) => store_error(e),
    }
}

/// DELETE /api/notifications/:id
async fn delete_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    match db::delete_notification(&conn, &user.id, &id) {
        Ok(true) => ok_json(serde_json::json!({ "deleted": id })),
        Ok(false) => not_found(),
        Err(e) => store_error(e),
    }
}

// ============================================================================
// Analytics handlers
// ============================================================================

type UserData = (Vec<Transaction>, Vec<Category>, Vec<Budget>);

/// Load everything the analytics engines need in one place
fn load_user_data(conn: &Connection, user_id: &str) -> anyhow::Result<UserData> {
    let transactions = db::list_transactions(conn, user_id, &TransactionFilter::default())?;
    let categories = db::list_categories(conn, user_id)?;
    let budgets = db::list_budgets(conn, user_id)?;
    Ok((transactions, categories, budgets))
}

#[derive(Deserialize, Default)]
struct RangeQuery {
    from: Option<String>,
    to: Option<String>,
}

fn parse_range(query: &RangeQuery) -> Result<(Option<NaiveDate>, Option<NaiveDate>), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let from = query
        .from
        .as_deref()
        .and_then(|raw| cash_compass::validation::check_date(&mut errors, "from", raw));
    let to = query
        .to
        .as_deref()
        .and_then(|raw| cash_compass::validation::check_date(&mut errors, "to", raw));

    if errors.is_empty() {
        Ok((from, to))
    } else {
        Err(errors)
    }
}

/// GET /api/analytics/overview?from&to
async fn analytics_overview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let (from, to) = match parse_range(&query) {
        Ok(range) => range,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();
    let filter = TransactionFilter { from, to, ..Default::default() };
    match db::list_transactions(&conn, &user.id, &filter) {
        Ok(transactions) => ok_json(overview(&transactions)),
        Err(e) => store_error(e),
    }
}

#[derive(Deserialize)]
struct TrendQuery {
    #[serde(default)]
    months: Option<u32>,
}

/// GET /api/analytics/trends?months=6
async fn analytics_trends(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TrendQuery>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let months = query.months.unwrap_or(6).clamp(1, 24);

    let conn = state.db.lock().unwrap();
    match db::list_transactions(&conn, &user.id, &TransactionFilter::default()) {
        Ok(transactions) => {
            let today = Utc::now().date_naive();
            ok_json(spending_trend(&transactions, today, months))
        }
        Err(e) => store_error(e),
    }
}

/// GET /api/analytics/categories?from&to
async fn analytics_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let (from, to) = match parse_range(&query) {
        Ok(range) => range,
        Err(errors) => return validation_response(errors),
    };

    let conn = state.db.lock().unwrap();
    let filter = TransactionFilter { from, to, ..Default::default() };
    let transactions = match db::list_transactions(&conn, &user.id, &filter) {
        Ok(t) => t,
        Err(e) => return store_error(e),
    };
    let categories = match db::list_categories(&conn, &user.id) {
        Ok(c) => c,
        Err(e) => return store_error(e),
    };

    ok_json(category_breakdown(&transactions, &categories))
}

/// GET /api/analytics/insights
/// Recomputes the full rule set and syncs derived notifications.
async fn analytics_insights(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match authenticate(&state, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let conn = state.db.lock().unwrap();
    let (transactions, categories, budgets) = match load_user_data(&conn, &user.id) {
        Ok(data) => data,
        Err(e) => return store_error(e),
    };

    let today = Utc::now().date_naive();
    let reports = budget_performance(&transactions, &budgets, &categories, today);
    let insights = generate_insights(&transactions, &reports, &categories, today);

    let synced = cash_compass::notifications::sync_budget_alerts(&conn, &user.id, &reports)
        .and_then(|n| Ok(n + cash_compass::notifications::sync_outlier_alerts(&conn, &user.id, &insights)?));
    if let Err(e) = synced {
        return store_error(e);
    }

    ok_json(insights)
}

// ============================================================================
// Misc handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> Response {
    ok_json(serde_json::json!({ "status": "ok", "version": cash_compass::VERSION }))
}

// ============================================================================
// Main Server
// ============================================================================

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Auth
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        // Transactions
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/export", get(export_transactions))
        .route(
            "/transactions/:id",
            get(get_transaction).put(update_transaction).delete(delete_transaction),
        )
        // Categories
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        // Budgets
        .route("/budgets", get(list_budgets).post(create_budget))
        .route("/budgets/performance", get(budget_performance_handler))
        .route("/budgets/:id", put(update_budget).delete(delete_budget))
        // Notifications
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", put(mark_all_notifications_read))
        .route("/notifications/:id/read", put(mark_notification_read))
        .route("/notifications/:id", delete(delete_notification))
        // Analytics
        .route("/analytics/overview", get(analytics_overview))
        .route("/analytics/trends", get(analytics_trends))
        .route("/analytics/categories", get(analytics_categories))
        .route("/analytics/insights", get(analytics_insights))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "compass_server=info,cash_compass=info".into()),
        )
        .init();

    let db_path = cash_compass::database_path();
    let conn = Connection::open(&db_path)?;
    cash_compass::setup_database(&conn)?;
    tracing::info!("database ready at {}", db_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let app = Router::new()
        .nest("/api", api_routes(state))
        .layer(CorsLayer::permissive());

    let addr = std::env::var("CASH_COMPASS_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Cash Compass API listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
