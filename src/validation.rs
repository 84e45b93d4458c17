// 📐 Request Validation
// Field-level checks applied before anything touches the store.
// Failures carry the field name so the API can return a useful 400 body.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{BudgetPeriod, CategoryKind, TransactionKind};

/// Upper bound on any single amount; anything above this is a typo
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// FIELD CHECKS
// ============================================================================

pub fn check_amount(errors: &mut Vec<ValidationError>, field: &str, amount: f64) {
    if !amount.is_finite() {
        errors.push(ValidationError::new(field, "Amount must be a number"));
    } else if amount <= 0.0 {
        errors.push(ValidationError::new(field, "Amount must be greater than zero"));
    } else if amount > MAX_AMOUNT {
        errors.push(ValidationError::new(field, "Amount is unreasonably large"));
    }
}

/// Parse a `YYYY-MM-DD` date, recording an error on failure
pub fn check_date(errors: &mut Vec<ValidationError>, field: &str, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(ValidationError::new(field, "Expected a date in YYYY-MM-DD form"));
            None
        }
    }
}

pub fn check_text(errors: &mut Vec<ValidationError>, field: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "Must not be empty"));
    } else if value.chars().count() > max_len {
        errors.push(ValidationError::new(
            field,
            &format!("Must be at most {} characters", max_len),
        ));
    }
}

pub fn check_color(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    let ok = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !ok {
        errors.push(ValidationError::new(field, "Expected a #RRGGBB hex color"));
    }
}

// ============================================================================
// PAYLOAD VALIDATORS
// ============================================================================

/// Validate a transaction payload; returns the parsed (kind, date) on success
pub fn validate_transaction(
    kind: &str,
    amount: f64,
    description: &str,
    date: &str,
    notes: Option<&str>,
) -> Result<(TransactionKind, NaiveDate), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let parsed_kind = TransactionKind::parse(kind);
    if parsed_kind.is_none() {
        errors.push(ValidationError::new("kind", "Expected \"income\" or \"expense\""));
    }

    check_amount(&mut errors, "amount", amount);
    check_text(&mut errors, "description", description, 200);
    let parsed_date = check_date(&mut errors, "date", date);

    if let Some(notes) = notes {
        if notes.chars().count() > 500 {
            errors.push(ValidationError::new("notes", "Must be at most 500 characters"));
        }
    }

    match (parsed_kind, parsed_date) {
        (Some(kind), Some(date)) if errors.is_empty() => Ok((kind, date)),
        _ => Err(errors),
    }
}

/// Validate a category payload; returns the parsed kind on success
pub fn validate_category(
    name: &str,
    kind: &str,
    color: Option<&str>,
) -> Result<CategoryKind, Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_text(&mut errors, "name", name, 60);

    let parsed_kind = CategoryKind::parse(kind);
    if parsed_kind.is_none() {
        errors.push(ValidationError::new("kind", "Expected \"expense\" or \"income\""));
    }

    if let Some(color) = color {
        check_color(&mut errors, "color", color);
    }

    match parsed_kind {
        Some(kind) if errors.is_empty() => Ok(kind),
        _ => Err(errors),
    }
}

/// Validate a budget payload; returns the parsed period on success
pub fn validate_budget(amount: f64, period: &str) -> Result<BudgetPeriod, Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_amount(&mut errors, "amount", amount);

    let parsed = BudgetPeriod::parse(period);
    if parsed.is_none() {
        errors.push(ValidationError::new(
            "period",
            "Expected \"weekly\", \"monthly\" or \"yearly\"",
        ));
    }

    match parsed {
        Some(period) if errors.is_empty() => Ok(period),
        _ => Err(errors),
    }
}

/// Validate registration fields (email shape, password length, name)
pub fn validate_registration(email: &str, password: &str, display_name: &str) -> ValidationResult {
    let mut errors = Vec::new();

    let email = email.trim();
    let at = email.find('@');
    let shape_ok = match at {
        Some(pos) => pos > 0 && email[pos + 1..].contains('.') && !email.ends_with('.'),
        None => false,
    };
    if !shape_ok {
        errors.push(ValidationError::new("email", "Expected a valid email address"));
    }

    if password.chars().count() < 8 {
        errors.push(ValidationError::new("password", "Must be at least 8 characters"));
    }

    check_text(&mut errors, "display_name", display_name, 80);

    finish(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transaction() {
        let (kind, date) =
            validate_transaction("expense", 25.0, "Lunch", "2025-03-10", None).unwrap();
        assert_eq!(kind, TransactionKind::Expense);
        assert_eq!(date.to_string(), "2025-03-10");
    }

    #[test]
    fn test_rejects_bad_amount() {
        let errs = validate_transaction("expense", -5.0, "Lunch", "2025-03-10", None).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "amount"));

        let errs = validate_transaction("expense", f64::NAN, "Lunch", "2025-03-10", None).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "amount"));
    }

    #[test]
    fn test_rejects_bad_date_and_kind() {
        let errs = validate_transaction("transfer", 5.0, "x", "03/10/2025", None).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "kind"));
        assert!(errs.iter().any(|e| e.field == "date"));
    }

    #[test]
    fn test_rejects_empty_description() {
        let errs = validate_transaction("income", 5.0, "   ", "2025-03-10", None).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "description"));
    }

    #[test]
    fn test_category_color() {
        assert!(validate_category("Food", "expense", Some("#FF5733")).is_ok());
        let errs = validate_category("Food", "expense", Some("red")).unwrap_err();
        assert!(errs.iter().any(|e| e.field == "color"));
    }

    #[test]
    fn test_budget_period() {
        assert!(validate_budget(100.0, "monthly").is_ok());
        assert!(validate_budget(100.0, "daily").is_err());
        assert!(validate_budget(0.0, "monthly").is_err());
    }

    #[test]
    fn test_registration() {
        assert!(validate_registration("a@b.com", "longenough", "Ada").is_ok());
        assert!(validate_registration("not-an-email", "longenough", "Ada").is_err());
        assert!(validate_registration("a@b.com", "short", "Ada").is_err());
    }
}
