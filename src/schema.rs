// 📐 Shape Layer - form input validation
//
// Turns the three raw form fields into typed values. Each failed check has its
// own variant so the form can tell the user exactly what is wrong.

use crate::entities::ExpenseCategory;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("please select a category")]
    MissingCategory,

    #[error("amount {0:?} is not a number")]
    InvalidAmount(String),

    #[error("amount must be greater than zero (got {0})")]
    NonPositiveAmount(f64),

    #[error("please pick a date")]
    MissingDate,

    #[error("date {0:?} is not a valid date (expected YYYY-MM-DD or RFC 3339)")]
    InvalidDate(String),
}

impl ValidationError {
    /// Name of the form field the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingCategory => "category",
            ValidationError::InvalidAmount(_) | ValidationError::NonPositiveAmount(_) => "amount",
            ValidationError::MissingDate | ValidationError::InvalidDate(_) => "date",
        }
    }
}

/// Validated form input, ready to become an `ExpenseRecord`
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseInput {
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: DateTime<Utc>,
}

/// Check all three fields in form order: category, amount, date.
pub fn validate_input(
    category: Option<ExpenseCategory>,
    amount_text: &str,
    date_text: &str,
) -> Result<ExpenseInput, ValidationError> {
    let category = category.ok_or(ValidationError::MissingCategory)?;
    let amount = parse_amount(amount_text)?;
    let date = parse_date(date_text)?;

    Ok(ExpenseInput {
        category,
        amount,
        date,
    })
}

/// Finite and strictly positive
pub fn parse_amount(text: &str) -> Result<f64, ValidationError> {
    let trimmed = text.trim();
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidAmount(text.to_string()))?;

    if !amount.is_finite() {
        return Err(ValidationError::InvalidAmount(text.to_string()));
    }
    if amount <= 0.0 {
        return Err(ValidationError::NonPositiveAmount(amount));
    }

    Ok(amount)
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` (taken as midnight UTC).
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingDate);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidDate(text.to_string()))
}
