// 💸 Expense Entity - one user-entered expense
//
// Identity: UUID (assigned at creation, never changes)
// Values: category, amount, date (immutable once recorded)

use crate::entities::ExpenseCategory;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Stable identity (UUID v4)
    pub id: String,

    pub category: ExpenseCategory,

    /// Always finite and > 0 for records built through the store
    pub amount: f64,

    /// Serialized as RFC 3339
    pub date: DateTime<Utc>,
}

impl ExpenseRecord {
    /// Create a record with a fresh UUID.
    ///
    /// Does not validate; the store checks input before calling this.
    pub fn new(category: ExpenseCategory, amount: f64, date: DateTime<Utc>) -> Self {
        ExpenseRecord {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            amount,
            date,
        }
    }

    /// UTC calendar date of the record, time of day discarded
    pub fn calendar_date(&self) -> NaiveDate {
        self.date.date_naive()
    }
}
