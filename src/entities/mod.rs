// Entity Models
//
// ExpenseCategory is a closed set; ExpenseRecord carries a stable UUID identity
// that never changes once assigned.

pub mod category;
pub mod expense;

pub use category::{ExpenseCategory, ParseCategoryError};
pub use expense::ExpenseRecord;
