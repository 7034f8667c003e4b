// Expense Ledger - Core Library
// Exposes the store, aggregation and storage backends for the CLI, the
// terminal form and tests

pub mod aggregation;
pub mod config;
pub mod db;
pub mod entities;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use aggregation::{aggregate, CategoryTotal, DateGroup, GroupedView};
pub use config::Config;
pub use db::{setup_database, KeyValueStore, MemoryStore, SqliteStore};
pub use entities::{ExpenseCategory, ExpenseRecord, ParseCategoryError};
pub use schema::{parse_amount, parse_date, validate_input, ExpenseInput, ValidationError};
pub use store::{ExpenseStore, DEFAULT_STORAGE_KEY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
