// 🏷️ Category Entity - the fixed set of expense categories
//
// Categories are a closed enum: no registry, no hierarchy. The display name is
// also the serialized form, so the durable JSON reads "category": "Food".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// EXPENSE CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Food,
    Transport,
    Entertainment,
    Shopping,
    Health,
    Other,
}

impl ExpenseCategory {
    /// Every category, in selector order
    pub const ALL: [ExpenseCategory; 6] = [
        ExpenseCategory::Food,
        ExpenseCategory::Transport,
        ExpenseCategory::Entertainment,
        ExpenseCategory::Shopping,
        ExpenseCategory::Health,
        ExpenseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Food => "Food",
            ExpenseCategory::Transport => "Transport",
            ExpenseCategory::Entertainment => "Entertainment",
            ExpenseCategory::Shopping => "Shopping",
            ExpenseCategory::Health => "Health",
            ExpenseCategory::Other => "Other",
        }
    }

    /// Position in `ALL`, used by the form's selector
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0:?}")]
pub struct ParseCategoryError(pub String);

impl FromStr for ExpenseCategory {
    type Err = ParseCategoryError;

    /// Case-insensitive match on the display name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
