// 📊 Aggregation - expenses grouped by date, then by category
//
// Pure projection, recomputed on every read. Groups come out in the order
// their date was first seen while scanning the list; categories likewise
// within a group. No sorting happens here.

use crate::entities::{ExpenseCategory, ExpenseRecord};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub categories: Vec<CategoryTotal>,
}

impl DateGroup {
    /// `YYYY-MM-DD`
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn total(&self) -> f64 {
        self.categories.iter().map(|c| c.total).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupedView {
    pub groups: Vec<DateGroup>,
}

impl GroupedView {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn grand_total(&self) -> f64 {
        self.groups.iter().map(DateGroup::total).sum()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DateGroup> {
        self.groups.iter().find(|g| g.date == date)
    }
}

/// Single pass over `records`, O(n).
pub fn aggregate(records: &[ExpenseRecord]) -> GroupedView {
    let mut by_date: IndexMap<NaiveDate, IndexMap<ExpenseCategory, f64>> = IndexMap::new();

    for record in records {
        let totals = by_date.entry(record.calendar_date()).or_default();
        *totals.entry(record.category).or_insert(0.0) += record.amount;
    }

    let groups = by_date
        .into_iter()
        .map(|(date, totals)| DateGroup {
            date,
            categories: totals
                .into_iter()
                .map(|(category, total)| CategoryTotal { category, total })
                .collect(),
        })
        .collect();

    GroupedView { groups }
}

// ============================================================================
// TESTS
// ============================================================================
