// 💾 Expense Store - authoritative list of records, write-through to storage
//
// Memory is mutated first, then the full list is written under a single key.
// A failed write leaves memory ahead of storage; the store remembers that so
// callers can report it and retry with `sync`.

use crate::aggregation::{aggregate, GroupedView};
use crate::db::KeyValueStore;
use crate::entities::{ExpenseCategory, ExpenseRecord};
use crate::schema::{validate_input, ValidationError};
use anyhow::{Context, Result};

pub const DEFAULT_STORAGE_KEY: &str = "expenses";

pub struct ExpenseStore<S: KeyValueStore> {
    storage: S,
    key: String,
    /// Newest first by insertion
    records: Vec<ExpenseRecord>,
    last_persist_error: Option<String>,
    /// Set when the durable list could not be read at startup. Writes merge
    /// with a fresh read instead of overwriting while this is set.
    load_error: Option<String>,
}

impl<S: KeyValueStore> ExpenseStore<S> {
    /// Build the store and load whatever is already persisted under `key`
    pub fn open(storage: S, key: impl Into<String>) -> Self {
        let mut store = ExpenseStore {
            storage,
            key: key.into(),
            records: Vec::new(),
            last_persist_error: None,
            load_error: None,
        };

        match store.read_stored() {
            Ok(records) => store.records = records,
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(key = %store.key, error = %message, "failed to read expenses, history not loaded");
                store.load_error = Some(message);
            }
        }

        store
    }

    /// Read the durable list without touching memory.
    ///
    /// Absent key, unreadable storage and malformed JSON all yield an empty
    /// list; the latter two are logged.
    pub fn load(&self) -> Vec<ExpenseRecord> {
        self.read_stored().unwrap_or_else(|err| {
            tracing::warn!(key = %self.key, error = %format!("{err:#}"), "failed to read expenses");
            Vec::new()
        })
    }

    /// Only storage failures are errors; malformed JSON reads as empty
    fn read_stored(&self) -> Result<Vec<ExpenseRecord>> {
        let raw = match self.storage.get(&self.key)? {
            Some(raw) => raw,
            None => {
                tracing::debug!(key = %self.key, "no stored expenses");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_str::<Vec<ExpenseRecord>>(&raw) {
            Ok(records) => {
                tracing::debug!(key = %self.key, count = records.len(), "loaded expenses");
                Ok(records)
            }
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "stored expenses are malformed, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Validate, prepend and persist a new record.
    ///
    /// Validation failures change nothing. A persistence failure is logged and
    /// recorded (see `needs_sync`) but the record stays in memory.
    pub fn add(
        &mut self,
        category: Option<ExpenseCategory>,
        amount_text: &str,
        date_text: &str,
    ) -> Result<ExpenseRecord, ValidationError> {
        let input = validate_input(category, amount_text, date_text)?;
        let record = ExpenseRecord::new(input.category, input.amount, input.date);

        self.records.insert(0, record.clone());
        tracing::debug!(id = %record.id, category = %record.category, amount = record.amount, "expense added");

        if let Err(err) = self.persist() {
            tracing::error!(error = %format!("{err:#}"), "failed to persist expenses");
        }

        Ok(record)
    }

    /// Empty the list and delete the durable entry.
    ///
    /// Memory is emptied even when the delete fails. An unread history is
    /// discarded too: clearing is an explicit wipe.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.load_error = None;
        tracing::debug!(key = %self.key, "expenses cleared");

        self.persist().map_err(|err| {
            tracing::error!(error = %format!("{err:#}"), "failed to clear stored expenses");
            err
        })
    }

    /// Re-attempt the last write so storage matches memory again
    pub fn sync(&mut self) -> Result<()> {
        self.persist()?;
        tracing::info!(key = %self.key, count = self.records.len(), "storage back in sync");
        Ok(())
    }

    /// True when storage and memory may differ: the last write failed or the
    /// stored history was never read
    pub fn needs_sync(&self) -> bool {
        self.last_persist_error.is_some() || self.load_error.is_some()
    }

    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Why the stored history could not be read at startup, if it could not
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn records(&self) -> &[ExpenseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn grouped(&self) -> GroupedView {
        aggregate(&self.records)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Fold the unread history back in behind the records added since startup
    fn recover_unread_history(&mut self) -> Result<()> {
        if self.load_error.is_none() {
            return Ok(());
        }

        let stored = self
            .read_stored()
            .context("stored expenses still unreadable, refusing to overwrite them")?;
        let count = stored.len();
        for record in stored {
            if !self.records.iter().any(|r| r.id == record.id) {
                self.records.push(record);
            }
        }

        self.load_error = None;
        tracing::info!(key = %self.key, recovered = count, "stored expenses recovered");
        Ok(())
    }

    /// Write the whole list, or delete the key when the list is empty
    fn persist(&mut self) -> Result<()> {
        let result = self.recover_unread_history().and_then(|()| {
            if self.records.is_empty() {
                self.storage.delete(&self.key)
            } else {
                serde_json::to_string(&self.records)
                    .context("Failed to serialize expenses")
                    .and_then(|json| self.storage.set(&self.key, &json))
            }
        });

        self.last_persist_error = result.as_ref().err().map(|err| format!("{err:#}"));
        result
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use anyhow::bail;
    use chrono::NaiveDate;

    /// Memory store whose reads or writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            if self.fail_reads {
                bail!("database is locked");
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn delete(&mut self, key: &str) -> Result<()> {
            if self.fail_writes {
                bail!("disk full");
            }
            self.inner.delete(key)
        }
    }

    fn stored(store: &ExpenseStore<impl KeyValueStore>) -> Option<Vec<ExpenseRecord>> {
        store
            .storage()
            .get(store.key())
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    fn new_store() -> ExpenseStore<MemoryStore> {
        ExpenseStore::open(MemoryStore::new(), DEFAULT_STORAGE_KEY)
    }

    #[test]
    fn test_open_empty() {
        let store = new_store();
        assert!(store.is_empty());
        assert!(store.grouped().is_empty());
        assert!(!store.needs_sync());
    }

    #[test]
    fn test_add_prepends_and_persists() {
        let mut store = new_store();
        store.add(Some(ExpenseCategory::Transport), "3", "2024-01-01").unwrap();
        let record = store
            .add(Some(ExpenseCategory::Food), "12.50", "2024-01-02T12:00:00Z")
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0], record);
        assert_eq!(record.amount, 12.5);

        let persisted = stored(&store).unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0], record);
    }

    #[test]
    fn test_invalid_input_changes_nothing() {
        let mut store = new_store();
        let first = store.add(Some(ExpenseCategory::Food), "1", "2024-01-01").unwrap();
        let before = store.storage().get(DEFAULT_STORAGE_KEY).unwrap();

        let cases = [
            (None, "10", "2024-01-01", ValidationError::MissingCategory),
            (
                Some(ExpenseCategory::Food),
                "abc",
                "2024-01-01",
                ValidationError::InvalidAmount("abc".to_string()),
            ),
            (
                Some(ExpenseCategory::Food),
                "-5",
                "2024-01-01",
                ValidationError::NonPositiveAmount(-5.0),
            ),
            (
                Some(ExpenseCategory::Food),
                "0",
                "2024-01-01",
                ValidationError::NonPositiveAmount(0.0),
            ),
            (Some(ExpenseCategory::Food), "10", "", ValidationError::MissingDate),
        ];

        for (category, amount, date, expected) in cases {
            assert_eq!(store.add(category, amount, date).unwrap_err(), expected);
        }

        assert_eq!(store.records(), &[first]);
        assert_eq!(store.storage().get(DEFAULT_STORAGE_KEY).unwrap(), before);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut store = new_store();
        store.add(Some(ExpenseCategory::Food), "1", "2024-01-01").unwrap();
        store.add(Some(ExpenseCategory::Health), "2", "2024-01-02").unwrap();

        store.clear().unwrap();

        assert!(store.is_empty());
        assert!(!store.storage().contains_key(DEFAULT_STORAGE_KEY));
        assert!(store.load().is_empty());

        // Clearing an empty store is fine too
        store.clear().unwrap();
    }

    #[test]
    fn test_reopen_reproduces_list() {
        let mut store = new_store();
        store.add(Some(ExpenseCategory::Shopping), "20", "2024-03-01").unwrap();
        store.add(Some(ExpenseCategory::Other), "4.5", "2024-03-02").unwrap();
        let expected = store.records().to_vec();

        let reopened = ExpenseStore::open(store.storage().clone(), DEFAULT_STORAGE_KEY);
        assert_eq!(reopened.records(), expected.as_slice());
    }

    #[test]
    fn test_malformed_storage_loads_empty() {
        let mut storage = MemoryStore::new();
        storage.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();

        let mut store = ExpenseStore::open(storage, DEFAULT_STORAGE_KEY);
        assert!(store.is_empty());

        // Next write replaces the bad value
        store.add(Some(ExpenseCategory::Food), "5", "2024-01-01").unwrap();
        assert_eq!(stored(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_memory_and_flags_sync() {
        let mut store = ExpenseStore::open(FlakyStore::default(), DEFAULT_STORAGE_KEY);
        store.storage_mut().fail_writes = true;

        let record = store.add(Some(ExpenseCategory::Food), "7", "2024-01-01").unwrap();

        assert_eq!(store.records(), &[record.clone()]);
        assert!(store.needs_sync());
        assert!(store.last_persist_error().unwrap().contains("disk full"));
        assert!(stored(&store).is_none());

        store.storage_mut().fail_writes = false;
        store.sync().unwrap();

        assert!(!store.needs_sync());
        assert_eq!(stored(&store).unwrap(), vec![record]);
    }

    #[test]
    fn test_failed_clear_reports_error() {
        let mut store = ExpenseStore::open(FlakyStore::default(), DEFAULT_STORAGE_KEY);
        store.add(Some(ExpenseCategory::Food), "7", "2024-01-01").unwrap();
        store.storage_mut().fail_writes = true;

        assert!(store.clear().is_err());
        assert!(store.is_empty());
        assert!(store.needs_sync());
        assert_eq!(stored(&store).unwrap().len(), 1);

        store.storage_mut().fail_writes = false;
        store.sync().unwrap();
        assert!(stored(&store).is_none());
    }

    #[test]
    fn test_grouped_reflects_adds() {
        let mut store = new_store();
        store.add(Some(ExpenseCategory::Transport), "20", "2024-01-02").unwrap();
        store.add(Some(ExpenseCategory::Food), "5", "2024-01-01").unwrap();
        store.add(Some(ExpenseCategory::Food), "10", "2024-01-01").unwrap();

        let view = store.grouped();
        assert_eq!(view.len(), 2);

        let jan1 = view.get(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
        assert_eq!(jan1.categories[0].category, ExpenseCategory::Food);
        assert_eq!(jan1.categories[0].total, 15.0);
        assert_eq!(view.grand_total(), 35.0);
    }

    fn seeded_flaky_store(count: usize) -> (FlakyStore, Vec<ExpenseRecord>) {
        let mut seed = ExpenseStore::open(MemoryStore::new(), DEFAULT_STORAGE_KEY);
        for day in 1..=count {
            seed.add(Some(ExpenseCategory::Food), "2", &format!("2024-01-{day:02}"))
                .unwrap();
        }
        let storage = FlakyStore {
            inner: seed.storage().clone(),
            fail_reads: true,
            fail_writes: false,
        };
        (storage, seed.records().to_vec())
    }

    #[test]
    fn test_unreadable_history_is_flagged() {
        let (storage, _) = seeded_flaky_store(3);
        let store = ExpenseStore::open(storage, DEFAULT_STORAGE_KEY);

        assert!(store.is_empty());
        assert!(store.needs_sync());
        assert!(store.load_error().unwrap().contains("database is locked"));
    }

    #[test]
    fn test_add_after_unreadable_open_keeps_history() {
        let (storage, history) = seeded_flaky_store(3);
        let mut store = ExpenseStore::open(storage, DEFAULT_STORAGE_KEY);

        // Reads come back before the next write
        store.storage_mut().fail_reads = false;
        let record = store.add(Some(ExpenseCategory::Health), "9", "2024-02-01").unwrap();

        let persisted = stored(&store).unwrap();
        assert_eq!(persisted.len(), 4);
        assert_eq!(persisted[0], record);
        assert_eq!(&persisted[1..], history.as_slice());
        assert_eq!(store.records(), persisted.as_slice());
        assert!(!store.needs_sync());
        assert_eq!(store.load_error(), None);
    }

    #[test]
    fn test_still_unreadable_refuses_to_overwrite() {
        let (storage, history) = seeded_flaky_store(3);
        let mut store = ExpenseStore::open(storage, DEFAULT_STORAGE_KEY);

        let record = store.add(Some(ExpenseCategory::Other), "1", "2024-02-01").unwrap();
        assert_eq!(store.records(), &[record.clone()]);
        assert!(store.needs_sync());
        assert!(store.last_persist_error().unwrap().contains("refusing to overwrite"));
        assert!(store.sync().is_err());

        store.storage_mut().fail_reads = false;
        assert_eq!(stored(&store).unwrap(), history);

        store.sync().unwrap();
        let persisted = stored(&store).unwrap();
        assert_eq!(persisted.len(), 4);
        assert_eq!(persisted[0], record);
        assert!(!store.needs_sync());
    }

    #[test]
    fn test_clear_wipes_unread_history() {
        let (storage, _) = seeded_flaky_store(2);
        let mut store = ExpenseStore::open(storage, DEFAULT_STORAGE_KEY);

        store.clear().unwrap();
        assert!(!store.needs_sync());

        store.storage_mut().fail_reads = false;
        assert!(stored(&store).is_none());
    }
}
