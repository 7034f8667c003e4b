use anyhow::Context;
use dotenv::dotenv;
use serde::Deserialize;
use std::path::PathBuf;

use crate::store::DEFAULT_STORAGE_KEY;

/// Settings read from `EXPENSES_*` environment variables (or a `.env` file)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Where logs go while the terminal form owns the screen
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("expenses.db")
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("expense-ledger.log")
}

impl Config {
    pub fn new() -> Result<Self, anyhow::Error> {
        // A missing .env is normal
        dotenv().ok();

        let config = envy::prefixed("EXPENSES_")
            .from_env::<Self>()
            .context("invalid EXPENSES_* environment variables")?;

        Ok(config)
    }

    /// Build from an explicit set of variables instead of the process environment
    pub fn from_vars<I>(vars: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("EXPENSES_")
            .from_iter(vars)
            .context("invalid EXPENSES_* variables")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            storage_key: default_storage_key(),
            log_file: default_log_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage_key, "expenses");
    }

    #[test]
    fn test_overrides() {
        let vars = vec![
            ("EXPENSES_DB_PATH".to_string(), "/tmp/ledger.db".to_string()),
            ("EXPENSES_STORAGE_KEY".to_string(), "household".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config = Config::from_vars(vars).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.storage_key, "household");
        assert_eq!(config.log_file, PathBuf::from("expense-ledger.log"));
    }
}
