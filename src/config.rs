//! Runtime configuration from the environment.

use std::env;
use std::path::PathBuf;

/// Directory holding `payouts.csv` and `donations.csv`.
pub const DATA_DIR_VAR: &str = "DATA_DIR";

/// Directory holding exported processor transactions, one file per payout.
pub const TRANSACTIONS_DIR_VAR: &str = "TRANSACTIONS_DIR";

const DEFAULT_DATA_DIR: &str = "data";

/// Paths the binary works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub transactions_dir: PathBuf,
}

impl Config {
    /// Reads configuration from `DATA_DIR` and `TRANSACTIONS_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from any variable lookup; empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = var(DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let transactions_dir = var(TRANSACTIONS_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("transactions"));

        Config {
            data_dir,
            transactions_dir,
        }
    }
}
