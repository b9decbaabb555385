//! Transaction sources: where the processor's records for a payout come from.

use crate::error::FetchError;
use crate::processor::{BalanceTransaction, TransactionType};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The processor's records tied to one payout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedTransactions {
    /// The payout's own balance line, if the processor returned one.
    pub payout: Option<BalanceTransaction>,

    /// Every other balance line attributed to the payout.
    pub charges: Vec<BalanceTransaction>,
}

impl RelatedTransactions {
    /// Splits a flat list of balance transactions the way the processor
    /// returns them: the first `payout` line is the settlement itself,
    /// everything else is expected to be a charge.
    pub fn from_list(transactions: Vec<BalanceTransaction>) -> Self {
        let mut related = RelatedTransactions::default();
        for tx in transactions {
            if related.payout.is_none() && tx.kind == TransactionType::Payout {
                related.payout = Some(tx);
            } else {
                related.charges.push(tx);
            }
        }
        related
    }
}

/// Capability to query the processor for a payout's transactions.
pub trait TransactionSource: Send + Sync {
    fn fetch_related_transactions(&self, payout_id: &str)
        -> Result<RelatedTransactions, FetchError>;
}

/// List response as exported from the processor's balance transaction query.
#[derive(Debug, Deserialize)]
struct ListResponse {
    data: Vec<BalanceTransaction>,
}

/// Reads exported list responses from `<dir>/<payout_id>.json`.
///
/// Each file holds `{ "data": [...] }` with the charge sources expanded.
#[derive(Debug, Clone)]
pub struct FileTransactionSource {
    dir: PathBuf,
}

impl FileTransactionSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileTransactionSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn export_path(&self, payout_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", payout_id))
    }
}

impl TransactionSource for FileTransactionSource {
    fn fetch_related_transactions(
        &self,
        payout_id: &str,
    ) -> Result<RelatedTransactions, FetchError> {
        // Payout ids name files; refuse anything that could escape the directory.
        if payout_id.is_empty() || payout_id.contains(['/', '\\']) || payout_id.starts_with('.') {
            return Err(FetchError::NotFound {
                payout_id: payout_id.to_string(),
            });
        }

        let path = self.export_path(payout_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FetchError::NotFound {
                    payout_id: payout_id.to_string(),
                });
            }
            Err(source) => return Err(FetchError::Io { path, source }),
        };

        let list: ListResponse = serde_json::from_slice(&bytes)
            .map_err(|source| FetchError::Decode { path: path.clone(), source })?;
        debug!(
            "Loaded {} balance transactions for payout {} from {}",
            list.data.len(),
            payout_id,
            path.display()
        );
        Ok(RelatedTransactions::from_list(list.data))
    }
}

/// In-memory source keyed by payout id.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    entries: HashMap<String, RelatedTransactions>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payout(mut self, payout_id: impl Into<String>, related: RelatedTransactions) -> Self {
        self.entries.insert(payout_id.into(), related);
        self
    }
}

impl TransactionSource for StaticSource {
    fn fetch_related_transactions(
        &self,
        payout_id: &str,
    ) -> Result<RelatedTransactions, FetchError> {
        self.entries
            .get(payout_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                payout_id: payout_id.to_string(),
            })
    }
}
