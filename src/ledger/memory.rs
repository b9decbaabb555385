//! In-memory ledger with the same commit semantics as the CSV store.

use super::{check_batch, pending_donations, CommitOutcome, LedgerReader, LedgerWriter};
use crate::error::LedgerError;
use crate::model::{Donation, Payout};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Tables {
    payouts: Vec<Payout>,
    donations: Vec<Donation>,
}

/// A ledger held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    tables: Mutex<Tables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger pre-populated with rows, bypassing commit checks.
    pub fn with_rows(payouts: Vec<Payout>, donations: Vec<Donation>) -> Self {
        MemoryLedger {
            tables: Mutex::new(Tables { payouts, donations }),
        }
    }
}

impl LedgerReader for MemoryLedger {
    fn list_payouts(&self) -> Result<Vec<Payout>, LedgerError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.payouts.clone())
    }

    fn list_donations(&self) -> Result<Vec<Donation>, LedgerError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.donations.clone())
    }
}

impl LedgerWriter for MemoryLedger {
    fn commit_payout_and_donations(
        &self,
        payout: &Payout,
        donations: &[Donation],
    ) -> Result<CommitOutcome, LedgerError> {
        check_batch(payout, donations)?;

        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if tables.payouts.iter().any(|p| p.id == payout.id) {
            return Ok(CommitOutcome::AlreadyRecorded);
        }

        let pending: Vec<Donation> = pending_donations(&tables.donations, donations)?
            .into_iter()
            .cloned()
            .collect();
        tables.donations.extend(pending);
        tables.payouts.push(payout.clone());
        Ok(CommitOutcome::Recorded)
    }
}
