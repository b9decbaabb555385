//! Append-only ledger of reconciled payouts and their donations.
//!
//! Readers and the writer are separate capabilities so report code can only
//! ever see the ledger read-only. `CsvLedger` is the durable implementation;
//! `MemoryLedger` holds the same semantics in memory.

mod audit;
mod csv_store;
mod memory;

pub use audit::{audit, Inconsistency};
pub use csv_store::CsvLedger;
pub use memory::MemoryLedger;

use crate::error::LedgerError;
use crate::model::{Donation, Payout};
use crate::money::Cents;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Result of committing a payout batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The payout and its donations were written.
    Recorded,
    /// The payout id was already in the ledger; nothing was written.
    AlreadyRecorded,
}

/// Read-only access to the ledger.
pub trait LedgerReader: Send + Sync {
    fn list_payouts(&self) -> Result<Vec<Payout>, LedgerError>;

    fn list_donations(&self) -> Result<Vec<Donation>, LedgerError>;

    fn get_payout_by_id(&self, id: &str) -> Result<Payout, LedgerError> {
        self.list_payouts()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| LedgerError::PayoutNotFound { id: id.to_string() })
    }

    /// Payouts created within `[start, end]`, both ends inclusive.
    ///
    /// An empty result is an error: "no data for the period" must be
    /// reported, not rendered as an empty report.
    fn get_payouts_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Payout>, LedgerError> {
        let payouts: Vec<Payout> = self
            .list_payouts()?
            .into_iter()
            .filter(|p| p.created >= start && p.created <= end)
            .collect();
        if payouts.is_empty() {
            return Err(LedgerError::EmptyRange { start, end });
        }
        Ok(payouts)
    }

    /// Donations of one payout; may legitimately be empty.
    fn get_donations_by_payout_id(&self, payout_id: &str) -> Result<Vec<Donation>, LedgerError> {
        Ok(self
            .list_donations()?
            .into_iter()
            .filter(|d| d.payout_id == payout_id)
            .collect())
    }
}

/// Write access to the ledger.
pub trait LedgerWriter: Send + Sync {
    /// Records a payout together with all of its donations.
    ///
    /// Committing a payout id that is already recorded writes nothing and
    /// returns [`CommitOutcome::AlreadyRecorded`].
    fn commit_payout_and_donations(
        &self,
        payout: &Payout,
        donations: &[Donation],
    ) -> Result<CommitOutcome, LedgerError>;
}

/// Rejects a batch that could never be a valid ledger entry.
pub(crate) fn check_batch(payout: &Payout, donations: &[Donation]) -> Result<(), LedgerError> {
    let invalid = |message: String| LedgerError::InvalidBatch {
        payout_id: payout.id.clone(),
        message,
    };

    if payout.id.is_empty() {
        return Err(invalid("payout id is empty".to_string()));
    }
    if !payout.check_invariant() {
        return Err(invalid(format!(
            "payout net {} != gross {} - fee {}",
            payout.net, payout.gross, payout.fee
        )));
    }
    if donations.is_empty() {
        return Err(invalid("no donations".to_string()));
    }

    let mut seen = HashSet::new();
    for donation in donations {
        if donation.id.is_empty() {
            return Err(invalid("donation id is empty".to_string()));
        }
        if !seen.insert(donation.id.as_str()) {
            return Err(invalid(format!("donation {} appears twice", donation.id)));
        }
        if donation.payout_id != payout.id {
            return Err(invalid(format!(
                "donation {} belongs to payout {}",
                donation.id, donation.payout_id
            )));
        }
        if donation.client_name.trim().is_empty() || donation.client_email.trim().is_empty() {
            return Err(invalid(format!(
                "donation {} has no client name or email",
                donation.id
            )));
        }
        if !donation.check_invariant() {
            return Err(invalid(format!(
                "donation {} amounts are not positive with net = gross - fee",
                donation.id
            )));
        }
    }

    let gross = Cents::checked_sum(donations.iter().map(|d| d.gross));
    let fee = Cents::checked_sum(donations.iter().map(|d| d.fee));
    if gross != Some(payout.gross) || fee != Some(payout.fee) {
        return Err(invalid(format!(
            "donations do not sum to payout gross {} fee {}",
            payout.gross, payout.fee
        )));
    }
    Ok(())
}

/// Selects the donations of a batch that still need writing.
///
/// A donation already recorded under the same payout is skipped: it is left
/// over from an interrupted commit of this very batch. One recorded under a
/// different payout is a conflict.
pub(crate) fn pending_donations<'a>(
    existing: &[Donation],
    donations: &'a [Donation],
) -> Result<Vec<&'a Donation>, LedgerError> {
    let recorded: HashMap<&str, &str> = existing
        .iter()
        .map(|d| (d.id.as_str(), d.payout_id.as_str()))
        .collect();

    let mut pending = Vec::with_capacity(donations.len());
    for donation in donations {
        match recorded.get(donation.id.as_str()) {
            None => pending.push(donation),
            Some(owner) if *owner == donation.payout_id => {}
            Some(owner) => {
                return Err(LedgerError::DonationConflict {
                    id: donation.id.clone(),
                    existing_payout_id: owner.to_string(),
                });
            }
        }
    }
    Ok(pending)
}
