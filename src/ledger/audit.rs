//! Cross-file consistency checks.
//!
//! The payout and donation files are committed by two separate renames. A
//! crash between them leaves donations without their payout; the audit
//! surfaces that and any other disagreement between the two files.

use super::LedgerReader;
use crate::error::LedgerError;
use crate::money::Cents;
use log::warn;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A disagreement between the payout and donation files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// The same payout id appears on more than one row.
    DuplicatePayout { payout_id: String },

    /// A recorded payout has no donations.
    PayoutWithoutDonations { payout_id: String },

    /// Donations reference a payout that is not recorded. This is the state
    /// an interrupted commit leaves behind; redelivering the payout's
    /// settlement event completes it.
    OrphanDonations {
        payout_id: String,
        donation_ids: Vec<String>,
    },

    /// A payout's donation amounts overflow when summed.
    TotalsOverflow { payout_id: String },

    /// A payout's donations do not add up to the payout.
    TotalsMismatch {
        payout_id: String,
        payout_gross: Cents,
        payout_fee: Cents,
        donations_gross: Cents,
        donations_fee: Cents,
    },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::DuplicatePayout { payout_id } => {
                write!(f, "payout {} is recorded more than once", payout_id)
            }
            Inconsistency::PayoutWithoutDonations { payout_id } => {
                write!(f, "payout {} has no donations", payout_id)
            }
            Inconsistency::OrphanDonations {
                payout_id,
                donation_ids,
            } => write!(
                f,
                "donations {} reference unrecorded payout {}",
                donation_ids.join(" "),
                payout_id
            ),
            Inconsistency::TotalsOverflow { payout_id } => {
                write!(f, "donations of payout {} overflow when summed", payout_id)
            }
            Inconsistency::TotalsMismatch {
                payout_id,
                payout_gross,
                payout_fee,
                donations_gross,
                donations_fee,
            } => write!(
                f,
                "payout {} gross {} fee {} but donations sum to gross {} fee {}",
                payout_id, payout_gross, payout_fee, donations_gross, donations_fee
            ),
        }
    }
}

/// Scans the whole ledger and reports every inconsistency found.
pub fn audit(reader: &dyn LedgerReader) -> Result<Vec<Inconsistency>, LedgerError> {
    let payouts = reader.list_payouts()?;
    let donations = reader.list_donations()?;

    let mut by_payout: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for donation in &donations {
        by_payout
            .entry(donation.payout_id.as_str())
            .or_default()
            .push(donation);
    }

    let mut found = Vec::new();
    let mut seen = HashSet::new();
    for payout in &payouts {
        if !seen.insert(payout.id.as_str()) {
            found.push(Inconsistency::DuplicatePayout {
                payout_id: payout.id.clone(),
            });
            continue;
        }

        let owned = match by_payout.get(payout.id.as_str()) {
            Some(owned) => owned,
            None => {
                found.push(Inconsistency::PayoutWithoutDonations {
                    payout_id: payout.id.clone(),
                });
                continue;
            }
        };

        let totals = Cents::checked_sum(owned.iter().map(|d| d.gross))
            .zip(Cents::checked_sum(owned.iter().map(|d| d.fee)));
        let (donations_gross, donations_fee) = match totals {
            Some(totals) => totals,
            None => {
                found.push(Inconsistency::TotalsOverflow {
                    payout_id: payout.id.clone(),
                });
                continue;
            }
        };
        if donations_gross != payout.gross || donations_fee != payout.fee {
            found.push(Inconsistency::TotalsMismatch {
                payout_id: payout.id.clone(),
                payout_gross: payout.gross,
                payout_fee: payout.fee,
                donations_gross,
                donations_fee,
            });
        }
    }

    for (payout_id, owned) in &by_payout {
        if !seen.contains(payout_id) {
            found.push(Inconsistency::OrphanDonations {
                payout_id: payout_id.to_string(),
                donation_ids: owned.iter().map(|d| d.id.clone()).collect(),
            });
        }
    }

    for inconsistency in &found {
        warn!("Ledger inconsistency: {}", inconsistency);
    }
    Ok(found)
}
