//! Payout reconciliation: fetch, validate, aggregate, persist.
//!
//! Runs synchronously per settlement event. Any failing stage stops the run
//! before anything is written.

use crate::error::{FieldIssue, ReconcileError, ValidationError};
use crate::ledger::{CommitOutcome, LedgerWriter};
use crate::model::{Donation, Payout};
use crate::processor::{BalanceTransaction, PayoutNotification};
use crate::source::TransactionSource;
use crate::validator::{self, Totals};
use log::{debug, info, warn};
use std::fmt;

/// Reconciliation stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    ValidatingPayout,
    ValidatingTransactions,
    ValidatingSums,
    Persisting,
    Done,
}

impl Stage {
    /// Prefix used when a failure in this stage is reported.
    pub fn failure_context(&self) -> &'static str {
        match self {
            Stage::Fetching => "stripe transactions unavailable",
            Stage::ValidatingPayout => "stripe payout invalid",
            Stage::ValidatingTransactions => "stripe transactions invalid",
            Stage::ValidatingSums => "stripe sums invalid",
            Stage::Persisting => "ledger commit failed",
            Stage::Done => "reconciliation finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::ValidatingPayout => "validating payout",
            Stage::ValidatingTransactions => "validating transactions",
            Stage::ValidatingSums => "validating sums",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A successfully reconciled payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub payout: Payout,
    pub donations: Vec<Donation>,
    /// `AlreadyRecorded` when the event was a redelivery.
    pub outcome: CommitOutcome,
}

/// Sequences a settlement event through to the ledger.
pub struct Reconciler<'a> {
    source: &'a dyn TransactionSource,
    ledger: &'a dyn LedgerWriter,
}

impl<'a> Reconciler<'a> {
    pub fn new(source: &'a dyn TransactionSource, ledger: &'a dyn LedgerWriter) -> Self {
        Reconciler { source, ledger }
    }

    /// Reconciles one settlement event.
    ///
    /// An already-recorded payout is a success with
    /// [`CommitOutcome::AlreadyRecorded`].
    pub fn reconcile(
        &self,
        notification: &PayoutNotification,
    ) -> Result<Reconciliation, ReconcileError> {
        let result = self.run(notification);
        match &result {
            Ok(done) => info!(
                "Payout {} reconciled ({:?}): {} donations, net {}",
                done.payout.id,
                done.outcome,
                done.donations.len(),
                done.payout.net
            ),
            Err(e) => warn!(
                "Payout {} not reconciled at stage {}: {}",
                notification.id,
                e.stage(),
                e
            ),
        }
        result
    }

    fn run(&self, notification: &PayoutNotification) -> Result<Reconciliation, ReconcileError> {
        let payout_id = notification.id.as_str();

        enter(payout_id, Stage::Fetching);
        let related = self
            .source
            .fetch_related_transactions(payout_id)
            .map_err(|source| ReconcileError::Fetch {
                payout_id: payout_id.to_string(),
                source,
            })?;

        enter(payout_id, Stage::ValidatingPayout);
        validator::validate_payout_notification(Some(notification))
            .map_err(reject(Stage::ValidatingPayout))?;

        enter(payout_id, Stage::ValidatingTransactions);
        validator::validate_payout_transaction(related.payout.as_ref())
            .map_err(reject(Stage::ValidatingTransactions))?;
        validator::validate_charge_transactions(&related.charges)
            .map_err(reject(Stage::ValidatingTransactions))?;
        let payout_tx = related
            .payout
            .as_ref()
            .ok_or(ValidationError::InvalidPayoutTransaction(FieldIssue::Missing))
            .map_err(reject(Stage::ValidatingTransactions))?;

        enter(payout_id, Stage::ValidatingSums);
        let totals = validator::validate_matching_sums(payout_tx, &related.charges)
            .map_err(reject(Stage::ValidatingSums))?;

        enter(payout_id, Stage::Persisting);
        let payout = build_payout(notification, totals)?;
        let donations = related
            .charges
            .iter()
            .enumerate()
            .map(|(index, charge)| build_donation(&payout.id, index, charge))
            .collect::<Result<Vec<_>, _>>()?;
        let outcome = self
            .ledger
            .commit_payout_and_donations(&payout, &donations)
            .map_err(|source| ReconcileError::Persist {
                payout_id: payout.id.clone(),
                source,
            })?;

        enter(payout_id, Stage::Done);
        Ok(Reconciliation {
            payout,
            donations,
            outcome,
        })
    }
}

fn enter(payout_id: &str, stage: Stage) {
    debug!("Payout {}: {}", payout_id, stage);
}

fn reject(stage: Stage) -> impl Fn(ValidationError) -> ReconcileError {
    move |source| ReconcileError::Rejected { stage, source }
}

fn build_payout(
    notification: &PayoutNotification,
    totals: Totals,
) -> Result<Payout, ReconcileError> {
    let created = notification.created_date().ok_or_else(|| {
        reject(Stage::ValidatingPayout)(ValidationError::InvalidPayout(
            FieldIssue::CreatedOutOfRange(notification.created),
        ))
    })?;
    Ok(Payout {
        id: notification.id.clone(),
        created,
        gross: totals.gross,
        fee: totals.fee,
        net: totals.net,
    })
}

fn build_donation(
    payout_id: &str,
    index: usize,
    charge: &BalanceTransaction,
) -> Result<Donation, ReconcileError> {
    let invalid = |issue: FieldIssue| {
        reject(Stage::ValidatingTransactions)(ValidationError::AtIndex {
            index,
            source: Box::new(ValidationError::InvalidChargeTransaction(issue)),
        })
    };

    let created = charge
        .created_date()
        .ok_or_else(|| invalid(FieldIssue::CreatedOutOfRange(charge.created)))?;
    let billing = charge
        .billing_details()
        .ok_or_else(|| invalid(FieldIssue::BillingDetailsMissing))?;
    let client_email = billing
        .email
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| invalid(FieldIssue::EmailMissing))?;
    let client_name = billing
        .name
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| invalid(FieldIssue::NameMissing))?;

    Ok(Donation {
        id: charge.id.clone(),
        created,
        client_name: client_name.to_string(),
        client_email: client_email.to_string(),
        payout_id: payout_id.to_string(),
        gross: charge.amount,
        fee: charge.fee,
        net: charge.net,
    })
}
