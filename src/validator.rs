//! Reconciliation checks on processor records.
//!
//! Pure functions with no I/O. Each returns the specific condition that
//! failed so callers can report exactly which invariant broke.

use crate::error::{FieldIssue, ValidationError};
use crate::money::Cents;
use crate::processor::{BalanceTransaction, PayoutNotification, SourceObject, TransactionType};

/// Gross, fee and net totals of a validated charge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub gross: Cents,
    pub fee: Cents,
    pub net: Cents,
}

/// Checks that a payout notification describes a completed settlement.
pub fn validate_payout_notification(
    payout: Option<&PayoutNotification>,
) -> Result<(), ValidationError> {
    let invalid = ValidationError::InvalidPayout;
    let payout = payout.ok_or(invalid(FieldIssue::Missing))?;

    if payout.id.is_empty() {
        return Err(invalid(FieldIssue::IdMissing));
    }
    check_created(payout.created).map_err(invalid)?;
    if payout.status != "paid" {
        return Err(invalid(FieldIssue::StatusNotPaid(payout.status.clone())));
    }
    if payout.reconciliation_status != "completed" {
        return Err(invalid(FieldIssue::ReconciliationNotCompleted(
            payout.reconciliation_status.clone(),
        )));
    }
    Ok(())
}

/// Checks the processor's ledger line for the outgoing payout.
///
/// A payout debits the processor balance, so amount and net are negative
/// and no fee is charged on it.
pub fn validate_payout_transaction(
    tx: Option<&BalanceTransaction>,
) -> Result<(), ValidationError> {
    let invalid = ValidationError::InvalidPayoutTransaction;
    let tx = tx.ok_or(invalid(FieldIssue::Missing))?;

    if tx.kind != TransactionType::Payout {
        return Err(invalid(FieldIssue::WrongType {
            expected: TransactionType::Payout,
            actual: tx.kind,
        }));
    }
    if tx.id.is_empty() {
        return Err(invalid(FieldIssue::IdMissing));
    }
    check_created(tx.created).map_err(invalid)?;
    if !tx.amount.is_negative() {
        return Err(invalid(FieldIssue::AmountNotNegative(tx.amount)));
    }
    if !tx.fee.is_zero() {
        return Err(invalid(FieldIssue::FeeNotZero(tx.fee)));
    }
    if !tx.net.is_negative() {
        return Err(invalid(FieldIssue::NetNotNegative(tx.net)));
    }
    Ok(())
}

/// Checks one customer charge contributing to a payout.
pub fn validate_charge_transaction(
    tx: Option<&BalanceTransaction>,
) -> Result<(), ValidationError> {
    let invalid = ValidationError::InvalidChargeTransaction;
    let tx = tx.ok_or(invalid(FieldIssue::Missing))?;

    match tx.kind {
        TransactionType::Charge => {}
        TransactionType::StripeFee => {
            return Err(ValidationError::UnexpectedFeeLine { id: tx.id.clone() });
        }
        other => {
            return Err(invalid(FieldIssue::WrongType {
                expected: TransactionType::Charge,
                actual: other,
            }));
        }
    }
    if tx.id.is_empty() {
        return Err(invalid(FieldIssue::IdMissing));
    }
    check_created(tx.created).map_err(invalid)?;
    if !tx.amount.is_positive() {
        return Err(invalid(FieldIssue::AmountNotPositive(tx.amount)));
    }
    if !tx.fee.is_positive() {
        return Err(invalid(FieldIssue::FeeNotPositive(tx.fee)));
    }
    if !tx.net.is_positive() {
        return Err(invalid(FieldIssue::NetNotPositive(tx.net)));
    }
    if tx.amount.checked_sub(tx.fee) != Some(tx.net) {
        return Err(invalid(FieldIssue::NetMismatch {
            amount: tx.amount,
            fee: tx.fee,
            net: tx.net,
        }));
    }

    let charge = match &tx.source {
        None => return Err(invalid(FieldIssue::SourceMissing)),
        Some(SourceObject::Id(id)) => {
            return Err(invalid(FieldIssue::ChargeNotExpanded(id.clone())));
        }
        Some(SourceObject::Charge(charge)) => charge,
    };
    let billing = charge
        .billing_details
        .as_ref()
        .ok_or(invalid(FieldIssue::BillingDetailsMissing))?;
    if is_blank(billing.email.as_deref()) {
        return Err(invalid(FieldIssue::EmailMissing));
    }
    if is_blank(billing.name.as_deref()) {
        return Err(invalid(FieldIssue::NameMissing));
    }
    Ok(())
}

/// Checks every charge in order, stopping at the first failure and
/// reporting its index.
pub fn validate_charge_transactions(charges: &[BalanceTransaction]) -> Result<(), ValidationError> {
    if charges.is_empty() {
        return Err(ValidationError::EmptyChargeSet);
    }
    for (index, charge) in charges.iter().enumerate() {
        validate_charge_transaction(Some(charge)).map_err(|e| ValidationError::AtIndex {
            index,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

/// Proves the payout figure is fully explained by the charges.
///
/// Computes `gross = sum(amount)`, `fee = sum(fee)` and `net = gross - fee`
/// over the charges and requires `-payout_tx.amount == net` exactly.
pub fn validate_matching_sums(
    payout_tx: &BalanceTransaction,
    charges: &[BalanceTransaction],
) -> Result<Totals, ValidationError> {
    let gross = Cents::checked_sum(charges.iter().map(|c| c.amount))
        .ok_or(ValidationError::AmountOverflow)?;
    let fee =
        Cents::checked_sum(charges.iter().map(|c| c.fee)).ok_or(ValidationError::AmountOverflow)?;
    let net = gross
        .checked_sub(fee)
        .ok_or(ValidationError::AmountOverflow)?;
    let expected = payout_tx
        .amount
        .checked_neg()
        .ok_or(ValidationError::AmountOverflow)?;

    if expected != net {
        return Err(ValidationError::SumMismatch {
            expected,
            actual: net,
        });
    }
    Ok(Totals { gross, fee, net })
}

fn check_created(created: i64) -> Result<(), FieldIssue> {
    if created <= 0 {
        return Err(FieldIssue::CreatedNotPositive);
    }
    if crate::processor::date_from_timestamp(created).is_none() {
        return Err(FieldIssue::CreatedOutOfRange(created));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
