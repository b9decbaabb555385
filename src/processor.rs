//! Processor-side record shapes as delivered by the payment processor's API.
//!
//! Every field defaults when absent so that a structurally incomplete record
//! still deserializes and the validator can name exactly which field is
//! wrong, instead of failing with a generic decode error.

use crate::error::EventError;
use crate::money::Cents;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only event type this crate reconciles.
pub const RECONCILIATION_COMPLETED: &str = "payout.reconciliation_completed";

/// Inbound webhook envelope, already authenticated by the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementEvent {
    /// Event type, e.g. `payout.reconciliation_completed`.
    #[serde(rename = "type")]
    pub kind: String,

    pub data: EventData,
}

/// Payload of a settlement event. The object stays untyped until the
/// event type is known.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl SettlementEvent {
    /// Parses a raw event body.
    pub fn from_slice(body: &[u8]) -> Result<Self, EventError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Extracts the payout notification, rejecting every other event type.
    pub fn into_notification(self) -> Result<PayoutNotification, EventError> {
        if self.kind != RECONCILIATION_COMPLETED {
            return Err(EventError::Unrecognized { kind: self.kind });
        }
        Ok(serde_json::from_value(self.data.object)?)
    }
}

/// The payout object carried by a settlement event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutNotification {
    #[serde(default)]
    pub id: String,

    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub reconciliation_status: String,
}

impl PayoutNotification {
    pub fn created_date(&self) -> Option<NaiveDate> {
        date_from_timestamp(self.created)
    }
}

/// Balance transaction type as reported by the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Charge,
    Payment,
    Payout,
    Refund,
    Adjustment,
    /// Processor-internal fee line, never part of a customer charge set.
    StripeFee,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Charge => "charge",
            TransactionType::Payment => "payment",
            TransactionType::Payout => "payout",
            TransactionType::Refund => "refund",
            TransactionType::Adjustment => "adjustment",
            TransactionType::StripeFee => "stripe_fee",
            TransactionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the processor's balance ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTransaction {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: TransactionType,

    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub amount: Cents,

    #[serde(default)]
    pub fee: Cents,

    #[serde(default)]
    pub net: Cents,

    /// The originating object; only expanded charges carry billing details.
    #[serde(default)]
    pub source: Option<SourceObject>,
}

impl BalanceTransaction {
    pub fn created_date(&self) -> Option<NaiveDate> {
        date_from_timestamp(self.created)
    }

    /// Billing details of the expanded source charge, if any.
    pub fn billing_details(&self) -> Option<&BillingDetails> {
        match &self.source {
            Some(SourceObject::Charge(charge)) => charge.billing_details.as_ref(),
            _ => None,
        }
    }
}

/// Source of a balance transaction: either an expanded charge object or a
/// bare identifier when the query did not expand it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceObject {
    Charge(Charge),
    Id(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub billing_details: Option<BillingDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// Converts a Unix timestamp to its UTC calendar day.
pub fn date_from_timestamp(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_yields_notification() {
        let body = br#"{
            "type": "payout.reconciliation_completed",
            "data": { "object": {
                "id": "po_1", "object": "payout", "created": 1710374400,
                "status": "paid", "reconciliation_status": "completed"
            } }
        }"#;

        let notification = SettlementEvent::from_slice(body)
            .unwrap()
            .into_notification()
            .unwrap();
        assert_eq!(notification.id, "po_1");
        assert_eq!(notification.status, "paid");
        assert_eq!(
            notification.created_date().unwrap().to_string(),
            "2024-03-14"
        );
    }

    #[test]
    fn test_event_rejects_other_types() {
        let body = br#"{ "type": "payout.paid", "data": { "object": { "id": "po_1" } } }"#;

        let err = SettlementEvent::from_slice(body)
            .unwrap()
            .into_notification()
            .unwrap_err();
        assert!(matches!(err, EventError::Unrecognized { ref kind } if kind == "payout.paid"));
    }

    #[test]
    fn test_balance_transaction_with_expanded_charge() {
        let json = r#"{
            "id": "txn_1", "type": "charge", "created": 1710000000,
            "amount": 100, "fee": 3, "net": 97,
            "source": { "id": "ch_1", "billing_details": {
                "email": "jane@example.com", "name": "Jane Doe"
            } }
        }"#;

        let tx: BalanceTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, TransactionType::Charge);
        assert_eq!(tx.amount, Cents::new(100));
        let billing = tx.billing_details().unwrap();
        assert_eq!(billing.email.as_deref(), Some("jane@example.com"));
        assert_eq!(billing.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_balance_transaction_with_unexpanded_source() {
        let json = r#"{ "id": "txn_1", "type": "charge", "source": "ch_1" }"#;

        let tx: BalanceTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.source, Some(SourceObject::Id("ch_1".to_string())));
        assert!(tx.billing_details().is_none());
    }

    #[test]
    fn test_unknown_type_and_missing_fields_default() {
        let tx: BalanceTransaction =
            serde_json::from_str(r#"{ "type": "issuing_authorization_hold" }"#).unwrap();
        assert_eq!(tx.kind, TransactionType::Unknown);
        assert_eq!(tx.id, "");
        assert_eq!(tx.created, 0);

        let fee: BalanceTransaction = serde_json::from_str(r#"{ "type": "stripe_fee" }"#).unwrap();
        assert_eq!(fee.kind, TransactionType::StripeFee);
    }
}
