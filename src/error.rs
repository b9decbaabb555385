//! Error types for payout reconciliation and the ledger.

use crate::money::Cents;
use crate::processor::TransactionType;
use crate::reconcile::Stage;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level errors surfaced by the binary.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read an input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The ledger audit found inconsistencies
    #[error("ledger audit found {count} inconsistencies")]
    AuditFailed { count: usize },
}

/// Command-line usage errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UsageError {
    #[error("Missing command. Usage: payout-ledger <init|reconcile|payouts|payout|monthly|audit> [args]")]
    MissingCommand,

    #[error("Unknown command {0:?}")]
    UnknownCommand(String),

    #[error("Missing argument <{0}>")]
    MissingArgument(&'static str),

    #[error("Invalid value {value:?} for <{name}>")]
    InvalidArgument { name: &'static str, value: String },

    #[error("Unexpected argument {0:?}")]
    UnexpectedArgument(String),
}

/// Errors raised while decoding an inbound settlement event.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any event other than a completed payout reconciliation
    #[error("unrecognized event type {kind:?}")]
    Unrecognized { kind: String },
}

/// The precise field that failed a validation check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    #[error("is missing")]
    Missing,

    #[error("id is missing")]
    IdMissing,

    #[error("created is not positive")]
    CreatedNotPositive,

    #[error("created {0} is out of range")]
    CreatedOutOfRange(i64),

    #[error("status is not paid (got {0:?})")]
    StatusNotPaid(String),

    #[error("reconciliation status is not completed (got {0:?})")]
    ReconciliationNotCompleted(String),

    #[error("type is not {expected} (got {actual})")]
    WrongType {
        expected: TransactionType,
        actual: TransactionType,
    },

    #[error("amount is not negative (got {0})")]
    AmountNotNegative(Cents),

    #[error("amount is not positive (got {0})")]
    AmountNotPositive(Cents),

    #[error("fee is not 0 (got {0})")]
    FeeNotZero(Cents),

    #[error("fee is not positive (got {0})")]
    FeeNotPositive(Cents),

    #[error("net is not negative (got {0})")]
    NetNotNegative(Cents),

    #[error("net is not positive (got {0})")]
    NetNotPositive(Cents),

    #[error("net {net} is not amount {amount} minus fee {fee}")]
    NetMismatch { amount: Cents, fee: Cents, net: Cents },

    #[error("source is missing")]
    SourceMissing,

    #[error("charge object is not expanded (source {0:?})")]
    ChargeNotExpanded(String),

    #[error("billing details are missing")]
    BillingDetailsMissing,

    #[error("email is missing")]
    EmailMissing,

    #[error("name is missing")]
    NameMissing,
}

/// A reconciliation invariant that does not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payout {0}")]
    InvalidPayout(FieldIssue),

    #[error("payout transaction {0}")]
    InvalidPayoutTransaction(FieldIssue),

    #[error("charge transaction {0}")]
    InvalidChargeTransaction(FieldIssue),

    /// A processor fee line showed up where only customer charges belong
    #[error("stripe_fee transactions were not expected (id {id:?})")]
    UnexpectedFeeLine { id: String },

    #[error("charge set is empty")]
    EmptyChargeSet,

    /// A failure inside a list, tagged with the element's position
    #[error("index {index}: {source}")]
    AtIndex {
        index: usize,
        source: Box<ValidationError>,
    },

    #[error("payout amount does not match total charges minus fees. amount {expected} != net {actual}")]
    SumMismatch { expected: Cents, actual: Cents },

    #[error("charge totals overflow")]
    AmountOverflow,
}

impl ValidationError {
    /// Returns the innermost condition, unwrapping any index context.
    pub fn root(&self) -> &ValidationError {
        match self {
            ValidationError::AtIndex { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised by a transaction source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no transactions found for payout {payout_id}")]
    NotFound { payout_id: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors raised by the ledger store.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A stored row that cannot be loaded as a valid record
    #[error("corrupt record in {} at line {line}: {message}", .path.display())]
    CorruptRecord {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("payout not found: {id}")]
    PayoutNotFound { id: String },

    #[error("no payouts found between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    /// Another writer holds the ledger lock
    #[error("ledger is locked by another writer ({})", .path.display())]
    Locked { path: PathBuf },

    /// The staged file does not hold the rows that were written to it
    #[error("staged file {} holds {actual} rows, expected {expected}", .path.display())]
    StagingMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("invalid batch for payout {payout_id}: {message}")]
    InvalidBatch { payout_id: String, message: String },

    /// A donation id is already recorded under a different payout
    #[error("donation {id} is already recorded for payout {existing_payout_id}")]
    DonationConflict {
        id: String,
        existing_payout_id: String,
    },
}

/// Errors raised while building or writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("report totals overflow")]
    TotalsOverflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised by the reconciliation orchestrator.
///
/// Each variant keeps the underlying condition intact and adds the stage in
/// which it occurred.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("fetching transactions for payout {payout_id} failed: {source}")]
    Fetch {
        payout_id: String,
        source: FetchError,
    },

    #[error("{}: {source}", .stage.failure_context())]
    Rejected {
        stage: Stage,
        source: ValidationError,
    },

    #[error("recording payout {payout_id} failed: {source}")]
    Persist {
        payout_id: String,
        source: LedgerError,
    },
}

impl ReconcileError {
    /// Stage in which reconciliation stopped.
    pub fn stage(&self) -> Stage {
        match self {
            ReconcileError::Fetch { .. } => Stage::Fetching,
            ReconcileError::Rejected { stage, .. } => *stage,
            ReconcileError::Persist { .. } => Stage::Persisting,
        }
    }

    /// Whether redelivering the same event may succeed.
    ///
    /// Validation failures need upstream data correction; fetch and
    /// persistence failures leave nothing committed and can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Fetch { .. } => true,
            ReconcileError::Rejected { .. } => false,
            ReconcileError::Persist { source, .. } => match source {
                LedgerError::Io(_) | LedgerError::Locked { .. } | LedgerError::StagingMismatch { .. } => {
                    true
                }
                LedgerError::Csv(e) => e.is_io_error(),
                _ => false,
            },
        }
    }

    /// The validation condition behind a rejection, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            ReconcileError::Rejected { source, .. } => Some(source),
            _ => None,
        }
    }
}
