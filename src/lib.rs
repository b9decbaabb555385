//! # Payout Ledger
//!
//! Reconciles payment processor payouts against the charges that compose
//! them and records each reconciled payout, with its donations, in an
//! append-only CSV ledger.
//!
//! ## Design Principles
//!
//! - **Integer money**: all amounts are minor currency units (`Cents`)
//! - **Exact sums**: a payout is recorded only when its charges explain it to the unit
//! - **Idempotent commits**: redelivered settlement events are recorded once
//! - **Crash-safe files**: every write is staged, synced, verified, then renamed
//!
//! ## Example
//!
//! ```no_run
//! use payout_ledger::{CsvLedger, FileTransactionSource, Reconciler, SettlementEvent};
//!
//! let ledger = CsvLedger::in_dir("data");
//! ledger.init().unwrap();
//! let source = FileTransactionSource::new("data/transactions");
//!
//! let body = std::fs::read("event.json").unwrap();
//! let notification = SettlementEvent::from_slice(&body)
//!     .unwrap()
//!     .into_notification()
//!     .unwrap();
//! let done = Reconciler::new(&source, &ledger).reconcile(&notification).unwrap();
//! println!("{:?} {}", done.outcome, done.payout.id);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod money;
pub mod processor;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod validator;

pub use config::Config;
pub use error::{
    Error, EventError, FetchError, FieldIssue, LedgerError, ReconcileError, ReportError, Result,
    UsageError, ValidationError,
};
pub use ledger::{CommitOutcome, CsvLedger, LedgerReader, LedgerWriter, MemoryLedger};
pub use model::{Donation, Payout};
pub use money::Cents;
pub use processor::{BalanceTransaction, PayoutNotification, SettlementEvent, TransactionType};
pub use reconcile::{Reconciler, Reconciliation, Stage};
pub use source::{FileTransactionSource, RelatedTransactions, StaticSource, TransactionSource};
