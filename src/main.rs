//! Payout Ledger CLI
//!
//! Reconciles settlement events against exported processor transactions
//! and reports on the recorded ledger.
//!
//! # Usage
//!
//! ```bash
//! payout-ledger init
//! payout-ledger reconcile event.json
//! payout-ledger payouts > payouts.csv
//! payout-ledger payout po_123
//! payout-ledger monthly 2025 3
//! payout-ledger audit
//! ```
//!
//! # Environment Variables
//!
//! - `DATA_DIR`: directory holding the ledger files (default `data`)
//! - `TRANSACTIONS_DIR`: directory of `<payout-id>.json` transaction exports
//!   (default `<DATA_DIR>/transactions`)
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use payout_ledger::cli::Command;
use payout_ledger::ledger::audit;
use payout_ledger::report::{monthly_report, payout_report, write_payouts};
use payout_ledger::{
    CommitOutcome, Config, CsvLedger, Error, FileTransactionSource, LedgerReader, Reconciler,
    Result, SettlementEvent,
};
use std::env;
use std::fs;
use std::io;
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let command = Command::parse(env::args().skip(1))?;
    let config = Config::from_env();
    let ledger = CsvLedger::in_dir(&config.data_dir);

    match command {
        Command::Init => {
            ledger.init()?;
            println!("initialized {}", config.data_dir.display());
        }
        Command::Reconcile { event_path } => {
            let body = fs::read(&event_path)?;
            let notification = SettlementEvent::from_slice(&body)?.into_notification()?;

            ledger.init()?;
            let source = FileTransactionSource::new(&config.transactions_dir);
            let done = Reconciler::new(&source, &ledger).reconcile(&notification)?;
            match done.outcome {
                CommitOutcome::Recorded => println!("recorded {}", done.payout.id),
                CommitOutcome::AlreadyRecorded => println!("already recorded {}", done.payout.id),
            }
        }
        Command::Payouts => {
            let payouts = ledger.list_payouts()?;
            write_payouts(&payouts, io::stdout().lock())?;
        }
        Command::Payout { id } => {
            payout_report(&ledger, &id)?.write_csv(io::stdout().lock())?;
        }
        Command::Monthly { year, month } => {
            monthly_report(&ledger, year, month)?.write_csv(io::stdout().lock())?;
        }
        Command::Audit => {
            let findings = audit(&ledger)?;
            if !findings.is_empty() {
                for finding in &findings {
                    println!("{}", finding);
                }
                return Err(Error::AuditFailed {
                    count: findings.len(),
                });
            }
            println!("ledger consistent");
        }
    }

    Ok(())
}
