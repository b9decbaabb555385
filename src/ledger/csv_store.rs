//! CSV-backed ledger store.
//!
//! Two flat files, `payouts.csv` and `donations.csv`, each starting with a
//! header row. Every write rebuilds the complete file in a staging file next
//! to it, syncs and re-reads the staged copy, then renames it over the
//! original, so readers only ever see a whole file.

use super::{check_batch, pending_donations, CommitOutcome, LedgerReader, LedgerWriter};
use crate::error::LedgerError;
use crate::model::{Donation, Payout, DONATION_HEADER, PAYOUT_HEADER};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use fs2::FileExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const PAYOUTS_FILE: &str = "payouts.csv";
const DONATIONS_FILE: &str = "donations.csv";
const LOCK_FILE: &str = ".ledger.lock";

/// A row type stored in one of the ledger files.
trait LedgerRecord: Serialize + DeserializeOwned {
    const HEADER: &'static [&'static str];

    /// Checks the record's own invariants after loading.
    fn check(&self) -> Result<(), String>;
}

impl LedgerRecord for Payout {
    const HEADER: &'static [&'static str] = &PAYOUT_HEADER;

    fn check(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("payout id is empty".to_string());
        }
        if !self.check_invariant() {
            return Err(format!(
                "payout {} net {} != gross {} - fee {}",
                self.id, self.net, self.gross, self.fee
            ));
        }
        Ok(())
    }
}

impl LedgerRecord for Donation {
    const HEADER: &'static [&'static str] = &DONATION_HEADER;

    fn check(&self) -> Result<(), String> {
        if self.id.is_empty() || self.payout_id.is_empty() {
            return Err("donation id or payout id is empty".to_string());
        }
        if !self.check_invariant() {
            return Err(format!(
                "donation {} amounts are not positive with net {} = gross {} - fee {}",
                self.id, self.net, self.gross, self.fee
            ));
        }
        Ok(())
    }
}

/// The durable ledger.
///
/// Reads are lock-free. Commits are serialized by an in-process mutex and,
/// across processes, by an exclusive file lock; both are held for
/// the whole read -> stage -> rename sequence over the two files.
#[derive(Debug)]
pub struct CsvLedger {
    payouts_path: PathBuf,
    donations_path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLedger {
    /// Creates a ledger over `payouts.csv` and `donations.csv` in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        CsvLedger {
            payouts_path: dir.join(PAYOUTS_FILE),
            donations_path: dir.join(DONATIONS_FILE),
            lock_path: dir.join(LOCK_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn payouts_path(&self) -> &Path {
        &self.payouts_path
    }

    pub fn donations_path(&self) -> &Path {
        &self.donations_path
    }

    /// Creates the data directory and header-only files where missing.
    pub fn init(&self) -> Result<(), LedgerError> {
        for path in [&self.payouts_path, &self.donations_path] {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = LockFile::acquire(&self.lock_path)?;

        if !self.payouts_path.exists() {
            replace_file::<Payout>(&self.payouts_path, &[], &[])?;
            info!("Created {}", self.payouts_path.display());
        }
        if !self.donations_path.exists() {
            replace_file::<Donation>(&self.donations_path, &[], &[])?;
            info!("Created {}", self.donations_path.display());
        }
        Ok(())
    }
}

impl LedgerReader for CsvLedger {
    fn list_payouts(&self) -> Result<Vec<Payout>, LedgerError> {
        load(&self.payouts_path)
    }

    fn list_donations(&self) -> Result<Vec<Donation>, LedgerError> {
        load(&self.donations_path)
    }
}

impl LedgerWriter for CsvLedger {
    fn commit_payout_and_donations(
        &self,
        payout: &Payout,
        donations: &[Donation],
    ) -> Result<CommitOutcome, LedgerError> {
        check_batch(payout, donations)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = LockFile::acquire(&self.lock_path)?;

        let payouts: Vec<Payout> = load(&self.payouts_path)?;
        if payouts.iter().any(|p| p.id == payout.id) {
            info!("Payout {} already recorded, skipping", payout.id);
            return Ok(CommitOutcome::AlreadyRecorded);
        }

        // Donations go first: if the process dies between the two renames,
        // the next delivery of this payout finds the payout missing and
        // finishes the job instead of reporting it as recorded.
        let existing: Vec<Donation> = load(&self.donations_path)?;
        let pending = pending_donations(&existing, donations)?;
        if pending.len() < donations.len() {
            warn!(
                "Payout {}: {} donations already present from an interrupted commit",
                payout.id,
                donations.len() - pending.len()
            );
        }
        if !pending.is_empty() {
            replace_file(&self.donations_path, &existing, &pending)?;
            debug!(
                "Wrote {} donations to {}",
                pending.len(),
                self.donations_path.display()
            );
        }

        replace_file(&self.payouts_path, &payouts, &[payout])?;
        info!(
            "Recorded payout {} with {} donations (gross {}, fee {}, net {})",
            payout.id,
            donations.len(),
            payout.gross,
            payout.fee,
            payout.net
        );
        Ok(CommitOutcome::Recorded)
    }
}

/// Loads every record of a ledger file, skipping the header row.
fn load<T: LedgerRecord>(path: &Path) -> Result<Vec<T>, LedgerError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(file);
    let header = StringRecord::from(T::HEADER.to_vec());
    let corrupt = |line: u64, message: String| LedgerError::CorruptRecord {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            if e.is_io_error() {
                LedgerError::Csv(e)
            } else {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                corrupt(line, e.to_string())
            }
        })?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 1);

        if idx == 0 {
            if !record.iter().eq(T::HEADER.iter().copied()) {
                return Err(corrupt(
                    line,
                    format!("unexpected header {:?}, expected {:?}", record, header),
                ));
            }
            continue;
        }

        let row: T = record
            .deserialize(Some(&header))
            .map_err(|e| corrupt(line, e.to_string()))?;
        row.check().map_err(|message| corrupt(line, message))?;
        records.push(row);
    }
    Ok(records)
}

/// Atomically replaces `path` with `existing` followed by `new` rows.
///
/// The staging file is removed on failure and the original stays untouched.
fn replace_file<T: LedgerRecord>(
    path: &Path,
    existing: &[T],
    new: &[&T],
) -> Result<(), LedgerError> {
    let staging = staging_path(path);
    let expected = existing.len() + new.len();

    let staged = write_staged(&staging, existing.iter().chain(new.iter().copied()))
        .and_then(|()| verify_staged::<T>(&staging, expected));
    if let Err(e) = staged {
        if staging.is_file() {
            if let Err(cleanup) = fs::remove_file(&staging) {
                warn!("Failed to remove {}: {}", staging.display(), cleanup);
            }
        }
        return Err(e);
    }

    fs::rename(&staging, path)?;
    sync_parent_dir(path);
    Ok(())
}

fn write_staged<'a, T, I>(staging: &Path, rows: I) -> Result<(), LedgerError>
where
    T: LedgerRecord + 'a,
    I: Iterator<Item = &'a T>,
{
    let file = File::create(staging)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record(T::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Re-reads the staged file and checks that every row made it.
fn verify_staged<T: LedgerRecord>(staging: &Path, expected: usize) -> Result<(), LedgerError> {
    let actual = load::<T>(staging)?.len();
    if actual != expected {
        return Err(LedgerError::StagingMismatch {
            path: staging.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => Path::new("."),
    };
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!("Failed to sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

/// Advisory cross-process lock held for the duration of a commit.
///
/// An exclusive `flock` on `.ledger.lock`. The file itself stays in place;
/// the operating system drops the lock when the handle closes or the
/// holding process dies.
struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: &Path) -> Result<Self, LedgerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(LockFile {
                file,
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(LedgerError::Locked {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
