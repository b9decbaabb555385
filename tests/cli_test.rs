//! Integration tests for the payout ledger CLI.
//!
//! These tests run the actual binary against a temporary data directory and
//! the exported processor transactions under `tests/data/transactions`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get path to test data file
fn test_data_path(filename: &str) -> String {
    format!("tests/data/{}", filename)
}

/// Get path to a settlement event fixture
fn event_path(name: &str) -> String {
    test_data_path(&format!("events/{}.json", name))
}

/// The binary, pointed at `data_dir` and the fixture transactions
fn ledger_cmd(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("payout-ledger").unwrap();
    cmd.env("DATA_DIR", data_dir)
        .env("TRANSACTIONS_DIR", test_data_path("transactions"))
        .env_remove("RUST_LOG");
    cmd
}

/// Run a command that must succeed and return stdout
fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let assert = ledger_cmd(data_dir).args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

fn read(data_dir: &Path, file: &str) -> String {
    fs::read_to_string(data_dir.join(file)).unwrap()
}

#[test]
fn test_init_creates_header_only_files() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");

    run_ok(&data_dir, &["init"]);

    assert_eq!(read(&data_dir, "payouts.csv"), "id,created,gross,fee,net\n");
    assert_eq!(
        read(&data_dir, "donations.csv"),
        "id,created,client_name,client_email,payout_id,gross,fee,net\n"
    );
}

#[test]
fn test_reconcile_records_payout_and_donations() {
    let dir = TempDir::new().unwrap();

    let output = run_ok(dir.path(), &["reconcile", &event_path("po_ok")]);
    assert_eq!(output, "recorded po_ok\n");

    assert_eq!(
        read(dir.path(), "payouts.csv"),
        "id,created,gross,fee,net\npo_ok,2024-03-14,300,6,294\n"
    );
    assert_eq!(
        read(dir.path(), "donations.csv"),
        "id,created,client_name,client_email,payout_id,gross,fee,net\n\
         txn_ok_1,2024-03-09,\"Doe, Jane\",jane@example.com,po_ok,100,3,97\n\
         txn_ok_2,2024-03-09,Sam Roe,sam@example.com,po_ok,200,3,197\n"
    );
}

#[test]
fn test_redelivered_event_is_recorded_once() {
    let dir = TempDir::new().unwrap();

    run_ok(dir.path(), &["reconcile", &event_path("po_ok")]);
    let payouts = read(dir.path(), "payouts.csv");
    let donations = read(dir.path(), "donations.csv");

    let output = run_ok(dir.path(), &["reconcile", &event_path("po_ok")]);
    assert_eq!(output, "already recorded po_ok\n");

    assert_eq!(read(dir.path(), "payouts.csv"), payouts);
    assert_eq!(read(dir.path(), "donations.csv"), donations);
}

#[test]
fn test_sum_mismatch_is_rejected_without_writing() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["init"]);

    ledger_cmd(dir.path())
        .args(["reconcile", &event_path("po_mismatch")])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "stripe sums invalid: payout amount does not match total charges minus fees. amount 295 != net 294",
        ));

    assert_eq!(read(dir.path(), "payouts.csv"), "id,created,gross,fee,net\n");
    assert_eq!(
        read(dir.path(), "donations.csv"),
        "id,created,client_name,client_email,payout_id,gross,fee,net\n"
    );
}

#[test]
fn test_charge_without_email_is_rejected() {
    let dir = TempDir::new().unwrap();

    ledger_cmd(dir.path())
        .args(["reconcile", &event_path("po_no_email")])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "stripe transactions invalid: index 1: charge transaction email is missing",
        ));

    assert_eq!(read(dir.path(), "payouts.csv"), "id,created,gross,fee,net\n");
}

#[test]
fn test_unreconciled_payout_is_rejected() {
    let dir = TempDir::new().unwrap();

    ledger_cmd(dir.path())
        .args(["reconcile", &event_path("po_ok_in_transit")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stripe payout invalid: payout status is not paid"));
}

#[test]
fn test_missing_transaction_export() {
    let dir = TempDir::new().unwrap();

    ledger_cmd(dir.path())
        .args(["reconcile", &event_path("po_missing")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no transactions found for payout po_missing"));
}

#[test]
fn test_other_event_types_are_rejected() {
    let dir = TempDir::new().unwrap();

    ledger_cmd(dir.path())
        .args(["reconcile", &event_path("payout_paid")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized event type \"payout.paid\""));
}

#[test]
fn test_reports_after_reconcile() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["reconcile", &event_path("po_ok")]);

    assert_eq!(
        run_ok(dir.path(), &["payouts"]),
        "id,created,gross,fee,net\npo_ok,2024-03-14,300,6,294\n"
    );

    assert_eq!(
        run_ok(dir.path(), &["payout", "po_ok"]),
        "id,created,gross,fee,net\n\
         po_ok,2024-03-14,300,6,294\n\
         id,created,client_name,client_email,payout_id,gross,fee,net\n\
         txn_ok_1,2024-03-09,\"Doe, Jane\",jane@example.com,po_ok,100,3,97\n\
         txn_ok_2,2024-03-09,Sam Roe,sam@example.com,po_ok,200,3,197\n"
    );

    assert_eq!(
        run_ok(dir.path(), &["monthly", "2024", "3"]),
        "id,created,gross,fee,net\npo_ok,2024-03-14,300,6,294\ntotal,,300,6,294\n"
    );
}

#[test]
fn test_report_errors() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["reconcile", &event_path("po_ok")]);

    ledger_cmd(dir.path())
        .args(["monthly", "2024", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "no payouts found between 2024-04-01 and 2024-04-30",
        ));

    ledger_cmd(dir.path())
        .args(["payout", "po_unknown"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("payout not found: po_unknown"));
}

#[test]
fn test_audit() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["reconcile", &event_path("po_ok")]);

    assert_eq!(run_ok(dir.path(), &["audit"]), "ledger consistent\n");

    // Simulate a commit interrupted between the two file renames.
    fs::write(
        dir.path().join("payouts.csv"),
        "id,created,gross,fee,net\n",
    )
    .unwrap();

    ledger_cmd(dir.path())
        .arg("audit")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "donations txn_ok_1 txn_ok_2 reference unrecorded payout po_ok",
        ))
        .stderr(predicate::str::contains("ledger audit found 1 inconsistencies"));

    // Redelivery completes the interrupted commit.
    assert_eq!(
        run_ok(dir.path(), &["reconcile", &event_path("po_ok")]),
        "recorded po_ok\n"
    );
    assert_eq!(run_ok(dir.path(), &["audit"]), "ledger consistent\n");
    assert_eq!(read(dir.path(), "donations.csv").lines().count(), 3);
}

#[test]
fn test_usage_errors() {
    let dir = TempDir::new().unwrap();

    ledger_cmd(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing command"));

    ledger_cmd(dir.path())
        .args(["monthly", "2024"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing argument <month>"));
}

#[test]
fn test_nonexistent_event_file() {
    let dir = TempDir::new().unwrap();

    ledger_cmd(dir.path())
        .args(["reconcile", "nonexistent_file.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
