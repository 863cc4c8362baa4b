use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::NamedTempFile;

mod common;

fn write_rows(rows: &[[&str; 8]]) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut wtr = csv::Writer::from_path(file.path()).unwrap();
    wtr.write_record(common::COMMAND_HEADER).unwrap();
    for row in rows {
        wtr.write_record(row).unwrap();
    }
    wtr.flush().unwrap();
    file
}

#[test]
fn test_malformed_rows_are_skipped() {
    let file = write_rows(&[
        ["submit_direct", "1", "client", "7", "10", "", "", ""],
        // Unknown operation
        ["teleport", "1", "client", "1", "", "", "", ""],
        // Role that does not exist
        ["accept", "10", "plumber", "1", "", "", "", ""],
        // Amount that is not a number
        ["accept", "10", "mechanic", "1", "", "ten", "", ""],
        ["accept", "10", "mechanic", "1", "", "", "", ""],
    ]);

    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg("--catalog")
        .arg("tests/fixtures/catalog.csv")
        .arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("1,1,1,10,active,800.00,800.00,"));
}

#[test]
fn test_invalid_operations_are_skipped() {
    let file = write_rows(&[
        ["submit_custom", "1", "client", "", "10", "", "Engine knock", ""],
        // Quote without items
        ["quote", "10", "mechanic", "1", "", "", "", ""],
        // Item without a price
        ["quote", "10", "mechanic", "1", "", "", "Diagnosis", ""],
        // Negative price
        ["quote", "10", "mechanic", "1", "", "", "Diagnosis=-20", ""],
        ["quote", "10", "mechanic", "1", "", "", "Diagnosis=120", ""],
        // Missing target
        ["accept", "1", "client", "", "", "", "", ""],
        ["accept", "1", "client", "1", "", "", "", ""],
        // Dispute outcome nobody knows
        ["dispute", "1", "client", "1", "", "", "Still knocking", ""],
        ["resolve_dispute", "99", "admin", "1", "", "", "", "maybe"],
        // Refund larger than the fee
        ["resolve_dispute", "99", "admin", "1", "", "500", "", "refunded"],
    ]);

    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing command"))
        .stderr(predicate::str::contains("Unknown dispute outcome"))
        .stdout(predicate::str::contains("1,1,1,10,dispute,120.00,120.00,"));
}

#[test]
fn test_unknown_catalog_service_is_reported() {
    let file = write_rows(&[
        ["submit_direct", "1", "client", "7", "10", "", "", ""],
        ["accept", "10", "mechanic", "1", "", "", "", ""],
    ]);

    // No catalog given, so service 7 does not exist.
    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Catalog service 7 does not exist"))
        .stderr(predicate::str::contains("request 1 not found"));
}

#[test]
fn test_empty_command_file() {
    let file = write_rows(&[]);

    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "booking,request,client,provider,status,amount_fee,total_amount,transaction",
        ));
}

#[test]
fn test_bad_commission_file_fails() {
    let mut settings = NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut settings, br#"{"default_rate": "140"}"#).unwrap();
    let file = write_rows(&[]);

    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg("--commission").arg(settings.path()).arg(file.path());

    cmd.assert().failure();
}
