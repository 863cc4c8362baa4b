use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

mod common;

fn replay() -> Command {
    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg("--catalog")
        .arg("tests/fixtures/catalog.csv")
        .arg("--providers")
        .arg("tests/fixtures/providers.csv");
    cmd
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = replay();
    cmd.arg("tests/fixtures/commands.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "booking,request,client,provider,status,amount_fee,total_amount,transaction",
        ))
        .stdout(predicate::str::contains("1,1,1,10,completed,800.00,800.00,1"))
        .stdout(predicate::str::contains("2,2,2,20,refunded,600.00,600.00,"))
        .stdout(predicate::str::contains(concat!(
            "transaction,booking,provider,client,total_amount,",
            "commission_rate,commission_amount,provider_payout,payout_status",
        )))
        .stdout(predicate::str::contains("1,1,10,1,800.00,8,64.00,736.00,paid"))
        .stderr(predicate::str::contains("Error processing command").not());

    Ok(())
}

#[test]
fn test_cli_commission_file_overrides_defaults() {
    let mut cmd = replay();
    cmd.arg("--commission")
        .arg("tests/fixtures/commission.json")
        .arg("tests/fixtures/commands.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,1,10,1,800.00,5,40.00,760.00,paid"));
}

#[test]
fn test_cli_set_rate_applies_to_later_bookings() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,actor,role,target,provider,amount,note,outcome").unwrap();
    writeln!(file, "submit_direct,1,client,7,10,,,").unwrap();
    writeln!(file, "accept,10,mechanic,1,,,,").unwrap();
    writeln!(file, "complete,10,mechanic,1,,,,").unwrap();
    writeln!(file, "set_rate,99,admin,,,20,,gold").unwrap();
    writeln!(file, "submit_direct,1,client,7,10,,8,").unwrap();
    writeln!(file, "accept,10,mechanic,2,,,,").unwrap();
    writeln!(file, "complete,10,mechanic,2,,,,").unwrap();

    let mut cmd = replay();
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,1,10,1,800.00,8,64.00,736.00,pending"))
        .stdout(predicate::str::contains("2,2,10,1,950.00,20,190.00,760.00,pending"));
}

#[test]
fn test_cli_back_job_supplement() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,actor,role,target,provider,amount,note,outcome").unwrap();
    writeln!(file, "submit_emergency,1,client,,,,Battery dead,").unwrap();
    writeln!(file, "accept,11,mechanic,1,,90.00,,").unwrap();
    writeln!(file, "complete,11,mechanic,1,,,,").unwrap();
    writeln!(file, "back_job,1,client,1,,,Dead again next morning,").unwrap();
    writeln!(file, "approve_back_job,11,mechanic,1,,,,").unwrap();
    writeln!(file, "supplement,11,mechanic,1,,35.50,Alternator belt,").unwrap();
    writeln!(file, "complete,11,mechanic,1,,,,").unwrap();

    let mut cmd = replay();
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("1,1,1,11,completed,90.00,125.50,1"))
        .stdout(predicate::str::contains("1,1,11,1,90.00,15,13.50,76.50,pending"))
        .stdout(predicate::str::contains("2,1,").not());
}

#[test]
fn test_cli_rejected_operations_are_reported() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op,actor,role,target,provider,amount,note,outcome").unwrap();
    writeln!(file, "submit_direct,1,client,7,10,,,").unwrap();
    writeln!(file, "accept,10,mechanic,1,,,,").unwrap();
    // Second accept loses to the first booking
    writeln!(file, "accept,10,mechanic,1,,,,").unwrap();
    // Client of another account
    writeln!(file, "complete,2,client,1,,,,").unwrap();

    let mut cmd = replay();
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("already has booking 1"))
        .stderr(predicate::str::contains("may not complete booking 1"))
        .stdout(predicate::str::contains("1,1,1,10,active,800.00,800.00,"));
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("mechconnect"));
    cmd.arg("tests/fixtures/does_not_exist.csv");
    cmd.assert().failure();
}

#[test]
fn test_cli_generated_replay() {
    let file = NamedTempFile::new().unwrap();
    common::generate_commands(file.path(), 50).expect("Failed to generate commands");

    let mut cmd = replay();
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("50,50,1,10,completed,800.00,800.00,50"))
        .stdout(predicate::str::contains("50,50,10,1,800.00,8,64.00,736.00,pending"));
}
