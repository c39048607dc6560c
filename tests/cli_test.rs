use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const SECRET: &str = "a29ab82edc5fbbc41ec9530f6dac86b1";
const LOAN: &str = "0b7e4a52-1c3d-4e5f-8a9b-000000000010";
const CASH_LOAN: &str = "0b7e4a52-1c3d-4e5f-8a9b-000000000011";

fn token_cmd(args: &[&str]) -> Command {
    let mut cmd = Command::new(cargo_bin!("payg-core"));
    cmd.arg("token").args(args);
    cmd
}

#[test]
fn test_token_matches_reference_vectors() {
    token_cmd(&["--secret", SECRET, "--counter", "41", "--value", "30"])
        .assert()
        .success()
        .stdout("18733103203082440506,42\n");

    token_cmd(&[
        "--secret",
        "00000000000000000000000000000000",
        "--counter",
        "0",
        "--value",
        "0",
    ])
    .assert()
    .success()
    .stdout("84180228683992083246,1\n");
}

#[test]
fn test_token_restricted_and_extended() {
    token_cmd(&["--secret", SECRET, "--counter", "41", "--value", "30", "--restricted"])
        .assert()
        .success()
        .stdout("21443344442211441433,42\n");

    token_cmd(&["--secret", SECRET, "--counter", "41", "--value", "30", "--extended"])
        .assert()
        .success()
        .stdout("98650473332963103203082440506,42\n");
}

#[test]
fn test_token_disable_payg() {
    token_cmd(&[
        "--secret",
        "00000000000000000000000000000000",
        "--counter",
        "0",
        "--value",
        "0",
        "--instruction",
        "disable-payg",
    ])
    .assert()
    .success()
    .stdout("84181406307057172824,1\n");
}

#[test]
fn test_token_rejects_bad_input() {
    token_cmd(&["--secret", "not-hex", "--counter", "1", "--value", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("secret key"));

    token_cmd(&["--secret", SECRET, "--counter", "1", "--value", "996"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds the maximum"));
}

#[test]
fn test_settle_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("payg-core"));
    cmd.arg("settle")
        .arg("tests/fixtures/payments.csv")
        .arg("--seed")
        .arg("tests/fixtures/seed.json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "loan,amount_paid,balance,accumulated,status,next_payment_date",
        ))
        // 600 + 500 settles one cycle, the duplicate ref-2 is skipped
        .stdout(predicate::str::contains(format!("{LOAN},1000,9000,100,active,")))
        // Cash in full pays the loan off
        .stdout(predicate::str::contains(format!("{CASH_LOAN},3000,0,0,completed,\n")))
        .stderr(predicate::str::contains("Error reading payment"));

    Ok(())
}

#[test]
fn test_settle_reports_unknown_loan_and_continues() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "business, loan, user, reference, amount").unwrap();
    writeln!(
        file,
        "0b7e4a52-1c3d-4e5f-8a9b-000000000001, 0b7e4a52-1c3d-4e5f-8a9b-0000000000ff, \
         0b7e4a52-1c3d-4e5f-8a9b-000000000020, ref-x, 1000"
    )
    .unwrap();
    writeln!(
        file,
        "0b7e4a52-1c3d-4e5f-8a9b-000000000001, {LOAN}, 0b7e4a52-1c3d-4e5f-8a9b-000000000020, ref-y, 2000"
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("payg-core"));
    cmd.arg("settle")
        .arg(file.path())
        .arg("--seed")
        .arg("tests/fixtures/seed.json");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing payment ref-x"))
        .stdout(predicate::str::contains(format!("{LOAN},2000,8000,0,active,")));
}

#[test]
fn test_settle_missing_seed_fails() {
    let mut cmd = Command::new(cargo_bin!("payg-core"));
    cmd.arg("settle")
        .arg("tests/fixtures/payments.csv")
        .arg("--seed")
        .arg("tests/fixtures/does-not-exist.json");

    cmd.assert().failure();
}
