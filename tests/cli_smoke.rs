use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_flag_works() {
    let mut cmd = Command::cargo_bin("pinfix").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pinfix"));
}

#[test]
fn help_mentions_the_pin_format() {
    let mut cmd = Command::cargo_bin("pinfix").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("PIN"))
        .stdout(predicate::str::contains("--skip-max-version-check"));
}

#[test]
fn no_arguments_is_a_usage_error() {
    let mut cmd = Command::cargo_bin("pinfix").unwrap();
    cmd.assert().failure();
}
