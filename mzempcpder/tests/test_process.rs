use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzempcpder")?;

    cmd.arg("not_real.json").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No such file or directory"));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzempcpder")?;

    cmd.arg("not_real.json").arg("-o").arg("-").args(["-r", "a-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("mzempcpder")?;

    cmd.arg("not_real.json").arg("-o").arg("-").args(["-r", "5-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));

    Ok(())
}

#[test]
fn test_unknown_mode() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzempcpder")?;

    cmd.arg("tests/data/peaks.json").args(["-m", "sideways"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'sideways'"));
    Ok(())
}

#[test]
fn test_run_empirical_compounds() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzempcpder")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/peaks.json").args(["-o", "-", "-s"]);
    let result = cmd.assert().success();
    result
        .stderr(predicate::str::contains("7 peaks: 2 seeds"))
        .stderr(predicate::str::contains("Empirical Compounds: 3"))
        .stdout(predicate::str::contains("MS1_pseudo_Spectra"))
        .stdout(predicate::str::contains("\"anchor,+NH4\""));
    Ok(())
}

#[test]
fn test_run_subset() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzempcpder")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/peaks.json")
        .args(["-o", "-", "-r", "250-350"]);
    let result = cmd.assert().success();
    result
        .stderr(predicate::str::contains("2 peaks between 250 and 350"))
        .stderr(predicate::str::contains("Empirical Compounds: 1"))
        .stdout(predicate::str::contains("\"B+1\""))
        .stdout(predicate::str::contains("\"A\"").not());
    Ok(())
}

#[test]
fn test_run_trees() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzempcpder")?;
    cmd.env("RUST_LOG", "info");
    cmd.arg("./tests/data/peaks.json")
        .args(["-o", "-", "-g", "trees", "-s"]);
    let result = cmd.assert().success();
    result
        .stderr(predicate::str::contains("In-source Grafts: 1"))
        .stdout(predicate::str::starts_with(
            "Feature_ID\tFeature_tag\troot\troot_tag\trelation",
        ))
        .stdout(predicate::str::contains("A+Na\t171.982@101.0\tA\t150.0@100.0\tNa/H"));
    Ok(())
}
