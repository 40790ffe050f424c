use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn run_json(args: &[&str]) -> anyhow::Result<serde_json::Value> {
    let mut cmd = Command::cargo_bin("rnaec")?;
    let output = cmd.arg("mi").args(args).output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    Ok(serde_json::from_str(&stdout)?)
}

#[test]
fn command_mi_coupled() -> anyhow::Result<()> {
    let json = run_json(&["tests/msa/coupled.fa"])?;

    assert_eq!(json["method"], "mutual_information_enhanced+adaptive_pc");
    assert_eq!(json["sequence_count"], 10);
    assert_eq!(json["sequence_length"], 20);
    assert_eq!(json["params"]["pseudocount"], 0.5);
    assert_eq!(json["top_pairs"][0]["i"], 5);
    assert_eq!(json["top_pairs"][0]["j"], 15);
    assert_eq!(json["single_sequence"], false);
    assert!(json.get("chunking").is_none());

    let matrix = json["coupling_matrix"].as_array().unwrap();
    assert_eq!(matrix.len(), 20);
    assert_eq!(matrix[3].as_array().unwrap().len(), 20);
    assert_eq!(matrix[5][15], matrix[15][5]);

    Ok(())
}

#[test]
fn command_mi_gz() -> anyhow::Result<()> {
    let json = run_json(&["tests/msa/coupled.fa.gz", "--compact"])?;
    assert_eq!(json["top_pairs"][0]["i"], 5);
    assert_eq!(json["top_pairs"][0]["j"], 15);

    Ok(())
}

#[test]
fn command_mi_pseudocount() -> anyhow::Result<()> {
    let json = run_json(&["tests/msa/coupled.fa", "--pseudocount", "0.25", "--parallel", "2"])?;
    assert_eq!(json["method"], "mutual_information_enhanced+fixed_pc");
    assert_eq!(json["params"]["pseudocount"], 0.25);

    let json = run_json(&["tests/msa/coupled.fa", "--pseudocount", "0", "--uniform"])?;
    assert_eq!(json["params"]["pseudocount"], 0.0);
    assert_eq!(json["params"]["weighting"], "uniform");

    Ok(())
}

#[test]
fn command_mi_profile() -> anyhow::Result<()> {
    let json = run_json(&["tests/msa/coupled.fa", "--profile", "limited,long,low"])?;
    assert_eq!(json["method"], "mutual_information_enhanced+fixed_pc");
    assert_eq!(json["params"]["pseudocount"], 0.8);
    assert_eq!(json["params"]["gap_threshold"], 0.6);

    // explicit flags win
    let json = run_json(&[
        "tests/msa/coupled.fa",
        "--profile",
        "standard,medium,high",
        "--gap-threshold",
        "0.3",
    ])?;
    assert_eq!(json["params"]["gap_threshold"], 0.3);
    assert_eq!(json["params"]["identity_threshold"], 0.85);

    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("mi")
        .arg("tests/msa/coupled.fa")
        .arg("--profile")
        .arg("huge")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--profile"));

    Ok(())
}

#[test]
fn command_mi_chunked() -> anyhow::Result<()> {
    let json = run_json(&[
        "tests/msa/long.fa",
        "--max-length",
        "40",
        "--chunk-size",
        "30",
        "--overlap",
        "10",
    ])?;

    assert_eq!(json["method"], "mutual_information_chunked+adaptive_pc");
    assert_eq!(json["sequence_length"], 60);
    assert_eq!(json["chunking"]["num_chunks"], 3);
    assert_eq!(json["chunking"]["windows"][1][0], 20);
    assert_eq!(json["chunking"]["windows"][2][1], 60);

    let pairs = json["top_pairs"].as_array().unwrap();
    assert!(pairs.len() <= 100);
    let scores: Vec<f64> = pairs.iter().map(|p| p["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    Ok(())
}

#[test]
fn command_mi_single_sequence() -> anyhow::Result<()> {
    let json = run_json(&["tests/msa/identical.fa"])?;
    assert_eq!(json["single_sequence"], true);
    assert_eq!(json["apc_skipped"], true);
    assert_eq!(json["top_pairs"].as_array().unwrap().len(), 0);

    Ok(())
}

#[test]
fn command_mi_length_mismatch() -> anyhow::Result<()> {
    let json = run_json(&["tests/msa/mismatch.fa"])?;
    assert_eq!(json["sequence_count"], 3);
    assert_eq!(json["sequence_length"], 8);

    Ok(())
}

#[test]
fn command_mi_outputs() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let json_file = temp.path().join("coupled.json");
    let matrix_file = temp.path().join("coupled.tsv");
    let pairs_file = temp.path().join("coupled.pairs.tsv");

    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("mi")
        .arg("tests/msa/coupled.fa")
        .arg("-o")
        .arg(&json_file)
        .arg("--matrix")
        .arg(&matrix_file)
        .arg("--pairs")
        .arg(&pairs_file)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_file)?)?;
    assert_eq!(json["msa_file"], "tests/msa/coupled.fa");

    let matrix = fs::read_to_string(&matrix_file)?;
    assert_eq!(matrix.lines().count(), 20);
    assert!(matrix.lines().all(|l| l.split('\t').count() == 20));

    let pairs = fs::read_to_string(&pairs_file)?;
    assert!(pairs.starts_with("5\t15\t"));

    // the written matrix ranks the same way
    let mut cmd = Command::cargo_bin("rnaec")?;
    let output = cmd.arg("top").arg(&matrix_file).arg("-k").arg("1").output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("5\t15\t"));
    assert_eq!(stdout.lines().count(), 1);

    Ok(())
}

#[test]
fn command_mi_invalid() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("mi")
        .arg("tests/msa/coupled.fa")
        .arg("--chunk-size")
        .arg("100")
        .arg("--overlap")
        .arg("100")
        .assert()
        .failure()
        .stderr(predicate::str::contains("overlap"));

    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("mi")
        .arg("tests/msa/coupled.fa")
        .arg("--gap-threshold")
        .arg("1.5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gap_threshold"));

    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("mi")
        .arg("tests/msa/not-there.fa")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not open"));

    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("mi").arg("tests/msa/bad.fa").assert().failure();

    Ok(())
}
