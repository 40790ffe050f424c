use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

#[test]
fn command_batch() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let outdir = temp.path().join("features");

    let mut cmd = Command::cargo_bin("rnaec")?;
    let output = cmd
        .arg("batch")
        .arg("tests/msa/coupled.fa")
        .arg("tests/msa/bad.fa")
        .arg("tests/msa/identical.fa")
        .arg("tests/msa/long.fa")
        .arg("--outdir")
        .arg(&outdir)
        .arg("--max-length")
        .arg("40")
        .arg("--chunk-size")
        .arg("30")
        .arg("--overlap")
        .arg("10")
        .arg("--parallel")
        .arg("2")
        .output()?;
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Processed 4 alignments: 3 succeeded, 1 failed"));

    assert!(outdir.join("coupled.json").exists());
    assert!(outdir.join("identical.json").exists());
    assert!(outdir.join("long.json").exists());
    assert!(!outdir.join("bad.json").exists());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(outdir.join("long.json"))?)?;
    assert_eq!(json["method"], "mutual_information_chunked+adaptive_pc");

    let summary = fs::read_to_string(outdir.join("summary.tsv"))?;
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "id\tstatus\tmethod\tlength\tcount\tseconds\terror");
    // input order
    assert!(lines[1].starts_with("coupled\tsuccess\tmutual_information_enhanced+adaptive_pc\t20\t10\t"));
    assert!(lines[2].starts_with("bad\terror\t"));
    assert!(lines[3].starts_with("identical\tsuccess\t"));
    assert!(lines[4].starts_with("long\tsuccess\tmutual_information_chunked+adaptive_pc\t60\t12\t"));

    Ok(())
}

#[test]
fn command_batch_duplicate_id() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("rnaec")?;
    cmd.arg("batch")
        .arg("tests/msa/coupled.fa")
        .arg("tests/msa/coupled.fa.gz")
        .arg("--outdir")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicates::str::contains("Duplicate target id"));

    Ok(())
}

#[test]
fn command_batch_timeout() -> anyhow::Result<()> {
    let temp = TempDir::new()?;

    let mut cmd = Command::cargo_bin("rnaec")?;
    let output = cmd
        .arg("batch")
        .arg("tests/msa/coupled.fa")
        .arg("--outdir")
        .arg(temp.path())
        .arg("--timeout")
        .arg("0")
        .output()?;
    assert!(output.status.success());

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("Processed 1 alignments: 0 succeeded, 1 failed"));
    assert!(!temp.path().join("coupled.json").exists());

    let summary = fs::read_to_string(temp.path().join("summary.tsv"))?;
    assert!(summary.contains("coupled\terror\t"));
    assert!(summary.contains("Timed out during"));

    Ok(())
}
