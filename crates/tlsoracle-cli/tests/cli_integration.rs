#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

use tlsoracle_core::fingerprint::{Alert, AlertDescription, MessageType};
use tlsoracle_core::protocol::{CipherSuite, ProtocolVersion};
use tlsoracle_core::replay::RecordedRun;
use tlsoracle_core::vector::{RecordGeneratorKind, VectorGeneratorKind};
use tlsoracle_core::{
    ResponseFingerprint, ResponseMap, TargetCapabilities, TestConfiguration, Transcript, Vector,
    VectorId,
};

const SUITE: &str = "TLS_RSA_WITH_AES_128_CBC_SHA";

fn tlsoracle() -> Command {
    let mut cmd = Command::cargo_bin("tlsoracle").unwrap();
    cmd.env_remove("TLSORACLE_CONFIG");
    cmd.env_remove("TLSORACLE_SCAN_DETAIL");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn capabilities() -> TargetCapabilities {
    TargetCapabilities::default().with_suites(ProtocolVersion::Tls12, [SUITE])
}

/// The single padding-oracle configuration enumerated at NORMAL detail.
fn configuration() -> TestConfiguration {
    TestConfiguration {
        protocol_version: ProtocolVersion::Tls12,
        cipher_suite: CipherSuite::new(SUITE),
        vector_generator: VectorGeneratorKind::Finished,
        record_generator: RecordGeneratorKind::Short,
    }
}

fn vectors() -> Vec<Vector> {
    vec![
        Vector::new(0, "valid padding, invalid mac"),
        Vector::new(1, "invalid padding"),
        Vector::new(2, "zero-length padding"),
    ]
}

fn alert(description: AlertDescription) -> ResponseFingerprint {
    ResponseFingerprint::new(false)
        .with_alert(Alert::fatal(description))
        .with_messages([MessageType::Alert])
}

fn uniform_run() -> RecordedRun {
    RecordedRun::Map(ResponseMap::from_pairs(
        (0..3).map(|i| (VectorId(i), Some(alert(AlertDescription::BadRecordMac)))),
    ))
}

fn distinct_run() -> RecordedRun {
    RecordedRun::Map(ResponseMap::from_pairs([
        (VectorId(0), Some(alert(AlertDescription::BadRecordMac))),
        (VectorId(1), Some(alert(AlertDescription::DecryptionFailed))),
        (VectorId(2), Some(alert(AlertDescription::BadRecordMac))),
    ]))
}

fn write_transcript(dir: &TempDir, runs: Vec<RecordedRun>) -> PathBuf {
    let transcript =
        Transcript::new(capabilities()).with_configuration(configuration(), vectors(), runs);
    let path = dir.path().join("transcript.json");
    std::fs::write(&path, transcript.to_json_pretty().unwrap()).unwrap();
    path
}

// ============================================================================
// analyze
// ============================================================================

#[test]
fn analyze_reports_stable_oracle() {
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, (0..10).map(|_| distinct_run()).collect());

    tlsoracle()
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "padding-oracle"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TRUE"))
        .stdout(predicate::str::contains(SUITE))
        .stdout(predicate::str::contains("ALERT_CONTENT"));
}

#[test]
fn analyze_fail_on_oracle_exit_codes() {
    let dir = TempDir::new().unwrap();
    let oracle = write_transcript(&dir, (0..10).map(|_| distinct_run()).collect());
    tlsoracle()
        .arg("analyze")
        .arg(&oracle)
        .args(["--probe", "padding-oracle", "--fail-on-oracle"])
        .assert()
        .code(4);

    let clean_dir = TempDir::new().unwrap();
    let clean = write_transcript(&clean_dir, vec![uniform_run()]);
    tlsoracle()
        .arg("analyze")
        .arg(&clean)
        .args(["--probe", "padding-oracle", "--fail-on-oracle"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("FALSE"));
}

#[test]
fn analyze_exhausted_transcript_is_inconclusive() {
    // Three base runs recorded, but the extended pass needs seven more.
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, (0..3).map(|_| distinct_run()).collect());

    tlsoracle()
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "padding-oracle", "--fail-on-oracle"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("COULD_NOT_TEST"))
        .stdout(predicate::str::contains("Failure Rate"))
        .stdout(predicate::str::contains("70.0%"));
}

#[test]
fn analyze_json_output() {
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, vec![uniform_run()]);

    let output = tlsoracle()
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "padding-oracle", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["probe"], "PADDING_ORACLE");
    assert_eq!(report["verdict"], "FALSE");
    assert_eq!(report["stats"]["early_exits"], 1);
    assert_eq!(report["tests"][0]["runs"], 1);
    assert!(report["tests"][0].get("response_maps").is_none());
}

#[test]
fn analyze_include_maps_prints_response_map() {
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, vec![uniform_run()]);

    tlsoracle()
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "padding-oracle", "--include-maps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Response map for"))
        .stdout(predicate::str::contains("invalid padding"));
}

#[test]
fn analyze_ineligible_probe_could_not_test() {
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, vec![uniform_run()]);

    tlsoracle()
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "master-secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COULD_NOT_TEST"))
        .stdout(predicate::str::contains("No eligible configurations"));
}

#[test]
fn analyze_uses_config_file_detail() {
    let dir = TempDir::new().unwrap();
    // QUICK with a uniform first run needs no further runs; NORMAL would too,
    // so assert on the reported detail instead.
    let path = write_transcript(&dir, vec![uniform_run()]);
    let config = dir.path().join("tlsoracle.toml");
    std::fs::write(&config, "scan_detail = \"QUICK\"\n").unwrap();

    let output = tlsoracle()
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "padding-oracle", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["scan_detail"], "QUICK");
    // QUICK selects the shorter record generator, which the transcript never recorded.
    assert_eq!(report["verdict"], "COULD_NOT_TEST");
}

// ============================================================================
// Error exit codes
// ============================================================================

#[test]
fn missing_transcript_is_not_found() {
    tlsoracle()
        .args(["analyze", "/nonexistent/transcript.json", "--probe", "padding-oracle"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Failed to load transcript"));
}

#[test]
fn malformed_transcript_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"configurations\": 42 }").unwrap();

    tlsoracle()
        .arg("analyze")
        .arg(&path)
        .args(["--probe", "bleichenbacher"])
        .assert()
        .code(2);
}

#[test]
fn zero_parallelism_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, vec![uniform_run()]);

    tlsoracle()
        .args(["--parallelism", "0", "analyze"])
        .arg(&path)
        .args(["--probe", "padding-oracle"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("parallelism"));
}

#[test]
fn unknown_probe_is_rejected() {
    tlsoracle()
        .args(["analyze", "transcript.json", "--probe", "heartbleed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown probe kind"));
}

// ============================================================================
// enumerate
// ============================================================================

#[test]
fn enumerate_lists_configurations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capabilities.json");
    std::fs::write(&path, serde_json::to_string(&capabilities()).unwrap()).unwrap();

    tlsoracle()
        .arg("enumerate")
        .arg(&path)
        .args(["--probe", "bleichenbacher"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CKE_CCS_FIN"))
        .stdout(predicate::str::contains("FAST"));
}

#[test]
fn enumerate_json_from_transcript() {
    let dir = TempDir::new().unwrap();
    let path = write_transcript(&dir, vec![uniform_run()]);

    let output = tlsoracle()
        .args(["--detail", "all", "enumerate"])
        .arg(&path)
        .args(["--probe", "bleichenbacher", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["scan_detail"], "ALL");
    assert_eq!(value["configurations"].as_array().unwrap().len(), 4);
    assert_eq!(value["configurations"][0]["record_generator"], "FULL");
}
