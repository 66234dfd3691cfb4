// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Integration tests for the easycap CLI
//!
//! TESTING LAYERS:
//!
//! Layer 1 (No hardware required):
//!   - Help text and command structure
//!   - Argument validation and exit codes
//!   - Missing device handling
//!
//! Layer 3 (Hardware Integration - Requires an EasyCap adapter):
//!   - Detection and capture against EASYCAP_DEVICE (default /dev/video0)
//!
//! RUN LAYER 3 (on hardware):
//!   cargo test --test cli -- --ignored --nocapture

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::{env, fs, path::PathBuf, thread, time::Duration};

/// Small delay to let the adapter release its buffers between tests
fn hardware_cleanup_delay() {
    thread::sleep(Duration::from_millis(500));
}

/// Helper to create a Command for the easycap binary
/// Uses EASYCAP_BIN environment variable if set, otherwise uses cargo run
fn easycap_cmd() -> Command {
    if let Ok(bin_path) = env::var("EASYCAP_BIN") {
        Command::new(bin_path)
    } else {
        let mut c = Command::new("cargo");
        c.args(["run", "--quiet", "--bin", "easycap", "--"]);
        c
    }
}

fn hardware_device() -> String {
    env::var("EASYCAP_DEVICE").unwrap_or_else(|_| "/dev/video0".to_string())
}

/// Get the test data directory (target/testdata/easycap-cli)
fn get_test_data_dir() -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target")
        .join("testdata")
        .join("easycap-cli");

    fs::create_dir_all(&test_dir).expect("Failed to create test data directory");
    test_dir
}

// =============================================================================
// Layer 1: Basic Command Tests (No Hardware Required)
// =============================================================================

#[test]
fn test_cli_help() {
    easycap_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EasyCap CLI"))
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("capture"));
}

#[test]
fn test_cli_version() {
    easycap_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("easycap"));
}

#[test]
fn test_capture_help() {
    easycap_cmd()
        .args(["capture", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--device"))
        .stdout(predicate::str::contains("--resolution"))
        .stdout(predicate::str::contains("--encoding"))
        .stdout(predicate::str::contains("--standard"))
        .stdout(predicate::str::contains("--buffers"));
}

#[test]
fn test_devices_help() {
    easycap_cmd()
        .args(["devices", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("V4L2"))
        .stdout(predicate::str::contains("--easycap"))
        .stdout(predicate::str::contains("--all"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_detect_help() {
    easycap_cmd()
        .args(["detect", "-h"])
        .assert()
        .success()
        .stdout(predicate::str::contains("adapter family"));
}

#[test]
fn test_unknown_subcommand() {
    easycap_cmd().arg("record").assert().failure().code(2);
}

// =============================================================================
// Argument Validation (No Hardware Required)
// =============================================================================

#[test]
fn test_capture_invalid_resolution() {
    easycap_cmd()
        .args(["capture", "--device", "/dev/videoNONEXISTENT"])
        .args(["--resolution", "720by480"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid resolution"));
}

#[test]
fn test_capture_zero_resolution() {
    easycap_cmd()
        .args(["capture", "--resolution", "0x480"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_capture_invalid_encoding() {
    easycap_cmd()
        .args(["capture", "--encoding", "mjpeg"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Unknown encoding"));
}

#[test]
fn test_capture_invalid_standard() {
    easycap_cmd()
        .args(["capture", "--standard", "secam"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Unknown standard"));
}

#[test]
fn test_capture_zero_max_timeouts_rejected() {
    easycap_cmd()
        .args(["capture", "--device", "/dev/videoNONEXISTENT"])
        .args(["--max-timeouts", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Max timeouts"));
}

#[test]
fn test_capture_single_buffer_rejected() {
    easycap_cmd()
        .args(["capture", "--device", "/dev/videoNONEXISTENT"])
        .args(["--buffers", "1"])
        .assert()
        .failure()
        .code(2);
}

// =============================================================================
// Missing Device Handling (No Hardware Required)
// =============================================================================

#[test]
fn test_detect_missing_device() {
    easycap_cmd()
        .args(["detect", "/dev/videoNONEXISTENT"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_detect_missing_device_json() {
    let output = easycap_cmd()
        .args(["--json", "detect", "/dev/videoNONEXISTENT"])
        .output()
        .expect("Command should execute");

    assert_eq!(output.status.code(), Some(3));
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    assert_eq!(parsed["detected"], false);
    assert_eq!(parsed["device"], "/dev/videoNONEXISTENT");
    assert!(parsed.get("family").is_none());
}

#[test]
fn test_capture_missing_device() {
    easycap_cmd()
        .args(["capture", "--device", "/dev/videoNONEXISTENT", "--frames", "1"])
        .timeout(Duration::from_secs(30))
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_devices_json_structure() {
    let output = easycap_cmd()
        .args(["devices", "--json"])
        .output()
        .expect("Command should execute");

    assert!(output.status.success(), "Command should succeed");

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    assert!(parsed["devices"].is_array());
    assert!(parsed["summary"]["total_nodes"].is_u64());
}

// =============================================================================
// Layer 3: Hardware Tests (EasyCap Adapter Required)
// =============================================================================

#[test]
#[ignore = "requires EasyCap hardware (run with --include-ignored on hardware)"]
#[serial]
fn test_detect_hardware() {
    easycap_cmd()
        .args(["detect", &hardware_device()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("UTV007")
                .or(predicate::str::contains("EMPIA"))
                .or(predicate::str::contains("STK1160"))
                .or(predicate::str::contains("SOMAGIC")),
        );
}

#[test]
#[ignore = "requires EasyCap hardware (run with --include-ignored on hardware)"]
#[serial]
fn test_devices_easycap_filter() {
    easycap_cmd()
        .args(["devices", "--easycap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recommended device"));
}

#[test]
#[ignore = "requires EasyCap hardware (run with --include-ignored on hardware)"]
#[serial]
fn test_capture_to_file() {
    hardware_cleanup_delay();

    let output_file = get_test_data_dir().join("capture.raw");
    fs::remove_file(&output_file).ok();

    easycap_cmd()
        .args(["capture", "--device", &hardware_device()])
        .args(["--frames", "30", "--encoding", "yuyv"])
        .arg("--output")
        .arg(&output_file)
        .timeout(Duration::from_secs(30))
        .assert()
        .success()
        .stderr(predicate::str::contains("Captured 30 frames total"));

    // 30 RGBA frames at 720x480
    let len = output_file.metadata().unwrap().len();
    assert_eq!(len, 30 * 720 * 480 * 4);

    fs::remove_file(&output_file).ok();
}

#[test]
#[ignore = "requires EasyCap hardware (run with --include-ignored on hardware)"]
#[serial]
fn test_capture_json_metrics() {
    hardware_cleanup_delay();

    let output = easycap_cmd()
        .args(["--json", "capture", "--device", &hardware_device()])
        .args(["--frames", "10"])
        .timeout(Duration::from_secs(30))
        .output()
        .expect("Command should execute");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    assert_eq!(parsed["frames_posted"], 10);
    assert!(parsed["throughput_fps"].as_f64().unwrap() > 0.0);
}
