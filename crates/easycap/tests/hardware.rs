// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Hardware Capture Tests
//
// TESTING LAYERS:
//
// Layer 1 (No hardware required):
//   - Missing device nodes are reported, not panicked on
//
// Layer 3 (Hardware Integration - Requires an EasyCap adapter):
//   - Detection of the adapter family
//   - Streaming frames into a memory surface for every encoding
//
// The adapter node defaults to /dev/video0 and can be overridden with
// EASYCAP_DEVICE.
//
// RUN LAYER 1:
//   cargo test --test hardware
//
// RUN LAYER 3 (on hardware):
//   cargo test --test hardware -- --ignored --nocapture

use easycap::{
    device::{CaptureDevice, State},
    probe,
    session::{self, Session},
    settings::{DeviceSettings, PixelEncoding},
    surface::MemorySurface,
    Error,
};
use serial_test::serial;
use std::time::{Duration, Instant};

fn device_path() -> String {
    std::env::var("EASYCAP_DEVICE").unwrap_or_else(|_| "/dev/video0".to_owned())
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// =============================================================================
// Layer 1
// =============================================================================

#[test]
fn test_missing_node_detection() {
    assert_eq!(session::detect("/dev/video-easycap-missing"), None);
    assert!(matches!(
        probe::identify("/dev/video-easycap-missing"),
        Err(Error::DeviceUnavailable(_))
    ));
}

#[test]
fn test_missing_node_open() {
    let mut device = CaptureDevice::new(
        DeviceSettings::default().with_device("/dev/video-easycap-missing"),
    );
    assert!(matches!(device.open(), Err(Error::DeviceUnavailable(_))));
    assert_eq!(device.state(), State::Closed);
}

// =============================================================================
// Layer 3
// =============================================================================

#[ignore = "test requires an EasyCap adapter (run with --include-ignored to enable)"]
#[test]
#[serial]
fn test_detect_adapter() {
    init_logging();
    let path = device_path();
    let info = probe::identify(&path).unwrap();
    println!("{}", info);
    assert!(info.can_capture());
    assert!(session::detect(&path).is_some(), "{} is not an EasyCap", path);
}

#[ignore = "test requires an EasyCap adapter (run with --include-ignored to enable)"]
#[test]
#[serial]
fn test_stream_all_encodings() {
    init_logging();
    for encoding in [PixelEncoding::Yuyv, PixelEncoding::Uyvy] {
        let settings = DeviceSettings::default()
            .with_device(device_path())
            .with_encoding(encoding);
        let mut session = match Session::start(settings) {
            Ok(session) => session,
            Err(Error::FormatNegotiationFailed(msg)) => {
                println!("{} not supported: {}", encoding, msg);
                continue;
            }
            Err(err) => panic!("{}: {}", encoding, err),
        };

        let mut surface = MemorySurface::new();
        let start = Instant::now();
        let mut posted = 0;
        while posted < 30 && start.elapsed() < Duration::from_secs(10) {
            if session.next_frame(&mut surface).unwrap() {
                posted += 1;
            }
        }
        println!(
            "{}: {} frames in {:?}",
            encoding,
            posted,
            start.elapsed()
        );
        assert_eq!(posted, 30);
        assert!(session.is_attached());
        session.stop();
    }
}

#[ignore = "test requires an EasyCap adapter (run with --include-ignored to enable)"]
#[test]
#[serial]
fn test_buffer_pool() {
    init_logging();
    let mut device = CaptureDevice::new(
        DeviceSettings::default()
            .with_device(device_path())
            .with_buffers(4),
    );
    device.open().unwrap();
    device.configure().unwrap();
    let format = device.format().unwrap();
    assert!(device.buffer_count() >= 2);
    for len in device.buffer_lengths() {
        assert!(len >= format.size_image as usize);
    }

    device.start_capture().unwrap();
    let first = device.capture_frame().unwrap().map(|b| b.sequence());
    let second = device.capture_frame().unwrap().map(|b| b.sequence());
    if let (Some(a), Some(b)) = (first, second) {
        assert!(b > a);
    }
    device.stop();
    device.stop();
    assert_eq!(device.state(), State::Closed);
}
