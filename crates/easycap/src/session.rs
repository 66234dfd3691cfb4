// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    device::CaptureDevice,
    driver::{Driver, V4l2Driver},
    probe::{self, DeviceKind},
    renderer::FrameRenderer,
    settings::DeviceSettings,
    surface::Surface,
    Error,
};
use std::path::Path;

/// Detect which adapter family sits behind a device node.
pub fn detect(path: impl AsRef<Path>) -> Option<DeviceKind> {
    probe::classify(path)
}

/// A running capture into a caller-owned surface
///
/// Owns the capture device and the renderer bound to its negotiated format.
/// Dropping the session stops the device.
#[derive(Debug)]
pub struct Session<D: Driver = V4l2Driver> {
    device: CaptureDevice<D>,
    renderer: FrameRenderer,
}

impl Session<V4l2Driver> {
    /// Open, configure and start streaming the device named in `settings`.
    pub fn start(settings: DeviceSettings) -> Result<Self, Error> {
        let mut device = CaptureDevice::new(settings);
        let result = device.open();
        Self::bring_up(device, result)
    }
}

impl<D: Driver> Session<D> {
    /// Start a session on an already opened driver handle.
    pub fn start_with(settings: DeviceSettings, driver: D) -> Result<Self, Error> {
        let mut device = CaptureDevice::with_settings(settings);
        let result = device.open_with(driver);
        Self::bring_up(device, result)
    }

    fn bring_up(mut device: CaptureDevice<D>, opened: Result<(), Error>) -> Result<Self, Error> {
        let result = opened
            .and_then(|_| device.configure())
            .and_then(|_| device.start_capture());
        if let Err(err) = result {
            log::error!(
                "starting capture on {}: {}",
                device.settings().device().display(),
                err
            );
            device.stop();
            return Err(err);
        }

        let format = device
            .format()
            .ok_or_else(|| Error::InvalidState("device configured without a format".to_owned()))?;
        let conversion = device
            .conversion()
            .cloned()
            .ok_or_else(|| Error::InvalidState("device configured without a conversion".to_owned()))?;
        let renderer = FrameRenderer::with_conversion(&format, conversion);
        log::info!(
            "session started: {} via {}",
            format,
            renderer.conversion()
        );
        Ok(Session { device, renderer })
    }

    /// Capture one frame and present it.
    ///
    /// Returns `Ok(false)` when no frame was available within the timeout or
    /// the surface dropped it.
    pub fn next_frame<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<bool, Error> {
        match self.device.capture_frame()? {
            Some(buffer) => self.renderer.present(&buffer, surface),
            None => Ok(false),
        }
    }

    /// Whether the device is streaming and its node is still present
    pub fn is_attached(&self) -> bool {
        self.device.is_streaming()
            && self
                .device
                .driver()
                .map(|driver| driver.is_present())
                .unwrap_or(false)
    }

    /// Stop capture and release the device. Idempotent.
    pub fn stop(&mut self) {
        self.device.stop();
    }

    pub fn device(&self) -> &CaptureDevice<D> {
        &self.device
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_detect_missing_node() {
        assert_eq!(detect("/dev/easycap-does-not-exist"), None);
    }

    #[test]
    fn test_start_missing_node() {
        let settings = DeviceSettings::default()
            .with_device("/dev/easycap-does-not-exist")
            .with_timeout(Duration::from_millis(10));
        assert!(matches!(
            Session::start(settings),
            Err(Error::DeviceUnavailable(_))
        ));
    }
}
