// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    convert::Conversion,
    driver::{Dequeued, Driver, PixFormat, V4l2Driver},
    settings::{DeviceSettings, PixelEncoding, MIN_BUFFERS},
    Error,
};
use easycap_sys as sys;
use std::{fmt, io};
use unix_ts::Timestamp;

/// Lifecycle state of a [`CaptureDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Opened,
    Configured,
    Streaming,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Opened => write!(f, "opened"),
            State::Configured => write!(f, "configured"),
            State::Streaming => write!(f, "streaming"),
        }
    }
}

/// Frame layout negotiated with the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
    /// Row stride of the captured buffer in bytes
    pub bytes_per_line: u32,
    /// Size of one captured frame in bytes
    pub size_image: u32,
}

impl FrameFormat {
    fn from_negotiated(applied: &PixFormat, encoding: PixelEncoding) -> FrameFormat {
        let bytes_per_line = match applied.bytes_per_line {
            0 => applied.width * encoding.bytes_per_pixel(),
            bpl => bpl,
        };
        let size_image = match applied.size_image {
            0 => bytes_per_line * applied.height,
            size => size,
        };
        FrameFormat {
            width: applied.width,
            height: applied.height,
            encoding,
            bytes_per_line,
            size_image,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} stride:{} size:{}",
            self.width, self.height, self.encoding, self.bytes_per_line, self.size_image
        )
    }
}

/// Capture device manager
///
/// Drives one adapter through `open` → `configure` → `start_capture` →
/// `capture_frame`* → `stop`. Every failure leaves the manager in a state
/// from which [`CaptureDevice::stop`] recovers; dropping the manager stops
/// it.
///
/// The driver is generic so the state machine can run against any
/// [`Driver`]; [`CaptureDevice::new`] uses the kernel V4L2 driver.
pub struct CaptureDevice<D: Driver = V4l2Driver> {
    settings: DeviceSettings,
    driver: Option<D>,
    format: Option<FrameFormat>,
    conversion: Option<Conversion>,
    pool: Vec<D::Mapping>,
    current: usize,
    last: Dequeued,
    state: State,
    captured: u64,
    timeouts: u64,
}

impl CaptureDevice<V4l2Driver> {
    pub fn new(settings: DeviceSettings) -> Self {
        Self::with_settings(settings)
    }
}

impl<D: Driver> CaptureDevice<D> {
    pub fn with_settings(settings: DeviceSettings) -> Self {
        CaptureDevice {
            settings,
            driver: None,
            format: None,
            conversion: None,
            pool: Vec::new(),
            current: 0,
            last: Dequeued::default(),
            state: State::Closed,
            captured: 0,
            timeouts: 0,
        }
    }

    /// Open the configured device node.
    pub fn open(&mut self) -> Result<(), Error> {
        self.expect_state(State::Closed, "open")?;
        let driver = D::open(self.settings.device()).map_err(|err| {
            log::error!("cannot open {}: {}", self.settings.device().display(), err);
            err
        })?;
        self.open_with(driver)
    }

    /// Take ownership of an already opened driver handle.
    pub fn open_with(&mut self, driver: D) -> Result<(), Error> {
        self.expect_state(State::Closed, "open")?;
        self.driver = Some(driver);
        self.state = State::Opened;
        log::debug!("{} opened", self.settings.device().display());
        Ok(())
    }

    /// Check capabilities, select the video standard and crop, negotiate the
    /// pixel format, bind the conversion strategy for the negotiated format
    /// and map the buffer pool.
    pub fn configure(&mut self) -> Result<(), Error> {
        self.expect_state(State::Opened, "configure")?;
        self.settings.validate()?;

        let requested = self.settings.num_buffers();
        if requested < MIN_BUFFERS {
            log::error!(
                "{} buffers requested, at least {} required",
                requested,
                MIN_BUFFERS
            );
            return Err(Error::InsufficientBuffers {
                requested,
                granted: 0,
            });
        }

        let settings = &self.settings;
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no driver handle".to_owned()))?;

        let cap = driver.query_capability()?;
        log::debug!(
            "{}: driver {} card {} caps 0x{:08x}",
            settings.device().display(),
            cap.driver,
            cap.card,
            cap.node_caps()
        );
        if !cap.can_capture() {
            log::error!("{} is not a video capture device", settings.device().display());
            return Err(Error::CapabilityUnsupported("video capture"));
        }
        if !cap.can_stream() {
            log::error!("{} does not support streaming I/O", settings.device().display());
            return Err(Error::CapabilityUnsupported("streaming I/O"));
        }

        if let Err(err) = driver.set_standard(settings.standard().std_id()) {
            log::warn!("unable to set video standard {}: {}", settings.standard(), err);
        }

        match driver.crop_default() {
            Ok(rect) => {
                if let Err(err) = driver.set_crop(rect) {
                    log::debug!("cropping not supported: {}", err);
                }
            }
            Err(err) => log::debug!("crop capabilities unavailable: {}", err),
        }

        let encoding = settings.encoding();
        let request = PixFormat {
            width: settings.width(),
            height: settings.height(),
            fourcc: encoding.fourcc(),
            field: sys::V4L2_FIELD_INTERLACED,
            bytes_per_line: 0,
            size_image: 0,
        };
        let applied = driver.set_format(&request).map_err(|err| {
            log::error!("VIDIOC_S_FMT {}x{} {}: {}", request.width, request.height, request.fourcc, err);
            Error::FormatNegotiationFailed(format!(
                "{}x{} {}: {}",
                request.width, request.height, request.fourcc, err
            ))
        })?;
        if applied.fourcc != request.fourcc {
            log::error!("driver substituted {} for {}", applied.fourcc, request.fourcc);
            return Err(Error::FormatNegotiationFailed(format!(
                "driver substituted {} for {}",
                applied.fourcc, request.fourcc
            )));
        }
        if applied.width != request.width || applied.height != request.height {
            log::info!(
                "driver adjusted {}x{} to {}x{}",
                request.width,
                request.height,
                applied.width,
                applied.height
            );
        }
        let format = FrameFormat::from_negotiated(&applied, encoding);

        let granted = driver.request_buffers(requested).map_err(|err| {
            if err.raw_os_error() == Some(libc::EINVAL) {
                log::error!("{} does not support memory mapping", settings.device().display());
                Error::CapabilityUnsupported("memory-mapped streaming")
            } else {
                Error::Io(err)
            }
        })?;
        if granted < MIN_BUFFERS {
            log::error!("insufficient buffer memory: {} of {} granted", granted, requested);
            release_pool(driver);
            return Err(Error::InsufficientBuffers { requested, granted });
        }

        let mut pool = Vec::with_capacity(granted as usize);
        for index in 0..granted {
            let mapping = driver
                .query_buffer(index)
                .and_then(|info| driver.map_buffer(&info));
            match mapping {
                Ok(mapping) => pool.push(mapping),
                Err(source) => {
                    log::error!("mapping buffer {} failed: {}", index, source);
                    drop(pool);
                    release_pool(driver);
                    return Err(Error::MappingFailed { index, source });
                }
            }
        }

        log::info!(
            "{} configured: {} {} buffers",
            settings.device().display(),
            format,
            pool.len()
        );
        self.conversion = Some(Conversion::select(format.encoding, format.width, format.height));
        self.pool = pool;
        self.format = Some(format);
        self.current = 0;
        self.state = State::Configured;
        Ok(())
    }

    /// Enqueue every pool buffer and turn the stream on.
    pub fn start_capture(&mut self) -> Result<(), Error> {
        self.expect_state(State::Configured, "start capture")?;
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no driver handle".to_owned()))?;

        for index in 0..self.pool.len() as u32 {
            driver.queue_buffer(index).map_err(|err| {
                log::error!("VIDIOC_QBUF {}: {}", index, err);
                Error::Io(err)
            })?;
        }
        driver.stream_on().map_err(|err| {
            log::error!("VIDIOC_STREAMON: {}", err);
            Error::Io(err)
        })?;

        self.state = State::Streaming;
        log::info!("{} streaming", self.settings.device().display());
        Ok(())
    }

    /// Wait for the next filled buffer.
    ///
    /// Returns `Ok(None)` without blocking when the device is not streaming,
    /// and after the readiness timeout when no frame arrived. The buffer is
    /// handed back to the driver as soon as it is dequeued; the returned view
    /// stays valid until the next call, which the borrow enforces.
    pub fn capture_frame(&mut self) -> Result<Option<CaptureBuffer<'_>>, Error> {
        if self.state != State::Streaming {
            return Ok(None);
        }
        let timeout = self.settings.timeout();
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no driver handle".to_owned()))?;

        loop {
            match driver.wait_readable(timeout) {
                Ok(true) => {}
                Ok(false) => {
                    log::warn!("timed out after {:?} waiting for a frame", timeout);
                    self.timeouts += 1;
                    return Ok(None);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::error!("waiting for frame: {}", err);
                    return Err(err.into());
                }
            }

            match driver.dequeue_buffer() {
                Ok(dequeued) => {
                    let index = dequeued.index as usize;
                    if index >= self.pool.len() {
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("driver returned buffer {} of {}", index, self.pool.len()),
                        )));
                    }
                    self.current = index;
                    self.last = dequeued;
                    driver.queue_buffer(dequeued.index).map_err(|err| {
                        log::error!("VIDIOC_QBUF {}: {}", dequeued.index, err);
                        Error::Io(err)
                    })?;
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) if err.raw_os_error() == Some(libc::EIO) => {
                    log::warn!("VIDIOC_DQBUF I/O error, reusing buffer {}", self.current);
                    break;
                }
                Err(err) => {
                    log::error!("VIDIOC_DQBUF: {}", err);
                    return Err(err.into());
                }
            }
        }

        self.captured += 1;
        let format = self
            .format
            .ok_or_else(|| Error::InvalidState("no negotiated format".to_owned()))?;
        Ok(Some(CaptureBuffer {
            data: self.pool[self.current].as_ref(),
            info: self.last,
            format,
        }))
    }

    /// Stop streaming, unmap the pool and close the device. Safe to call in
    /// any state, any number of times.
    pub fn stop(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            if self.state == State::Streaming {
                if let Err(err) = driver.stream_off() {
                    log::warn!("VIDIOC_STREAMOFF: {}", err);
                }
            }
            if !self.pool.is_empty() {
                self.pool.clear();
                release_pool(driver);
            }
            log::debug!("{} closed", self.settings.device().display());
        }

        self.pool.clear();
        self.driver = None;
        self.format = None;
        self.conversion = None;
        self.current = 0;
        self.last = Dequeued::default();
        self.state = State::Closed;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == State::Streaming
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Negotiated frame layout, available once configured
    pub fn format(&self) -> Option<FrameFormat> {
        self.format
    }

    /// Conversion strategy bound at configuration
    pub fn conversion(&self) -> Option<&Conversion> {
        self.conversion.as_ref()
    }

    pub fn buffer_count(&self) -> usize {
        self.pool.len()
    }

    /// Mapped length of every pool buffer, in index order
    pub fn buffer_lengths(&self) -> Vec<usize> {
        self.pool.iter().map(|m| m.as_ref().len()).collect()
    }

    /// Index of the most recently captured buffer
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Driver sequence number of the most recent capture
    pub fn last_sequence(&self) -> u32 {
        self.last.sequence
    }

    /// Frames delivered by [`CaptureDevice::capture_frame`]
    pub fn captured(&self) -> u64 {
        self.captured
    }

    /// Readiness waits that expired without a frame
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Driver handle, while the device is open
    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }

    fn expect_state(&self, expected: State, operation: &str) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} while {}",
                operation, self.state
            )))
        }
    }
}

/// Best-effort release of the driver-side pool.
fn release_pool<D: Driver>(driver: &mut D) {
    if let Err(err) = driver.request_buffers(0) {
        log::debug!("releasing buffer pool: {}", err);
    }
}

impl<D: Driver> Drop for CaptureDevice<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<D: Driver> fmt::Debug for CaptureDevice<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CaptureDevice")
            .field("device", &self.settings.device())
            .field("state", &self.state)
            .field("format", &self.format)
            .field("conversion", &self.conversion.as_ref().map(Conversion::name))
            .field("buffers", &self.pool.len())
            .field("current", &self.current)
            .finish()
    }
}

/// A captured frame, borrowed from the device's buffer pool
#[derive(Debug)]
pub struct CaptureBuffer<'a> {
    data: &'a [u8],
    info: Dequeued,
    format: FrameFormat,
}

impl CaptureBuffer<'_> {
    /// Pool index of the buffer
    pub fn index(&self) -> u32 {
        self.info.index
    }

    /// The whole mapped buffer
    pub fn data(&self) -> &[u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes the driver filled for this frame
    pub fn bytes_used(&self) -> u32 {
        self.info.bytes_used
    }

    pub fn sequence(&self) -> u32 {
        self.info.sequence
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp::new(self.info.timestamp_sec, self.info.timestamp_nsec)
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    pub fn width(&self) -> u32 {
        self.format.width
    }

    pub fn height(&self) -> u32 {
        self.format.height
    }

    pub fn encoding(&self) -> PixelEncoding {
        self.format.encoding
    }
}

impl fmt::Display for CaptureBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} index:{} seq:{} bytes:{}",
            self.width(),
            self.height(),
            self.encoding(),
            self.index(),
            self.sequence(),
            self.bytes_used()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::FourCC;

    #[test]
    fn test_frame_format_fills_missing_stride() {
        let applied = PixFormat {
            width: 720,
            height: 480,
            fourcc: FourCC::YUYV,
            field: sys::V4L2_FIELD_INTERLACED,
            bytes_per_line: 0,
            size_image: 0,
        };
        let format = FrameFormat::from_negotiated(&applied, PixelEncoding::Yuyv);
        assert_eq!(format.bytes_per_line, 1440);
        assert_eq!(format.size_image, 1440 * 480);
    }

    #[test]
    fn test_frame_format_keeps_driver_stride() {
        let applied = PixFormat {
            width: 640,
            height: 480,
            fourcc: FourCC::RGBA32,
            field: sys::V4L2_FIELD_INTERLACED,
            bytes_per_line: 2816,
            size_image: 2816 * 480,
        };
        let format = FrameFormat::from_negotiated(&applied, PixelEncoding::Rgba8888);
        assert_eq!(format.bytes_per_line, 2816);
        assert_eq!(format.size_image, 2816 * 480);
        assert_eq!(format.to_string(), "640x480 rgba8888 stride:2816 size:1351680");
    }

    #[test]
    fn test_capture_on_closed_device() {
        let mut device = CaptureDevice::new(DeviceSettings::default());
        assert_eq!(device.state(), State::Closed);
        assert!(device.capture_frame().unwrap().is_none());
        device.stop();
        device.stop();
        assert_eq!(device.state(), State::Closed);
    }

    #[test]
    fn test_configure_requires_open() {
        let mut device = CaptureDevice::new(DeviceSettings::default());
        assert!(matches!(device.configure(), Err(Error::InvalidState(_))));
        assert!(matches!(device.start_capture(), Err(Error::InvalidState(_))));
    }
}
