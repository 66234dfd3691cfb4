// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{fourcc::FourCC, surface::PixelFormat, Error};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Default readiness wait applied to every capture call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum pool size for tear-free capture (one buffer filling, one presented)
pub const MIN_BUFFERS: u32 = 2;

/// Pixel encoding negotiated with the capture device
///
/// The encoding drives both the kernel format negotiation and the conversion
/// strategy, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelEncoding {
    /// Packed 4:2:2, byte order Y0 U Y1 V
    #[default]
    Yuyv,
    /// Packed 4:2:2, byte order U Y0 V Y1
    Uyvy,
    /// Packed 16-bit RGB 5:6:5
    Rgb565,
    /// Packed 32-bit RGBA, byte order R G B A
    Rgba8888,
}

impl PixelEncoding {
    pub const ALL: [PixelEncoding; 4] = [
        PixelEncoding::Yuyv,
        PixelEncoding::Uyvy,
        PixelEncoding::Rgb565,
        PixelEncoding::Rgba8888,
    ];

    /// Map a raw integer selector from host glue onto an encoding.
    ///
    /// Unknown selectors fall back to [`PixelEncoding::Yuyv`], which is what
    /// nearly every supported adapter streams natively.
    pub fn from_raw(raw: i32) -> PixelEncoding {
        match raw {
            0 => PixelEncoding::Yuyv,
            1 => PixelEncoding::Uyvy,
            2 => PixelEncoding::Rgb565,
            3 => PixelEncoding::Rgba8888,
            other => {
                log::warn!(
                    "unknown pixel encoding selector {}, falling back to YUYV",
                    other
                );
                PixelEncoding::Yuyv
            }
        }
    }

    pub fn fourcc(&self) -> FourCC {
        match self {
            PixelEncoding::Yuyv => FourCC::YUYV,
            PixelEncoding::Uyvy => FourCC::UYVY,
            PixelEncoding::Rgb565 => FourCC::RGB565,
            PixelEncoding::Rgba8888 => FourCC::RGBA32,
        }
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<PixelEncoding> {
        PixelEncoding::ALL
            .into_iter()
            .find(|enc| enc.fourcc() == fourcc)
    }

    /// Bytes per pixel in the captured buffer
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelEncoding::Rgba8888 => 4,
            _ => 2,
        }
    }

    /// Pixel format the presented surface must be declared with
    pub fn output_format(&self) -> PixelFormat {
        match self {
            PixelEncoding::Rgb565 => PixelFormat::Rgb565,
            _ => PixelFormat::Rgba8888,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelEncoding::Yuyv => "yuyv",
            PixelEncoding::Uyvy => "uyvy",
            PixelEncoding::Rgb565 => "rgb565",
            PixelEncoding::Rgba8888 => "rgba8888",
        }
    }
}

impl fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        PixelEncoding::ALL
            .into_iter()
            .find(|enc| enc.name() == lower || enc.fourcc().to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidSettings(format!("unknown pixel encoding: {}", s)))
    }
}

/// Analog video standard the adapter's decoder is tuned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoStandard {
    #[default]
    Ntsc,
    Pal,
}

impl VideoStandard {
    /// Map a raw integer selector onto a standard, defaulting to NTSC.
    pub fn from_raw(raw: i32) -> VideoStandard {
        match raw {
            1 => VideoStandard::Pal,
            _ => VideoStandard::Ntsc,
        }
    }

    pub fn std_id(&self) -> easycap_sys::v4l2_std_id {
        match self {
            VideoStandard::Ntsc => easycap_sys::V4L2_STD_NTSC,
            VideoStandard::Pal => easycap_sys::V4L2_STD_PAL,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoStandard::Ntsc => "ntsc",
            VideoStandard::Pal => "pal",
        }
    }
}

impl fmt::Display for VideoStandard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoStandard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ntsc" => Ok(VideoStandard::Ntsc),
            "pal" => Ok(VideoStandard::Pal),
            _ => Err(Error::InvalidSettings(format!(
                "unknown video standard: {}",
                s
            ))),
        }
    }
}

/// Capture session settings
///
/// Immutable once handed to a [`CaptureDevice`](crate::device::CaptureDevice);
/// build one with the `with_*` methods starting from [`Default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// video device node for the adapter
    device: PathBuf,

    /// requested frame width, the driver may adjust it
    width: u32,

    /// requested frame height, the driver may adjust it
    height: u32,

    encoding: PixelEncoding,

    standard: VideoStandard,

    /// number of mmap buffers to request
    num_buffers: u32,

    /// readiness wait bound for each capture call
    timeout: Duration,
}

impl DeviceSettings {
    pub fn with_device(self, device: impl AsRef<Path>) -> DeviceSettings {
        DeviceSettings {
            device: device.as_ref().to_path_buf(),
            ..self
        }
    }

    pub fn with_resolution(self, width: u32, height: u32) -> DeviceSettings {
        DeviceSettings {
            width,
            height,
            ..self
        }
    }

    pub fn with_encoding(self, encoding: PixelEncoding) -> DeviceSettings {
        DeviceSettings { encoding, ..self }
    }

    pub fn with_standard(self, standard: VideoStandard) -> DeviceSettings {
        DeviceSettings { standard, ..self }
    }

    pub fn with_buffers(self, num_buffers: u32) -> DeviceSettings {
        DeviceSettings {
            num_buffers,
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> DeviceSettings {
        DeviceSettings { timeout, ..self }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoding(&self) -> PixelEncoding {
        self.encoding
    }

    pub fn standard(&self) -> VideoStandard {
        self.standard
    }

    pub fn num_buffers(&self) -> u32 {
        self.num_buffers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check the geometry invariants. The buffer count is checked by the
    /// device manager against what the driver actually grants.
    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidSettings(format!(
                "frame dimensions must be positive: {}x{}",
                self.width, self.height
            )));
        }
        if matches!(self.encoding, PixelEncoding::Yuyv | PixelEncoding::Uyvy) && self.width % 2 != 0 {
            return Err(Error::InvalidSettings(format!(
                "{} frames pair pixels, width must be even: {}",
                self.encoding, self.width
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidSettings(
                "capture timeout must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for DeviceSettings {
    fn default() -> DeviceSettings {
        DeviceSettings {
            device: PathBuf::from("/dev/video0"),
            width: 720,
            height: 480,
            encoding: PixelEncoding::Yuyv,
            standard: VideoStandard::Ntsc,
            num_buffers: 4,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Display for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}x{} {} {} buffers:{}",
            self.device.display(),
            self.width,
            self.height,
            self.encoding,
            self.standard,
            self.num_buffers
        )
    }
}
