// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! EasyCap Capture Library for Rust
//!
//! Zero-copy capture from V4L2 analog video adapters (the "EasyCap" family of
//! USB grabbers) and presentation of the captured frames into a display
//! surface.
//!
//! The library is organised as a small pipeline:
//!
//! - [`probe`] classifies which adapter family sits behind a device node.
//! - [`device::CaptureDevice`] drives the open → configure → stream → capture
//!   lifecycle over a pool of memory-mapped kernel buffers.
//! - [`convert::Conversion`] is the per-session pixel conversion strategy.
//! - [`renderer::FrameRenderer`] converts one captured buffer and posts it
//!   into a [`surface::Surface`].
//! - [`session::Session`] ties everything together for callers.
//!
//! # Quick Start
//!
//! ```no_run
//! use easycap::session::Session;
//! use easycap::settings::{DeviceSettings, PixelEncoding};
//! use easycap::surface::MemorySurface;
//!
//! let settings = DeviceSettings::default()
//!     .with_device("/dev/video0")
//!     .with_resolution(720, 480)
//!     .with_encoding(PixelEncoding::Yuyv);
//!
//! let mut session = Session::start(settings)?;
//! let mut surface = MemorySurface::new();
//! for _ in 0..30 {
//!     if session.next_frame(&mut surface)? {
//!         println!("posted frame {}", surface.posted());
//!     }
//! }
//! session.stop();
//! # Ok::<(), easycap::Error>(())
//! ```
//!
//! # Supported Adapters
//!
//! | Driver    | Family                 |
//! |-----------|------------------------|
//! | `usbtv`   | Fushicai UTV007        |
//! | `em28xx`  | Empia EM28xx           |
//! | `stk1160` | Syntek STK1160         |
//! | `smi2021` | Somagic SMI2021        |

use std::{error, fmt, io, path::PathBuf};

/// Error type for capture and presentation operations
///
/// Every variant is terminal for the current session. Transient conditions
/// (a readiness timeout, an empty dequeue, a driver I/O warning) are handled
/// inside [`device::CaptureDevice::capture_frame`] and never surface here.
#[derive(Debug)]
pub enum Error {
    /// The device path does not exist or is not a character device
    DeviceUnavailable(PathBuf),

    /// The device exists but the process may not open it
    DevicePermission(PathBuf),

    /// The device lacks video capture or streaming I/O support
    CapabilityUnsupported(&'static str),

    /// The driver rejected the requested pixel format or geometry
    FormatNegotiationFailed(String),

    /// Fewer than two buffers were requested or granted
    InsufficientBuffers {
        /// Number of buffers asked for in the settings
        requested: u32,
        /// Number of buffers the driver granted (0 if never asked)
        granted: u32,
    },

    /// Querying or memory-mapping a pool buffer failed
    MappingFailed {
        /// Index of the buffer that could not be mapped
        index: u32,
        /// Underlying OS error
        source: io::Error,
    },

    /// Settings failed validation before touching the device
    InvalidSettings(String),

    /// An operation was called out of lifecycle order
    InvalidState(String),

    /// I/O error from an underlying system call
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DeviceUnavailable(path) => {
                write!(f, "capture device unavailable: {}", path.display())
            }
            Error::DevicePermission(path) => {
                write!(f, "insufficient permissions on {}", path.display())
            }
            Error::CapabilityUnsupported(what) => {
                write!(f, "device does not support {}", what)
            }
            Error::FormatNegotiationFailed(msg) => {
                write!(f, "format negotiation failed: {}", msg)
            }
            Error::InsufficientBuffers { requested, granted } => write!(
                f,
                "insufficient buffer memory: requested {}, granted {}",
                requested, granted
            ),
            Error::MappingFailed { index, source } => {
                write!(f, "failed to map buffer {}: {}", index, source)
            }
            Error::InvalidSettings(msg) => write!(f, "invalid settings: {}", msg),
            Error::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::MappingFailed { source, .. } => Some(source),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// Capture settings, pixel encodings and video standards.
pub mod settings;

/// The driver module abstracts the V4L2 capture protocol.
pub mod driver;

/// Adapter detection by driver identity.
pub mod probe;

/// The device module implements the capture state machine.
pub mod device;

/// Pixel conversion strategies.
pub mod convert;

/// Display surfaces the renderer presents into.
pub mod surface;

/// Frame conversion and presentation.
pub mod renderer;

/// Caller-facing capture sessions.
pub mod session;

/// Get the easycap library version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
