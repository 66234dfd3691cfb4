// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::Error;
use std::fmt;

/// Pixel layout of a presented surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 16 bits per pixel, 5:6:5
    Rgb565,
    /// 32 bits per pixel, byte order R G B A
    Rgba8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgba8888 => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Rgb565 => "RGB_565",
            PixelFormat::Rgba8888 => "RGBA_8888",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Writable pixel store of a locked surface
///
/// `stride` is in pixels, as display back-ends report it; it is never smaller
/// than `width`.
#[derive(Debug)]
pub struct SurfaceBuffer<'a> {
    pub bits: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl SurfaceBuffer<'_> {
    /// Row pitch in bytes
    pub fn row_bytes(&self) -> usize {
        self.stride as usize * self.format.bytes_per_pixel()
    }

    /// Whether rows follow each other with no padding
    pub fn is_packed(&self) -> bool {
        self.stride == self.width
    }

    pub fn capacity(&self) -> usize {
        self.bits.len()
    }
}

/// Display surface the renderer presents into
///
/// Implementations are owned by the caller. A present call declares the
/// geometry, locks one buffer, fills it and posts it; locking while a buffer
/// is already locked is a caller bug and may fail.
pub trait Surface {
    fn set_geometry(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<(), Error>;

    fn lock(&mut self) -> Result<SurfaceBuffer<'_>, Error>;

    fn unlock_and_post(&mut self) -> Result<(), Error>;
}

/// Heap-backed surface
///
/// Keeps the last posted frame in [`MemorySurface::pixels`]. Used by the CLI
/// and for testing without a display.
#[derive(Debug, Default)]
pub struct MemorySurface {
    geometry: Option<(u32, u32, PixelFormat)>,
    padding: u32,
    pixels: Vec<u8>,
    locked: bool,
    posted: u64,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface whose rows carry `padding` extra pixels past the width.
    pub fn with_padding(padding: u32) -> Self {
        MemorySurface {
            padding,
            ..Self::default()
        }
    }

    pub fn geometry(&self) -> Option<(u32, u32, PixelFormat)> {
        self.geometry
    }

    /// Row stride in pixels for the current geometry
    pub fn stride(&self) -> Option<u32> {
        self.geometry.map(|(width, _, _)| width + self.padding)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of frames posted so far
    pub fn posted(&self) -> u64 {
        self.posted
    }
}

impl Surface for MemorySurface {
    fn set_geometry(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSettings(format!(
                "surface geometry must be positive: {}x{}",
                width, height
            )));
        }
        if self.geometry != Some((width, height, format)) {
            let stride = (width + self.padding) as usize;
            self.pixels = vec![0; stride * height as usize * format.bytes_per_pixel()];
            self.geometry = Some((width, height, format));
        }
        Ok(())
    }

    fn lock(&mut self) -> Result<SurfaceBuffer<'_>, Error> {
        let (width, height, format) = self
            .geometry
            .ok_or_else(|| Error::InvalidState("surface geometry not set".to_owned()))?;
        if self.locked {
            return Err(Error::InvalidState("surface already locked".to_owned()));
        }
        self.locked = true;
        Ok(SurfaceBuffer {
            bits: &mut self.pixels,
            width,
            height,
            stride: width + self.padding,
            format,
        })
    }

    fn unlock_and_post(&mut self) -> Result<(), Error> {
        if !self.locked {
            return Err(Error::InvalidState("surface not locked".to_owned()));
        }
        self.locked = false;
        self.posted += 1;
        Ok(())
    }
}
