// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    convert::Conversion,
    device::{CaptureBuffer, FrameFormat},
    surface::{PixelFormat, Surface},
    Error,
};

/// Converts captured frames and posts them into a [`Surface`]
///
/// The conversion strategy is bound from the negotiated format when the
/// renderer is built. Each present call declares the surface geometry, locks
/// it, converts one frame and posts it; nothing is queued between calls.
#[derive(Debug)]
pub struct FrameRenderer {
    format: FrameFormat,
    conversion: Conversion,
    presented: u64,
    dropped: u64,
}

impl FrameRenderer {
    pub fn new(format: &FrameFormat) -> Self {
        Self::with_conversion(
            format,
            Conversion::select(format.encoding, format.width, format.height),
        )
    }

    /// Build a renderer around a strategy already bound by the device.
    pub fn with_conversion(format: &FrameFormat, conversion: Conversion) -> Self {
        FrameRenderer {
            format: *format,
            conversion,
            presented: 0,
            dropped: 0,
        }
    }

    pub fn conversion(&self) -> &Conversion {
        &self.conversion
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Pixel format the surface is declared with
    pub fn output_format(&self) -> PixelFormat {
        self.format.encoding.output_format()
    }

    /// Present one captured buffer. Returns `Ok(false)` when the surface
    /// could not be locked and the frame was dropped.
    pub fn present<S: Surface + ?Sized>(
        &mut self,
        buffer: &CaptureBuffer<'_>,
        surface: &mut S,
    ) -> Result<bool, Error> {
        self.present_bytes(buffer.data(), surface)
    }

    /// Present raw frame bytes laid out in the negotiated format.
    pub fn present_bytes<S: Surface + ?Sized>(
        &mut self,
        frame: &[u8],
        surface: &mut S,
    ) -> Result<bool, Error> {
        let FrameFormat {
            width,
            height,
            bytes_per_line,
            ..
        } = self.format;
        surface.set_geometry(width, height, self.output_format())?;

        let written = {
            let mut locked = match surface.lock() {
                Ok(locked) => locked,
                Err(err) => {
                    log::debug!("surface lock failed, dropping frame: {}", err);
                    self.dropped += 1;
                    return Ok(false);
                }
            };
            self.conversion
                .run(frame, bytes_per_line as usize, width, height, &mut locked)
        };

        // post even on a conversion error so the surface is never left locked
        surface.unlock_and_post()?;
        let written = written?;

        self.presented += 1;
        log::trace!("presented {} bytes via {}", written, self.conversion);
        Ok(true)
    }

    /// Frames posted so far
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Frames dropped because the surface could not be locked
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        settings::PixelEncoding,
        surface::{MemorySurface, SurfaceBuffer},
    };

    fn format(encoding: PixelEncoding, width: u32, height: u32) -> FrameFormat {
        let bytes_per_line = width * encoding.bytes_per_pixel();
        FrameFormat {
            width,
            height,
            encoding,
            bytes_per_line,
            size_image: bytes_per_line * height,
        }
    }

    /// Surface that refuses every lock
    struct BusySurface {
        geometry_calls: usize,
        posts: usize,
    }

    impl Surface for BusySurface {
        fn set_geometry(&mut self, _: u32, _: u32, _: PixelFormat) -> Result<(), Error> {
            self.geometry_calls += 1;
            Ok(())
        }

        fn lock(&mut self) -> Result<SurfaceBuffer<'_>, Error> {
            Err(Error::InvalidState("window gone".to_owned()))
        }

        fn unlock_and_post(&mut self) -> Result<(), Error> {
            self.posts += 1;
            Ok(())
        }
    }

    #[test]
    fn test_rgb565_identity_present() {
        let mut renderer = FrameRenderer::new(&format(PixelEncoding::Rgb565, 4, 2));
        assert!(renderer.conversion().is_identity());
        assert_eq!(renderer.output_format(), PixelFormat::Rgb565);

        let frame: Vec<u8> = (0..16).collect();
        let mut surface = MemorySurface::new();
        assert!(renderer.present_bytes(&frame, &mut surface).unwrap());
        assert_eq!(surface.geometry(), Some((4, 2, PixelFormat::Rgb565)));
        assert_eq!(surface.pixels(), &frame[..]);
        assert_eq!(surface.posted(), 1);
        assert_eq!(renderer.presented(), 1);
    }

    #[test]
    fn test_padded_rows_into_packed_surface() {
        let format = FrameFormat {
            bytes_per_line: 8,
            size_image: 16,
            ..format(PixelEncoding::Rgb565, 2, 2)
        };
        let mut renderer = FrameRenderer::new(&format);
        let frame = [0u8, 1, 2, 3, 9, 9, 9, 9, 4, 5, 6, 7, 9, 9, 9, 9];
        let mut surface = MemorySurface::new();
        assert!(renderer.present_bytes(&frame, &mut surface).unwrap());
        assert_eq!(surface.pixels(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_yuyv_present_declares_rgba() {
        let mut renderer = FrameRenderer::new(&format(PixelEncoding::Yuyv, 2, 1));
        assert_eq!(renderer.output_format(), PixelFormat::Rgba8888);

        let mut surface = MemorySurface::new();
        assert!(renderer
            .present_bytes(&[235, 128, 235, 128], &mut surface)
            .unwrap());
        assert_eq!(surface.geometry(), Some((2, 1, PixelFormat::Rgba8888)));
        assert_eq!(surface.pixels(), &[255; 8]);
    }

    #[test]
    fn test_lock_failure_drops_frame() {
        let mut renderer = FrameRenderer::new(&format(PixelEncoding::Uyvy, 2, 2));
        let mut surface = BusySurface {
            geometry_calls: 0,
            posts: 0,
        };

        assert!(!renderer.present_bytes(&[0; 8], &mut surface).unwrap());
        assert!(!renderer.present_bytes(&[0; 8], &mut surface).unwrap());
        assert_eq!(surface.geometry_calls, 2);
        assert_eq!(surface.posts, 0);
        assert_eq!(renderer.dropped(), 2);
        assert_eq!(renderer.presented(), 0);
    }

    #[test]
    fn test_strategy_fixed_for_session() {
        let mut renderer = FrameRenderer::new(&format(PixelEncoding::Uyvy, 2, 1));
        let mut surface = MemorySurface::new();
        for _ in 0..3 {
            renderer.present_bytes(&[128, 16, 128, 16], &mut surface).unwrap();
            assert!(matches!(renderer.conversion(), Conversion::Uyvy(_)));
        }
        assert_eq!(surface.posted(), 3);
    }
}
