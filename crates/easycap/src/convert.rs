// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    settings::PixelEncoding,
    surface::{PixelFormat, SurfaceBuffer},
    Error,
};
use std::fmt;

/// Fixed-point BT.601 (studio swing) YCbCr to RGB converter
///
/// The per-component products are precomputed into lookup tables when the
/// converter is built, so converting a macropixel is a handful of table
/// lookups, adds and clamps.
#[derive(Clone)]
pub struct Yuv422Converter {
    luma: [i32; 256],
    v_red: [i32; 256],
    u_green: [i32; 256],
    v_green: [i32; 256],
    u_blue: [i32; 256],
}

impl Yuv422Converter {
    pub fn new() -> Self {
        let mut conv = Yuv422Converter {
            luma: [0; 256],
            v_red: [0; 256],
            u_green: [0; 256],
            v_green: [0; 256],
            u_blue: [0; 256],
        };
        for i in 0..256 {
            let c = i as i32 - 16;
            let d = i as i32 - 128;
            conv.luma[i] = 298 * c + 128;
            conv.v_red[i] = 409 * d;
            conv.u_green[i] = -100 * d;
            conv.v_green[i] = -208 * d;
            conv.u_blue[i] = 516 * d;
        }
        conv
    }

    /// Convert one pixel to RGBA.
    #[inline]
    pub fn rgba(&self, y: u8, u: u8, v: u8) -> [u8; 4] {
        let l = self.luma[y as usize];
        [
            clamp((l + self.v_red[v as usize]) >> 8),
            clamp((l + self.u_green[u as usize] + self.v_green[v as usize]) >> 8),
            clamp((l + self.u_blue[u as usize]) >> 8),
            0xff,
        ]
    }

    /// Convert one macropixel (two pixels sharing chroma) into 8 RGBA bytes.
    #[inline]
    fn macropixel(&self, y0: u8, u: u8, y1: u8, v: u8, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.rgba(y0, u, v));
        out[4..8].copy_from_slice(&self.rgba(y1, u, v));
    }
}

impl Default for Yuv422Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Yuv422Converter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Yuv422Converter")
    }
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Pixel conversion bound to a session
///
/// Selected once from the negotiated encoding and never changed afterwards.
#[derive(Debug, Clone)]
pub enum Conversion {
    /// RGB encodings are copied unchanged
    Identity,
    /// Packed 4:2:2 Y0 U Y1 V to RGBA
    Yuyv(Box<Yuv422Converter>),
    /// Packed 4:2:2 U Y0 V Y1 to RGBA
    Uyvy(Box<Yuv422Converter>),
}

impl Conversion {
    pub fn select(encoding: PixelEncoding, width: u32, height: u32) -> Conversion {
        let conversion = match encoding {
            PixelEncoding::Rgb565 | PixelEncoding::Rgba8888 => Conversion::Identity,
            PixelEncoding::Yuyv => Conversion::Yuyv(Box::default()),
            PixelEncoding::Uyvy => Conversion::Uyvy(Box::default()),
        };
        log::debug!(
            "{}x{} {} frames use {} conversion",
            width,
            height,
            encoding,
            conversion.name()
        );
        conversion
    }

    pub fn name(&self) -> &'static str {
        match self {
            Conversion::Identity => "identity",
            Conversion::Yuyv(_) => "yuyv-to-rgba",
            Conversion::Uyvy(_) => "uyvy-to-rgba",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Conversion::Identity)
    }

    /// Convert `src` (rows of `src_stride` bytes) into the locked surface
    /// store and return the number of bytes written.
    pub fn run(
        &self,
        src: &[u8],
        src_stride: usize,
        width: u32,
        height: u32,
        dst: &mut SurfaceBuffer<'_>,
    ) -> Result<usize, Error> {
        match self {
            Conversion::Identity => Ok(copy_identity(src, src_stride, width, height, dst)),
            Conversion::Yuyv(conv) => {
                convert_yuv422(src, src_stride, width, height, dst, |m, out| {
                    conv.macropixel(m[0], m[1], m[2], m[3], out)
                })
            }
            Conversion::Uyvy(conv) => {
                convert_yuv422(src, src_stride, width, height, dst, |m, out| {
                    conv.macropixel(m[1], m[0], m[3], m[2], out)
                })
            }
        }
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn copy_identity(
    src: &[u8],
    src_stride: usize,
    width: u32,
    height: u32,
    dst: &mut SurfaceBuffer<'_>,
) -> usize {
    if dst.is_packed() && src_stride == dst.row_bytes() {
        let len = src.len().min(dst.capacity());
        dst.bits[..len].copy_from_slice(&src[..len]);
        return len;
    }

    let row_bytes = dst.row_bytes();
    let line = (width.min(dst.width) as usize * dst.format.bytes_per_pixel()).min(src_stride);
    let mut written = 0;
    for row in 0..height.min(dst.height) as usize {
        let Some(src_row) = src.get(row * src_stride..) else {
            break;
        };
        let Some(dst_row) = dst.bits.get_mut(row * row_bytes..) else {
            break;
        };
        let len = line.min(src_row.len()).min(dst_row.len());
        dst_row[..len].copy_from_slice(&src_row[..len]);
        written += len;
    }
    written
}

fn convert_yuv422<F>(
    src: &[u8],
    src_stride: usize,
    width: u32,
    height: u32,
    dst: &mut SurfaceBuffer<'_>,
    macropixel: F,
) -> Result<usize, Error>
where
    F: Fn(&[u8], &mut [u8]),
{
    if dst.format != PixelFormat::Rgba8888 {
        return Err(Error::InvalidState(format!(
            "4:2:2 conversion cannot write {} surfaces",
            dst.format
        )));
    }

    let row_bytes = dst.row_bytes();
    let pairs = width.min(dst.width) as usize / 2;
    let mut written = 0;
    for row in 0..height.min(dst.height) as usize {
        let Some(src_row) = src.get(row * src_stride..) else {
            break;
        };
        let Some(dst_row) = dst.bits.get_mut(row * row_bytes..) else {
            break;
        };
        for (m, out) in src_row
            .chunks_exact(4)
            .zip(dst_row.chunks_exact_mut(8))
            .take(pairs)
        {
            macropixel(m, out);
            written += 8;
        }
    }
    Ok(written)
}
