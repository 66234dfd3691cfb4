// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use core::{fmt, result::Result, str::FromStr};

/// Four-character pixel format code as used by V4L2.
///
/// The numeric form always packs the first character into the least
/// significant byte, matching the kernel's `v4l2_fourcc()` macro on every
/// host endianness.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const YUYV: FourCC = FourCC(*b"YUYV");
    pub const UYVY: FourCC = FourCC(*b"UYVY");
    pub const RGB565: FourCC = FourCC(*b"RGBP");
    pub const RGBA32: FourCC = FourCC(*b"AB24");

    pub const fn from_u32(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }

    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC::from_u32(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

impl FromStr for FourCC {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| format!("FOURCC must be exactly 4 characters: {}", s))?;
        Ok(FourCC(bytes))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.0 {
                    write!(f, "{}", core::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "FourCC({}, 0x{:08x})", self, self.to_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_kernel_codes() {
        assert_eq!(FourCC::YUYV.to_u32(), easycap_sys::V4L2_PIX_FMT_YUYV);
        assert_eq!(FourCC::UYVY.to_u32(), easycap_sys::V4L2_PIX_FMT_UYVY);
        assert_eq!(FourCC::RGB565.to_u32(), easycap_sys::V4L2_PIX_FMT_RGB565);
        assert_eq!(FourCC::RGBA32.to_u32(), easycap_sys::V4L2_PIX_FMT_RGBA32);
        assert_eq!(FourCC::from(0x5659_5559), FourCC::YUYV);
    }

    #[test]
    fn test_parse_and_display() {
        let fourcc: FourCC = "UYVY".parse().unwrap();
        assert_eq!(fourcc, FourCC::UYVY);
        assert_eq!(fourcc.to_string(), "UYVY");
        assert!("YUY".parse::<FourCC>().is_err());
        assert!("YUYVV".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_display_non_printable() {
        let fourcc = FourCC([0xff, b'A', 0, b'B']);
        assert_eq!(fourcc.to_string(), "\\xffA\\x00B");
    }
}
