// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Low-level V4L2 kernel ABI for the easycap capture library.
//!
//! Hand-maintained `#[repr(C)]` mirrors of the subset of `linux/videodev2.h`
//! used for single-planar MMAP capture, together with the matching ioctl
//! request wrappers. Everything here is a direct view of the kernel ABI; the
//! safe API lives in the `easycap` crate.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

use std::mem;

// Re-export nix so callers can match on the errno returned by the ioctls
pub use nix;

use libc::{c_int, c_ulong, timeval};

/// Build a V4L2 fourcc code from its four characters.
pub const fn v4l2_fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

// Device capabilities (v4l2_capability.capabilities / device_caps)
pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x0000_0002;
pub const V4L2_CAP_READWRITE: u32 = 0x0100_0000;
pub const V4L2_CAP_STREAMING: u32 = 0x0400_0000;
pub const V4L2_CAP_DEVICE_CAPS: u32 = 0x8000_0000;

// enum v4l2_buf_type
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;

// enum v4l2_memory
pub const V4L2_MEMORY_MMAP: u32 = 1;

// enum v4l2_field
pub const V4L2_FIELD_INTERLACED: u32 = 4;

// Buffer flags
pub const V4L2_BUF_FLAG_DONE: u32 = 0x0000_0004;

pub type v4l2_std_id = u64;

pub const V4L2_STD_PAL_B: v4l2_std_id = 0x0000_0001;
pub const V4L2_STD_PAL_B1: v4l2_std_id = 0x0000_0002;
pub const V4L2_STD_PAL_G: v4l2_std_id = 0x0000_0004;
pub const V4L2_STD_PAL_H: v4l2_std_id = 0x0000_0008;
pub const V4L2_STD_PAL_I: v4l2_std_id = 0x0000_0010;
pub const V4L2_STD_PAL_D: v4l2_std_id = 0x0000_0020;
pub const V4L2_STD_PAL_D1: v4l2_std_id = 0x0000_0040;
pub const V4L2_STD_PAL_K: v4l2_std_id = 0x0000_0080;
pub const V4L2_STD_NTSC_M: v4l2_std_id = 0x0000_1000;
pub const V4L2_STD_NTSC_M_JP: v4l2_std_id = 0x0000_2000;
pub const V4L2_STD_NTSC_M_KR: v4l2_std_id = 0x0000_8000;

pub const V4L2_STD_PAL: v4l2_std_id = V4L2_STD_PAL_B
    | V4L2_STD_PAL_B1
    | V4L2_STD_PAL_G
    | V4L2_STD_PAL_H
    | V4L2_STD_PAL_I
    | V4L2_STD_PAL_D
    | V4L2_STD_PAL_D1
    | V4L2_STD_PAL_K;
pub const V4L2_STD_NTSC: v4l2_std_id = V4L2_STD_NTSC_M | V4L2_STD_NTSC_M_JP | V4L2_STD_NTSC_M_KR;

// Pixel formats
pub const V4L2_PIX_FMT_YUYV: u32 = v4l2_fourcc(b'Y', b'U', b'Y', b'V');
pub const V4L2_PIX_FMT_UYVY: u32 = v4l2_fourcc(b'U', b'Y', b'V', b'Y');
pub const V4L2_PIX_FMT_RGB565: u32 = v4l2_fourcc(b'R', b'G', b'B', b'P');
pub const V4L2_PIX_FMT_RGBA32: u32 = v4l2_fourcc(b'A', b'B', b'2', b'4');

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_fract {
    pub numerator: u32,
    pub denominator: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_cropcap {
    pub type_: u32,
    pub bounds: v4l2_rect,
    pub defrect: v4l2_rect,
    pub pixelaspect: v4l2_fract,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_crop {
    pub type_: u32,
    pub c: v4l2_rect,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

/// The `fmt` union of `struct v4l2_format`.
///
/// Only the single-planar pixel format is exposed. The zero-length `c_ulong`
/// array gives the union the pointer alignment the kernel's `v4l2_window`
/// member imposes, so the overall struct size matches the ioctl number.
#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_format_fmt {
    pub pix: v4l2_pix_format,
    pub raw_data: [u8; 200],
    _align: [c_ulong; 0],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_fmt,
}

impl Default for v4l2_format {
    fn default() -> Self {
        // SAFETY: plain-old-data kernel struct, all-zero is a valid value.
        unsafe { mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

/// The `m` union of `struct v4l2_buffer`.
///
/// `userptr` stands in for the `planes` pointer member; both are one machine
/// word wide.
#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: c_ulong,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl Default for v4l2_buffer {
    fn default() -> Self {
        // SAFETY: plain-old-data kernel struct, all-zero is a valid value.
        unsafe { mem::zeroed() }
    }
}

nix::ioctl_read! {
    /// `VIDIOC_QUERYCAP`
    vidioc_querycap, b'V', 0, v4l2_capability
}
nix::ioctl_readwrite! {
    /// `VIDIOC_S_FMT`
    vidioc_s_fmt, b'V', 5, v4l2_format
}
nix::ioctl_readwrite! {
    /// `VIDIOC_REQBUFS`
    vidioc_reqbufs, b'V', 8, v4l2_requestbuffers
}
nix::ioctl_readwrite! {
    /// `VIDIOC_QUERYBUF`
    vidioc_querybuf, b'V', 9, v4l2_buffer
}
nix::ioctl_readwrite! {
    /// `VIDIOC_QBUF`
    vidioc_qbuf, b'V', 15, v4l2_buffer
}
nix::ioctl_readwrite! {
    /// `VIDIOC_DQBUF`
    vidioc_dqbuf, b'V', 17, v4l2_buffer
}
nix::ioctl_write_ptr! {
    /// `VIDIOC_STREAMON`
    vidioc_streamon, b'V', 18, c_int
}
nix::ioctl_write_ptr! {
    /// `VIDIOC_STREAMOFF`
    vidioc_streamoff, b'V', 19, c_int
}
nix::ioctl_write_ptr! {
    /// `VIDIOC_S_STD`
    vidioc_s_std, b'V', 24, v4l2_std_id
}
nix::ioctl_readwrite! {
    /// `VIDIOC_CROPCAP`
    vidioc_cropcap, b'V', 58, v4l2_cropcap
}
nix::ioctl_write_ptr! {
    /// `VIDIOC_S_CROP`
    vidioc_s_crop, b'V', 60, v4l2_crop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes_match_kernel_abi() {
        assert_eq!(mem::size_of::<v4l2_capability>(), 104);
        assert_eq!(mem::size_of::<v4l2_rect>(), 16);
        assert_eq!(mem::size_of::<v4l2_cropcap>(), 44);
        assert_eq!(mem::size_of::<v4l2_crop>(), 20);
        assert_eq!(mem::size_of::<v4l2_pix_format>(), 48);
        assert_eq!(mem::size_of::<v4l2_requestbuffers>(), 20);
        assert_eq!(mem::size_of::<v4l2_timecode>(), 16);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_pointer_sized_structs_64bit() {
        assert_eq!(mem::size_of::<v4l2_format>(), 208);
        assert_eq!(mem::size_of::<v4l2_buffer>(), 88);
    }

    #[test]
    fn test_fourcc_constants() {
        assert_eq!(V4L2_PIX_FMT_YUYV, 0x5659_5559);
        assert_eq!(V4L2_PIX_FMT_UYVY, 0x5956_5955);
        assert_eq!(V4L2_PIX_FMT_RGB565, 0x5042_4752);
        assert_eq!(&V4L2_PIX_FMT_RGBA32.to_le_bytes(), b"AB24");
    }

    #[test]
    fn test_standard_masks() {
        assert_eq!(V4L2_STD_NTSC, 0xb000);
        assert_eq!(V4L2_STD_PAL, 0xff);
    }
}
