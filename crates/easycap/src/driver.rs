// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! V4L2 capture protocol
//!
//! [`Driver`] is the seam between the capture state machine and the kernel:
//! every interaction the manager has with a device (capability query,
//! standard and crop selection, format negotiation, buffer pool management,
//! queue/dequeue and stream control) goes through it. [`V4l2Driver`] is the
//! implementation for real device nodes, built on the raw ioctls in
//! `easycap-sys`.

use crate::{fourcc::FourCC, Error};
use easycap_sys as sys;
use std::{
    ffi::CStr,
    fmt,
    fs::{File, OpenOptions},
    io,
    num::NonZeroUsize,
    os::{
        fd::{AsFd, AsRawFd, RawFd},
        unix::fs::{FileTypeExt, OpenOptionsExt},
    },
    path::{Path, PathBuf},
    ptr::NonNull,
    slice,
    time::Duration,
};
use sys::nix::{
    poll::{poll, PollFd, PollFlags, PollTimeout},
    sys::mman::{mmap, munmap, MapFlags, ProtFlags},
};

/// Capability and identity metadata reported by `VIDIOC_QUERYCAP`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capability {
    /// Kernel driver name (e.g. "usbtv", "em28xx")
    pub driver: String,
    /// Card/device name
    pub card: String,
    /// Bus information (e.g. "usb-0000:00:14.0-2")
    pub bus_info: String,
    /// Driver version
    pub version: u32,
    /// Capabilities of the physical device
    pub capabilities: u32,
    /// Capabilities of this particular node, valid with `V4L2_CAP_DEVICE_CAPS`
    pub device_caps: u32,
}

impl Capability {
    pub(crate) fn from_raw(raw: &sys::v4l2_capability) -> Self {
        Capability {
            driver: c_field(&raw.driver),
            card: c_field(&raw.card),
            bus_info: c_field(&raw.bus_info),
            version: raw.version,
            capabilities: raw.capabilities,
            device_caps: raw.device_caps,
        }
    }

    /// Capabilities of the opened node, preferring the per-node set.
    pub fn node_caps(&self) -> u32 {
        if self.capabilities & sys::V4L2_CAP_DEVICE_CAPS != 0 {
            self.device_caps
        } else {
            self.capabilities
        }
    }

    pub fn can_capture(&self) -> bool {
        self.node_caps() & sys::V4L2_CAP_VIDEO_CAPTURE != 0
    }

    pub fn can_stream(&self) -> bool {
        self.node_caps() & sys::V4L2_CAP_STREAMING != 0
    }
}

/// Decode a fixed-size, NUL-padded kernel string.
fn c_field(bytes: &[u8]) -> String {
    match CStr::from_bytes_until_nul(bytes) {
        Ok(s) => s.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Rectangle in sensor coordinates, used for cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Single-planar pixel format as negotiated with `VIDIOC_S_FMT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    /// `enum v4l2_field` value
    pub field: u32,
    /// Row stride in bytes, 0 lets the driver choose
    pub bytes_per_line: u32,
    /// Total frame size in bytes, 0 lets the driver choose
    pub size_image: u32,
}

/// Kernel-assigned placement of one pool buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub index: u32,
    pub length: u32,
    pub offset: u32,
}

/// Metadata of a dequeued (filled) buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dequeued {
    pub index: u32,
    pub bytes_used: u32,
    pub sequence: u32,
    pub flags: u32,
    pub timestamp_sec: i64,
    pub timestamp_nsec: u32,
}

/// Capture device protocol
///
/// All methods report failures as [`io::Error`] carrying the OS error code so
/// the caller can apply its policy (`EAGAIN`, `EIO` and `EINTR` are not fatal
/// for the capture loop).
pub trait Driver {
    /// Memory-mapped view of one pool buffer, unmapped on drop
    type Mapping: AsRef<[u8]>;

    /// Open the node read/write and non-blocking.
    fn open(path: &Path) -> Result<Self, Error>
    where
        Self: Sized;

    fn query_capability(&mut self) -> io::Result<Capability>;

    fn set_standard(&mut self, std_id: sys::v4l2_std_id) -> io::Result<()>;

    /// Default crop rectangle from `VIDIOC_CROPCAP`
    fn crop_default(&mut self) -> io::Result<Rect>;

    fn set_crop(&mut self, rect: Rect) -> io::Result<()>;

    /// Request a format; returns what the driver actually applied.
    fn set_format(&mut self, format: &PixFormat) -> io::Result<PixFormat>;

    /// Request `count` MMAP buffers; returns the count granted. Zero releases
    /// the pool.
    fn request_buffers(&mut self, count: u32) -> io::Result<u32>;

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo>;

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<Self::Mapping>;

    fn queue_buffer(&mut self, index: u32) -> io::Result<()>;

    fn dequeue_buffer(&mut self) -> io::Result<Dequeued>;

    fn stream_on(&mut self) -> io::Result<()>;

    fn stream_off(&mut self) -> io::Result<()>;

    /// Block until the device has a filled buffer or `timeout` elapses.
    /// Returns `Ok(false)` on timeout.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Whether the underlying node is still present.
    fn is_present(&self) -> bool {
        true
    }
}

/// Open a V4L2 node the way every capture path expects: it must be a
/// character device, opened read/write and non-blocking.
pub fn open_device(path: &Path) -> Result<File, Error> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            log::debug!("Cannot identify '{}': {}", path.display(), err);
            return Err(Error::DevicePermission(path.to_path_buf()));
        }
        Err(err) => {
            log::debug!("Cannot identify '{}': {}", path.display(), err);
            return Err(Error::DeviceUnavailable(path.to_path_buf()));
        }
    };

    if !meta.file_type().is_char_device() {
        log::debug!("{} is not a character device", path.display());
        return Err(Error::DeviceUnavailable(path.to_path_buf()));
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
        .open(path)
        .map_err(|err| {
            log::debug!("Cannot open '{}': {}", path.display(), err);
            match err.raw_os_error() {
                Some(libc::EACCES) | Some(libc::EPERM) => {
                    Error::DevicePermission(path.to_path_buf())
                }
                Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => {
                    Error::DeviceUnavailable(path.to_path_buf())
                }
                _ => Error::Io(err),
            }
        })
}

/// Issue an ioctl, retrying while it is interrupted by a signal.
fn xioctl<F>(mut request: F) -> io::Result<()>
where
    F: FnMut() -> sys::nix::Result<libc::c_int>,
{
    loop {
        match request() {
            Ok(_) => return Ok(()),
            Err(sys::nix::errno::Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from(errno)),
        }
    }
}

/// A buffer of the device's pool mapped into this process
pub struct MmapRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is plain shared memory owned by this handle; it is only
// unmapped in Drop.
unsafe impl Send for MmapRegion {}

impl MmapRegion {
    fn map<F: AsFd>(fd: F, offset: u32, len: usize) -> io::Result<MmapRegion> {
        let length = NonZeroUsize::new(len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "zero-length buffer"))?;
        // SAFETY: a fresh shared mapping of the device at a kernel-provided
        // offset, never aliased by another Rust allocation.
        let addr = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                offset as libc::off_t,
            )
        }?;
        Ok(MmapRegion {
            ptr: addr.cast(),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for MmapRegion {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: ptr/len describe a live mapping until Drop.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        // SAFETY: unmapping exactly the region returned by mmap.
        if let Err(errno) = unsafe { munmap(self.ptr.cast(), self.len) } {
            log::error!("munmap: {}", errno);
        }
    }
}

impl fmt::Debug for MmapRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MmapRegion {{ ptr: {:?}, len: {} }}", self.ptr, self.len)
    }
}

/// Driver for a real V4L2 device node
#[derive(Debug)]
pub struct V4l2Driver {
    path: PathBuf,
    file: File,
}

impl V4l2Driver {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn capture_buffer(index: u32) -> sys::v4l2_buffer {
        sys::v4l2_buffer {
            index,
            type_: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::V4L2_MEMORY_MMAP,
            ..Default::default()
        }
    }
}

impl Driver for V4l2Driver {
    type Mapping = MmapRegion;

    fn open(path: &Path) -> Result<Self, Error> {
        let file = open_device(path)?;
        log::debug!("opened {} (fd {})", path.display(), file.as_raw_fd());
        Ok(V4l2Driver {
            path: path.to_path_buf(),
            file,
        })
    }

    fn query_capability(&mut self) -> io::Result<Capability> {
        let mut raw = sys::v4l2_capability::default();
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_querycap(fd, &mut raw) })?;
        Ok(Capability::from_raw(&raw))
    }

    fn set_standard(&mut self, std_id: sys::v4l2_std_id) -> io::Result<()> {
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_s_std(fd, &std_id) })
    }

    fn crop_default(&mut self) -> io::Result<Rect> {
        let mut cropcap = sys::v4l2_cropcap {
            type_: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..Default::default()
        };
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_cropcap(fd, &mut cropcap) })?;
        let r = cropcap.defrect;
        Ok(Rect {
            left: r.left,
            top: r.top,
            width: r.width,
            height: r.height,
        })
    }

    fn set_crop(&mut self, rect: Rect) -> io::Result<()> {
        let crop = sys::v4l2_crop {
            type_: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            c: sys::v4l2_rect {
                left: rect.left,
                top: rect.top,
                width: rect.width,
                height: rect.height,
            },
        };
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_s_crop(fd, &crop) })
    }

    fn set_format(&mut self, format: &PixFormat) -> io::Result<PixFormat> {
        let mut raw = sys::v4l2_format {
            type_: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            ..Default::default()
        };
        raw.fmt.pix = sys::v4l2_pix_format {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.to_u32(),
            field: format.field,
            bytesperline: format.bytes_per_line,
            sizeimage: format.size_image,
            ..Default::default()
        };

        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_s_fmt(fd, &mut raw) })?;

        // SAFETY: the capture buffer type selects the `pix` union member.
        let pix = unsafe { raw.fmt.pix };
        Ok(PixFormat {
            width: pix.width,
            height: pix.height,
            fourcc: FourCC::from_u32(pix.pixelformat),
            field: pix.field,
            bytes_per_line: pix.bytesperline,
            size_image: pix.sizeimage,
        })
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        let mut req = sys::v4l2_requestbuffers {
            count,
            type_: sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: sys::V4L2_MEMORY_MMAP,
            ..Default::default()
        };
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_reqbufs(fd, &mut req) })?;
        Ok(req.count)
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo> {
        let mut buf = Self::capture_buffer(index);
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_querybuf(fd, &mut buf) })?;
        Ok(BufferInfo {
            index: buf.index,
            length: buf.length,
            // SAFETY: MMAP buffers report their placement in `offset`.
            offset: unsafe { buf.m.offset },
        })
    }

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<MmapRegion> {
        MmapRegion::map(&self.file, info.offset, info.length as usize)
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        let mut buf = Self::capture_buffer(index);
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_qbuf(fd, &mut buf) })
    }

    fn dequeue_buffer(&mut self) -> io::Result<Dequeued> {
        let mut buf = Self::capture_buffer(0);
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_dqbuf(fd, &mut buf) })?;
        Ok(Dequeued {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
            flags: buf.flags,
            timestamp_sec: buf.timestamp.tv_sec as i64,
            timestamp_nsec: (buf.timestamp.tv_usec as u32).saturating_mul(1000),
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        let ty = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE as libc::c_int;
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_streamon(fd, &ty) })
    }

    fn stream_off(&mut self) -> io::Result<()> {
        let ty = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE as libc::c_int;
        let fd = self.fd();
        xioctl(|| unsafe { sys::vidioc_streamoff(fd, &ty) })
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let timeout = PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX);
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout)? {
            0 => Ok(false),
            _ => Ok(true),
        }
    }

    fn is_present(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.file_type().is_char_device())
            .unwrap_or(false)
    }
}
