// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Adapter detection
//!
//! EasyCap-style grabbers are sold under one name but built around several
//! different chipsets, each with its own kernel driver. This module opens a
//! device node, asks the driver who it is and maps the answer onto a
//! [`DeviceKind`].
//!
//! # Example
//!
//! ```no_run
//! use easycap::probe;
//!
//! for device in probe::enumerate()? {
//!     match device.kind() {
//!         Some(kind) => println!("{}: {}", device.path().display(), kind),
//!         None => println!("{}: {} (unsupported)", device.path().display(), device.driver()),
//!     }
//! }
//! # Ok::<(), easycap::Error>(())
//! ```

use crate::{
    driver::{Capability, Driver, V4l2Driver},
    Error,
};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Adapter chipset family
///
/// Families are recognized by the prefix of the kernel driver name reported
/// by `VIDIOC_QUERYCAP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Fushicai UTV007, driver `usbtv`
    Utv007,
    /// Empia EM28xx, driver `em28xx`
    Empia,
    /// Syntek STK1160, driver `stk1160`
    Stk1160,
    /// Somagic SMI2021, driver `smi2021`
    Somagic,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 4] = [
        DeviceKind::Utv007,
        DeviceKind::Empia,
        DeviceKind::Stk1160,
        DeviceKind::Somagic,
    ];

    /// Match a kernel driver name against the known families.
    ///
    /// Matching is by prefix so suffixed driver names still classify.
    pub fn from_driver(driver: &str) -> Option<DeviceKind> {
        DeviceKind::ALL
            .into_iter()
            .find(|kind| driver.starts_with(kind.driver_prefix()))
    }

    pub fn driver_prefix(&self) -> &'static str {
        match self {
            DeviceKind::Utv007 => "usbtv",
            DeviceKind::Empia => "em28xx",
            DeviceKind::Stk1160 => "stk1160",
            DeviceKind::Somagic => "smi2021",
        }
    }

    /// Human-readable family name
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Utv007 => "UTV007",
            DeviceKind::Empia => "EMPIA",
            DeviceKind::Stk1160 => "STK1160",
            DeviceKind::Somagic => "SOMAGIC",
        }
    }

    /// Numeric code for host glue; 0 is reserved for "not detected".
    pub fn raw(&self) -> i32 {
        match self {
            DeviceKind::Utv007 => 1,
            DeviceKind::Empia => 2,
            DeviceKind::Stk1160 => 3,
            DeviceKind::Somagic => 4,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity and capabilities of one video node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    path: PathBuf,
    capability: Capability,
    kind: Option<DeviceKind>,
}

impl DeviceInfo {
    fn new(path: &Path, capability: Capability) -> Self {
        let kind = DeviceKind::from_driver(&capability.driver);
        DeviceInfo {
            path: path.to_path_buf(),
            capability,
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn driver(&self) -> &str {
        &self.capability.driver
    }

    pub fn card(&self) -> &str {
        &self.capability.card
    }

    pub fn bus_info(&self) -> &str {
        &self.capability.bus_info
    }

    /// Driver version as `major.minor.patch`
    pub fn version(&self) -> String {
        let v = self.capability.version;
        format!("{}.{}.{}", (v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
    }

    /// Capability bits of this node
    pub fn capabilities(&self) -> u32 {
        self.capability.node_caps()
    }

    pub fn can_capture(&self) -> bool {
        self.capability.can_capture()
    }

    pub fn can_stream(&self) -> bool {
        self.capability.can_stream()
    }

    /// Recognized adapter family, if any
    pub fn kind(&self) -> Option<DeviceKind> {
        self.kind
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.card(),
            self.driver()
        )?;
        if let Some(kind) = self.kind {
            write!(f, " [{}]", kind)?;
        }
        Ok(())
    }
}

/// Classify the adapter behind `path`.
///
/// Any failure (not a character device, open refused, query rejected) and
/// any unrecognized driver yields `None`. The handle is closed before
/// returning.
pub fn classify(path: impl AsRef<Path>) -> Option<DeviceKind> {
    let path = path.as_ref();
    match V4l2Driver::open(path) {
        Ok(driver) => classify_driver(driver),
        Err(err) => {
            log::debug!("classify {}: {}", path.display(), err);
            None
        }
    }
}

/// Classify an opened driver handle, consuming and closing it.
pub fn classify_driver<D: Driver>(mut driver: D) -> Option<DeviceKind> {
    match driver.query_capability() {
        Ok(cap) => {
            let kind = DeviceKind::from_driver(&cap.driver);
            match kind {
                Some(kind) => log::info!("detected {} adapter ({})", kind, cap.driver),
                None => log::debug!("unrecognized driver {}", cap.driver),
            }
            kind
        }
        Err(err) => {
            log::debug!("VIDIOC_QUERYCAP: {}", err);
            None
        }
    }
}

/// Query identity and capabilities of the node at `path`.
pub fn identify(path: impl AsRef<Path>) -> Result<DeviceInfo, Error> {
    let path = path.as_ref();
    let mut driver = V4l2Driver::open(path)?;
    let capability = driver.query_capability()?;
    Ok(DeviceInfo::new(path, capability))
}

/// Identify every `/dev/video*` node, sorted by node number.
///
/// Nodes that cannot be opened or queried are skipped.
pub fn enumerate() -> Result<Vec<DeviceInfo>, Error> {
    enumerate_in(Path::new("/dev"))
}

fn enumerate_in(dir: &Path) -> Result<Vec<DeviceInfo>, Error> {
    let mut nodes: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let number = video_node_number(name.to_str()?)?;
            Some((number, entry.path()))
        })
        .collect();
    nodes.sort();

    Ok(nodes
        .into_iter()
        .filter_map(|(_, path)| match identify(&path) {
            Ok(info) => Some(info),
            Err(err) => {
                log::debug!("skipping {}: {}", path.display(), err);
                None
            }
        })
        .collect())
}

/// `video12` → 12
fn video_node_number(name: &str) -> Option<u32> {
    name.strip_prefix("video")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_prefix_matching() {
        assert_eq!(DeviceKind::from_driver("usbtv"), Some(DeviceKind::Utv007));
        assert_eq!(DeviceKind::from_driver("em28xx"), Some(DeviceKind::Empia));
        assert_eq!(DeviceKind::from_driver("em28xx_v4l"), Some(DeviceKind::Empia));
        assert_eq!(DeviceKind::from_driver("stk1160"), Some(DeviceKind::Stk1160));
        assert_eq!(DeviceKind::from_driver("smi2021"), Some(DeviceKind::Somagic));
        assert_eq!(DeviceKind::from_driver("uvcvideo"), None);
        assert_eq!(DeviceKind::from_driver("usb"), None);
        assert_eq!(DeviceKind::from_driver(""), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(DeviceKind::Utv007.to_string(), "UTV007");
        assert_eq!(DeviceKind::Somagic.name(), "SOMAGIC");
        let raws: Vec<i32> = DeviceKind::ALL.iter().map(|k| k.raw()).collect();
        assert_eq!(raws, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_video_node_number() {
        assert_eq!(video_node_number("video0"), Some(0));
        assert_eq!(video_node_number("video12"), Some(12));
        assert_eq!(video_node_number("video"), None);
        assert_eq!(video_node_number("vbi0"), None);
        assert_eq!(video_node_number("video0p1"), None);
    }

    #[test]
    fn test_classify_non_device() {
        assert_eq!(classify("/dev/easycap-does-not-exist"), None);
        assert_eq!(classify("/proc/self/status"), None);
    }

    #[test]
    fn test_info_display() {
        let cap = Capability {
            driver: "stk1160".to_owned(),
            card: "stk1160".to_owned(),
            bus_info: "usb-0000:00:14.0-1".to_owned(),
            version: 0x0006_0100,
            ..Default::default()
        };
        let info = DeviceInfo::new(Path::new("/dev/video1"), cap);
        assert_eq!(info.kind(), Some(DeviceKind::Stk1160));
        assert_eq!(info.version(), "6.1.0");
        assert_eq!(info.to_string(), "/dev/video1: stk1160 (stk1160) [STK1160]");
    }

    #[test]
    fn test_enumerate_empty_dir() {
        let dir = std::env::temp_dir();
        assert!(enumerate_in(&dir).is_ok());
    }
}
