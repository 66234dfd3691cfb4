// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use easycap::settings::{PixelEncoding, VideoStandard};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a pixel encoding by name (`yuyv`, `uyvy`, `rgb565`, `rgba8888`) or
/// kernel FOURCC.
pub fn parse_encoding(s: &str) -> Result<PixelEncoding, CliError> {
    s.parse().map_err(|_| {
        CliError::InvalidArgs(format!(
            "Unknown encoding '{}' (expected yuyv, uyvy, rgb565 or rgba8888)",
            s
        ))
    })
}

/// Parse a video standard name (`ntsc`, `pal`).
pub fn parse_standard(s: &str) -> Result<VideoStandard, CliError> {
    s.parse().map_err(|_| {
        CliError::InvalidArgs(format!("Unknown standard '{}' (expected ntsc or pal)", s))
    })
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT or
/// SIGTERM is received. Check this flag between frames to exit gracefully.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&term))
            .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;
    }

    log::debug!("Installed SIGINT/SIGTERM handler");
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_valid() {
        assert_eq!(parse_resolution("720x480").unwrap(), (720, 480));
        assert_eq!(parse_resolution("720x576").unwrap(), (720, 576));
        assert_eq!(parse_resolution("640x480").unwrap(), (640, 480));

        // Test alternative separator
        assert_eq!(parse_resolution("720*480").unwrap(), (720, 480));
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("720").is_err());
        assert!(parse_resolution("720x").is_err());
        assert!(parse_resolution("x480").is_err());
        assert!(parse_resolution("720x480x60").is_err());
        assert!(parse_resolution("widthxheight").is_err());
        assert!(parse_resolution("0x0").is_err());
        assert!(parse_resolution("-720x480").is_err());
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!(parse_encoding("yuyv").unwrap(), PixelEncoding::Yuyv);
        assert_eq!(parse_encoding("UYVY").unwrap(), PixelEncoding::Uyvy);
        assert_eq!(parse_encoding("rgb565").unwrap(), PixelEncoding::Rgb565);
        assert_eq!(parse_encoding("AB24").unwrap(), PixelEncoding::Rgba8888);
        assert!(matches!(
            parse_encoding("mjpeg"),
            Err(CliError::InvalidArgs(_))
        ));
    }

    #[test]
    fn test_parse_standard() {
        assert_eq!(parse_standard("ntsc").unwrap(), VideoStandard::Ntsc);
        assert_eq!(parse_standard("PAL").unwrap(), VideoStandard::Pal);
        assert!(parse_standard("secam").is_err());
    }
}
