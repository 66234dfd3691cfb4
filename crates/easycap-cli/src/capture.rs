// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::utils;
use clap::Args as ClapArgs;
use easycap::{
    session::Session,
    settings::{DeviceSettings, MIN_BUFFERS},
    surface::{MemorySurface, PixelFormat, Surface, SurfaceBuffer},
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Video device node
    #[arg(short, long, default_value = "/dev/video0")]
    device: String,

    /// Output file for posted frames ("-" for stdout, omit to discard)
    #[arg(short, long)]
    output: Option<String>,

    /// Resolution in WxH format
    #[arg(short, long, default_value = "720x480")]
    resolution: String,

    /// Pixel encoding: yuyv, uyvy, rgb565 or rgba8888
    #[arg(short, long, default_value = "yuyv")]
    encoding: String,

    /// Analog video standard: ntsc or pal
    #[arg(short, long, default_value = "ntsc")]
    standard: String,

    /// Number of capture buffers to request
    #[arg(short, long, default_value = "4")]
    buffers: u32,

    /// Readiness timeout per frame in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Give up after this many consecutive timeouts
    #[arg(long, default_value = "5")]
    max_timeouts: u32,

    /// Number of frames to capture (0=unlimited)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Print capture metrics on exit
    #[arg(long)]
    metrics: bool,
}

/// Surface that appends every posted frame to a writer
struct RawFileSurface {
    inner: MemorySurface,
    sink: Option<Box<dyn Write>>,
}

impl RawFileSurface {
    fn open(output: Option<&str>) -> Result<Self, CliError> {
        let sink: Option<Box<dyn Write>> = match output {
            None => None,
            Some("-") => Some(Box::new(BufWriter::new(io::stdout().lock()))),
            Some(path) => {
                let file = File::create(path).map_err(|e| {
                    CliError::General(format!("Failed to create output file {}: {}", path, e))
                })?;
                Some(Box::new(BufWriter::new(file)))
            }
        };
        Ok(RawFileSurface {
            inner: MemorySurface::new(),
            sink,
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl Surface for RawFileSurface {
    fn set_geometry(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(), easycap::Error> {
        self.inner.set_geometry(width, height, format)
    }

    fn lock(&mut self) -> Result<SurfaceBuffer<'_>, easycap::Error> {
        self.inner.lock()
    }

    fn unlock_and_post(&mut self) -> Result<(), easycap::Error> {
        self.inner.unlock_and_post()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(self.inner.pixels())?;
        }
        Ok(())
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Capture parameters: {:?}", args);

    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let encoding = utils::parse_encoding(&args.encoding)?;
    let standard = utils::parse_standard(&args.standard)?;
    if args.timeout_ms == 0 {
        return Err(CliError::InvalidArgs(
            "Timeout must be at least 1 ms".to_string(),
        ));
    }
    if args.max_timeouts == 0 {
        return Err(CliError::InvalidArgs(
            "Max timeouts must be at least 1".to_string(),
        ));
    }
    if args.buffers < MIN_BUFFERS {
        return Err(CliError::InvalidArgs(format!(
            "At least {} buffers are required, got {}",
            MIN_BUFFERS, args.buffers
        )));
    }

    let settings = DeviceSettings::default()
        .with_device(&args.device)
        .with_resolution(width, height)
        .with_encoding(encoding)
        .with_standard(standard)
        .with_buffers(args.buffers)
        .with_timeout(Duration::from_millis(args.timeout_ms));

    let term = utils::install_signal_handler()?;
    let mut surface = RawFileSurface::open(args.output.as_deref())?;

    log::info!("Opening {}", settings);
    let mut session = Session::start(settings)?;
    if let Some(format) = session.device().format() {
        log::info!(
            "Capturing {} via {} into {}",
            format,
            session.renderer().conversion(),
            session.renderer().output_format()
        );
    }

    let mut metrics_collector = if args.metrics || json {
        Some(MetricsCollector::new())
    } else {
        None
    };

    let max_frames = if args.frames == 0 {
        u64::MAX
    } else {
        args.frames
    };

    log::info!(
        "Capturing {} frames (Ctrl+C to stop)...",
        if max_frames == u64::MAX {
            "unlimited".to_string()
        } else {
            max_frames.to_string()
        }
    );

    let mut frame_count = 0u64;
    let mut consecutive_timeouts = 0u32;
    let mut result = Ok(());

    while frame_count < max_frames && !term.load(Ordering::Relaxed) {
        let timeouts_before = session.device().timeouts();
        let start = Instant::now();

        let posted = match session.next_frame(&mut surface) {
            Ok(posted) => posted,
            Err(err) => {
                result = Err(err.into());
                break;
            }
        };

        if session.device().timeouts() > timeouts_before {
            consecutive_timeouts += 1;
            if let Some(ref mut metrics) = metrics_collector {
                metrics.record_timeout();
            }
            if consecutive_timeouts >= args.max_timeouts {
                result = Err(CliError::Timeout(format!(
                    "no frame from {} after {} attempts",
                    args.device, consecutive_timeouts
                )));
                break;
            }
            if !session.is_attached() {
                result = Err(CliError::CameraNotFound(format!(
                    "{} was disconnected",
                    args.device
                )));
                break;
            }
            continue;
        }
        consecutive_timeouts = 0;

        if !posted {
            continue;
        }

        if let Some(ref mut metrics) = metrics_collector {
            metrics.record_latency(start.elapsed());
            if let Some(format) = session.device().format() {
                metrics.record_bytes(format.size_image as u64);
            }
            metrics.track_sequence(session.device().last_sequence());
        }

        frame_count += 1;
        if frame_count % 30 == 0 {
            log::debug!("Captured {} frames", frame_count);
        }
    }

    if term.load(Ordering::Relaxed) {
        log::info!("Received Ctrl+C, stopping...");
    }

    session.stop();
    surface
        .flush()
        .map_err(|e| CliError::General(format!("Failed to flush output: {}", e)))?;
    log::info!("Captured {} frames total", frame_count);

    if let Some(ref mut metrics) = metrics_collector {
        if json {
            metrics
                .print_json()
                .map_err(|e| CliError::General(format!("Failed to output JSON metrics: {}", e)))?;
        } else if args.metrics {
            metrics.print_text();
        }
    }

    result
}
