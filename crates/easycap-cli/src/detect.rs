// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use clap::Args as ClapArgs;
use easycap::{probe, session};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Video device node to probe
    #[arg(default_value = "/dev/video0")]
    device: String,
}

#[derive(Debug, Serialize)]
struct Detection {
    device: String,
    detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bus: Option<String>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing detect command: {:?}", args);

    let kind = session::detect(&args.device);

    let info = probe::identify(&args.device).ok();
    let detection = Detection {
        device: args.device.clone(),
        detected: kind.is_some(),
        family: kind.map(|k| k.to_string()),
        driver: info.as_ref().map(|i| i.driver().to_string()),
        card: info.as_ref().map(|i| i.card().to_string()),
        bus: info.as_ref().map(|i| i.bus_info().to_string()),
    };

    if json {
        let json_str = serde_json::to_string_pretty(&detection)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else if let Some(family) = &detection.family {
        println!("{}: {}", detection.device, family);
        if let (Some(driver), Some(card)) = (&detection.driver, &detection.card) {
            println!("  Driver: {} ({})", driver, card);
        }
    }

    match kind {
        Some(_) => Ok(()),
        None => Err(CliError::CameraNotFound(format!(
            "no recognized device at {}",
            args.device
        ))),
    }
}
