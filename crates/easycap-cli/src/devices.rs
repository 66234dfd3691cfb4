// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Video node listing with adapter classification and grouping.

use crate::error::CliError;
use clap::Args as ClapArgs;
use easycap::probe::{self, DeviceInfo};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Show only recognized EasyCap adapters
    #[arg(long)]
    easycap: bool,

    /// Show all device nodes (disable grouping by hardware)
    #[arg(long)]
    all: bool,

    /// Show bus, driver version and capability bits
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct DevicesOutput {
    devices: Vec<DeviceGroup>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct DeviceGroup {
    name: String,
    driver: String,
    bus: String,
    version: String,
    /// Adapter family, absent for unrecognized drivers
    #[serde(skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    nodes: Vec<String>,
    capture: bool,
    streaming: bool,
    capabilities: String,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_nodes: usize,
    hardware_units: usize,
    easycap: usize,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing devices command: {:?}", args);

    let devices = probe::enumerate()
        .map_err(|e| CliError::General(format!("Failed to enumerate video devices: {}", e)))?;

    let selected: Vec<&DeviceInfo> = devices
        .iter()
        .filter(|d| !args.easycap || d.kind().is_some())
        .collect();

    let groups: Vec<DeviceGroup> = if args.all {
        selected.iter().map(|d| group_of(&[*d])).collect()
    } else {
        group_by_bus(&selected)
    };

    let output = DevicesOutput {
        summary: Summary {
            total_nodes: devices.len(),
            hardware_units: groups.len(),
            easycap: groups.iter().filter(|g| g.family.is_some()).count(),
        },
        devices: groups,
    };

    if json {
        let json_str = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json_str);
    } else {
        print_text_output(&output, args.verbose);
    }

    Ok(())
}

/// Group nodes by bus_info so one adapter shows up once
fn group_by_bus(devices: &[&DeviceInfo]) -> Vec<DeviceGroup> {
    let mut groups: BTreeMap<&str, Vec<&DeviceInfo>> = BTreeMap::new();
    for device in devices {
        groups.entry(device.bus_info()).or_default().push(*device);
    }

    let mut result: Vec<DeviceGroup> = groups.values().map(|devs| group_of(devs)).collect();
    result.sort_by(|a, b| a.nodes.first().cmp(&b.nodes.first()));
    result
}

fn group_of(devs: &[&DeviceInfo]) -> DeviceGroup {
    let first = devs[0];
    DeviceGroup {
        name: first.card().to_string(),
        driver: first.driver().to_string(),
        bus: first.bus_info().to_string(),
        version: first.version(),
        family: first.kind().map(|k| k.to_string()),
        nodes: devs.iter().map(|d| d.path().display().to_string()).collect(),
        capture: devs.iter().any(|d| d.can_capture()),
        streaming: devs.iter().any(|d| d.can_stream()),
        capabilities: format!("0x{:08x}", first.capabilities()),
    }
}

fn print_text_output(output: &DevicesOutput, verbose: bool) {
    println!(
        "Video Devices ({} nodes, {} hardware units, {} EasyCap)\n",
        output.summary.total_nodes, output.summary.hardware_units, output.summary.easycap
    );

    for group in &output.devices {
        print_device_group(group, verbose);
    }

    if let Some(adapter) = output.devices.iter().find(|g| g.family.is_some() && g.capture) {
        println!(
            "\nRecommended device: {} ({})",
            adapter.nodes.first().map(|n| n.as_str()).unwrap_or("?"),
            adapter.family.as_deref().unwrap_or("?")
        );
    }
}

fn print_device_group(group: &DeviceGroup, verbose: bool) {
    let paths: Vec<&str> = group.nodes.iter().map(|n| n.as_str()).collect();
    if paths.len() == 1 {
        println!("  {}: {}", paths[0], group.name);
    } else {
        println!(
            "  {}: {} ({} nodes)",
            summarize_paths(&paths),
            group.name,
            paths.len()
        );
    }

    match &group.family {
        Some(family) => println!("    Driver: {} [{}]", group.driver, family),
        None => println!("    Driver: {}", group.driver),
    }

    if verbose {
        println!("    Bus: {}", group.bus);
        println!("    Version: {}", group.version);
        println!(
            "    Capabilities: {}{}{}",
            group.capabilities,
            if group.capture { " capture" } else { "" },
            if group.streaming { " streaming" } else { "" }
        );
    }
}

/// Summarize device paths like "/dev/video0-4" or "/dev/video{1,3}"
fn summarize_paths(paths: &[&str]) -> String {
    if paths.len() <= 1 {
        return paths.join(", ");
    }

    let mut nums: Vec<u32> = paths
        .iter()
        .filter_map(|p| {
            p.strip_prefix("/dev/video")
                .and_then(|s| s.parse::<u32>().ok())
        })
        .collect();
    nums.sort_unstable();

    let (Some(first), Some(last)) = (nums.first(), nums.last()) else {
        return paths.join(", ");
    };
    if nums.len() != paths.len() {
        return paths.join(", ");
    }

    let is_consecutive = nums.windows(2).all(|w| w[1] == w[0] + 1);
    if is_consecutive && nums.len() > 2 {
        format!("/dev/video{}-{}", first, last)
    } else {
        format!(
            "/dev/video{{{}}}",
            nums.iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_paths() {
        assert_eq!(summarize_paths(&[]), "");
        assert_eq!(summarize_paths(&["/dev/video0"]), "/dev/video0");
        assert_eq!(
            summarize_paths(&["/dev/video2", "/dev/video0", "/dev/video1"]),
            "/dev/video0-2"
        );
        assert_eq!(
            summarize_paths(&["/dev/video1", "/dev/video3"]),
            "/dev/video{1,3}"
        );
        assert_eq!(
            summarize_paths(&["/dev/video1", "/tmp/video"]),
            "/dev/video1, /tmp/video"
        );
    }
}
