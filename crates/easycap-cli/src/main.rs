// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod capture;
mod detect;
mod devices;
mod error;
mod metrics;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// EasyCap CLI - Analog capture adapter detection, capture and metrics tool
#[derive(Parser)]
#[command(name = "easycap")]
#[command(version)]
#[command(about = "EasyCap CLI - Analog capture adapter detection, capture and metrics tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which adapter family drives a video node
    Detect(detect::Args),

    /// List V4L2 devices with adapter classification and grouping
    Devices(devices::Args),

    /// Capture frames, convert them and post them to a raw output
    Capture(capture::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Detect(args) => detect::execute(args, cli.json),
        Commands::Devices(args) => devices::execute(args, cli.json),
        Commands::Capture(args) => capture::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
