//! stereoseg: batch stereo segmentation.
//!
//! Reads a list file of left/right image paths (one per line, alternating)
//! and, for every pair, writes a disparity image, a segment image, a
//! boundary visualization, a plane file and a boundary label file into the
//! output directory.
//!
//! # Usage
//!
//! ```text
//! stereoseg [OPTIONS] <LIST_FILE>
//! ```
//!
//! Logging goes to stderr through `env_logger` (default level `info`,
//! override with `RUST_LOG`).

#![allow(clippy::print_stderr)]

mod artifacts;
mod batch;
mod error;
mod list;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use log::{error, info};
use stereoseg_pipeline::{EngineConfig, EngineKind};

use crate::batch::{BatchOptions, run_batch};
use crate::list::read_pair_list;

/// Batch stereo segmentation with boundary relation rendering.
///
/// Every pair of lines in LIST_FILE names a rectified left and right
/// image. Artifacts are named after the left image.
#[derive(Parser)]
#[command(name = "stereoseg", version)]
struct Cli {
    /// File listing left and right image paths on alternating lines.
    list_file: PathBuf,

    /// Directory receiving the artifacts.
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: PathBuf,

    /// Log and skip pairs that fail instead of stopping the batch.
    #[arg(long)]
    keep_going: bool,

    /// Desired number of segments per image.
    #[arg(long, default_value_t = EngineConfig::DEFAULT_SUPERPIXEL_TOTAL, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    superpixels: u32,

    /// Largest disparity searched, in pixels.
    #[arg(long, default_value_t = EngineConfig::DEFAULT_MAX_DISPARITY, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_disparity: u32,

    /// Full engine config as a JSON string.
    ///
    /// When provided, `--superpixels` and `--max-disparity` are ignored.
    /// Missing fields take their default values.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build the engine configuration from CLI arguments.
fn config_from_cli(cli: &Cli) -> Result<EngineConfig, String> {
    let config = match cli.config_json {
        Some(ref json) => serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?,
        None => EngineConfig {
            superpixel_total: cli.superpixels,
            max_disparity: cli.max_disparity,
            ..EngineConfig::default()
        },
    };
    config
        .validate()
        .map_err(|e| format!("Error in engine configuration: {e}"))?;
    Ok(config)
}

/// Exit status after clap stops argument parsing: success for `--help`
/// and `--version`, 1 for every usage error.
fn usage_exit_code(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return usage_exit_code(e.kind());
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let pairs = match read_pair_list(&cli.list_file) {
        Ok(pairs) => pairs,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "{} pairs listed in {}",
        pairs.len(),
        cli.list_file.display()
    );

    let options = BatchOptions {
        output_dir: cli.output_dir,
        keep_going: cli.keep_going,
    };
    match run_batch(&pairs, &EngineKind::default(), &config, &options) {
        Ok(summary) => {
            info!(
                "{} pairs processed, {} failed",
                summary.processed, summary.failed
            );
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
