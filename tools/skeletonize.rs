// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Skeletonization Tool

Runs anchor stitching, block thinning and skeleton refinement over the block footprint
described by a `synskel.toml` configuration. Per-crate debug logging is enabled with
`--debug-<crate>` flags or `SYNSKEL_DEBUG`.

Usage:
  cargo run --release --bin skeletonize -- --config synskel.toml --workers 16
*/

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use synskel::config::{load_config, validate_config};
use synskel::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingOptions};
use synskel::thinning::SkeletonizationPipeline;

/// Skeletonize a block-partitioned label volume
#[derive(Parser, Debug)]
#[command(name = "skeletonize", version, author, after_help = debug_flags_help())]
struct Args {
    /// Configuration file (searched for when omitted)
    #[arg(short, long, env = "SYNSKEL_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override `paths.tmp_dir`
    #[arg(long)]
    tmp_dir: Option<String>,

    /// Override `paths.output_dir`
    #[arg(long)]
    output_dir: Option<String>,

    /// Override `parallel.workers`
    #[arg(long)]
    workers: Option<usize>,

    /// Override `thinning.oracle` (lookup_table or computed)
    #[arg(long)]
    oracle: Option<String>,

    /// Override `anchors.contour_rule` (lookup_table or computed)
    #[arg(long)]
    contour_rule: Option<String>,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl Args {
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value);
            }
        };
        set("tmp_dir", self.tmp_dir.clone());
        set("output_dir", self.output_dir.clone());
        set("workers", self.workers.map(|workers| workers.to_string()));
        set("oracle", self.oracle.clone());
        set("contour_rule", self.contour_rule.clone());
        overrides
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));
    let config = load_config(args.config.as_deref(), Some(&args.overrides()))?;
    validate_config(&config)?;

    let options = LoggingOptions {
        default_level: config.logging.log_level.clone(),
        log_dir: config
            .logging
            .file_logging
            .then(|| config.logging.log_dir.clone()),
        ..LoggingOptions::default()
    };
    let _guard = init_logging(&parse_debug_flags(), &options)?;

    let settings = synskel::pipeline_settings(&config);
    tracing::info!(
        target: "synskel",
        volume = %settings.volume_size,
        block = %settings.block_size,
        blocks = settings.block_indices().len(),
        oracle = %config.thinning.oracle,
        contour_rule = %config.anchors.contour_rule,
        "Starting skeletonization"
    );

    let started = Instant::now();
    let pipeline = SkeletonizationPipeline::new(
        settings,
        synskel::block_source(&config),
        synskel::simple_point_oracle(&config)?,
        synskel::contour_rule(&config)?,
    );
    let report = match pipeline.run() {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(target: "synskel", error = %err, "Skeletonization failed");
            return Err(err.into());
        }
    };
    let elapsed = started.elapsed();

    if args.json {
        let summary = serde_json::json!({
            "blocks_thinned": report.blocks_thinned,
            "anchor_files": report.anchor_files,
            "labels_refined": report.labels_refined,
            "labels_skipped": report.labels_skipped,
            "voxels_removed": report.voxels_removed,
            "elapsed_seconds": elapsed.as_secs_f64(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        tracing::info!(target: "synskel", elapsed_seconds = elapsed.as_secs_f64(), "Done");
    }
    Ok(())
}
