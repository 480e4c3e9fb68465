// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

/*!
Simple-Point Table Generator

Evaluates the (26, 6) simple-point test for all 2^26 neighborhood patterns and writes the
packed bit table the thinning stage loads as `lut_simple.dat`.

Usage:
  cargo run --release --bin generate_lut -- --lut-dir ./lut
*/

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use synskel::observability::{init_logging, parse_debug_flags, LoggingOptions};
use synskel::serialization::write_atomically;
use synskel::thinning::{generate_lookup_table, LookupTable, TopologicalOracle, LUT_FILE_NAME};

/// Generate the 3-D simple-point lookup table
#[derive(Parser, Debug)]
#[command(name = "generate_lut", version, author, long_about = None)]
struct Args {
    /// Directory to write the table into
    #[arg(long, default_value = "lut", env = "SYNSKEL_LUT_DIR")]
    lut_dir: PathBuf,

    /// Worker threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Overwrite an existing table
    #[arg(long, default_value_t = false)]
    force: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));
    let _guard = init_logging(&parse_debug_flags(), &LoggingOptions::default())?;

    let path = args.lut_dir.join(LUT_FILE_NAME);
    if path.exists() && !args.force {
        tracing::warn!(target: "synskel", path = %path.display(), "Table exists, pass --force to overwrite");
        return Ok(());
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers)
        .build_global()?;

    let started = Instant::now();
    let oracle = TopologicalOracle::new(26, 6)?;
    let bits = generate_lookup_table(&oracle);
    let simple = bits.iter().map(|byte| byte.count_ones() as u64).sum::<u64>();

    // validates the size before anything touches the disk
    let table = LookupTable::from_bytes(bits)?;
    write_atomically(&path, |writer| writer.write_all(table.as_bytes()))?;

    tracing::info!(
        target: "synskel",
        path = %path.display(),
        simple_patterns = simple,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Wrote simple-point table"
    );
    Ok(())
}
