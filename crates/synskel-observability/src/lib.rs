// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! # synskel-observability
//!
//! Logging setup shared by the synskel tools.
//!
//! Every crate logs through `tracing` with its crate name as the target, so a single
//! `--debug-synskel-thinning` flag (or `SYNSKEL_DEBUG=synskel-thinning`) raises one
//! crate to debug without flooding the console with the others.
//!
//! ## Features
//! - `file-logging`: JSON log file per run, with retention of old runs

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known synskel crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "synskel",
    "synskel-config",
    "synskel-structures",
    "synskel-serialization",
    "synskel-thinning",
];
