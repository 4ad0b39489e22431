// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # semfusion-observability
//!
//! Logging setup shared by every semfusion crate, with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files with daily rotation and run-folder retention (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known semfusion crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "semfusion",
    "semfusion_engine",
    "semfusion_config",
    "semfusion_observability",
];
