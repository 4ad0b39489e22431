// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the fusion engine
//!
//! Per-frame kernels treat contract violations as panics. These errors only cover
//! the recoverable edges: engine construction, colour scheme loading and image export.

/// Result type alias using FusionError
pub type Result<T> = std::result::Result<T, FusionError>;

/// Error types for the fusion engine
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    /// Engine configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed colour scheme file
    #[error("Colour scheme line {line}: {reason}")]
    ColourScheme { line: usize, reason: String },

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Label image encoding or writing failed
    #[error("Image export failed: {0}")]
    ImageExport(#[from] image::ImageError),
}
