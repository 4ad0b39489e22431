// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # semfusion-engine
//!
//! Online per-element semantic probability fusion for streaming 3-D maps.
//!
//! For every map element (surfel) the engine keeps a categorical distribution
//! over the classifier's classes, folds each classifier frame into it, refines
//! it with periodic dense-CRF smoothing, and caches the best class for
//! rendering and export.
//!
//! ## Architecture
//! - Dense id-indexed table, class-major, double-buffered for O(1) swaps
//! - Rayon data-parallel kernels over table rows or pixels
//! - The map and the smoothing solver plug in through traits
//!   ([`ElementPopulation`], [`PairwiseSolver`])
//!
//! ## Performance Targets
//! - Tens of milliseconds per frame
//! - Millions of elements (default capacity 3,000,000)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod colour_scheme;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod pipeline;
pub mod population;
pub mod projection;
pub mod raster;
pub mod smoothing;
pub mod synchronizer;
pub mod table;
pub mod types;

pub use colour_scheme::{ClassColour, ClassColourScheme};
pub use config::{FusionConfig, PipelineConfig};
pub use engine::SemanticFusionEngine;
pub use error::{FusionError, Result};
pub use fusion::FusionReport;
pub use pipeline::{FrameReport, FusionPipeline, FusionStats};
pub use population::{ElementPopulation, PopulationSnapshot};
pub use projection::DEFAULT_DOWNSAMPLE_FACTOR;
pub use raster::{ClassProbabilityRaster, IdentityRaster};
pub use smoothing::{
    MeanFieldSolver, PairwiseFeatures, PairwiseSolver, SmoothingParams, SmoothingReport,
};
pub use synchronizer::SyncReport;
pub use table::{summarize, ProbabilityTable};
pub use types::*;
