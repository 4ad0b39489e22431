// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # semfusion - Online Semantic Probability Fusion
//!
//! Keeps a class distribution for every element (surfel) of a streaming 3-D map,
//! fuses per-pixel classifier output into it frame by frame, optionally refines
//! it with dense-CRF smoothing, and exports argmax label images.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use semfusion::prelude::*;
//!
//! let config = semfusion::config::load_config(None, None)?;
//! semfusion::config::validate_config(&config)?;
//!
//! let flags = semfusion::observability::parse_debug_flags();
//! let _log_guard =
//!     semfusion::observability::init_logging(&flags, &semfusion::logging_config_from(&config))?;
//! semfusion::configure_thread_pool(&config)?;
//!
//! let mut pipeline = semfusion::build_pipeline(&config)?;
//! let mut population = PopulationSnapshot::new(1, IdentityRaster::new(640, 480));
//!
//! // Once per frame, after the mapping subsystem updated the population
//! let report = pipeline.process_frame(&mut population, || {
//!     ClassProbabilityRaster::uniform(config.fusion.num_classes, 224, 224)
//! });
//! println!("frame {} fused: {}", report.frame, report.fusion.is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: semfusion-config, semfusion-observability  │
//! │  (TOML + overrides, logging and debug flags)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Core: semfusion-engine                                 │
//! │  (table sync, raster fusion, smoothing, export)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  This crate: config → engine bridge, prelude            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

use tracing::info;

pub use semfusion_config as config;
pub use semfusion_engine as engine;
pub use semfusion_observability as observability;

use semfusion_config::SemfusionConfig;
use semfusion_engine::{
    ClassColourScheme, FusionConfig, FusionError, FusionPipeline, PipelineConfig,
    SemanticFusionEngine, SmoothingParams,
};
use semfusion_observability::LoggingConfig;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use semfusion_engine::{
        ClassColourScheme, ClassProbabilityRaster, ClassSummary, ElementId, ElementPopulation,
        FusionPipeline, IdentityRaster, MeanFieldSolver, PairwiseSolver, PopulationSnapshot,
        SemanticFusionEngine, NO_CLASS,
    };
}

/// Engine configuration from the application configuration
pub fn fusion_config_from(config: &SemfusionConfig) -> FusionConfig {
    let smoothing = &config.smoothing;
    FusionConfig {
        num_classes: config.fusion.num_classes,
        max_components: config.fusion.max_components,
        colour_threshold: config.fusion.colour_threshold,
        downsample_factor: config.export.downsample_factor,
        smoothing: SmoothingParams {
            spatial_stddev: smoothing.spatial_stddev,
            spatial_weight: smoothing.spatial_weight,
            bilateral_position_stddev: smoothing.bilateral_position_stddev,
            bilateral_colour_stddev: smoothing.bilateral_colour_stddev,
            bilateral_weight: smoothing.bilateral_weight,
            iterations: smoothing.iterations,
            relaxation: smoothing.relaxation,
        },
    }
}

/// Frame schedule from the application configuration
pub fn pipeline_config_from(config: &SemfusionConfig) -> PipelineConfig {
    PipelineConfig {
        cnn_skip_frames: config.fusion.cnn_skip_frames,
        smoothing_enabled: config.smoothing.enabled,
        smoothing_skip_frames: config.smoothing.skip_frames,
        frame_budget_ms: config.fusion.frame_budget_ms,
    }
}

/// Logging configuration seeded from `[system]`
pub fn logging_config_from(config: &SemfusionConfig) -> LoggingConfig {
    LoggingConfig {
        level: config.system.log_level.clone(),
        ..Default::default()
    }
}

/// Size the global rayon pool from `system.max_threads` (0 keeps rayon's default)
///
/// # Errors
/// If the global pool was already initialised.
pub fn configure_thread_pool(config: &SemfusionConfig) -> semfusion_engine::Result<()> {
    let threads = config.system.max_threads;
    if threads == 0 {
        return Ok(());
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| FusionError::InvalidConfig(format!("thread pool: {}", e)))?;
    info!("Kernel thread pool sized to {} threads", threads);
    Ok(())
}

/// Build the engine and frame pipeline described by `config`
pub fn build_pipeline(config: &SemfusionConfig) -> semfusion_engine::Result<FusionPipeline> {
    let engine = SemanticFusionEngine::new(fusion_config_from(config))?;
    Ok(FusionPipeline::new(engine, pipeline_config_from(config)))
}

/// Load the configured colour scheme, if any
pub fn load_colour_scheme(
    config: &SemfusionConfig,
) -> semfusion_engine::Result<Option<ClassColourScheme>> {
    config
        .export
        .colour_scheme
        .as_deref()
        .map(|path| ClassColourScheme::load(path, config.fusion.num_classes))
        .transpose()
}
