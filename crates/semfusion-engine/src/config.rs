// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Engine-side configuration
//!
//! These are plain structs filled by the application layer (the umbrella crate
//! maps the TOML configuration onto them), so the engine never depends on the
//! configuration loader.

use crate::error::{FusionError, Result};
use crate::projection::DEFAULT_DOWNSAMPLE_FACTOR;
use crate::smoothing::SmoothingParams;

/// Probability table and export configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub num_classes: usize,
    /// Table capacity in rows; fixed for the engine's lifetime
    pub max_components: usize,
    /// Minimum best-class probability for a confident class
    pub colour_threshold: f32,
    /// Identity-to-label-image downsample factor for argmax export
    pub downsample_factor: usize,
    pub smoothing: SmoothingParams,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            num_classes: 14,
            max_components: 3_000_000,
            colour_threshold: 0.0,
            downsample_factor: DEFAULT_DOWNSAMPLE_FACTOR,
            smoothing: SmoothingParams::default(),
        }
    }
}

impl FusionConfig {
    /// Reject configurations the kernels cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(FusionError::InvalidConfig(
                "num_classes must be at least 1".to_string(),
            ));
        }
        if self.max_components < 2 {
            return Err(FusionError::InvalidConfig(
                "max_components must leave room for the reserved row 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.colour_threshold) {
            return Err(FusionError::InvalidConfig(format!(
                "colour_threshold {} outside [0, 1]",
                self.colour_threshold
            )));
        }
        if self.downsample_factor == 0 {
            return Err(FusionError::InvalidConfig(
                "downsample_factor must be at least 1".to_string(),
            ));
        }
        let smoothing = &self.smoothing;
        for (name, stddev) in [
            ("spatial_stddev", smoothing.spatial_stddev),
            ("bilateral_position_stddev", smoothing.bilateral_position_stddev),
            ("bilateral_colour_stddev", smoothing.bilateral_colour_stddev),
        ] {
            if !(stddev > 0.0 && stddev.is_finite()) {
                return Err(FusionError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, stddev
                )));
            }
        }
        if !(smoothing.relaxation > 0.0 && smoothing.relaxation <= 1.0) {
            return Err(FusionError::InvalidConfig(format!(
                "relaxation {} outside (0, 1]",
                smoothing.relaxation
            )));
        }
        Ok(())
    }
}

/// Frame schedule for [`FusionPipeline`](crate::pipeline::FusionPipeline)
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Run the classifier every N frames (0 = every frame)
    pub cnn_skip_frames: u64,
    pub smoothing_enabled: bool,
    /// Smooth on frames divisible by this value
    pub smoothing_skip_frames: u64,
    /// Frames slower than this are logged as warnings
    pub frame_budget_ms: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cnn_skip_frames: 0,
            smoothing_enabled: false,
            smoothing_skip_frames: 500,
            frame_budget_ms: 33.0,
        }
    }
}
