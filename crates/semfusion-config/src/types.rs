// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `semfusion_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SemfusionConfig {
    pub system: SystemConfig,
    pub fusion: FusionSettings,
    pub smoothing: SmoothingSettings,
    pub export: ExportSettings,
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
    /// Worker threads for the data-parallel kernels (0 = rayon default)
    pub max_threads: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_threads: 0,
        }
    }
}

/// Probability table and fusion settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FusionSettings {
    /// Number of semantic classes produced by the classifier
    pub num_classes: usize,
    /// Allocation ceiling for the probability table (rows)
    pub max_components: usize,
    /// Minimum best-class probability for an element to count as confidently labelled
    pub colour_threshold: f32,
    /// Run the classifier every N frames (0 = every frame)
    pub cnn_skip_frames: u64,
    /// Per-frame latency budget; slower frames are logged as warnings
    pub frame_budget_ms: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            num_classes: 14,
            max_components: 3_000_000,
            colour_threshold: 0.0,
            cnn_skip_frames: 0,
            frame_budget_ms: 33.0,
        }
    }
}

/// Periodic dense-CRF smoothing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmoothingSettings {
    pub enabled: bool,
    /// Smooth on every frame number divisible by this value
    pub skip_frames: u64,
    /// Mean-field iterations per pass
    pub iterations: usize,
    /// Spatial (position-only) Gaussian kernel width, in map units
    pub spatial_stddev: f32,
    pub spatial_weight: f32,
    /// Bilateral kernel position width, in map units
    pub bilateral_position_stddev: f32,
    /// Bilateral kernel colour width, in 0-255 colour units
    pub bilateral_colour_stddev: f32,
    pub bilateral_weight: f32,
    /// Relaxation factor for the mean-field update (1.0 = plain update)
    pub relaxation: f32,
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            skip_frames: 500,
            iterations: 10,
            spatial_stddev: 0.05,
            spatial_weight: 3.0,
            bilateral_position_stddev: 0.1,
            bilateral_colour_stddev: 20.0,
            bilateral_weight: 10.0,
            relaxation: 1.0,
        }
    }
}

/// Prediction export settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Downsample factor between the identity raster and saved label images
    pub downsample_factor: usize,
    /// Class colour lookup table (`name id r g b` rows, two header lines)
    pub colour_scheme: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            downsample_factor: 2,
            colour_scheme: None,
            output_dir: PathBuf::from("./predictions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SemfusionConfig = toml::from_str(
            r#"
            [fusion]
            num_classes = 3

            [smoothing]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.fusion.num_classes, 3);
        assert_eq!(config.fusion.max_components, 3_000_000);
        assert!(config.smoothing.enabled);
        assert_eq!(config.smoothing.iterations, 10);
        assert_eq!(config.export.downsample_factor, 2);
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = SemfusionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SemfusionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.smoothing.bilateral_colour_stddev, 20.0);
        assert_eq!(back.export.output_dir, PathBuf::from("./predictions"));
    }
}
