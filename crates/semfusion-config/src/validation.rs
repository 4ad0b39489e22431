//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! consistent and within valid ranges before the fusion engine is built.

use crate::{ConfigError, ConfigResult, SemfusionConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// All violations are collected and reported together.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &SemfusionConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_fusion(config, &mut errors);
    validate_smoothing(config, &mut errors);
    validate_export(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn invalid(errors: &mut Vec<ConfigValidationError>, field: &str, reason: &str) {
    errors.push(ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    });
}

fn validate_required_fields(config: &SemfusionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.system.log_level.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "system.log_level".to_string(),
        });
    }
}

fn validate_fusion(config: &SemfusionConfig, errors: &mut Vec<ConfigValidationError>) {
    let fusion = &config.fusion;

    if fusion.num_classes == 0 {
        invalid(errors, "fusion.num_classes", "must be at least 1");
    }
    // Row 0 is reserved, so a usable table needs at least one more row
    if fusion.max_components < 2 {
        invalid(errors, "fusion.max_components", "must be at least 2");
    }
    if !(0.0..=1.0).contains(&fusion.colour_threshold) {
        invalid(errors, "fusion.colour_threshold", "must be between 0.0 and 1.0");
    }
    if !(fusion.frame_budget_ms > 0.0) {
        invalid(errors, "fusion.frame_budget_ms", "must be positive");
    }
}

fn validate_smoothing(config: &SemfusionConfig, errors: &mut Vec<ConfigValidationError>) {
    let smoothing = &config.smoothing;

    if smoothing.skip_frames == 0 {
        invalid(errors, "smoothing.skip_frames", "must be at least 1");
    }
    if smoothing.iterations == 0 {
        invalid(errors, "smoothing.iterations", "must be at least 1");
    }

    let widths = [
        ("smoothing.spatial_stddev", smoothing.spatial_stddev),
        ("smoothing.bilateral_position_stddev", smoothing.bilateral_position_stddev),
        ("smoothing.bilateral_colour_stddev", smoothing.bilateral_colour_stddev),
    ];
    for (field, width) in widths {
        if !(width > 0.0) || !width.is_finite() {
            invalid(errors, field, "must be a positive, finite kernel width");
        }
    }

    let weights = [
        ("smoothing.spatial_weight", smoothing.spatial_weight),
        ("smoothing.bilateral_weight", smoothing.bilateral_weight),
    ];
    for (field, weight) in weights {
        if !(weight >= 0.0) || !weight.is_finite() {
            invalid(errors, field, "must be non-negative and finite");
        }
    }

    if !(smoothing.relaxation > 0.0 && smoothing.relaxation <= 1.0) {
        invalid(errors, "smoothing.relaxation", "must be in (0.0, 1.0]");
    }
}

fn validate_export(config: &SemfusionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.export.downsample_factor == 0 {
        invalid(errors, "export.downsample_factor", "must be at least 1");
    }
}
