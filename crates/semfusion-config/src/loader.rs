// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SemfusionConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "semfusion_configuration.toml";

/// Find the semfusion configuration file
///
/// Search order:
/// 1. `SEMFUSION_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SEMFUSION_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SEMFUSION_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SEMFUSION_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Value validation is a separate step (`validate_config`).
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SemfusionConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SemfusionConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SEMFUSION_LOG_LEVEL` -> `system.log_level`
/// - `SEMFUSION_MAX_THREADS` -> `system.max_threads`
/// - `SEMFUSION_NUM_CLASSES` -> `fusion.num_classes`
/// - `SEMFUSION_MAX_COMPONENTS` -> `fusion.max_components`
/// - `SEMFUSION_COLOUR_THRESHOLD` -> `fusion.colour_threshold`
/// - `SEMFUSION_CNN_SKIP_FRAMES` -> `fusion.cnn_skip_frames`
/// - `SEMFUSION_SMOOTHING` -> `smoothing.enabled`
/// - `SEMFUSION_SMOOTHING_SKIP_FRAMES` -> `smoothing.skip_frames`
/// - `SEMFUSION_SMOOTHING_ITERATIONS` -> `smoothing.iterations`
/// - `SEMFUSION_COLOUR_SCHEME` -> `export.colour_scheme`
/// - `SEMFUSION_OUTPUT_DIR` -> `export.output_dir`
pub fn apply_environment_overrides(config: &mut SemfusionConfig) {
    if let Ok(value) = env::var("SEMFUSION_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("SEMFUSION_MAX_THREADS") {
        if let Ok(threads) = value.parse::<usize>() {
            config.system.max_threads = threads;
        }
    }

    if let Ok(value) = env::var("SEMFUSION_NUM_CLASSES") {
        if let Ok(classes) = value.parse::<usize>() {
            config.fusion.num_classes = classes;
        }
    }
    if let Ok(value) = env::var("SEMFUSION_MAX_COMPONENTS") {
        if let Ok(components) = value.parse::<usize>() {
            config.fusion.max_components = components;
        }
    }
    if let Ok(value) = env::var("SEMFUSION_COLOUR_THRESHOLD") {
        if let Ok(threshold) = value.parse::<f32>() {
            config.fusion.colour_threshold = threshold;
        }
    }
    if let Ok(value) = env::var("SEMFUSION_CNN_SKIP_FRAMES") {
        if let Ok(skip) = value.parse::<u64>() {
            config.fusion.cnn_skip_frames = skip;
        }
    }

    if let Ok(value) = env::var("SEMFUSION_SMOOTHING") {
        config.smoothing.enabled = parse_flag(&value);
    }
    if let Ok(value) = env::var("SEMFUSION_SMOOTHING_SKIP_FRAMES") {
        if let Ok(skip) = value.parse::<u64>() {
            config.smoothing.skip_frames = skip;
        }
    }
    if let Ok(value) = env::var("SEMFUSION_SMOOTHING_ITERATIONS") {
        if let Ok(iterations) = value.parse::<usize>() {
            config.smoothing.iterations = iterations;
        }
    }

    if let Ok(value) = env::var("SEMFUSION_COLOUR_SCHEME") {
        config.export.colour_scheme = Some(PathBuf::from(value));
    }
    if let Ok(value) = env::var("SEMFUSION_OUTPUT_DIR") {
        config.export.output_dir = PathBuf::from(value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"num_classes": "14", "smoothing": "true"}`)
pub fn apply_cli_overrides(config: &mut SemfusionConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("max_threads") {
        if let Ok(threads) = value.parse::<usize>() {
            config.system.max_threads = threads;
        }
    }

    if let Some(value) = cli_args.get("num_classes") {
        if let Ok(classes) = value.parse::<usize>() {
            config.fusion.num_classes = classes;
        }
    }
    if let Some(value) = cli_args.get("max_components") {
        if let Ok(components) = value.parse::<usize>() {
            config.fusion.max_components = components;
        }
    }
    if let Some(value) = cli_args.get("colour_threshold") {
        if let Ok(threshold) = value.parse::<f32>() {
            config.fusion.colour_threshold = threshold;
        }
    }
    if let Some(value) = cli_args.get("cnn_skip_frames") {
        if let Ok(skip) = value.parse::<u64>() {
            config.fusion.cnn_skip_frames = skip;
        }
    }

    if let Some(value) = cli_args.get("smoothing") {
        config.smoothing.enabled = parse_flag(value);
    }
    if let Some(value) = cli_args.get("smoothing_skip_frames") {
        if let Ok(skip) = value.parse::<u64>() {
            config.smoothing.skip_frames = skip;
        }
    }
    if let Some(value) = cli_args.get("smoothing_iterations") {
        if let Ok(iterations) = value.parse::<usize>() {
            config.smoothing.iterations = iterations;
        }
    }

    if let Some(value) = cli_args.get("colour_scheme") {
        config.export.colour_scheme = Some(PathBuf::from(value));
    }
    if let Some(value) = cli_args.get("output_dir") {
        config.export.output_dir = PathBuf::from(value);
    }
}
