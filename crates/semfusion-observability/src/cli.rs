//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-semfusion-engine` or `--debug-all`
//! to raise individual crates to debug level.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Tracing targets use the crate's module path, so `semfusion-engine` is stored as `semfusion_engine`.
fn normalize_crate_name(name: &str) -> String {
    name.trim().replace('-', "_")
}

/// Parse debug flags from command-line arguments
///
/// # Example
/// ```rust
/// use semfusion_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-semfusion-engine".to_string()]);
/// assert!(flags.is_enabled("semfusion-engine"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}` pattern.
    /// Also supports `--debug-all` to enable all crates.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut enabled_crates = HashMap::new();
        let mut debug_all = false;

        for arg in args {
            if arg == "--debug-all" {
                debug_all = true;
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                enabled_crates.insert(normalize_crate_name(crate_name), true);
            }
        }

        if debug_all {
            for crate_name in KNOWN_CRATES {
                enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        CrateDebugFlags { enabled_crates }
    }

    /// Check if debug is enabled for a specific crate (hyphens or underscores)
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates
            .contains_key(&normalize_crate_name(crate_name))
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Returns `tracing::Level::DEBUG` if enabled, `tracing::Level::INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Create a tracing filter from debug flags
    ///
    /// Format: `"semfusion_engine=debug,info"` or `"info"` if none enabled.
    pub fn to_filter_string(&self) -> String {
        if self.enabled_crates.is_empty() {
            return "info".to_string();
        }

        let mut names: Vec<&String> = self.enabled_crates.keys().collect();
        names.sort();

        let mut filters: Vec<String> = names
            .into_iter()
            .map(|crate_name| format!("{}=debug", crate_name))
            .collect();
        filters.push("info".to_string());
        filters.join(",")
    }
}

/// Parse debug flags from both command-line arguments and the `SEMFUSION_DEBUG` environment variable
///
/// Environment variable format: comma-separated crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("SEMFUSION_DEBUG") {
        if env_var == "all" {
            for crate_name in KNOWN_CRATES {
                flags.enabled_crates.insert(crate_name.to_string(), true);
            }
        } else {
            for crate_name in env_var.split(',') {
                if !crate_name.trim().is_empty() {
                    flags
                        .enabled_crates
                        .insert(normalize_crate_name(crate_name), true);
                }
            }
        }
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  SEMFUSION_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  SEMFUSION_DEBUG=all                               Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}
