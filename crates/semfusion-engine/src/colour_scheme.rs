// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Class colour scheme
//!
//! Text format: two header lines, then one `name id r g b` row per class.
//! Classes without a row are drawn black.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{FusionError, Result};

const HEADER_LINES: usize = 2;

/// Named colour of one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassColour {
    pub name: String,
    pub rgb: [u8; 3],
}

impl Default for ClassColour {
    fn default() -> Self {
        Self {
            name: String::new(),
            rgb: [0, 0, 0],
        }
    }
}

/// Lookup from class index to display colour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassColourScheme {
    classes: Vec<ClassColour>,
}

impl ClassColourScheme {
    /// Scheme with every class black and unnamed
    pub fn new(num_classes: usize) -> Self {
        Self {
            classes: vec![ClassColour::default(); num_classes],
        }
    }

    /// Load a scheme file
    pub fn load(path: &Path, num_classes: usize) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let scheme = Self::parse(&text, num_classes)?;
        info!(
            "Loaded colour scheme for {} classes from {}",
            num_classes,
            path.display()
        );
        Ok(scheme)
    }

    /// Parse scheme text
    ///
    /// # Errors
    /// Malformed rows, colour components above 255, and ids not below `num_classes`.
    pub fn parse(text: &str, num_classes: usize) -> Result<Self> {
        let mut scheme = Self::new(num_classes);

        for (index, line) in text.lines().enumerate().skip(HEADER_LINES) {
            let line_number = index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 5 {
                return Err(FusionError::ColourScheme {
                    line: line_number,
                    reason: format!("expected `name id r g b`, found {} fields", fields.len()),
                });
            }

            let parse_field = |field: &str, what: &str| -> Result<usize> {
                field.parse::<usize>().map_err(|e| FusionError::ColourScheme {
                    line: line_number,
                    reason: format!("invalid {} '{}': {}", what, field, e),
                })
            };
            let parse_component = |field: &str, what: &str| -> Result<u8> {
                let value = parse_field(field, what)?;
                u8::try_from(value).map_err(|_| FusionError::ColourScheme {
                    line: line_number,
                    reason: format!("{} component {} exceeds 255", what, value),
                })
            };

            let id = parse_field(fields[1], "class id")?;
            if id >= num_classes {
                return Err(FusionError::ColourScheme {
                    line: line_number,
                    reason: format!("class id {} not below {} classes", id, num_classes),
                });
            }

            scheme.classes[id] = ClassColour {
                name: fields[0].to_string(),
                rgb: [
                    parse_component(fields[2], "red")?,
                    parse_component(fields[3], "green")?,
                    parse_component(fields[4], "blue")?,
                ],
            };
        }

        Ok(scheme)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Colour of `class`; black for `NO_CLASS` and unknown classes
    pub fn colour(&self, class: i32) -> [u8; 3] {
        usize::try_from(class)
            .ok()
            .and_then(|index| self.classes.get(index))
            .map(|entry| entry.rgb)
            .unwrap_or([0, 0, 0])
    }

    pub fn name(&self, class: i32) -> Option<&str> {
        usize::try_from(class)
            .ok()
            .and_then(|index| self.classes.get(index))
            .map(|entry| entry.name.as_str())
            .filter(|name| !name.is_empty())
    }
}
