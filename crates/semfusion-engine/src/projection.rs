// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Projection and Export
//!
//! Read-only views of the table through an identity raster:
//! - full per-pixel distributions (`[classes][h][w]`) for rendering
//! - downsampled argmax label images for evaluation

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Array3, Axis, Zip};
use tracing::debug;

use crate::colour_scheme::ClassColourScheme;
use crate::error::Result;
use crate::raster::{ClassProbabilityRaster, IdentityRaster};
use crate::table::ProbabilityTable;
use crate::types::{ElementId, NO_CLASS};

/// Downsample factor between identity raster and saved label images
pub const DEFAULT_DOWNSAMPLE_FACTOR: usize = 2;

/// Gather each pixel's element distribution; unmapped pixels are all-zero
pub fn project_probabilities(
    table: &ProbabilityTable,
    identity: &IdentityRaster,
) -> ClassProbabilityRaster {
    let width = table.current_size();
    let probabilities = table.probabilities();
    let ids = identity.view();

    let mut projected =
        Array3::<f32>::zeros((table.num_classes(), identity.height(), identity.width()));
    projected
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(class, mut plane)| {
            let class_row = probabilities.row(class);
            Zip::from(&mut plane).and(&ids).for_each(|value, &id| {
                if ElementId(id).is_valid_for(width) {
                    *value = class_row[id as usize];
                }
            });
        });

    ClassProbabilityRaster::from_array(projected)
}

/// Downsampled argmax labels
///
/// Each output pixel covers a `factor x factor` identity patch and takes the
/// class of the live element with the highest cached probability. Pixels with
/// no live element, or whose best element has no confident class, are 0.
///
/// # Panics
/// If `factor` is zero.
pub fn argmax_labels(
    table: &ProbabilityTable,
    identity: &IdentityRaster,
    factor: usize,
) -> Array2<u8> {
    assert!(factor > 0, "downsample factor must be positive");

    let width = table.current_size();
    let summary = table.summary();
    let ids = identity.view();
    let out_height = identity.height() / factor;
    let out_width = identity.width() / factor;

    let mut labels = Array2::<u8>::zeros((out_height, out_width));
    Zip::indexed(&mut labels).par_for_each(|(row, col), label| {
        let mut best_probability = 0.0f32;
        let mut best_class = NO_CLASS;
        for dy in 0..factor {
            for dx in 0..factor {
                let id = ElementId(ids[[row * factor + dy, col * factor + dx]]);
                if id.is_valid_for(width) {
                    let entry = summary[id.index()];
                    if entry.probability > best_probability {
                        best_probability = entry.probability;
                        best_class = entry.class;
                    }
                }
            }
        }
        *label = if best_class == NO_CLASS {
            0
        } else {
            best_class.clamp(0, u8::MAX as i32) as u8
        };
    });

    labels
}

/// Write labels as an 8-bit RGB PNG with the class in all three channels
pub fn save_label_image(path: &Path, labels: &Array2<u8>) -> Result<()> {
    let (height, width) = labels.dim();
    let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let class = labels[[y as usize, x as usize]];
        Rgb([class, class, class])
    });
    image.save_with_format(path, ImageFormat::Png)?;
    debug!("[EXPORT] wrote {}x{} label image to {}", width, height, path.display());
    Ok(())
}

/// Write labels as an RGB PNG coloured through a class colour scheme
pub fn save_colour_label_image(
    path: &Path,
    labels: &Array2<u8>,
    scheme: &ClassColourScheme,
) -> Result<()> {
    let (height, width) = labels.dim();
    let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
        Rgb(scheme.colour(labels[[y as usize, x as usize]] as i32))
    });
    image.save_with_format(path, ImageFormat::Png)?;
    debug!(
        "[EXPORT] wrote {}x{} colour label image to {}",
        width,
        height,
        path.display()
    );
    Ok(())
}
