// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Raster Fusion Unit
//!
//! Folds one classifier frame into the probability table.
//!
//! ## Phases
//! 1. **Group**: counting sort of identity pixels by element id (CSR offsets), so
//!    every observation of an element lands in one contiguous run
//! 2. **Fuse**: parallel over table rows; each row applies its observations in
//!    pixel order (multiply, sum, renormalise) then refreshes its summary
//! 3. **Collect**: touched elements and their new classes, for push-back
//!
//! Grouping gives each row a single owner, so no atomics or locks are needed.

use ndarray::parallel::prelude::*;
use ndarray::{s, Axis};
use tracing::{debug, trace};

use crate::raster::{ClassProbabilityRaster, IdentityRaster};
use crate::table::{summarize, ProbabilityTable};
use crate::types::{ElementId, FUSION_EPSILON};

/// Outcome of one fusion pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionReport {
    /// Identity pixels carrying a live element id
    pub observations: usize,
    /// Elements whose row received at least one observation
    pub elements_updated: usize,
    /// Observations discarded because the product mass collapsed
    pub collapsed: usize,
    /// Touched elements with their new class (`NO_CLASS` below threshold)
    pub confident_classes: Vec<(ElementId, i32)>,
}

/// Observations grouped by element: `pixels[offsets[id]..offsets[id + 1]]`
struct ObservationGroups {
    offsets: Vec<usize>,
    /// Classifier pixel (row-major index) per observation
    pixels: Vec<u32>,
}

impl ObservationGroups {
    fn build(
        identity: &IdentityRaster,
        width: usize,
        x_map: &[usize],
        y_map: &[usize],
        prob_width: usize,
    ) -> Self {
        let ids = identity.view();

        let mut counts = vec![0usize; width + 1];
        for &id in ids.iter() {
            if ElementId(id).is_valid_for(width) {
                counts[id as usize + 1] += 1;
            }
        }

        // Prefix sums into offsets
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let offsets = counts;
        let total = offsets[width];

        let mut cursor = offsets.clone();
        let mut pixels = vec![0u32; total];
        for ((y, x), &id) in ids.indexed_iter() {
            if ElementId(id).is_valid_for(width) {
                let slot = &mut cursor[id as usize];
                pixels[*slot] = (y_map[y] * prob_width + x_map[x]) as u32;
                *slot += 1;
            }
        }

        Self { offsets, pixels }
    }

    #[inline]
    fn observations_of(&self, row: usize) -> &[u32] {
        &self.pixels[self.offsets[row]..self.offsets[row + 1]]
    }

    fn total(&self) -> usize {
        self.pixels.len()
    }
}

/// Nearest-lower classifier coordinate for every identity coordinate
fn coordinate_map(identity_extent: usize, classifier_extent: usize) -> Vec<usize> {
    (0..identity_extent)
        .map(|i| i * classifier_extent / identity_extent)
        .collect()
}

/// Fuse one classifier frame into the table
///
/// # Panics
/// If the classifier channel count differs from the table's class count, or the
/// classifier raster is larger than the identity raster.
pub fn fuse_raster(
    table: &mut ProbabilityTable,
    identity: &IdentityRaster,
    classifier: &ClassProbabilityRaster,
) -> FusionReport {
    let num_classes = table.num_classes();
    assert_eq!(
        classifier.channels(),
        num_classes,
        "classifier produced {} channels, table has {} classes",
        classifier.channels(),
        num_classes
    );
    assert!(
        classifier.width() <= identity.width() && classifier.height() <= identity.height(),
        "classifier raster {}x{} larger than identity raster {}x{}",
        classifier.width(),
        classifier.height(),
        identity.width(),
        identity.height()
    );

    let width = table.current_size();
    let threshold = table.colour_threshold();
    let prob_width = classifier.width();

    let x_map = coordinate_map(identity.width(), classifier.width());
    let y_map = coordinate_map(identity.height(), classifier.height());
    let groups = ObservationGroups::build(identity, width, &x_map, &y_map, prob_width);

    let evidence = classifier.view();

    let (mut probabilities, summary) = table.active_mut();
    let collapsed: usize = probabilities
        .slice_mut(s![.., ..width])
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(summary[..width].par_iter_mut())
        .enumerate()
        .map_init(
            || vec![0.0f32; num_classes],
            |scratch, (row, (mut column, row_summary))| {
                let observations = groups.observations_of(row);
                if observations.is_empty() {
                    return 0;
                }

                let mut collapsed = 0;
                for &pixel in observations {
                    let pixel = pixel as usize;
                    let observed = evidence.slice(s![.., pixel / prob_width, pixel % prob_width]);
                    let mut sum = 0.0f32;
                    for ((out, &prior), &p) in
                        scratch.iter_mut().zip(column.iter()).zip(observed.iter())
                    {
                        *out = prior * p;
                        sum += *out;
                    }
                    if sum > FUSION_EPSILON {
                        for (cell, &value) in column.iter_mut().zip(scratch.iter()) {
                            *cell = value / sum;
                        }
                    } else {
                        collapsed += 1;
                    }
                }

                *row_summary = summarize(column.view(), threshold);
                collapsed
            },
        )
        .sum();

    let confident_classes: Vec<(ElementId, i32)> = (1..width)
        .filter(|&row| !groups.observations_of(row).is_empty())
        .map(|row| (ElementId(row as u32), summary[row].class))
        .collect();

    let report = FusionReport {
        observations: groups.total(),
        elements_updated: confident_classes.len(),
        collapsed,
        confident_classes,
    };

    if report.collapsed > 0 {
        trace!(
            "[FUSION] {} observations collapsed to zero mass and were skipped",
            report.collapsed
        );
    }
    debug!(
        "[FUSION] {} observations fused into {} elements",
        report.observations, report.elements_updated
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchronizer::reconcile;
    use crate::types::NO_CLASS;

    fn table_with_width(num_classes: usize, width: usize, threshold: f32) -> ProbabilityTable {
        let mut table = ProbabilityTable::new(num_classes, 32, threshold);
        reconcile(&mut table, &[], width);
        table
    }

    #[test]
    fn test_coordinate_map_integer_scale() {
        assert_eq!(coordinate_map(4, 2), vec![0, 0, 1, 1]);
        assert_eq!(coordinate_map(3, 3), vec![0, 1, 2]);
        assert_eq!(coordinate_map(640, 224)[639], 223);
    }

    #[test]
    fn test_single_observation() {
        let mut table = table_with_width(3, 4, 0.0);
        let identity = IdentityRaster::from_vec(1, 1, vec![2]);
        let mut classifier = ClassProbabilityRaster::zeros(3, 1, 1);
        classifier.set_pixel(0, 0, &[0.9, 0.05, 0.05]);

        let report = fuse_raster(&mut table, &identity, &classifier);

        assert_eq!(report.observations, 1);
        assert_eq!(report.confident_classes, vec![(ElementId(2), 0)]);
        let row = table.row(ElementId(2));
        assert!((row[0] - 0.9).abs() < 1e-6);
        assert!((row[1] - 0.05).abs() < 1e-6);
        assert!((table.summary_of(ElementId(2)).probability - 0.9).abs() < 1e-6);
        // Untouched rows stay uniform
        assert_eq!(table.row(ElementId(1)).to_vec(), vec![1.0 / 3.0; 3]);
    }

    #[test]
    fn test_patch_under_one_classifier_pixel_applies_each_observation() {
        let mut table = table_with_width(2, 6, 0.0);
        let mut identity = IdentityRaster::new(4, 4);
        identity.fill_rect(0, 0, 2, 2, ElementId(5));
        let mut classifier = ClassProbabilityRaster::uniform(2, 2, 2);
        classifier.set_pixel(0, 0, &[0.8, 0.2]);

        let report = fuse_raster(&mut table, &identity, &classifier);

        assert_eq!(report.observations, 4);
        assert_eq!(report.elements_updated, 1);
        // 0.8^4 / (0.8^4 + 0.2^4)
        let expected = 0.4096 / (0.4096 + 0.0016);
        assert!((table.row(ElementId(5))[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_sentinel_and_out_of_range_ids_ignored() {
        let mut table = table_with_width(2, 3, 0.0);
        let identity = IdentityRaster::from_vec(3, 1, vec![0, 3, 99]);
        let classifier = ClassProbabilityRaster::uniform(2, 3, 1);

        let report = fuse_raster(&mut table, &identity, &classifier);

        assert_eq!(report.observations, 0);
        assert!(report.confident_classes.is_empty());
        assert_eq!(table.summary_of(ElementId(0)), crate::types::ClassSummary::UNOBSERVED);
    }

    #[test]
    fn test_threshold_marks_unconfident() {
        let mut table = table_with_width(2, 3, 0.7);
        let identity = IdentityRaster::from_vec(2, 1, vec![1, 2]);
        let mut classifier = ClassProbabilityRaster::zeros(2, 2, 1);
        classifier.set_pixel(0, 0, &[0.6, 0.4]);
        classifier.set_pixel(1, 0, &[0.7, 0.3]);

        let report = fuse_raster(&mut table, &identity, &classifier);

        assert_eq!(report.confident_classes[0], (ElementId(1), NO_CLASS));
        let summary = table.summary_of(ElementId(1));
        assert_eq!(summary.class, NO_CLASS);
        assert!((summary.probability - 0.6).abs() < 1e-6);
        // 0.35 / 0.5 lands on the threshold within float error
        assert!((table.summary_of(ElementId(2)).probability - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_zero_mass_observation_keeps_prior() {
        let mut table = table_with_width(2, 2, 0.0);
        table.update_row(ElementId(1), &[1.0, 0.0]);
        let identity = IdentityRaster::from_vec(1, 1, vec![1]);
        let mut classifier = ClassProbabilityRaster::zeros(2, 1, 1);
        classifier.set_pixel(0, 0, &[0.0, 1.0]);

        let report = fuse_raster(&mut table, &identity, &classifier);

        assert_eq!(report.collapsed, 1);
        assert_eq!(table.row(ElementId(1)).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "channels")]
    fn test_channel_mismatch_panics() {
        let mut table = table_with_width(3, 2, 0.0);
        let identity = IdentityRaster::new(2, 2);
        let classifier = ClassProbabilityRaster::uniform(4, 2, 2);
        fuse_raster(&mut table, &identity, &classifier);
    }
}
