// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reference dense-CRF solver
//!
//! Exact mean-field inference with a Potts compatibility and two Gaussian kernels:
//! - spatial: `w_s * exp(-|dp|^2 / 2 sigma_s^2)`
//! - bilateral: `w_b * exp(-|dp|^2 / 2 sigma_bp^2 - |dc|^2 / 2 sigma_bc^2)`
//!
//! Message passing is O(N^2) per iteration, parallel over elements. Suitable for
//! small maps and tests; large maps should plug in a lattice-based solver.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, Axis};

use super::{PairwiseFeatures, PairwiseSolver, SmoothingParams};

/// Exact mean-field solver on the CPU
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanFieldSolver;

impl MeanFieldSolver {
    pub fn new() -> Self {
        Self
    }
}

/// Precomputed kernel coefficients
struct Kernels {
    spatial_weight: f32,
    spatial_scale: f32,
    bilateral_weight: f32,
    bilateral_position_scale: f32,
    bilateral_colour_scale: f32,
}

impl Kernels {
    fn new(params: &SmoothingParams) -> Self {
        let scale = |stddev: f32| 1.0 / (2.0 * stddev * stddev);
        Self {
            spatial_weight: params.spatial_weight,
            spatial_scale: scale(params.spatial_stddev),
            bilateral_weight: params.bilateral_weight,
            bilateral_position_scale: scale(params.bilateral_position_stddev),
            bilateral_colour_scale: scale(params.bilateral_colour_stddev),
        }
    }

    #[inline]
    fn affinity(&self, features: &PairwiseFeatures, i: usize, j: usize) -> f32 {
        let position_distance = squared_distance(&features.positions[i], &features.positions[j]);
        let colour_distance = squared_distance(&features.colours[i], &features.colours[j]);

        let mut affinity = 0.0;
        if self.spatial_weight > 0.0 {
            affinity += self.spatial_weight * (-position_distance * self.spatial_scale).exp();
        }
        if self.bilateral_weight > 0.0 {
            affinity += self.bilateral_weight
                * (-position_distance * self.bilateral_position_scale
                    - colour_distance * self.bilateral_colour_scale)
                    .exp();
        }
        affinity
    }
}

#[inline]
fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// In-place softmax of negated energies
fn softmax_of_negated(energies: &mut [f32]) {
    let min = energies.iter().copied().fold(f32::INFINITY, f32::min);
    let mut sum = 0.0;
    for e in energies.iter_mut() {
        *e = (min - *e).exp();
        sum += *e;
    }
    for e in energies.iter_mut() {
        *e /= sum;
    }
}

impl PairwiseSolver for MeanFieldSolver {
    fn solver_name(&self) -> &str {
        "mean-field"
    }

    fn solve(
        &self,
        unary: ArrayView2<'_, f32>,
        features: &PairwiseFeatures,
        params: &SmoothingParams,
    ) -> Array2<f32> {
        let (elements, num_classes) = unary.dim();
        assert_eq!(
            features.len(),
            elements,
            "features describe {} elements, unary has {}",
            features.len(),
            elements
        );

        // Initial marginals from unaries alone
        let mut marginals = Array2::<f32>::zeros((elements, num_classes));
        marginals.assign(&unary);
        marginals
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                // Standard layout, so every row is contiguous
                if let Some(slice) = row.as_slice_mut() {
                    softmax_of_negated(slice);
                }
            });

        let kernels = Kernels::new(params);
        let relaxation = params.relaxation;

        for _ in 0..params.iterations {
            let previous = marginals.view();
            let mut next = Array2::<f32>::zeros((elements, num_classes));
            next.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each_init(
                    || vec![0.0f32; num_classes],
                    |energies, (i, mut out)| {
                        energies.iter_mut().for_each(|m| *m = 0.0);

                        // Potts: each label is rewarded by neighbours' mass on the same label
                        for j in 0..elements {
                            if j == i {
                                continue;
                            }
                            let affinity = kernels.affinity(features, i, j);
                            if affinity <= 0.0 {
                                continue;
                            }
                            for (m, &q) in energies.iter_mut().zip(previous.row(j).iter()) {
                                *m += affinity * q;
                            }
                        }

                        for (e, &u) in energies.iter_mut().zip(unary.row(i).iter()) {
                            *e = u - *e;
                        }
                        softmax_of_negated(energies);

                        for ((cell, &updated), &old) in
                            out.iter_mut().zip(energies.iter()).zip(previous.row(i).iter())
                        {
                            *cell = (1.0 - relaxation) * old + relaxation * updated;
                        }
                    },
                );
            marginals = next;
        }

        marginals
    }
}
