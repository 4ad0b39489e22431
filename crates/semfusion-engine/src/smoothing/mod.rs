// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Smoothing Pass
//!
//! Periodic dense-CRF refinement of the whole table. Rows become unary energies,
//! element geometry becomes pairwise features, a [`PairwiseSolver`] runs joint
//! inference, and only well-formed results are written back.
//!
//! Row 0 is the "no element" sentinel and never takes part.

mod mean_field;

pub use mean_field::MeanFieldSolver;

use ndarray::parallel::prelude::*;
use ndarray::{s, Array2, ArrayView2, Axis};
use tracing::{debug, warn};

use crate::population::ElementPopulation;
use crate::table::ProbabilityTable;
use crate::types::{ElementId, UNARY_EPSILON};

/// Kernel and inference parameters for one smoothing pass
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingParams {
    /// Position-only Gaussian kernel width (map units)
    pub spatial_stddev: f32,
    pub spatial_weight: f32,
    /// Bilateral kernel position width (map units)
    pub bilateral_position_stddev: f32,
    /// Bilateral kernel colour width (0-255 units)
    pub bilateral_colour_stddev: f32,
    pub bilateral_weight: f32,
    /// Mean-field iterations
    pub iterations: usize,
    /// Blend between previous and updated marginals (1.0 = plain update)
    pub relaxation: f32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            spatial_stddev: 0.05,
            spatial_weight: 3.0,
            bilateral_position_stddev: 0.1,
            bilateral_colour_stddev: 20.0,
            bilateral_weight: 10.0,
            iterations: 10,
            relaxation: 1.0,
        }
    }
}

/// Per-element geometry consumed by the pairwise kernels
///
/// Index `i` describes element `i + 1`; the sentinel row is not included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseFeatures {
    pub positions: Vec<[f32; 3]>,
    /// Colour in 0-255 units
    pub colours: Vec<[f32; 3]>,
}

impl PairwiseFeatures {
    /// Copy geometry of elements `1..table_size` from the population
    pub fn from_population<P: ElementPopulation + ?Sized>(population: &P, table_size: usize) -> Self {
        let ids = (1..table_size).map(|id| ElementId(id as u32));
        let positions = ids.clone().map(|id| population.element_position(id)).collect();
        let colours = ids
            .map(|id| {
                let [r, g, b] = population.element_colour(id);
                [r as f32, g as f32, b as f32]
            })
            .collect();
        Self { positions, colours }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Joint inference over all elements
pub trait PairwiseSolver: Send + Sync {
    /// Solver name for logging
    fn solver_name(&self) -> &str;

    /// Approximate marginals from unary energies
    ///
    /// # Arguments
    /// * `unary` - `[elements][classes]` energies (`-ln p`)
    /// * `features` - geometry of the same elements, same order
    /// * `params` - kernel widths, weights, iterations and relaxation
    ///
    /// # Returns
    /// `[elements][classes]` marginals. Values outside (0, 1) are discarded by the caller.
    fn solve(
        &self,
        unary: ArrayView2<'_, f32>,
        features: &PairwiseFeatures,
        params: &SmoothingParams,
    ) -> Array2<f32>;
}

/// Outcome of one smoothing pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothingReport {
    /// Elements that took part (table width minus the sentinel row)
    pub elements: usize,
    /// Cells overwritten with the solver's result
    pub cells_written: usize,
    /// Cells left untouched because the result was 0, 1 or not finite
    pub cells_discarded: usize,
    /// Every live element with its refreshed class
    pub confident_classes: Vec<(ElementId, i32)>,
}

/// Unary energies `-ln(p + eps)` for rows `1..table_size`, `[elements][classes]`
pub fn unary_energies(table: &ProbabilityTable) -> Array2<f32> {
    let width = table.current_size();
    let live = table.probabilities().slice_move(s![.., 1..width.max(1)]);
    let mut unary = Array2::<f32>::zeros((live.ncols(), live.nrows()));
    unary.assign(&live.t());
    unary.mapv_inplace(|p| -(p + UNARY_EPSILON).ln());
    unary
}

#[inline]
fn accept(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value < 1.0
}

/// Run one smoothing pass over the live table
///
/// # Panics
/// If the solver returns a result of the wrong shape.
pub fn smooth_table<P, S>(
    table: &mut ProbabilityTable,
    population: &P,
    solver: &S,
    params: &SmoothingParams,
) -> SmoothingReport
where
    P: ElementPopulation + ?Sized,
    S: PairwiseSolver + ?Sized,
{
    let width = table.current_size();
    if width <= 1 {
        return SmoothingReport::default();
    }

    let unary = unary_energies(table);
    let features = PairwiseFeatures::from_population(population, width);
    let marginals = solver.solve(unary.view(), &features, params);
    assert_eq!(
        marginals.dim(),
        unary.dim(),
        "solver '{}' returned {:?}, expected {:?}",
        solver.solver_name(),
        marginals.dim(),
        unary.dim()
    );

    let (mut probabilities, _) = table.active_mut();
    let (written, discarded) = probabilities
        .slice_mut(s![.., 1..width])
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(marginals.axis_iter(Axis(0)).into_par_iter())
        .map(|(mut column, result)| {
            let mut written = 0usize;
            for (cell, &value) in column.iter_mut().zip(result.iter()) {
                if accept(value) {
                    *cell = value;
                    written += 1;
                }
            }
            (written, result.len() - written)
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    table.recompute_summaries(1..width);
    let confident_classes = table.summary()[1..]
        .iter()
        .enumerate()
        .map(|(i, summary)| (ElementId(i as u32 + 1), summary.class))
        .collect();

    if discarded > 0 {
        warn!(
            "[CRF] {} of {} cells rejected from solver '{}' (0, 1 or NaN)",
            discarded,
            written + discarded,
            solver.solver_name()
        );
    }
    debug!(
        "[CRF] smoothed {} elements with '{}' ({} iterations)",
        width - 1,
        solver.solver_name(),
        params.iterations
    );

    SmoothingReport {
        elements: width - 1,
        cells_written: written,
        cells_discarded: discarded,
        confident_classes,
    }
}
