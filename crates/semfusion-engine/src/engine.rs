// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Semantic Fusion Engine
//!
//! Owns the probability table and drives the per-frame kernels in strict order:
//! synchronise, fuse, optionally smooth, optionally project.
//!
//! All mutating operations take `&mut self`, so no reader can observe a table
//! mid-update.

use std::path::Path;
use std::time::Instant;

use ndarray::Array2;
use tracing::{debug, info};

use crate::colour_scheme::ClassColourScheme;
use crate::config::FusionConfig;
use crate::error::Result;
use crate::fusion::{fuse_raster, FusionReport};
use crate::population::ElementPopulation;
use crate::projection::{
    argmax_labels, project_probabilities, save_colour_label_image, save_label_image,
};
use crate::raster::{ClassProbabilityRaster, IdentityRaster};
use crate::smoothing::{
    smooth_table, MeanFieldSolver, PairwiseSolver, SmoothingParams, SmoothingReport,
};
use crate::synchronizer::{reconcile, SyncReport};
use crate::table::ProbabilityTable;
use crate::types::{ClassSummary, ElementId};

/// Per-element semantic probability fusion
pub struct SemanticFusionEngine<S: PairwiseSolver = MeanFieldSolver> {
    table: ProbabilityTable,
    solver: S,
    smoothing: SmoothingParams,
    downsample_factor: usize,
    rendered: Option<ClassProbabilityRaster>,
}

impl SemanticFusionEngine<MeanFieldSolver> {
    /// Engine with the reference mean-field smoothing solver
    pub fn new(config: FusionConfig) -> Result<Self> {
        Self::with_solver(config, MeanFieldSolver)
    }
}

impl<S: PairwiseSolver> SemanticFusionEngine<S> {
    /// Engine with a custom smoothing solver
    ///
    /// Allocates both table buffers at full capacity.
    pub fn with_solver(config: FusionConfig, solver: S) -> Result<Self> {
        config.validate()?;

        let table = ProbabilityTable::new(
            config.num_classes,
            config.max_components,
            config.colour_threshold,
        );
        info!(
            "Fusion engine ready: {} classes, capacity {} elements, threshold {}, solver '{}'",
            config.num_classes,
            config.max_components,
            config.colour_threshold,
            solver.solver_name()
        );

        Ok(Self {
            table,
            solver,
            smoothing: config.smoothing,
            downsample_factor: config.downsample_factor,
            rendered: None,
        })
    }

    /// Reconcile the table with the population's deletions and new width
    ///
    /// # Panics
    /// On inconsistent population reports (see [`reconcile`]).
    pub fn update_probability_table<P>(&mut self, population: &P) -> SyncReport
    where
        P: ElementPopulation + ?Sized,
    {
        let start = Instant::now();
        let report = reconcile(
            &mut self.table,
            population.deleted_since_last_sync(),
            population.live_element_count(),
        );
        debug!(
            "[SYNC] reconciled in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        report
    }

    /// Fuse one classifier frame and push updated classes back to the population
    ///
    /// # Panics
    /// If the classifier channel count differs from `num_classes`.
    pub fn update_probabilities<P>(
        &mut self,
        classifier: &ClassProbabilityRaster,
        population: &mut P,
    ) -> FusionReport
    where
        P: ElementPopulation + ?Sized,
    {
        let start = Instant::now();
        let report = fuse_raster(&mut self.table, population.identity_raster(), classifier);
        for &(id, class) in &report.confident_classes {
            population.set_confident_class(id, class);
        }
        debug!(
            "[FUSION] frame fused in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        report
    }

    /// Smooth the whole table with `iterations` of joint inference
    ///
    /// Every live element's class is refreshed and pushed back afterwards.
    pub fn crf_update<P>(&mut self, population: &mut P, iterations: usize) -> SmoothingReport
    where
        P: ElementPopulation + ?Sized,
    {
        let start = Instant::now();
        let params = SmoothingParams {
            iterations,
            ..self.smoothing.clone()
        };
        let report = smooth_table(&mut self.table, &*population, &self.solver, &params);
        for &(id, class) in &report.confident_classes {
            population.set_confident_class(id, class);
        }
        info!(
            "[CRF] {} elements smoothed in {:.2}ms",
            report.elements,
            start.elapsed().as_secs_f64() * 1000.0
        );
        report
    }

    /// Gather full distributions per identity pixel
    ///
    /// The result is kept and exposed by [`rendered_probability_map`](Self::rendered_probability_map).
    pub fn calculate_projected_probability_map(&mut self, identity: &IdentityRaster) {
        self.rendered = Some(project_probabilities(&self.table, identity));
    }

    /// Last projected probability map, if one was calculated
    pub fn rendered_probability_map(&self) -> Option<&ClassProbabilityRaster> {
        self.rendered.as_ref()
    }

    /// Best class and probability per live row
    pub fn class_summary(&self) -> &[ClassSummary] {
        self.table.summary()
    }

    /// Fixed table capacity
    pub fn max_table_capacity(&self) -> usize {
        self.table.max_components()
    }

    pub fn current_table_size(&self) -> usize {
        self.table.current_size()
    }

    pub fn num_classes(&self) -> usize {
        self.table.num_classes()
    }

    pub fn table(&self) -> &ProbabilityTable {
        &self.table
    }

    pub fn smoothing_params(&self) -> &SmoothingParams {
        &self.smoothing
    }

    /// Fuse one observation into one element outside the raster path
    pub fn update_element(&mut self, id: ElementId, observed: &[f32]) -> i32 {
        self.table.update_row(id, observed)
    }

    /// Downsampled argmax labels at the configured factor
    pub fn argmax_labels(&self, identity: &IdentityRaster) -> Array2<u8> {
        argmax_labels(&self.table, identity, self.downsample_factor)
    }

    /// Save downsampled argmax labels as a grey RGB PNG
    pub fn save_argmax_predictions(&self, path: &Path, identity: &IdentityRaster) -> Result<()> {
        save_label_image(path, &self.argmax_labels(identity))
    }

    /// Save downsampled argmax labels coloured through `scheme`
    pub fn save_argmax_colour_image(
        &self,
        path: &Path,
        identity: &IdentityRaster,
        scheme: &ClassColourScheme,
    ) -> Result<()> {
        save_colour_label_image(path, &self.argmax_labels(identity), scheme)
    }
}
