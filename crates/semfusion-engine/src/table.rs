// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Probability Table
//!
//! Dense, class-major `[num_classes][max_components]` table of per-element class
//! distributions plus the lock-step summary cache of best classes.
//!
//! ## Layout
//! - Element `id` owns column `id` (its "row" in domain terms); stride is `max_components`
//! - Two physical buffers; the synchronizer writes the inactive one and flips `active`
//! - Only columns `< current_size` are meaningful; the rest are undefined until reclaimed

use ndarray::parallel::prelude::*;
use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};

use crate::types::{ClassSummary, ElementId, FUSION_EPSILON, NO_CLASS};

/// One physical copy of table + summary
#[derive(Debug, Clone)]
pub(crate) struct TableBuffer {
    pub(crate) probabilities: Array2<f32>,
    pub(crate) summary: Vec<ClassSummary>,
}

impl TableBuffer {
    fn new(num_classes: usize, max_components: usize) -> Self {
        Self {
            probabilities: Array2::from_elem(
                (num_classes, max_components),
                1.0 / num_classes as f32,
            ),
            summary: vec![ClassSummary::UNOBSERVED; max_components],
        }
    }
}

/// Double-buffered probability table with summary cache
#[derive(Debug, Clone)]
pub struct ProbabilityTable {
    num_classes: usize,
    max_components: usize,
    colour_threshold: f32,
    current_size: usize,
    buffers: [TableBuffer; 2],
    active: usize,
}

impl ProbabilityTable {
    /// Allocate both buffers at full capacity, uniform rows, unobserved summaries
    ///
    /// # Panics
    /// If `num_classes` or `max_components` is zero.
    pub fn new(num_classes: usize, max_components: usize, colour_threshold: f32) -> Self {
        assert!(num_classes > 0, "probability table needs at least one class");
        assert!(max_components > 0, "probability table needs capacity");

        Self {
            num_classes,
            max_components,
            colour_threshold,
            current_size: 0,
            buffers: [
                TableBuffer::new(num_classes, max_components),
                TableBuffer::new(num_classes, max_components),
            ],
            active: 0,
        }
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[inline]
    pub fn max_components(&self) -> usize {
        self.max_components
    }

    /// Logical width: rows `[0, current_size)` are live
    #[inline]
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    #[inline]
    pub fn colour_threshold(&self) -> f32 {
        self.colour_threshold
    }

    /// Value every fresh row is initialised to
    #[inline]
    pub fn uniform_probability(&self) -> f32 {
        1.0 / self.num_classes as f32
    }

    /// Active table, full capacity
    pub fn probabilities(&self) -> ArrayView2<'_, f32> {
        self.buffers[self.active].probabilities.view()
    }

    /// Distribution of one element
    ///
    /// # Panics
    /// If `id` is outside the live width.
    pub fn row(&self, id: ElementId) -> ArrayView1<'_, f32> {
        assert!(
            id.index() < self.current_size,
            "element {} outside table width {}",
            id,
            self.current_size
        );
        self.buffers[self.active].probabilities.column(id.index())
    }

    /// Summary cache for the live width
    pub fn summary(&self) -> &[ClassSummary] {
        &self.buffers[self.active].summary[..self.current_size]
    }

    /// Summary of one element
    pub fn summary_of(&self, id: ElementId) -> ClassSummary {
        self.summary()[id.index()]
    }

    /// Active table and summary for in-place kernels
    pub(crate) fn active_mut(&mut self) -> (ArrayViewMut2<'_, f32>, &mut [ClassSummary]) {
        let buffer = &mut self.buffers[self.active];
        (buffer.probabilities.view_mut(), &mut buffer.summary)
    }

    /// Active (read) and inactive (write) buffers for the synchronizer
    pub(crate) fn split_for_sync(&mut self) -> (&TableBuffer, &mut TableBuffer) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.active == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Make the inactive buffer active and adopt its width
    pub(crate) fn swap_buffers(&mut self, new_size: usize) {
        self.active ^= 1;
        self.current_size = new_size;
    }

    /// Recompute summaries for `rows` of the active buffer
    pub(crate) fn recompute_summaries(&mut self, rows: std::ops::Range<usize>) {
        let threshold = self.colour_threshold;
        let buffer = &mut self.buffers[self.active];
        buffer
            .probabilities
            .slice(s![.., rows.clone()])
            .axis_iter(Axis(1))
            .into_par_iter()
            .zip(buffer.summary[rows].par_iter_mut())
            .for_each(|(row, summary)| *summary = summarize(row, threshold));
    }

    /// Fuse one observation into one element outside the raster path
    ///
    /// Same multiply, renormalise, argmax and threshold rules as raster fusion.
    /// Returns the confident class or `NO_CLASS`.
    ///
    /// # Panics
    /// If `id` is outside the live width or `observed` has the wrong length.
    pub fn update_row(&mut self, id: ElementId, observed: &[f32]) -> i32 {
        assert!(
            id.index() < self.current_size,
            "element {} outside table width {}",
            id,
            self.current_size
        );
        assert_eq!(
            observed.len(),
            self.num_classes,
            "observation has {} classes, table has {}",
            observed.len(),
            self.num_classes
        );

        let threshold = self.colour_threshold;
        let mut scratch = vec![0.0; self.num_classes];
        let (mut probabilities, summary) = self.active_mut();
        let mut row = probabilities.column_mut(id.index());

        let mut sum = 0.0;
        for ((out, &prior), &evidence) in scratch.iter_mut().zip(row.iter()).zip(observed) {
            *out = prior * evidence;
            sum += *out;
        }
        if sum > FUSION_EPSILON {
            for (cell, &value) in row.iter_mut().zip(&scratch) {
                *cell = value / sum;
            }
        }

        let updated = summarize(row.view(), threshold);
        summary[id.index()] = updated;
        updated.class
    }
}

/// Argmax summary of one distribution
///
/// Ties go to the lowest class index. The class is `NO_CLASS` when the best
/// probability is below `threshold`; reaching it exactly counts as confident.
pub fn summarize(row: ArrayView1<'_, f32>, threshold: f32) -> ClassSummary {
    if row.is_empty() {
        return ClassSummary::UNOBSERVED;
    }

    let mut best_class = 0usize;
    let mut best = f32::NEG_INFINITY;
    for (class, &p) in row.iter().enumerate() {
        if p > best {
            best = p;
            best_class = class;
        }
    }

    ClassSummary {
        class: if best >= threshold {
            best_class as i32
        } else {
            NO_CLASS
        },
        probability: best,
    }
}
