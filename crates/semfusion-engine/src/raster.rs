// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Rasters
//!
//! Two image-shaped inputs drive the engine:
//! - [`IdentityRaster`]: per-pixel element id rendered by the mapping subsystem (`[h][w]`)
//! - [`ClassProbabilityRaster`]: per-pixel class distribution from the classifier (`[classes][h][w]`)
//!
//! Both are row-major with `y` as the slow axis, matching the classifier's output layout.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3};

use crate::types::ElementId;

/// Per-pixel element ids (`0` = no element)
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRaster {
    ids: Array2<u32>,
}

impl IdentityRaster {
    /// Raster with every pixel set to "no element"
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            ids: Array2::zeros((height, width)),
        }
    }

    /// Build from row-major ids
    ///
    /// # Panics
    /// If `ids.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, ids: Vec<u32>) -> Self {
        assert_eq!(
            ids.len(),
            width * height,
            "identity raster needs {}x{} ids, got {}",
            width,
            height,
            ids.len()
        );
        let ids = Array2::from_shape_vec((height, width), ids)
            .unwrap_or_else(|e| panic!("identity raster shape: {}", e));
        Self { ids }
    }

    /// Wrap an existing `[h][w]` array
    pub fn from_array(ids: Array2<u32>) -> Self {
        Self { ids }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.ids.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.ids.nrows()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> ElementId {
        ElementId(self.ids[[y, x]])
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, id: ElementId) {
        self.ids[[y, x]] = id.0;
    }

    /// Fill an axis-aligned rectangle with one id (clipped to the raster)
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, id: ElementId) {
        let x_end = (x + width).min(self.width());
        let y_end = (y + height).min(self.height());
        for yy in y.min(y_end)..y_end {
            for xx in x.min(x_end)..x_end {
                self.ids[[yy, xx]] = id.0;
            }
        }
    }

    pub fn view(&self) -> ArrayView2<'_, u32> {
        self.ids.view()
    }
}

/// Classifier output: one probability plane per class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilityRaster {
    data: Array3<f32>,
}

impl ClassProbabilityRaster {
    /// All-zero raster
    pub fn zeros(num_classes: usize, width: usize, height: usize) -> Self {
        Self {
            data: Array3::zeros((num_classes, height, width)),
        }
    }

    /// Every pixel uniform over `num_classes`
    pub fn uniform(num_classes: usize, width: usize, height: usize) -> Self {
        let value = 1.0 / num_classes as f32;
        Self {
            data: Array3::from_elem((num_classes, height, width), value),
        }
    }

    /// Wrap an existing `[classes][h][w]` array
    pub fn from_array(data: Array3<f32>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    #[inline]
    pub fn value(&self, class: usize, x: usize, y: usize) -> f32 {
        self.data[[class, y, x]]
    }

    /// Class distribution at one pixel
    pub fn pixel(&self, x: usize, y: usize) -> ArrayView1<'_, f32> {
        self.data.slice(ndarray::s![.., y, x])
    }

    /// Overwrite the distribution at one pixel
    ///
    /// # Panics
    /// If `probabilities.len() != self.channels()`.
    pub fn set_pixel(&mut self, x: usize, y: usize, probabilities: &[f32]) {
        assert_eq!(probabilities.len(), self.channels());
        for (class, &p) in probabilities.iter().enumerate() {
            self.data[[class, y, x]] = p;
        }
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }
}
