// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core identifiers, sentinels and numeric constants shared by every kernel

use std::fmt;

/// Class value meaning "no confident class"
pub const NO_CLASS: i32 = -1;

/// Renormalisation floor: an observation whose product mass falls to or below this is discarded
pub const FUSION_EPSILON: f32 = 1e-30;

/// Offset added before taking the log of a probability for unary energies
pub const UNARY_EPSILON: f32 = 1e-12;

/// Identifier of a map element (surfel), owned and recycled by the mapping subsystem
///
/// Live ids below the table width index their probability row directly.
/// `ElementId(0)` is reserved for "no element" in the identity raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ElementId(pub u32);

impl ElementId {
    /// Reserved "no element" sentinel
    pub const NONE: ElementId = ElementId(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Row index in the probability table
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// True when this id refers to a live row of a table of width `table_size`
    #[inline]
    pub fn is_valid_for(self, table_size: usize) -> bool {
        self.0 > 0 && (self.0 as usize) < table_size
    }
}

impl From<u32> for ElementId {
    fn from(value: u32) -> Self {
        ElementId(value)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cached best class for one table row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassSummary {
    /// Best class, or `NO_CLASS` when below the confidence threshold or never observed
    pub class: i32,
    /// Probability of the best class (kept even when `class` is `NO_CLASS`)
    pub probability: f32,
}

impl ClassSummary {
    /// Summary of a freshly created row
    pub const UNOBSERVED: ClassSummary = ClassSummary {
        class: NO_CLASS,
        probability: 0.0,
    };

    #[inline]
    pub fn is_confident(&self) -> bool {
        self.class != NO_CLASS
    }
}

impl Default for ClassSummary {
    fn default() -> Self {
        Self::UNOBSERVED
    }
}
