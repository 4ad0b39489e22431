// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Element Population
//!
//! The engine never owns the map. It reads the element population through
//! [`ElementPopulation`], implemented by the mapping subsystem, and writes back
//! only the confident class of each element it updates.

use crate::raster::IdentityRaster;
use crate::types::{ElementId, NO_CLASS};

/// View of the externally owned, append/delete element population
pub trait ElementPopulation {
    /// Table width the engine must match after the next sync (includes the reserved id 0)
    fn live_element_count(&self) -> usize;

    /// Ids deleted since the previous sync, ascending and disjoint
    fn deleted_since_last_sync(&self) -> &[ElementId];

    /// Per-pixel element ids for the current frame
    fn identity_raster(&self) -> &IdentityRaster;

    /// Element position in map units
    fn element_position(&self, id: ElementId) -> [f32; 3];

    /// Element colour in 0-255 units
    fn element_colour(&self, id: ElementId) -> [u8; 3];

    /// Record the element's confident class (`NO_CLASS` when below threshold)
    fn set_confident_class(&mut self, id: ElementId, class: i32);
}

/// Plain owned population, used for replay, benchmarks and tests
#[derive(Debug, Clone)]
pub struct PopulationSnapshot {
    element_count: usize,
    deleted: Vec<ElementId>,
    identity: IdentityRaster,
    positions: Vec<[f32; 3]>,
    colours: Vec<[u8; 3]>,
    confident_classes: Vec<i32>,
}

impl PopulationSnapshot {
    /// Population of `element_count` elements at the origin, all black
    pub fn new(element_count: usize, identity: IdentityRaster) -> Self {
        Self {
            element_count,
            deleted: Vec::new(),
            identity,
            positions: vec![[0.0; 3]; element_count],
            colours: vec![[0; 3]; element_count],
            confident_classes: vec![NO_CLASS; element_count],
        }
    }

    /// Resize the population, keeping existing attributes
    pub fn set_element_count(&mut self, element_count: usize) {
        self.element_count = element_count;
        self.positions.resize(element_count, [0.0; 3]);
        self.colours.resize(element_count, [0; 3]);
        self.confident_classes.resize(element_count, NO_CLASS);
    }

    /// Deletions reported by the next sync
    ///
    /// # Panics
    /// If `deleted` is not strictly ascending.
    pub fn set_deleted(&mut self, deleted: Vec<ElementId>) {
        assert!(
            deleted.windows(2).all(|w| w[0] < w[1]),
            "deletions must be strictly ascending"
        );
        self.deleted = deleted;
    }

    /// Clear deletions after they were consumed
    pub fn clear_deleted(&mut self) {
        self.deleted.clear();
    }

    /// Delete ids and compact attributes the same way the probability table is compacted
    ///
    /// The resulting count is `element_count - deleted.len()`; the ids are kept in
    /// `deleted_since_last_sync` until [`clear_deleted`](Self::clear_deleted).
    pub fn delete_and_compact(&mut self, deleted: Vec<ElementId>) {
        self.set_deleted(deleted);
        let mut next_deleted = self.deleted.iter().peekable();
        let mut kept = 0;
        for index in 0..self.element_count {
            if next_deleted.peek().map(|id| id.index()) == Some(index) {
                next_deleted.next();
                continue;
            }
            self.positions[kept] = self.positions[index];
            self.colours[kept] = self.colours[index];
            self.confident_classes[kept] = self.confident_classes[index];
            kept += 1;
        }
        self.set_element_count(kept);
    }

    pub fn set_identity_raster(&mut self, identity: IdentityRaster) {
        self.identity = identity;
    }

    pub fn identity_raster_mut(&mut self) -> &mut IdentityRaster {
        &mut self.identity
    }

    pub fn set_position(&mut self, id: ElementId, position: [f32; 3]) {
        self.positions[id.index()] = position;
    }

    pub fn set_colour(&mut self, id: ElementId, colour: [u8; 3]) {
        self.colours[id.index()] = colour;
    }

    /// Last class pushed back for `id`
    pub fn confident_class(&self, id: ElementId) -> i32 {
        self.confident_classes[id.index()]
    }
}

impl ElementPopulation for PopulationSnapshot {
    fn live_element_count(&self) -> usize {
        self.element_count
    }

    fn deleted_since_last_sync(&self) -> &[ElementId] {
        &self.deleted
    }

    fn identity_raster(&self) -> &IdentityRaster {
        &self.identity
    }

    fn element_position(&self, id: ElementId) -> [f32; 3] {
        self.positions[id.index()]
    }

    fn element_colour(&self, id: ElementId) -> [u8; 3] {
        self.colours[id.index()]
    }

    fn set_confident_class(&mut self, id: ElementId, class: i32) {
        self.confident_classes[id.index()] = class;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_resize_keeps_attributes() {
        let mut population = PopulationSnapshot::new(3, IdentityRaster::new(2, 2));
        population.set_position(ElementId(2), [1.0, 2.0, 3.0]);
        population.set_element_count(5);

        assert_eq!(population.live_element_count(), 5);
        assert_eq!(population.element_position(ElementId(2)), [1.0, 2.0, 3.0]);
        assert_eq!(population.confident_class(ElementId(4)), NO_CLASS);
    }

    #[test]
    fn test_delete_and_compact() {
        let mut population = PopulationSnapshot::new(5, IdentityRaster::new(1, 1));
        for i in 0..5 {
            population.set_colour(ElementId(i), [i as u8; 3]);
        }
        population.delete_and_compact(vec![ElementId(1), ElementId(3)]);

        assert_eq!(population.live_element_count(), 3);
        assert_eq!(population.deleted_since_last_sync().len(), 2);
        assert_eq!(population.element_colour(ElementId(1)), [2; 3]);
        assert_eq!(population.element_colour(ElementId(2)), [4; 3]);
    }

    #[test]
    #[should_panic]
    fn test_unsorted_deletions_rejected() {
        let mut population = PopulationSnapshot::new(5, IdentityRaster::new(1, 1));
        population.set_deleted(vec![ElementId(3), ElementId(1)]);
    }
}
