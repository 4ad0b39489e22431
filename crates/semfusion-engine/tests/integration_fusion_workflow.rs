/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Integration Tests: Complete Fusion Workflow
//!
//! End-to-end tests across the engine's public surface:
//! - Population growth → table sync → raster fusion → class push-back
//! - Deletions → compaction with row contents following their elements
//! - Smoothing with pluggable solvers
//! - Projection and label image export

use ndarray::{arr2, Array2, ArrayView2};
use semfusion_engine::*;

// ═══════════════════════════════════════════════════════════
// Helper Functions
// ═══════════════════════════════════════════════════════════

fn engine(num_classes: usize, max_components: usize, threshold: f32) -> SemanticFusionEngine {
    SemanticFusionEngine::new(FusionConfig {
        num_classes,
        max_components,
        colour_threshold: threshold,
        ..Default::default()
    })
    .unwrap()
}

fn assert_row_sums_to_one(engine: &SemanticFusionEngine<impl PairwiseSolver>) {
    for id in 1..engine.current_table_size() {
        let sum = engine.table().row(ElementId(id as u32)).sum();
        assert!((sum - 1.0).abs() < 1e-5, "row {} sums to {}", id, sum);
    }
}

/// Solver that checks its inputs and returns a fixed answer
struct ScriptedSolver {
    result: Array2<f32>,
}

impl PairwiseSolver for ScriptedSolver {
    fn solver_name(&self) -> &str {
        "scripted"
    }

    fn solve(
        &self,
        unary: ArrayView2<'_, f32>,
        features: &PairwiseFeatures,
        params: &SmoothingParams,
    ) -> Array2<f32> {
        assert_eq!(unary.nrows(), features.len());
        assert_eq!(params.iterations, 7);
        self.result.clone()
    }
}

// ═══════════════════════════════════════════════════════════
// Integration Tests
// ═══════════════════════════════════════════════════════════

#[test]
fn test_growth_then_single_observation() {
    let mut engine = engine(3, 16, 0.0);
    let mut population = PopulationSnapshot::new(1, IdentityRaster::new(1, 1));
    engine.update_probability_table(&population);
    assert_eq!(engine.current_table_size(), 1);

    population.set_element_count(4);
    population.set_identity_raster(IdentityRaster::from_vec(1, 1, vec![2]));
    let report = engine.update_probability_table(&population);
    assert_eq!(report.created, 3);

    for id in 1..4 {
        assert_eq!(engine.table().row(ElementId(id)).to_vec(), vec![1.0 / 3.0; 3]);
    }

    let mut classifier = ClassProbabilityRaster::zeros(3, 1, 1);
    classifier.set_pixel(0, 0, &[0.9, 0.05, 0.05]);
    engine.update_probabilities(&classifier, &mut population);

    let row = engine.table().row(ElementId(2));
    assert!((row[0] - 0.9).abs() < 1e-6);
    assert!((row[1] - 0.05).abs() < 1e-6);
    assert!((row[2] - 0.05).abs() < 1e-6);
    let summary = engine.class_summary()[2];
    assert_eq!(summary.class, 0);
    assert!((summary.probability - 0.9).abs() < 1e-6);
    assert_eq!(population.confident_class(ElementId(2)), 0);
}

#[test]
fn test_patch_of_one_element_is_applied_per_pixel() {
    let mut engine = engine(2, 16, 0.0);
    let mut identity = IdentityRaster::new(4, 4);
    identity.fill_rect(0, 0, 2, 2, ElementId(5));
    let mut population = PopulationSnapshot::new(6, identity);
    engine.update_probability_table(&population);

    let mut classifier = ClassProbabilityRaster::uniform(2, 2, 2);
    classifier.set_pixel(0, 0, &[0.6, 0.4]);
    let report = engine.update_probabilities(&classifier, &mut population);

    assert_eq!(report.observations, 4);
    let expected = 0.6f32.powi(4) / (0.6f32.powi(4) + 0.4f32.powi(4));
    assert!((engine.table().row(ElementId(5))[0] - expected).abs() < 1e-5);
}

#[test]
fn test_compaction_follows_elements() {
    let mut engine = engine(2, 16, 0.0);
    let mut population = PopulationSnapshot::new(5, IdentityRaster::new(1, 1));
    engine.update_probability_table(&population);
    for id in 1..5u32 {
        let p = id as f32 / 10.0;
        engine.update_element(ElementId(id), &[p, 1.0 - p]);
    }
    let row2 = engine.table().row(ElementId(2)).to_vec();
    let row4 = engine.table().row(ElementId(4)).to_vec();

    population.delete_and_compact(vec![ElementId(1), ElementId(3)]);
    engine.update_probability_table(&population);
    population.clear_deleted();

    assert_eq!(engine.current_table_size(), 3);
    assert_eq!(engine.table().row(ElementId(1)).to_vec(), row2);
    assert_eq!(engine.table().row(ElementId(2)).to_vec(), row4);
}

#[test]
fn test_sync_without_changes_is_identity() {
    let mut engine = engine(3, 16, 0.2);
    let identity = IdentityRaster::from_vec(3, 1, vec![1, 2, 3]);
    let mut population = PopulationSnapshot::new(4, identity);
    engine.update_probability_table(&population);
    let mut classifier = ClassProbabilityRaster::uniform(3, 3, 1);
    classifier.set_pixel(0, 0, &[0.7, 0.2, 0.1]);
    classifier.set_pixel(2, 0, &[0.1, 0.1, 0.8]);
    engine.update_probabilities(&classifier, &mut population);

    let table_before = engine.table().probabilities().to_owned();
    let summary_before = engine.class_summary().to_vec();
    engine.update_probability_table(&population);

    assert_eq!(
        engine.table().probabilities().slice(ndarray::s![.., ..4]),
        table_before.slice(ndarray::s![.., ..4])
    );
    assert_eq!(engine.class_summary(), summary_before.as_slice());
}

#[test]
fn test_repeated_agreeing_evidence_converges() {
    let mut engine = engine(3, 8, 0.0);
    let identity = IdentityRaster::from_vec(1, 1, vec![1]);
    let mut population = PopulationSnapshot::new(2, identity);
    engine.update_probability_table(&population);

    let mut classifier = ClassProbabilityRaster::zeros(3, 1, 1);
    classifier.set_pixel(0, 0, &[0.5, 0.3, 0.2]);

    let mut previous = engine.table().row(ElementId(1))[0];
    for _ in 0..20 {
        engine.update_probabilities(&classifier, &mut population);
        let current = engine.table().row(ElementId(1))[0];
        assert!(current >= previous);
        previous = current;
        assert_row_sums_to_one(&engine);
    }
    assert!(previous > 0.99);
}

#[test]
fn test_threshold_boundary_is_inclusive() {
    let mut engine = engine(2, 8, 0.75);
    let identity = IdentityRaster::from_vec(2, 1, vec![1, 2]);
    let mut population = PopulationSnapshot::new(3, identity);
    engine.update_probability_table(&population);

    // 0.75 and 0.5 are exact in binary, so the fused probability is exactly 0.75
    let mut classifier = ClassProbabilityRaster::zeros(2, 2, 1);
    classifier.set_pixel(0, 0, &[0.75, 0.25]);
    classifier.set_pixel(1, 0, &[0.5, 0.5]);
    engine.update_probabilities(&classifier, &mut population);

    assert_eq!(engine.class_summary()[1].class, 0);
    assert_eq!(engine.class_summary()[2].class, NO_CLASS);
    assert_eq!(engine.class_summary()[2].probability, 0.5);
    assert_eq!(population.confident_class(ElementId(2)), NO_CLASS);
}

#[test]
fn test_smoothing_write_back_filter() {
    let result = arr2(&[[0.0, 1.0], [f32::NAN, 0.3], [0.2, 0.8]]);
    let mut engine = SemanticFusionEngine::with_solver(
        FusionConfig {
            num_classes: 2,
            max_components: 8,
            ..Default::default()
        },
        ScriptedSolver { result },
    )
    .unwrap();
    let mut population = PopulationSnapshot::new(4, IdentityRaster::new(1, 1));
    engine.update_probability_table(&population);

    let report = engine.crf_update(&mut population, 7);

    assert_eq!(report.elements, 3);
    assert_eq!(report.cells_written, 3);
    assert_eq!(report.cells_discarded, 3);
    assert_eq!(engine.table().row(ElementId(1)).to_vec(), vec![0.5, 0.5]);
    assert_eq!(engine.table().row(ElementId(2)).to_vec(), vec![0.5, 0.3]);
    assert_eq!(engine.table().row(ElementId(3)).to_vec(), vec![0.2, 0.8]);
    assert_eq!(population.confident_class(ElementId(3)), 1);
    assert_eq!(engine.class_summary()[0], ClassSummary::UNOBSERVED);
}

#[test]
fn test_mean_field_smoothing_keeps_rows_normalised() {
    // Light kernels keep every marginal strictly inside (0, 1)
    let mut engine = SemanticFusionEngine::new(FusionConfig {
        num_classes: 2,
        max_components: 8,
        smoothing: SmoothingParams {
            spatial_weight: 0.5,
            bilateral_weight: 0.5,
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();
    let identity = IdentityRaster::from_vec(3, 1, vec![1, 2, 3]);
    let mut population = PopulationSnapshot::new(4, identity);
    for id in 1..4u32 {
        population.set_position(ElementId(id), [id as f32 * 0.01, 0.0, 0.0]);
        population.set_colour(ElementId(id), [120, 120, 120]);
    }
    engine.update_probability_table(&population);

    let mut classifier = ClassProbabilityRaster::zeros(2, 3, 1);
    classifier.set_pixel(0, 0, &[0.9, 0.1]);
    classifier.set_pixel(1, 0, &[0.45, 0.55]);
    classifier.set_pixel(2, 0, &[0.9, 0.1]);
    engine.update_probabilities(&classifier, &mut population);
    assert_eq!(population.confident_class(ElementId(2)), 1);

    let report = engine.crf_update(&mut population, 10);

    assert_eq!(report.cells_discarded, 0);
    assert_row_sums_to_one(&engine);
    // The undecided middle element follows its confident neighbours
    assert_eq!(population.confident_class(ElementId(2)), 0);
}

#[test]
fn test_projection_and_export() {
    let mut engine = engine(3, 16, 0.0);
    let mut identity = IdentityRaster::new(4, 4);
    identity.fill_rect(0, 0, 2, 2, ElementId(1));
    identity.fill_rect(2, 2, 2, 2, ElementId(2));
    let mut population = PopulationSnapshot::new(3, identity.clone());
    engine.update_probability_table(&population);

    let mut classifier = ClassProbabilityRaster::uniform(3, 4, 4);
    for y in 0..2 {
        for x in 0..2 {
            classifier.set_pixel(x, y, &[0.1, 0.2, 0.7]);
            classifier.set_pixel(x + 2, y + 2, &[0.2, 0.7, 0.1]);
        }
    }
    engine.update_probabilities(&classifier, &mut population);

    engine.calculate_projected_probability_map(&identity);
    let rendered = engine.rendered_probability_map().unwrap();
    assert_eq!(rendered.pixel(3, 0).sum(), 0.0);
    assert!((rendered.pixel(0, 0).sum() - 1.0).abs() < 1e-5);

    let labels = engine.argmax_labels(&identity);
    assert_eq!(labels, arr2(&[[2u8, 0], [0, 1]]));

    let dir = tempfile::tempdir().unwrap();
    let grey = dir.path().join("frame_0000.png");
    engine.save_argmax_predictions(&grey, &identity).unwrap();
    let decoded = image::open(&grey).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (2, 2));
    assert_eq!(decoded.get_pixel(0, 0).0, [2, 2, 2]);
    assert_eq!(decoded.get_pixel(1, 1).0, [1, 1, 1]);

    let scheme = ClassColourScheme::parse(
        "header\nheader\nFLOOR 1 10 20 30\nWALL 2 200 100 50\n",
        3,
    )
    .unwrap();
    let coloured = dir.path().join("frame_0000_colour.png");
    engine.save_argmax_colour_image(&coloured, &identity, &scheme).unwrap();
    let decoded = image::open(&coloured).unwrap().to_rgb8();
    assert_eq!(decoded.get_pixel(0, 0).0, [200, 100, 50]);
    assert_eq!(decoded.get_pixel(1, 1).0, [10, 20, 30]);
    assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 0]);
}

#[test]
fn test_export_to_missing_directory_fails() {
    let engine = engine(2, 4, 0.0);
    let identity = IdentityRaster::new(2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("labels.png");

    assert!(engine.save_argmax_predictions(&path, &identity).is_err());
}

#[test]
#[should_panic(expected = "channels")]
fn test_classifier_channel_mismatch_panics() {
    let mut engine = engine(3, 8, 0.0);
    let mut population = PopulationSnapshot::new(2, IdentityRaster::new(2, 2));
    engine.update_probability_table(&population);
    let classifier = ClassProbabilityRaster::uniform(5, 2, 2);
    engine.update_probabilities(&classifier, &mut population);
}
