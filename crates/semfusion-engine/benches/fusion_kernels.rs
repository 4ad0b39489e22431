/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Fusion Kernel Benchmarks
//!
//! Per-frame kernels at realistic map sizes: table sync with deletions,
//! raster fusion of a 224x224 classifier frame into a 640x480 identity raster,
//! and argmax export.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use semfusion_engine::*;

const NUM_CLASSES: usize = 14;
const IDENTITY_WIDTH: usize = 640;
const IDENTITY_HEIGHT: usize = 480;
const CLASSIFIER_SIZE: usize = 224;

/// Identity raster tiling `element_count` ids over the image in 4x4 blocks
fn create_identity(element_count: usize) -> IdentityRaster {
    let ids = (0..IDENTITY_WIDTH * IDENTITY_HEIGHT)
        .map(|pixel| {
            let block = (pixel / IDENTITY_WIDTH / 4) * (IDENTITY_WIDTH / 4) + (pixel % IDENTITY_WIDTH) / 4;
            (block % (element_count - 1) + 1) as u32
        })
        .collect();
    IdentityRaster::from_vec(IDENTITY_WIDTH, IDENTITY_HEIGHT, ids)
}

/// Classifier frame with a class gradient across the image
fn create_classifier() -> ClassProbabilityRaster {
    let mut raster = ClassProbabilityRaster::zeros(NUM_CLASSES, CLASSIFIER_SIZE, CLASSIFIER_SIZE);
    let mut pixel = vec![0.0f32; NUM_CLASSES];
    for y in 0..CLASSIFIER_SIZE {
        for x in 0..CLASSIFIER_SIZE {
            let favoured = (x * NUM_CLASSES) / CLASSIFIER_SIZE;
            for (class, p) in pixel.iter_mut().enumerate() {
                *p = if class == favoured { 0.6 } else { 0.4 / (NUM_CLASSES - 1) as f32 };
            }
            raster.set_pixel(x, y, &pixel);
        }
    }
    raster
}

fn create_engine(element_count: usize) -> (SemanticFusionEngine, PopulationSnapshot) {
    let engine = SemanticFusionEngine::new(FusionConfig {
        num_classes: NUM_CLASSES,
        max_components: element_count * 2,
        ..Default::default()
    })
    .expect("valid benchmark config");
    let population = PopulationSnapshot::new(element_count, create_identity(element_count));
    (engine, population)
}

fn bench_table_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_sync");

    for (element_count, label) in [(100_000, "100K"), (1_000_000, "1M")] {
        group.throughput(Throughput::Elements(element_count as u64));
        group.bench_with_input(BenchmarkId::new("deletions_1pct", label), &element_count, |b, &n| {
            let (mut engine, mut population) = create_engine(n);
            engine.update_probability_table(&population);
            let deleted: Vec<ElementId> = (1..n).step_by(100).map(|id| ElementId(id as u32)).collect();

            b.iter(|| {
                population.set_deleted(deleted.clone());
                population.set_element_count(n);
                black_box(engine.update_probability_table(&population));
            });
        });
    }

    group.finish();
}

fn bench_raster_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster_fusion");
    let classifier = create_classifier();

    for (element_count, label) in [(20_000, "20K"), (1_000_000, "1M")] {
        group.throughput(Throughput::Elements((IDENTITY_WIDTH * IDENTITY_HEIGHT) as u64));
        group.bench_with_input(BenchmarkId::new("640x480", label), &element_count, |b, &n| {
            let (mut engine, mut population) = create_engine(n);
            engine.update_probability_table(&population);

            b.iter(|| black_box(engine.update_probabilities(&classifier, &mut population)));
        });
    }

    group.finish();
}

fn bench_argmax_export(c: &mut Criterion) {
    let (mut engine, mut population) = create_engine(20_000);
    engine.update_probability_table(&population);
    engine.update_probabilities(&create_classifier(), &mut population);

    c.bench_function("argmax_labels_320x240", |b| {
        b.iter(|| black_box(engine.argmax_labels(population.identity_raster())))
    });
}

criterion_group!(benches, bench_table_sync, bench_raster_fusion, bench_argmax_export);
criterion_main!(benches);
