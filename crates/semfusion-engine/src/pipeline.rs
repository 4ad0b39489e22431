// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Frame Pipeline
//!
//! Frame-synchronous driver around [`SemanticFusionEngine`]:
//! 1. reconcile the table with the population (every frame)
//! 2. run the classifier and fuse its output (on the classifier schedule)
//! 3. smooth (when enabled, on the smoothing schedule)
//!
//! The classifier is passed as a closure so it only runs on scheduled frames.

use std::time::Instant;

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::engine::SemanticFusionEngine;
use crate::fusion::FusionReport;
use crate::population::ElementPopulation;
use crate::raster::ClassProbabilityRaster;
use crate::smoothing::{MeanFieldSolver, PairwiseSolver, SmoothingReport};
use crate::synchronizer::SyncReport;

/// Running pipeline statistics
#[derive(Debug, Clone, Default)]
pub struct FusionStats {
    pub total_frames: u64,
    pub fused_frames: u64,
    pub smoothing_passes: u64,
    pub total_observations: u64,
    pub slow_frames: u64,
    pub total_processing_time_us: u64,
}

impl FusionStats {
    /// Get average processing time per frame (microseconds)
    pub fn avg_processing_time_us(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / self.total_frames as f64
        }
    }

    /// Get average observations per fused frame
    pub fn avg_observations_per_fused_frame(&self) -> f64 {
        if self.fused_frames == 0 {
            0.0
        } else {
            self.total_observations as f64 / self.fused_frames as f64
        }
    }
}

/// What one frame did
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    pub sync: SyncReport,
    pub fusion: Option<FusionReport>,
    pub smoothing: Option<SmoothingReport>,
    pub elapsed_us: u64,
}

/// Frame-by-frame driver
pub struct FusionPipeline<S: PairwiseSolver = MeanFieldSolver> {
    engine: SemanticFusionEngine<S>,
    config: PipelineConfig,
    frame: u64,
    stats: FusionStats,
}

impl<S: PairwiseSolver> FusionPipeline<S> {
    pub fn new(engine: SemanticFusionEngine<S>, config: PipelineConfig) -> Self {
        Self {
            engine,
            config,
            frame: 0,
            stats: FusionStats::default(),
        }
    }

    pub fn engine(&self) -> &SemanticFusionEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SemanticFusionEngine<S> {
        &mut self.engine
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Number of the next frame to be processed
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> &FusionStats {
        &self.stats
    }

    /// Classifier schedule: every frame when `cnn_skip_frames` is 0, otherwise
    /// frame 0 and every frame whose successor is a multiple of the skip.
    pub fn should_fuse(&self, frame: u64) -> bool {
        let skip = self.config.cnn_skip_frames;
        skip == 0 || frame == 0 || (frame > 1 && (frame + 1) % skip == 0)
    }

    /// Smoothing schedule: frames divisible by `smoothing_skip_frames`
    pub fn should_smooth(&self, frame: u64) -> bool {
        self.config.smoothing_enabled
            && self.config.smoothing_skip_frames > 0
            && frame % self.config.smoothing_skip_frames == 0
    }

    /// Process one frame
    ///
    /// `classify` runs only when the classifier schedule selects this frame.
    pub fn process_frame<P, F>(&mut self, population: &mut P, classify: F) -> FrameReport
    where
        P: ElementPopulation + ?Sized,
        F: FnOnce() -> ClassProbabilityRaster,
    {
        let start = Instant::now();
        let frame = self.frame;

        let sync = self.engine.update_probability_table(&*population);

        let fusion = if self.should_fuse(frame) {
            let classifier_output = classify();
            let report = self.engine.update_probabilities(&classifier_output, population);
            self.stats.fused_frames += 1;
            self.stats.total_observations += report.observations as u64;
            Some(report)
        } else {
            None
        };

        let smoothing = if self.should_smooth(frame) {
            let iterations = self.engine.smoothing_params().iterations;
            self.stats.smoothing_passes += 1;
            Some(self.engine.crf_update(population, iterations))
        } else {
            None
        };

        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.stats.total_frames += 1;
        self.stats.total_processing_time_us += elapsed.as_micros() as u64;

        if elapsed_ms > self.config.frame_budget_ms {
            self.stats.slow_frames += 1;
            warn!(
                "[PIPELINE] ⚠️ Slow frame {}: {:.2}ms (budget {:.2}ms, fused={}, smoothed={})",
                frame,
                elapsed_ms,
                self.config.frame_budget_ms,
                fusion.is_some(),
                smoothing.is_some()
            );
        } else {
            debug!("[PIPELINE] frame {} processed in {:.2}ms", frame, elapsed_ms);
        }

        self.frame += 1;

        FrameReport {
            frame,
            sync,
            fusion,
            smoothing,
            elapsed_us: elapsed.as_micros() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionConfig;

    fn pipeline(config: PipelineConfig) -> FusionPipeline {
        let engine = SemanticFusionEngine::new(FusionConfig {
            num_classes: 2,
            max_components: 8,
            ..Default::default()
        })
        .unwrap();
        FusionPipeline::new(engine, config)
    }

    #[test]
    fn test_fuse_every_frame_without_skip() {
        let pipeline = pipeline(PipelineConfig::default());
        assert!((0..10).all(|frame| pipeline.should_fuse(frame)));
    }

    #[test]
    fn test_classifier_skip_schedule() {
        let pipeline = pipeline(PipelineConfig {
            cnn_skip_frames: 3,
            ..Default::default()
        });
        let fused: Vec<u64> = (0..10).filter(|&f| pipeline.should_fuse(f)).collect();
        assert_eq!(fused, vec![0, 2, 5, 8]);
    }

    #[test]
    fn test_smoothing_schedule() {
        let disabled = pipeline(PipelineConfig::default());
        assert!(!disabled.should_smooth(0));

        let enabled = pipeline(PipelineConfig {
            smoothing_enabled: true,
            smoothing_skip_frames: 4,
            ..Default::default()
        });
        let smoothed: Vec<u64> = (0..10).filter(|&f| enabled.should_smooth(f)).collect();
        assert_eq!(smoothed, vec![0, 4, 8]);
    }

    #[test]
    fn test_stats_averages() {
        let stats = FusionStats {
            total_frames: 4,
            fused_frames: 2,
            total_observations: 100,
            total_processing_time_us: 2000,
            ..Default::default()
        };
        assert_eq!(stats.avg_processing_time_us(), 500.0);
        assert_eq!(stats.avg_observations_per_fused_frame(), 50.0);
        assert_eq!(FusionStats::default().avg_processing_time_us(), 0.0);
    }
}
