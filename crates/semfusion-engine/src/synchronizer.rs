// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Table Synchronizer
//!
//! Reconciles the probability table with the population after the mapping
//! subsystem appended and deleted elements.
//!
//! ## Algorithm
//! Deletions `D` are sorted, so the number of deletions at or before a surviving
//! source row is monotone. Shifting each deletion by its rank (`D'[i] = D[i] - i`)
//! turns "which source row lands at destination `r`" into one binary search:
//! `s = r + |{d' in D' : d' <= r}|`. Every destination row is therefore
//! computed independently and the whole pass runs in parallel, writing into the
//! inactive buffer which is then made active.

use ndarray::parallel::prelude::*;
use ndarray::{s, Axis};
use tracing::debug;

use crate::table::ProbabilityTable;
use crate::types::{ClassSummary, ElementId};

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub previous_width: usize,
    pub new_width: usize,
    pub deleted: usize,
    /// Rows born uniform this pass
    pub created: usize,
}

/// Compact, re-index and extend the table, then swap buffers
///
/// # Panics
/// On contract violations: unsorted or duplicate deletions, deletion ids at or
/// beyond the previous width, a new width smaller than the surviving rows, or a
/// new width beyond capacity.
pub fn reconcile(
    table: &mut ProbabilityTable,
    deletions: &[ElementId],
    new_width: usize,
) -> SyncReport {
    let old_width = table.current_size();
    let max_components = table.max_components();

    assert!(
        deletions.windows(2).all(|w| w[0] < w[1]),
        "deleted ids must be strictly ascending"
    );
    if let Some(last) = deletions.last() {
        assert!(
            last.index() < old_width,
            "deleted id {} outside previous width {}",
            last,
            old_width
        );
    }
    let surviving = old_width - deletions.len();
    assert!(
        new_width >= surviving,
        "new width {} smaller than {} surviving rows",
        new_width,
        surviving
    );
    assert!(
        new_width <= max_components,
        "new width {} exceeds capacity {}",
        new_width,
        max_components
    );

    let shifted: Vec<usize> = deletions
        .iter()
        .enumerate()
        .map(|(rank, id)| id.index() - rank)
        .collect();
    let uniform = table.uniform_probability();

    let (source, target) = table.split_for_sync();
    target
        .probabilities
        .slice_mut(s![.., ..new_width])
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(target.summary[..new_width].par_iter_mut())
        .enumerate()
        .for_each(|(row, (mut column, summary))| {
            let source_row = row + shifted.partition_point(|&d| d <= row);
            if source_row < old_width {
                column.assign(&source.probabilities.column(source_row));
                *summary = source.summary[source_row];
            } else {
                column.fill(uniform);
                *summary = ClassSummary::UNOBSERVED;
            }
        });

    table.swap_buffers(new_width);

    let report = SyncReport {
        previous_width: old_width,
        new_width,
        deleted: deletions.len(),
        created: new_width - surviving,
    };
    debug!(
        "[SYNC] width {} -> {} ({} deleted, {} created)",
        report.previous_width, report.new_width, report.deleted, report.created
    );
    report
}
