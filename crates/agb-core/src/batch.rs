//! Whole-inventory estimation with per-tree failure isolation.
//!
//! With the `threading` feature trees are evaluated in parallel; the table and
//! config are only ever read, so no synchronisation is involved.

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::error::AgbError;
use crate::selector::{Estimate, ModelSelector, Tier};
use crate::tree::TreeRecord;

/// Outcome counts for one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub taxon_specific: usize,
    pub height_based: usize,
    pub height_less: usize,
    pub diameter_mismatches: usize,
    /// Index of each failed tree with its error. Those trees keep `agb = None`.
    pub failures: Vec<(usize, AgbError)>,
}

impl BatchReport {
    pub fn estimated(&self) -> usize {
        self.taxon_specific + self.height_based + self.height_less
    }

    fn record(&mut self, index: usize, outcome: Result<Estimate, AgbError>) {
        match outcome {
            Ok(e) => {
                match e.tier {
                    Tier::TaxonSpecific => self.taxon_specific += 1,
                    Tier::HeightBased => self.height_based += 1,
                    Tier::HeightLess => self.height_less += 1,
                }
                if e.diameter_mismatch {
                    self.diameter_mismatches += 1;
                }
            }
            Err(err) => {
                tracing::warn!(tree = index, error = %err, "tree skipped");
                self.failures.push((index, err));
            }
        }
    }
}

/// Estimate every tree in place. A failing tree is reported and left without
/// an estimate; it never stops the rest of the batch.
pub fn estimate_all(selector: &ModelSelector<'_>, trees: &mut [TreeRecord]) -> BatchReport {
    let apply = |tree: &mut TreeRecord| {
        tree.agb = None;
        tree.tier = None;
        selector.apply(tree)
    };

    #[cfg(feature = "threading")]
    let outcomes: Vec<Result<Estimate, AgbError>> = trees.par_iter_mut().map(apply).collect();
    #[cfg(not(feature = "threading"))]
    let outcomes: Vec<Result<Estimate, AgbError>> = trees.iter_mut().map(apply).collect();

    let mut report = BatchReport::default();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        report.record(i, outcome);
    }
    tracing::info!(
        estimated = report.estimated(),
        failed = report.failures.len(),
        taxon_specific = report.taxon_specific,
        height_based = report.height_based,
        height_less = report.height_less,
        "batch complete"
    );
    report
}
