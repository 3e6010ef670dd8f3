//! Evaluation of matcher outputs against reference alignments.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`confusion`] | TP/FP/FN partitioning, precision/recall/F-scores, micro/macro aggregation |
//! | [`hierarchy`] | expansion of alignments along class hierarchies before scoring |
//! | [`similarity`] | pairwise Jaccard similarity between matcher outputs |
//! | [`mcnemar`] | McNemar significance testing between matcher pairs |
//! | [`confidence`] | confidence threshold sweeps and F1-optimal cuts |
//!
//! Batch runs follow partial-failure semantics: one malformed input must not
//! void an evaluation across hundreds of test cases. [`run_batch`] applies a
//! fallible operation to every execution result, collects per-item failures,
//! and keeps going.

pub mod confidence;
pub mod confusion;
pub mod hierarchy;
pub mod mcnemar;
pub mod similarity;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::eval::confusion::{ConfusionMatrix, ConfusionMatrixMetric};
use crate::execution::{ExecutionResult, ExecutionResultSet};

/// Outcome of a batch evaluation: the per-result successes plus a summary of
/// the failures encountered along the way.
#[derive(Debug)]
pub struct BatchReport<T> {
    successes: Vec<(ExecutionResult, T)>,
    failures: Vec<(ExecutionResult, Error)>,
}

impl<T> BatchReport<T> {
    /// Results that were processed successfully, in input order.
    pub fn successes(&self) -> &[(ExecutionResult, T)] {
        &self.successes
    }

    /// Results that failed, with their errors, in input order.
    pub fn failures(&self) -> &[(ExecutionResult, Error)] {
        &self.failures
    }

    /// True when every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary of the batch outcome.
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed",
            self.successes.len(),
            self.failures.len()
        )
    }
}

/// Apply `op` to every execution result, continuing past failures.
///
/// Failures are logged as warnings and collected in the report; successful
/// items are unaffected by failing neighbors.
pub fn run_batch<'a, T, I, F>(results: I, op: F) -> BatchReport<T>
where
    I: IntoIterator<Item = &'a ExecutionResult>,
    F: Fn(&ExecutionResult) -> Result<T>,
{
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match op(result) {
            Ok(value) => successes.push((result.clone(), value)),
            Err(e) => {
                log::warn!("evaluation of {result} failed: {e}");
                failures.push((result.clone(), e));
            }
        }
    }
    let report = BatchReport {
        successes,
        failures,
    };
    log::info!("batch evaluation finished: {}", report.summary());
    report
}

/// Compute (and memoize) the confusion matrix of every result in the set.
pub fn evaluate_all(
    metric: &ConfusionMatrixMetric,
    results: &ExecutionResultSet,
) -> BatchReport<Arc<ConfusionMatrix>> {
    run_batch(results, |r| Ok(metric.compute(r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::Alignment;
    use crate::correspondence::Correspondence;
    use crate::execution::TestCase;

    fn result(track: &str, case: &str, matcher: &str) -> ExecutionResult {
        let mut reference = Alignment::new();
        reference.add(Correspondence::equivalence("a", "1")).unwrap();
        let tc = TestCase::new(track, case, reference.clone());
        ExecutionResult::new(tc, matcher, reference)
    }

    #[test]
    fn batch_continues_past_failures() {
        let mut set = ExecutionResultSet::new();
        set.add(result("t", "c1", "A"));
        set.add(result("t", "c2", "A"));
        set.add(result("t", "c3", "A"));

        let report = run_batch(&set, |r| {
            if r.test_case().name() == "c2" {
                Err(Error::evaluation("broken reference"))
            } else {
                Ok(r.system().len())
            }
        });
        assert_eq!(report.successes().len(), 2);
        assert_eq!(report.failures().len(), 1);
        assert!(!report.is_complete());
        assert_eq!(report.failures()[0].0.test_case().name(), "c2");
        assert_eq!(report.summary(), "2 succeeded, 1 failed");
    }

    #[test]
    fn evaluate_all_covers_every_result() {
        let mut set = ExecutionResultSet::new();
        set.add(result("t", "c1", "A"));
        set.add(result("t", "c1", "B"));
        let metric = ConfusionMatrixMetric::new();
        let report = evaluate_all(&metric, &set);
        assert!(report.is_complete());
        assert_eq!(report.successes().len(), 2);
        assert_eq!(metric.cached_len(), 2);
        for (_, matrix) in report.successes() {
            assert_eq!(matrix.precision, 1.0);
        }
    }
}
