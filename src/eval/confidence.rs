//! Confidence threshold sweeps.
//!
//! Matchers attach a confidence to every correspondence; cutting the system
//! alignment at different thresholds trades precision against recall. This
//! module enumerates the thresholds actually worth trying (the confidence
//! values occurring in the data, bucketed deterministically) and finds the
//! F1-optimal cut.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::eval::confusion::ConfusionMatrixMetric;
use crate::execution::ExecutionResult;

/// Default rounding precision for confidence bucketing.
pub const DEFAULT_DECIMALS: u32 = 2;

/// Scores obtained by cutting the system alignment at one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdScore {
    /// The confidence cut applied (inclusive, mappings with confidence
    /// `>= threshold` are kept).
    pub threshold: f64,
    /// Precision at this cut.
    pub precision: f64,
    /// Recall at this cut.
    pub recall: f64,
    /// F1 at this cut.
    pub f1: f64,
    /// Number of system mappings surviving the cut.
    pub kept: usize,
}

/// The candidate thresholds for a result: every confidence value occurring
/// in the system or reference alignment, rounded to `decimals` places
/// (half-away-from-zero), ascending, always including 0.0 (the uncut
/// alignment).
pub fn candidate_thresholds(result: &ExecutionResult, decimals: u32) -> Result<Vec<f64>> {
    let mut values = result.system().occurring_confidences_rounded(decimals)?;
    values.extend(result.reference().occurring_confidences_rounded(decimals)?);
    values.push(0.0);
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    Ok(values)
}

/// Score every candidate threshold, ascending.
pub fn sweep(
    result: &ExecutionResult,
    metric: &ConfusionMatrixMetric,
    decimals: u32,
) -> Result<Vec<ThresholdScore>> {
    let thresholds = candidate_thresholds(result, decimals)?;
    let reference = result.reference();
    let mut scores = Vec::with_capacity(thresholds.len());
    for threshold in thresholds {
        let cut = result.system().filter_by_confidence(threshold);
        let matrix = metric.compute_from_alignments(&cut, reference);
        scores.push(ThresholdScore {
            threshold,
            precision: matrix.precision,
            recall: matrix.recall,
            f1: matrix.f1(),
            kept: cut.len(),
        });
    }
    Ok(scores)
}

/// The threshold maximizing F1. Ties go to the lowest threshold, keeping
/// the most mappings among the equally good cuts.
pub fn best_threshold(
    result: &ExecutionResult,
    metric: &ConfusionMatrixMetric,
    decimals: u32,
) -> Result<ThresholdScore> {
    let scores = sweep(result, metric, decimals)?;
    let mut best = scores[0]; // sweep always yields the 0.0 threshold
    for score in &scores[1..] {
        if score.f1 > best.f1 {
            best = *score;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::Alignment;
    use crate::correspondence::Correspondence;
    use crate::execution::TestCase;

    fn conf(s: &str, t: &str, confidence: f64) -> Correspondence {
        Correspondence::new(s, t, crate::correspondence::Relation::Equivalence, confidence)
    }

    fn result() -> ExecutionResult {
        // Reference: a1, b2, c3. System: the three correct mappings at high
        // confidence plus two wrong ones at low confidence.
        let mut reference = Alignment::new();
        for (s, t) in [("a", "1"), ("b", "2"), ("c", "3")] {
            reference.add(Correspondence::equivalence(s, t)).unwrap();
        }
        let mut system = Alignment::new();
        system.add(conf("a", "1", 0.9)).unwrap();
        system.add(conf("b", "2", 0.8)).unwrap();
        system.add(conf("c", "3", 0.7)).unwrap();
        system.add(conf("x", "8", 0.3)).unwrap();
        system.add(conf("y", "9", 0.2)).unwrap();
        let tc = TestCase::new("track", "tc", reference);
        ExecutionResult::new(tc, "matcher", system)
    }

    #[test]
    fn candidates_are_rounded_sorted_and_include_zero() {
        let r = result();
        let thresholds = candidate_thresholds(&r, 2).unwrap();
        assert_eq!(thresholds[0], 0.0);
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]));
        assert!(thresholds.contains(&0.7));
        // Reference confidences (1.0) are candidates too.
        assert!(thresholds.contains(&1.0));
    }

    #[test]
    fn best_threshold_cuts_away_the_noise() {
        let r = result();
        let metric = ConfusionMatrixMetric::new();
        let best = best_threshold(&r, &metric, 2).unwrap();
        // Keeping exactly the three correct mappings is optimal.
        assert_eq!(best.threshold, 0.7);
        assert_eq!(best.kept, 3);
        assert_eq!(best.f1, 1.0);
        assert_eq!(best.precision, 1.0);
        assert_eq!(best.recall, 1.0);
    }

    #[test]
    fn ties_resolve_to_the_lowest_threshold() {
        // All system mappings correct: every cut up to the minimum
        // confidence scores F1 = 1.0 on the kept side, but higher cuts lose
        // recall. Construct a flat tie instead: one correct mapping at two
        // candidate thresholds below it.
        let mut reference = Alignment::new();
        reference.add(Correspondence::equivalence("a", "1")).unwrap();
        let mut system = Alignment::new();
        system.add(conf("a", "1", 0.9)).unwrap();
        let tc = TestCase::new("track", "tie", reference);
        let r = ExecutionResult::new(tc, "matcher", system);
        let metric = ConfusionMatrixMetric::new();
        let best = best_threshold(&r, &metric, 2).unwrap();
        // 0.0, 0.9, and 1.0-side candidates below 0.9 all give F1 = 1.0;
        // the lowest wins.
        assert_eq!(best.threshold, 0.0);
        assert_eq!(best.f1, 1.0);
    }

    #[test]
    fn sweep_is_monotonically_shrinking() {
        let r = result();
        let metric = ConfusionMatrixMetric::new();
        let scores = sweep(&r, &metric, 2).unwrap();
        assert!(scores.windows(2).all(|w| w[0].kept >= w[1].kept));
        // The uncut alignment keeps everything.
        assert_eq!(scores[0].kept, 5);
    }

    #[test]
    fn invalid_precision_is_rejected() {
        let r = result();
        let metric = ConfusionMatrixMetric::new();
        assert!(best_threshold(&r, &metric, 0).is_err());
        assert!(sweep(&r, &metric, 42).is_err());
    }
}
