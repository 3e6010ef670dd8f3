//! Confusion-matrix computation and micro/macro aggregation.
//!
//! [`ConfusionMatrixMetric`] partitions a system alignment against the test
//! case's reference into true-positive, false-positive, and false-negative
//! alignments (kept as sets, not just counts, so downstream consumers can
//! explain individual decisions) and derives precision, recall, and F-scores.
//!
//! Empty denominators yield 0.0, never NaN and never an error.
//!
//! Per-result matrices are memoized: two calls with the same
//! `(test case, matcher)` identity return the same cached matrix.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;
use crate::correspondence::{Correspondence, Relation};
use crate::execution::ExecutionResult;

// =============================================================================
// Configuration
// =============================================================================

/// Which identity components decide whether a system correspondence matches
/// a reference correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchMode {
    /// Match on `(source, target, relation)` — the full identity triple.
    #[default]
    SourceTargetRelation,
    /// Match on `(source, target)` only; OAEI-style tasks often score the
    /// pair and ignore the relation type.
    SourceTarget,
}

impl MatchMode {
    /// All match modes.
    pub fn all() -> &'static [MatchMode] {
        &[MatchMode::SourceTargetRelation, MatchMode::SourceTarget]
    }

    /// Short identifier.
    pub fn name(&self) -> &'static str {
        match self {
            MatchMode::SourceTargetRelation => "source-target-relation",
            MatchMode::SourceTarget => "source-target",
        }
    }
}

/// How complete the reference alignment is.
///
/// Under a partial gold standard, a system correspondence absent from the
/// reference is only a false positive when the gold standard is complete for
/// its source (resp. target) entity; otherwise it simply cannot be judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GoldStandardCompleteness {
    /// The reference contains every correct mapping; anything else the
    /// system produces is wrong.
    #[default]
    Complete,
    /// The reference is incomplete; judgement of unmatched system
    /// correspondences depends on per-side completeness.
    Partial {
        /// Every mapping for a source entity that occurs in the reference
        /// is contained in the reference.
        source_complete: bool,
        /// Every mapping for a target entity that occurs in the reference
        /// is contained in the reference.
        target_complete: bool,
    },
}

impl GoldStandardCompleteness {
    /// Whether unmatched system correspondences are always judgeable.
    pub fn is_complete(&self) -> bool {
        matches!(self, GoldStandardCompleteness::Complete)
    }
}

// =============================================================================
// ConfusionMatrix
// =============================================================================

/// TP/FP/FN sets plus derived scores for one execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Mappings found by the matcher and present in the reference.
    pub true_positive: Alignment,
    /// Mappings found by the matcher but wrong.
    pub false_positive: Alignment,
    /// Reference mappings the matcher missed.
    pub false_negative: Alignment,
    /// Precision in `[0.0, 1.0]`.
    pub precision: f64,
    /// Recall in `[0.0, 1.0]`.
    pub recall: f64,
    /// Size of the system alignment. Under a partial gold standard this can
    /// exceed `TP + FP` because unjudgeable correspondences count here but
    /// appear in neither set.
    pub num_correspondences: usize,
}

impl ConfusionMatrix {
    /// Build a matrix from already-partitioned sets, deriving the scores.
    pub fn from_sets(
        true_positive: Alignment,
        false_positive: Alignment,
        false_negative: Alignment,
        num_correspondences: usize,
    ) -> Self {
        let tp = true_positive.len() as f64;
        let precision = divide(tp, tp + false_positive.len() as f64);
        let recall = divide(tp, tp + false_negative.len() as f64);
        ConfusionMatrix {
            true_positive,
            false_positive,
            false_negative,
            precision,
            recall,
            num_correspondences,
        }
    }

    /// Number of true positives.
    pub fn tp(&self) -> usize {
        self.true_positive.len()
    }

    /// Number of false positives.
    pub fn fp(&self) -> usize {
        self.false_positive.len()
    }

    /// Number of false negatives.
    pub fn fn_count(&self) -> usize {
        self.false_negative.len()
    }

    /// Balanced F-measure; 0.0 when precision + recall is 0.
    #[must_use]
    pub fn f1(&self) -> f64 {
        self.f_beta(1.0)
    }

    /// F-measure weighting recall `beta` times as much as precision.
    #[must_use]
    pub fn f_beta(&self, beta: f64) -> f64 {
        let beta_sq = beta * beta;
        divide(
            (1.0 + beta_sq) * self.precision * self.recall,
            beta_sq * self.precision + self.recall,
        )
    }
}

/// 0.0 on a zero denominator; the explicit empty-denominator policy.
fn divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// =============================================================================
// ConfusionMatrixMetric
// =============================================================================

/// Computes and memoizes confusion matrices per execution result.
///
/// The cache is keyed by the result's `(test case, matcher)` identity and
/// guarded by a read-write lock with insert-if-absent discipline, so
/// concurrent readers never compute the same matrix twice and never block
/// each other once it is cached.
#[derive(Debug, Default)]
pub struct ConfusionMatrixMetric {
    mode: MatchMode,
    gold: GoldStandardCompleteness,
    cache: RwLock<HashMap<ExecutionResult, Arc<ConfusionMatrix>>>,
}

impl ConfusionMatrixMetric {
    /// Metric with full-triple matching against a complete gold standard.
    pub fn new() -> Self {
        ConfusionMatrixMetric::default()
    }

    /// Metric with explicit match mode and gold-standard completeness.
    pub fn with_config(mode: MatchMode, gold: GoldStandardCompleteness) -> Self {
        ConfusionMatrixMetric {
            mode,
            gold,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The configured match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Compute the confusion matrix for a result, or return the cached one.
    pub fn compute(&self, result: &ExecutionResult) -> Arc<ConfusionMatrix> {
        if let Some(cached) = self.cache.read().get(result) {
            return Arc::clone(cached);
        }
        let matrix = Arc::new(self.compute_uncached(result));
        let mut cache = self.cache.write();
        // Another thread may have raced us here; first insert wins.
        Arc::clone(
            cache
                .entry(result.clone())
                .or_insert(matrix),
        )
    }

    /// Number of memoized matrices.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn compute_uncached(&self, result: &ExecutionResult) -> ConfusionMatrix {
        self.compute_from_alignments(result.system(), result.reference())
    }

    /// Compute a matrix directly from a system and reference alignment,
    /// bypassing the per-result cache. Used for threshold sweeps, where many
    /// cut variants of one result are scored.
    pub fn compute_from_alignments(
        &self,
        system: &Alignment,
        reference: &Alignment,
    ) -> ConfusionMatrix {
        let system_keys: HashSet<MatchKey> =
            system.iter().map(|c| MatchKey::of(c, self.mode)).collect();

        let mut true_positive = Alignment::with_config(system.index_config());
        let mut false_positive = Alignment::with_config(system.index_config());
        let mut false_negative = Alignment::with_config(reference.index_config());

        // Reference side: decide TP membership and misses.
        let mut judged_keys: HashSet<MatchKey> = HashSet::new();
        let mut incompatible_keys: HashSet<MatchKey> = HashSet::new();
        let mut unknown_pairs: HashSet<(String, String)> = HashSet::new();
        for r in reference.iter() {
            if r.relation() == Relation::Unknown {
                // The pair cannot be judged at all, under any relation.
                log::warn!("reference correspondence with unknown relation skipped: {r}");
                unknown_pairs.insert((r.source().to_owned(), r.target().to_owned()));
                continue;
            }
            let key = MatchKey::of(r, self.mode);
            if judged_keys.contains(&key) {
                // Pair-mode references can carry several relations for one
                // entity pair; the pair is judged once.
                continue;
            }
            if r.relation() == Relation::Incompatible {
                // A known-wrong mapping: producing it is a false positive,
                // missing it is correct.
                incompatible_keys.insert(key.clone());
                judged_keys.insert(key);
                continue;
            }
            if system_keys.contains(&key) {
                self.insert(&mut true_positive, r);
            } else {
                self.insert(&mut false_negative, r);
            }
            judged_keys.insert(key);
        }

        // System side: everything not matched against a judgeable reference
        // entry is a candidate false positive.
        for s in system.iter() {
            if unknown_pairs.contains(&(s.source().to_owned(), s.target().to_owned())) {
                continue;
            }
            let key = MatchKey::of(s, self.mode);
            if incompatible_keys.contains(&key) {
                self.insert(&mut false_positive, s);
                continue;
            }
            if judged_keys.contains(&key) {
                continue; // counted as TP from the reference side
            }
            if self.judgeable(s, reference) {
                self.insert(&mut false_positive, s);
            }
        }

        ConfusionMatrix::from_sets(
            true_positive,
            false_positive,
            false_negative,
            system.len(),
        )
    }

    /// Whether an unmatched system correspondence can be judged wrong under
    /// the configured gold-standard completeness.
    fn judgeable(&self, c: &Correspondence, reference: &Alignment) -> bool {
        match self.gold {
            GoldStandardCompleteness::Complete => true,
            GoldStandardCompleteness::Partial {
                source_complete,
                target_complete,
            } => {
                (source_complete && !reference.correspondences_by_source(c.source()).is_empty())
                    || (target_complete
                        && !reference.correspondences_by_target(c.target()).is_empty())
            }
        }
    }

    fn insert(&self, alignment: &mut Alignment, c: &Correspondence) {
        // Members of an existing alignment were validated on their way in.
        if let Err(e) = alignment.add(c.clone()) {
            log::warn!("dropping correspondence from confusion matrix: {e}");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MatchKey {
    Triple(String, String, Relation),
    Pair(String, String),
}

impl MatchKey {
    fn of(c: &Correspondence, mode: MatchMode) -> Self {
        match mode {
            MatchMode::SourceTargetRelation => MatchKey::Triple(
                c.source().to_owned(),
                c.target().to_owned(),
                c.relation(),
            ),
            MatchMode::SourceTarget => {
                MatchKey::Pair(c.source().to_owned(), c.target().to_owned())
            }
        }
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Precision/recall/F1 summary of an aggregation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    /// Aggregated precision.
    pub precision: f64,
    /// Aggregated recall.
    pub recall: f64,
    /// Aggregated F1. For macro averaging this is the mean of per-case F1
    /// values, not the F1 of the mean precision and recall.
    pub f1: f64,
}

/// Micro average: pool TP/FP/FN counts across all matrices, then compute the
/// scores once from the totals. Weights test cases by their size.
pub fn micro_average(matrices: &[ConfusionMatrix]) -> MetricScores {
    let tp: usize = matrices.iter().map(ConfusionMatrix::tp).sum();
    let fp: usize = matrices.iter().map(ConfusionMatrix::fp).sum();
    let fn_: usize = matrices.iter().map(ConfusionMatrix::fn_count).sum();
    let precision = divide(tp as f64, (tp + fp) as f64);
    let recall = divide(tp as f64, (tp + fn_) as f64);
    let f1 = divide(2.0 * precision * recall, precision + recall);
    MetricScores {
        precision,
        recall,
        f1,
    }
}

/// Macro average: compute scores per matrix, then average them unweighted.
/// Weights test cases equally regardless of size.
pub fn macro_average(matrices: &[ConfusionMatrix]) -> MetricScores {
    if matrices.is_empty() {
        return MetricScores {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let n = matrices.len() as f64;
    MetricScores {
        precision: matrices.iter().map(|m| m.precision).sum::<f64>() / n,
        recall: matrices.iter().map(|m| m.recall).sum::<f64>() / n,
        f1: matrices.iter().map(ConfusionMatrix::f1).sum::<f64>() / n,
    }
}
