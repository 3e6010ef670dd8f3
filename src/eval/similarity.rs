//! Pairwise matcher similarity.
//!
//! Quantifies how alike the outputs of different matchers are: cell `(i, j)`
//! of the symmetric [`MatcherSimilarity`] matrix is the Jaccard similarity
//! between matcher i's and matcher j's system alignments, comparing
//! correspondences by `(source, target)` only so that matchers differing in
//! relation or confidence granularity stay comparable.
//!
//! Self-similarity is always computed, never skipped, and is exactly 1.0 for
//! any non-empty alignment (an invariant of the set comparison, not an
//! empirical artifact). The reported medians come in two flavors, including
//! and excluding the diagonal: with the diagonal, the median is biased
//! toward 1.0 in proportion to the number of matchers.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::execution::{ExecutionResult, ExecutionResultSet};

/// How a track-level similarity matrix is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalculationMode {
    /// Pool each matcher's correspondences across all of a track's test
    /// cases into one set per matcher, then compare the pooled sets.
    #[default]
    Micro,
    /// Compute per-test-case similarities, then average them per matcher
    /// pair over the test cases where both matchers produced a result.
    Macro,
}

impl CalculationMode {
    /// All calculation modes.
    pub fn all() -> &'static [CalculationMode] {
        &[CalculationMode::Micro, CalculationMode::Macro]
    }

    /// Short identifier.
    pub fn name(&self) -> &'static str {
        match self {
            CalculationMode::Micro => "micro",
            CalculationMode::Macro => "macro",
        }
    }
}

/// Symmetric matrix of pairwise matcher similarities. Immutable once
/// computed.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherSimilarity {
    matchers: Vec<String>,
    scores: HashMap<(String, String), f64>,
}

impl MatcherSimilarity {
    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_owned(), b.to_owned())
        } else {
            (b.to_owned(), a.to_owned())
        }
    }

    /// The matcher names covered by this matrix, sorted.
    pub fn matchers(&self) -> &[String] {
        &self.matchers
    }

    /// Similarity between two matchers; symmetric in its arguments.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        self.scores.get(&MatcherSimilarity::key(a, b)).copied()
    }

    /// Median over all matrix cells including the self-similarity diagonal.
    pub fn median_including_diagonal(&self) -> f64 {
        self.median(true)
    }

    /// Median over all off-diagonal cells.
    pub fn median_excluding_diagonal(&self) -> f64 {
        self.median(false)
    }

    fn median(&self, with_diagonal: bool) -> f64 {
        let mut values: Vec<f64> = self
            .scores
            .iter()
            .filter(|((a, b), _)| with_diagonal || a != b)
            .map(|(_, v)| *v)
            .collect();
        if values.is_empty() {
            return 0.0;
        }
        values.sort_by(|x, y| x.total_cmp(y));
        let mid = values.len() / 2;
        if values.len() % 2 == 1 {
            values[mid]
        } else {
            (values[mid - 1] + values[mid]) / 2.0
        }
    }

    /// Render the matrix as a markdown table.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("| matcher |");
        for m in &self.matchers {
            out.push_str(&format!(" {m} |"));
        }
        out.push_str("\n|---|");
        for _ in &self.matchers {
            out.push_str("---|");
        }
        out.push('\n');
        for a in &self.matchers {
            out.push_str(&format!("| {a} |"));
            for b in &self.matchers {
                let v = self.similarity(a, b).unwrap_or(0.0);
                out.push_str(&format!(" {v:.3} |"));
            }
            out.push('\n');
        }
        out
    }
}

/// Jaccard similarity of two `(source, target)` pair sets; 0.0 on an empty
/// union.
fn jaccard(a: &HashSet<(String, String)>, b: &HashSet<(String, String)>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

fn pair_set(result: &ExecutionResult) -> HashSet<(String, String)> {
    result
        .system()
        .iter()
        .map(|c| (c.source().to_owned(), c.target().to_owned()))
        .collect()
}

fn matrix_from_sets(sets: Vec<(String, HashSet<(String, String)>)>) -> MatcherSimilarity {
    let mut scores = HashMap::new();
    for (i, (name_a, set_a)) in sets.iter().enumerate() {
        for (name_b, set_b) in sets.iter().skip(i) {
            scores.insert(
                MatcherSimilarity::key(name_a, name_b),
                jaccard(set_a, set_b),
            );
        }
    }
    let mut matchers: Vec<String> = sets.into_iter().map(|(name, _)| name).collect();
    matchers.sort();
    MatcherSimilarity { matchers, scores }
}

/// Similarity matrix over all given results, which must belong to one test
/// case. Duplicate matcher names are rejected.
pub fn per_test_case(results: &[&ExecutionResult]) -> Result<MatcherSimilarity> {
    let Some(first) = results.first() else {
        return Err(Error::invalid_input(
            "similarity needs at least one execution result",
        ));
    };
    let mut seen = HashSet::new();
    for r in results {
        if r.test_case() != first.test_case() {
            return Err(Error::uncomparable(format!(
                "results belong to different test cases: {} vs {}",
                first.test_case(),
                r.test_case()
            )));
        }
        if !r.test_case().same_reference(first.test_case()) {
            return Err(Error::uncomparable(format!(
                "results for {} do not share a reference alignment",
                first.test_case()
            )));
        }
        if !seen.insert(r.matcher().to_owned()) {
            return Err(Error::invalid_input(format!(
                "duplicate matcher in similarity computation: {}",
                r.matcher()
            )));
        }
    }
    let sets = results
        .iter()
        .map(|r| (r.matcher().to_owned(), pair_set(r)))
        .collect();
    Ok(matrix_from_sets(sets))
}

/// Track-level similarity matrix over every matcher present in the result
/// set for the given track.
pub fn per_track(
    results: &ExecutionResultSet,
    track: &str,
    mode: CalculationMode,
) -> Result<MatcherSimilarity> {
    let track_results: Vec<&ExecutionResult> = results
        .iter()
        .filter(|r| r.test_case().track() == track)
        .collect();
    if track_results.is_empty() {
        return Err(Error::invalid_input(format!(
            "no execution results for track {track:?}"
        )));
    }
    let mut matchers: Vec<String> = track_results
        .iter()
        .map(|r| r.matcher().to_owned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    matchers.sort();

    match mode {
        CalculationMode::Micro => {
            // One pooled pair set per matcher across the whole track.
            let mut pooled: HashMap<String, HashSet<(String, String)>> = HashMap::new();
            for r in &track_results {
                pooled
                    .entry(r.matcher().to_owned())
                    .or_default()
                    .extend(pair_set(r));
            }
            let sets = matchers
                .into_iter()
                .map(|m| {
                    let set = pooled.remove(&m).unwrap_or_default();
                    (m, set)
                })
                .collect();
            Ok(matrix_from_sets(sets))
        }
        CalculationMode::Macro => {
            let mut by_case: HashMap<(String, String), Vec<&ExecutionResult>> = HashMap::new();
            for r in &track_results {
                by_case
                    .entry((
                        r.test_case().track().to_owned(),
                        r.test_case().name().to_owned(),
                    ))
                    .or_default()
                    .push(r);
            }
            // Average per-test-case similarities per matcher pair.
            let mut sums: HashMap<(String, String), (f64, usize)> = HashMap::new();
            for case_results in by_case.values() {
                let matrix = per_test_case(case_results)?;
                for (i, a) in matrix.matchers.iter().enumerate() {
                    for b in matrix.matchers.iter().skip(i) {
                        if let Some(v) = matrix.similarity(a, b) {
                            let entry = sums
                                .entry(MatcherSimilarity::key(a, b))
                                .or_insert((0.0, 0));
                            entry.0 += v;
                            entry.1 += 1;
                        }
                    }
                }
            }
            let scores = sums
                .into_iter()
                .map(|(k, (sum, n))| (k, sum / n as f64))
                .collect();
            Ok(MatcherSimilarity { matchers, scores })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::Alignment;
    use crate::correspondence::{Correspondence, Relation};
    use crate::execution::TestCase;

    fn alignment(pairs: &[(&str, &str)]) -> Alignment {
        let mut a = Alignment::new();
        for (s, t) in pairs {
            a.add(Correspondence::equivalence(*s, *t)).unwrap();
        }
        a
    }

    fn test_case() -> TestCase {
        TestCase::new("anatomy", "mouse-human", alignment(&[("a", "1")]))
    }

    #[test]
    fn self_similarity_is_exactly_one() {
        let tc = test_case();
        let system = alignment(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let r = ExecutionResult::new(tc, "AML", system);
        let matrix = per_test_case(&[&r]).unwrap();
        assert_eq!(matrix.similarity("AML", "AML"), Some(1.0));
    }

    #[test]
    fn jaccard_over_pairs_ignores_relation_and_confidence() {
        let tc = test_case();
        let mut a = Alignment::new();
        a.add(Correspondence::new("x", "y", Relation::Subsumed, 0.2))
            .unwrap();
        let mut b = Alignment::new();
        b.add(Correspondence::new("x", "y", Relation::Equivalence, 0.9))
            .unwrap();
        let ra = ExecutionResult::new(tc.clone(), "A", a);
        let rb = ExecutionResult::new(tc, "B", b);
        let matrix = per_test_case(&[&ra, &rb]).unwrap();
        assert_eq!(matrix.similarity("A", "B"), Some(1.0));
        assert_eq!(matrix.similarity("B", "A"), Some(1.0));
    }

    #[test]
    fn partial_overlap() {
        let tc = test_case();
        let ra = ExecutionResult::new(tc.clone(), "A", alignment(&[("a", "1"), ("b", "2")]));
        let rb = ExecutionResult::new(tc, "B", alignment(&[("b", "2"), ("c", "3")]));
        let matrix = per_test_case(&[&ra, &rb]).unwrap();
        // |{b2}| / |{a1, b2, c3}|
        assert!((matrix.similarity("A", "B").unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn differing_test_cases_are_uncomparable() {
        let tc1 = test_case();
        let tc2 = TestCase::new("anatomy", "other", alignment(&[("z", "9")]));
        let r1 = ExecutionResult::new(tc1, "A", Alignment::new());
        let r2 = ExecutionResult::new(tc2, "B", Alignment::new());
        let err = per_test_case(&[&r1, &r2]).unwrap_err();
        assert!(matches!(err, Error::UncomparableResults(_)));
    }

    #[test]
    fn micro_mode_pools_across_test_cases() {
        let tc1 = TestCase::new("conference", "c1", alignment(&[("a", "1")]));
        let tc2 = TestCase::new("conference", "c2", alignment(&[("b", "2")]));
        let mut set = ExecutionResultSet::new();
        // Matcher A finds a1 on tc1 and b2 on tc2; matcher B finds both on
        // their test cases plus one extra.
        set.add(ExecutionResult::new(tc1.clone(), "A", alignment(&[("a", "1")])));
        set.add(ExecutionResult::new(tc2.clone(), "A", alignment(&[("b", "2")])));
        set.add(ExecutionResult::new(tc1, "B", alignment(&[("a", "1"), ("x", "9")])));
        set.add(ExecutionResult::new(tc2, "B", alignment(&[("b", "2")])));

        let matrix = per_track(&set, "conference", CalculationMode::Micro).unwrap();
        // Pooled: A = {a1, b2}, B = {a1, b2, x9} -> 2/3.
        assert!((matrix.similarity("A", "B").unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(matrix.similarity("A", "A"), Some(1.0));
    }

    #[test]
    fn macro_mode_averages_per_test_case() {
        let tc1 = TestCase::new("conference", "c1", alignment(&[("a", "1")]));
        let tc2 = TestCase::new("conference", "c2", alignment(&[("b", "2")]));
        let mut set = ExecutionResultSet::new();
        // tc1: identical outputs (1.0); tc2: disjoint outputs (0.0).
        set.add(ExecutionResult::new(tc1.clone(), "A", alignment(&[("a", "1")])));
        set.add(ExecutionResult::new(tc1, "B", alignment(&[("a", "1")])));
        set.add(ExecutionResult::new(tc2.clone(), "A", alignment(&[("p", "7")])));
        set.add(ExecutionResult::new(tc2, "B", alignment(&[("q", "8")])));

        let matrix = per_track(&set, "conference", CalculationMode::Macro).unwrap();
        assert!((matrix.similarity("A", "B").unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn medians_with_and_without_diagonal() {
        let tc = test_case();
        let ra = ExecutionResult::new(tc.clone(), "A", alignment(&[("a", "1")]));
        let rb = ExecutionResult::new(tc.clone(), "B", alignment(&[("b", "2")]));
        let rc = ExecutionResult::new(tc, "C", alignment(&[("a", "1"), ("b", "2")]));
        let matrix = per_test_case(&[&ra, &rb, &rc]).unwrap();
        // Diagonal 1.0 x3; off-diagonal: A-B 0.0, A-C 0.5, B-C 0.5.
        assert!((matrix.median_excluding_diagonal() - 0.5).abs() < 1e-12);
        assert!(matrix.median_including_diagonal() > matrix.median_excluding_diagonal());
    }

    #[test]
    fn unknown_track_is_rejected() {
        let set = ExecutionResultSet::new();
        assert!(per_track(&set, "nope", CalculationMode::Micro).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn self_similarity_is_one_for_any_nonempty_output(
                pairs in proptest::collection::vec(("[a-f]{1,6}", "[u-z]{1,6}"), 1..40),
            ) {
                let mut system = Alignment::new();
                for (s, t) in pairs {
                    system.add(Correspondence::equivalence(s, t)).unwrap();
                }
                let tc = TestCase::new("anatomy", "prop", system.clone());
                let r = ExecutionResult::new(tc, "M", system);
                let matrix = per_test_case(&[&r]).unwrap();
                prop_assert_eq!(matrix.similarity("M", "M"), Some(1.0));
            }
        }
    }

    #[test]
    fn markdown_rendering_contains_all_matchers() {
        let tc = test_case();
        let ra = ExecutionResult::new(tc.clone(), "A", alignment(&[("a", "1")]));
        let rb = ExecutionResult::new(tc, "B", alignment(&[("a", "1")]));
        let matrix = per_test_case(&[&ra, &rb]).unwrap();
        let md = matrix.to_markdown();
        assert!(md.contains("| A |"));
        assert!(md.contains("1.000"));
    }
}
