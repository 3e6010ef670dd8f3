//! McNemar significance testing between matcher pairs.
//!
//! For two matchers evaluated on the same test case, the test asks whether
//! their disagreement pattern is statistically significant. The 2x2
//! contingency table is built over correctness against the shared reference:
//! a matcher is wrong on a mapping it invents (false positive) as much as on
//! one it misses (false negative), so the discordant counts are
//!
//! ```text
//! n01 = |(B ∩ R) \ A|  +  |(A \ B) \ R|   (B right where A is wrong)
//! n10 = |(A ∩ R) \ B|  +  |(B \ A) \ R|   (A right where B is wrong)
//! ```
//!
//! With `n01 = n10 = 0` the matchers never disagree and the p-value is 1.0,
//! which also covers the self-comparison invariant: a matcher against itself
//! is never significantly different, at any alpha.
//!
//! The asymptotic chi-squared approximation needs `n01 + n10 >= 25`; below
//! that the verdict is [`Significance::CannotDetermine`] unless an
//! exact-fallback test type is selected, which switches to the exact
//! two-sided binomial test for small samples.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::execution::{ExecutionResult, ExecutionResultSet};

/// Minimum discordant-pair count for the chi-squared approximation.
const ASYMPTOTIC_MINIMUM: u64 = 25;

// =============================================================================
// Configuration
// =============================================================================

/// Which flavor of the McNemar test to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TestType {
    /// Chi-squared approximation, `(n01 - n10)^2 / (n01 + n10)`.
    Asymptotic,
    /// Chi-squared approximation with Edwards' continuity correction,
    /// `(|n01 - n10| - 1)^2 / (n01 + n10)`.
    #[default]
    AsymptoticContinuityCorrection,
    /// Asymptotic, falling back to the exact binomial test when the sample
    /// is too small for the approximation.
    AsymptoticExactFallback,
    /// Continuity-corrected asymptotic with the same exact fallback.
    AsymptoticContinuityCorrectionExactFallback,
}

impl TestType {
    /// All test types.
    pub fn all() -> &'static [TestType] {
        &[
            TestType::Asymptotic,
            TestType::AsymptoticContinuityCorrection,
            TestType::AsymptoticExactFallback,
            TestType::AsymptoticContinuityCorrectionExactFallback,
        ]
    }

    fn continuity_correction(&self) -> bool {
        matches!(
            self,
            TestType::AsymptoticContinuityCorrection
                | TestType::AsymptoticContinuityCorrectionExactFallback
        )
    }

    fn exact_fallback(&self) -> bool {
        matches!(
            self,
            TestType::AsymptoticExactFallback
                | TestType::AsymptoticContinuityCorrectionExactFallback
        )
    }
}

/// Significance test configuration: test type plus alpha level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McNemarConfig {
    alpha: f64,
    test: TestType,
}

impl Default for McNemarConfig {
    fn default() -> Self {
        McNemarConfig {
            alpha: 0.05,
            test: TestType::default(),
        }
    }
}

impl McNemarConfig {
    /// Configuration with the given alpha and test type. Alpha must lie
    /// strictly between 0 and 1.
    pub fn new(alpha: f64, test: TestType) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::invalid_input(format!(
                "alpha must be in (0, 1), got {alpha}"
            )));
        }
        Ok(McNemarConfig { alpha, test })
    }

    /// The significance level.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// The configured test type.
    pub fn test(&self) -> TestType {
        self.test
    }
}

// =============================================================================
// Results
// =============================================================================

/// Verdict of one pairwise significance test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Significance {
    /// The disagreement pattern is significant at the configured alpha.
    Significant,
    /// The disagreement pattern is not significant.
    NotSignificant,
    /// The sample was too small for the chosen test.
    CannotDetermine,
}

/// Outcome of comparing two matchers on one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McNemarResult {
    /// First matcher name.
    pub matcher_a: String,
    /// Second matcher name.
    pub matcher_b: String,
    /// Track of the shared test case.
    pub track: String,
    /// Name of the shared test case.
    pub test_case: String,
    /// Mappings where B is right and A is wrong.
    pub n01: u64,
    /// Mappings where A is right and B is wrong.
    pub n10: u64,
    /// Two-sided p-value; `None` when the test could not be decided.
    pub p_value: Option<f64>,
    /// Alpha the verdict was taken at.
    pub alpha: f64,
    /// The verdict.
    pub significance: Significance,
}

/// Per-pair tally of verdicts across a track's test cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificanceCount {
    /// Test cases with a significant difference.
    pub significant: usize,
    /// Test cases without a significant difference.
    pub not_significant: usize,
    /// Test cases where the test was undecidable.
    pub cannot_determine: usize,
}

impl SignificanceCount {
    fn record(&mut self, verdict: Significance) {
        match verdict {
            Significance::Significant => self.significant += 1,
            Significance::NotSignificant => self.not_significant += 1,
            Significance::CannotDetermine => self.cannot_determine += 1,
        }
    }

    /// Track-level verdict: significant on a strict majority of the decided
    /// test cases. `None` when no test case could be decided.
    pub fn majority_verdict(&self) -> Option<Significance> {
        let decided = self.significant + self.not_significant;
        if decided == 0 {
            return None;
        }
        if self.significant * 2 > decided {
            Some(Significance::Significant)
        } else {
            Some(Significance::NotSignificant)
        }
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Run the configured McNemar test for two execution results.
///
/// Both results must belong to the same test case (and therefore share its
/// reference alignment); anything else is uncomparable.
pub fn compare(
    a: &ExecutionResult,
    b: &ExecutionResult,
    config: &McNemarConfig,
) -> Result<McNemarResult> {
    if a.test_case() != b.test_case() {
        return Err(Error::uncomparable(format!(
            "significance between different test cases: {} vs {}",
            a.test_case(),
            b.test_case()
        )));
    }
    if !a.test_case().same_reference(b.test_case()) {
        return Err(Error::uncomparable(format!(
            "results for {} do not share a reference alignment",
            a.test_case()
        )));
    }

    let reference = a.reference();
    let system_a = a.system();
    let system_b = b.system();

    let b_right_a_wrong = system_b.intersection(reference).subtraction(system_a).len()
        + system_a.subtraction(system_b).subtraction(reference).len();
    let a_right_b_wrong = system_a.intersection(reference).subtraction(system_b).len()
        + system_b.subtraction(system_a).subtraction(reference).len();
    let n01 = b_right_a_wrong as u64;
    let n10 = a_right_b_wrong as u64;

    let p_value = p_value(n01, n10, config.test);
    let significance = match p_value {
        Some(p) if p < config.alpha => Significance::Significant,
        Some(_) => Significance::NotSignificant,
        None => Significance::CannotDetermine,
    };

    Ok(McNemarResult {
        matcher_a: a.matcher().to_owned(),
        matcher_b: b.matcher().to_owned(),
        track: a.test_case().track().to_owned(),
        test_case: a.test_case().name().to_owned(),
        n01,
        n10,
        p_value,
        alpha: config.alpha(),
        significance,
    })
}

/// Significance tests for every unordered matcher pair (including
/// self-pairs) on every test case of the given track.
pub fn track_significance(
    results: &ExecutionResultSet,
    track: &str,
    config: &McNemarConfig,
) -> Result<Vec<McNemarResult>> {
    let mut outcomes = Vec::new();
    let test_cases: Vec<_> = results
        .distinct_test_cases()
        .into_iter()
        .filter(|tc| tc.track() == track)
        .cloned()
        .collect();
    if test_cases.is_empty() {
        return Err(Error::invalid_input(format!(
            "no execution results for track {track:?}"
        )));
    }
    for tc in &test_cases {
        let case_results = results.results_for_test_case(tc);
        for (i, a) in case_results.iter().enumerate() {
            for b in case_results.iter().skip(i) {
                outcomes.push(compare(a, b, config)?);
            }
        }
    }
    Ok(outcomes)
}

/// Aggregate per-test-case outcomes into per-pair counts.
pub fn count_by_pair(outcomes: &[McNemarResult]) -> HashMap<(String, String), SignificanceCount> {
    let mut counts: HashMap<(String, String), SignificanceCount> = HashMap::new();
    for o in outcomes {
        let key = if o.matcher_a <= o.matcher_b {
            (o.matcher_a.clone(), o.matcher_b.clone())
        } else {
            (o.matcher_b.clone(), o.matcher_a.clone())
        };
        counts.entry(key).or_default().record(o.significance);
    }
    counts
}

fn p_value(n01: u64, n10: u64, test: TestType) -> Option<f64> {
    let n = n01 + n10;
    if n == 0 {
        // Perfect agreement: never significant.
        return Some(1.0);
    }
    if n < ASYMPTOTIC_MINIMUM {
        if test.exact_fallback() {
            return Some(exact_binomial_p(n01, n10));
        }
        log::debug!("discordant count {n} below asymptotic minimum, undecided");
        return None;
    }
    let diff = n01 as f64 - n10 as f64;
    let statistic = if test.continuity_correction() {
        let corrected = (diff.abs() - 1.0).max(0.0);
        corrected * corrected / n as f64
    } else {
        diff * diff / n as f64
    };
    Some(chi_squared_sf_1df(statistic))
}

/// Exact two-sided binomial p-value at success probability 0.5.
fn exact_binomial_p(n01: u64, n10: u64) -> f64 {
    let n = n01 + n10;
    let k_max = n01.min(n10);
    // P(X <= k_max) for X ~ Binomial(n, 0.5), then doubled and capped.
    let half_pow_n = 0.5f64.powi(n as i32);
    let mut coefficient = 1.0;
    let mut cumulative = half_pow_n;
    for k in 1..=k_max {
        coefficient *= (n - k + 1) as f64 / k as f64;
        cumulative += coefficient * half_pow_n;
    }
    (2.0 * cumulative).min(1.0)
}

/// Survival function of the chi-squared distribution with one degree of
/// freedom: `P(X > x) = erfc(sqrt(x / 2))`.
fn chi_squared_sf_1df(x: f64) -> f64 {
    erfc((x / 2.0).sqrt())
}

/// Complementary error function, Abramowitz & Stegun 7.1.26.
/// Absolute error below 1.5e-7, plenty for significance verdicts.
fn erfc(x: f64) -> f64 {
    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * abs_x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let value = poly * (-abs_x * abs_x).exp();
    if x < 0.0 {
        2.0 - value
    } else {
        value
    }
}
