//! Test cases and execution results.
//!
//! A [`TestCase`] is one matching problem instance: a (source ontology,
//! target ontology) pair with a reference alignment, belonging to a named
//! track. Ontology loading is an external collaborator; here a test case is
//! an opaque key plus the already-parsed reference.
//!
//! An [`ExecutionResult`] associates one test case with one matcher and the
//! system alignment that matcher produced. Results are immutable after
//! construction and equality/hash cover `(test case, matcher)` only, which
//! makes them usable as memoization keys for metric computation.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::alignment::Alignment;

// =============================================================================
// TestCase
// =============================================================================

/// One matching problem instance inside a track.
#[derive(Debug, Clone)]
pub struct TestCase {
    track: String,
    name: String,
    reference: Arc<Alignment>,
}

impl TestCase {
    /// Create a test case with its ground-truth reference alignment.
    pub fn new(track: impl Into<String>, name: impl Into<String>, reference: Alignment) -> Self {
        TestCase {
            track: track.into(),
            name: name.into(),
            reference: Arc::new(reference),
        }
    }

    /// The track this test case belongs to.
    pub fn track(&self) -> &str {
        &self.track
    }

    /// Test case name, unique within the track.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reference (ground-truth) alignment.
    pub fn reference(&self) -> &Alignment {
        &self.reference
    }

    /// Whether two test cases share the same reference alignment instance.
    pub fn same_reference(&self, other: &TestCase) -> bool {
        Arc::ptr_eq(&self.reference, &other.reference) || self.reference == other.reference
    }
}

/// Identity over `(track, name)`; the reference is part of the payload.
impl PartialEq for TestCase {
    fn eq(&self, other: &Self) -> bool {
        self.track == other.track && self.name == other.name
    }
}

impl Eq for TestCase {}

impl Hash for TestCase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.track.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.track, self.name)
    }
}

// =============================================================================
// ExecutionResult
// =============================================================================

/// The output of one matcher on one test case.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    test_case: TestCase,
    matcher: String,
    system: Arc<Alignment>,
}

impl ExecutionResult {
    /// Associate a matcher's system alignment with a test case.
    pub fn new(test_case: TestCase, matcher: impl Into<String>, system: Alignment) -> Self {
        ExecutionResult {
            test_case,
            matcher: matcher.into(),
            system: Arc::new(system),
        }
    }

    /// The test case this result was produced for.
    pub fn test_case(&self) -> &TestCase {
        &self.test_case
    }

    /// Name of the matcher that produced the system alignment.
    pub fn matcher(&self) -> &str {
        &self.matcher
    }

    /// The matcher-produced alignment.
    pub fn system(&self) -> &Alignment {
        &self.system
    }

    /// The test case's reference alignment.
    pub fn reference(&self) -> &Alignment {
        self.test_case.reference()
    }
}

/// Identity over `(test case, matcher)`; the system alignment is payload.
impl PartialEq for ExecutionResult {
    fn eq(&self, other: &Self) -> bool {
        self.matcher == other.matcher && self.test_case == other.test_case
    }
}

impl Eq for ExecutionResult {}

impl Hash for ExecutionResult {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.test_case.hash(state);
        self.matcher.hash(state);
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.test_case, self.matcher)
    }
}

// =============================================================================
// ExecutionResultSet
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultKey {
    track: String,
    test_case: String,
    matcher: String,
}

impl ResultKey {
    fn of(result: &ExecutionResult) -> Self {
        ResultKey {
            track: result.test_case().track().to_owned(),
            test_case: result.test_case().name().to_owned(),
            matcher: result.matcher().to_owned(),
        }
    }
}

/// A keyed collection of execution results across matchers and test cases.
///
/// Lookup by `(test case, matcher)` is O(1); iteration is insertion order.
/// Adding a result for an already-present `(test case, matcher)` pair
/// replaces the stored one.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResultSet {
    results: HashMap<ResultKey, ExecutionResult>,
    order: Vec<ResultKey>,
}

impl ExecutionResultSet {
    /// Empty result set.
    pub fn new() -> Self {
        ExecutionResultSet::default()
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True when no results are stored.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Add a result, replacing any stored result with the same identity.
    pub fn add(&mut self, result: ExecutionResult) {
        let key = ResultKey::of(&result);
        if self.results.insert(key.clone(), result).is_none() {
            self.order.push(key);
        }
    }

    /// Add every result from an iterator.
    pub fn add_all<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = ExecutionResult>,
    {
        for r in results {
            self.add(r);
        }
    }

    /// Look up the result of one matcher on one test case.
    pub fn get(&self, test_case: &TestCase, matcher: &str) -> Option<&ExecutionResult> {
        self.results.get(&ResultKey {
            track: test_case.track().to_owned(),
            test_case: test_case.name().to_owned(),
            matcher: matcher.to_owned(),
        })
    }

    /// Iterate over results in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionResult> + '_ {
        self.order.iter().filter_map(|k| self.results.get(k))
    }

    /// Distinct matcher names, sorted.
    pub fn distinct_matchers(&self) -> Vec<String> {
        let mut matchers: Vec<String> = self
            .results
            .keys()
            .map(|k| k.matcher.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        matchers.sort();
        matchers
    }

    /// Distinct test cases, in first-seen order.
    pub fn distinct_test_cases(&self) -> Vec<&TestCase> {
        let mut seen = std::collections::HashSet::new();
        self.iter()
            .map(ExecutionResult::test_case)
            .filter(|tc| seen.insert((tc.track().to_owned(), tc.name().to_owned())))
            .collect()
    }

    /// All results produced by one matcher, in insertion order.
    pub fn results_for_matcher(&self, matcher: &str) -> Vec<&ExecutionResult> {
        self.iter().filter(|r| r.matcher() == matcher).collect()
    }

    /// All results for one test case, in insertion order.
    pub fn results_for_test_case(&self, test_case: &TestCase) -> Vec<&ExecutionResult> {
        self.iter().filter(|r| r.test_case() == test_case).collect()
    }
}

impl<'a> IntoIterator for &'a ExecutionResultSet {
    type Item = &'a ExecutionResult;
    type IntoIter = Box<dyn Iterator<Item = &'a ExecutionResult> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<ExecutionResult> for ExecutionResultSet {
    fn from_iter<I: IntoIterator<Item = ExecutionResult>>(iter: I) -> Self {
        let mut set = ExecutionResultSet::new();
        set.add_all(iter);
        set
    }
}
