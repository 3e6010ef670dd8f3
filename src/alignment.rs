//! Indexed correspondence sets.
//!
//! An [`Alignment`] is an unordered collection of unique [`Correspondence`]s,
//! keyed by the `(source, target, relation)` identity triple. Secondary
//! indices over source, target, relation, and confidence are selected at
//! construction time via [`IndexConfig`]: maintaining every index is wasteful
//! for small or write-once sets, and necessary for sets queried repeatedly at
//! scale (hundreds of thousands of correspondences in bulk knowledge-graph
//! matching).
//!
//! Invariant: active indices always reflect the member set. A mutation either
//! updates the members and every active index, or (on rejection) changes
//! nothing at all.
//!
//! ## Collision policy
//!
//! [`Alignment::add`] is last-write-wins: re-adding an existing mapping
//! replaces the stored correspondence (updating its confidence and
//! extensions) without changing the set size. Matchers that call `add`
//! repeatedly for the same pair with refined confidences therefore end up
//! with the final value. [`Alignment::add_or_use_highest_confidence`] is the
//! opt-in alternative that keeps the maximum confidence seen.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::correspondence::{Correspondence, CorrespondenceId, Relation};
use crate::error::{Error, Result};

// =============================================================================
// Index configuration
// =============================================================================

/// Selects which secondary indices an [`Alignment`] maintains.
///
/// Indexed lookups are O(1) amortized; without the index the same query
/// falls back to a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maintain the source-URI index.
    pub source: bool,
    /// Maintain the target-URI index.
    pub target: bool,
    /// Maintain the relation index.
    pub relation: bool,
    /// Maintain the confidence index (enables ranged threshold filtering).
    pub confidence: bool,
}

impl Default for IndexConfig {
    /// Source, target, and relation indexed; confidence not.
    fn default() -> Self {
        IndexConfig {
            source: true,
            target: true,
            relation: true,
            confidence: false,
        }
    }
}

impl IndexConfig {
    /// No indices; every query scans.
    pub fn none() -> Self {
        IndexConfig {
            source: false,
            target: false,
            relation: false,
            confidence: false,
        }
    }

    /// All indices.
    pub fn all() -> Self {
        IndexConfig {
            source: true,
            target: true,
            relation: true,
            confidence: true,
        }
    }
}

// =============================================================================
// Alignment
// =============================================================================

type IdSet = HashSet<CorrespondenceId>;

/// A deduplicated, optionally indexed collection of correspondences.
///
/// Iteration yields members in first-insertion order; callers must treat the
/// order as presentational only.
///
/// Not thread-safe for concurrent mutation; concurrent readers of a
/// fully-built alignment are safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "AlignmentSerde", into = "AlignmentSerde")]
pub struct Alignment {
    entries: HashMap<CorrespondenceId, Correspondence>,
    order: Vec<CorrespondenceId>,
    config: IndexConfig,
    source_index: HashMap<String, IdSet>,
    target_index: HashMap<String, IdSet>,
    relation_index: HashMap<Relation, IdSet>,
    // Keyed by confidence bit pattern; monotone in the value since
    // confidences are non-negative.
    confidence_index: BTreeMap<u64, IdSet>,
    extensions: BTreeMap<String, String>,
}

impl Default for Alignment {
    fn default() -> Self {
        Alignment::new()
    }
}

impl Alignment {
    /// Empty alignment with the default index configuration.
    pub fn new() -> Self {
        Alignment::with_config(IndexConfig::default())
    }

    /// Empty alignment maintaining exactly the given indices.
    pub fn with_config(config: IndexConfig) -> Self {
        Alignment {
            entries: HashMap::new(),
            order: Vec::new(),
            config,
            source_index: HashMap::new(),
            target_index: HashMap::new(),
            relation_index: HashMap::new(),
            confidence_index: BTreeMap::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Build an alignment from correspondences, default indices.
    pub fn from_correspondences<I>(correspondences: I) -> Result<Self>
    where
        I: IntoIterator<Item = Correspondence>,
    {
        let mut alignment = Alignment::new();
        alignment.add_all(correspondences)?;
        Ok(alignment)
    }

    /// The index configuration chosen at construction.
    pub fn index_config(&self) -> IndexConfig {
        self.config
    }

    /// Number of distinct mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the alignment holds no mappings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collection-level extension attributes (e.g. a title), independent of
    /// the member correspondences.
    pub fn extensions(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }

    /// Set a collection-level extension attribute.
    pub fn set_extension(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extensions.insert(key.into(), value.into());
    }

    /// Look up a collection-level extension attribute.
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Insert a correspondence. Last-write-wins on identity collision: the
    /// new correspondence replaces the stored one, the set size and the
    /// insertion position are unchanged.
    ///
    /// Rejects correspondences with an empty source or target URI; on
    /// rejection neither the members nor any index are touched.
    pub fn add(&mut self, correspondence: Correspondence) -> Result<()> {
        self.validate(&correspondence)?;
        self.insert_entry(correspondence);
        Ok(())
    }

    /// Bulk insert with the same per-element semantics as [`Alignment::add`].
    ///
    /// Stops at the first invalid element; elements added before the failure
    /// remain in the set.
    pub fn add_all<I>(&mut self, correspondences: I) -> Result<()>
    where
        I: IntoIterator<Item = Correspondence>,
    {
        for c in correspondences {
            self.add(c)?;
        }
        Ok(())
    }

    /// Insert a correspondence, keeping whichever of the stored and the new
    /// confidence is higher. Extensions of the higher-confidence entry win.
    pub fn add_or_use_highest_confidence(&mut self, correspondence: Correspondence) -> Result<()> {
        self.validate(&correspondence)?;
        if let Some(existing) = self.entries.get(&correspondence.id()) {
            if existing.confidence() >= correspondence.confidence() {
                return Ok(());
            }
        }
        self.insert_entry(correspondence);
        Ok(())
    }

    /// Remove a mapping by identity. Returns the removed correspondence.
    pub fn remove(&mut self, id: &CorrespondenceId) -> Option<Correspondence> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|o| o != id);
        self.deindex(&removed);
        Some(removed)
    }

    /// Remove every mapping that also occurs in `other` (by identity).
    pub fn remove_all(&mut self, other: &Alignment) {
        for id in other.order.iter() {
            let _ = self.remove(id);
        }
    }

    fn validate(&self, c: &Correspondence) -> Result<()> {
        if c.source().trim().is_empty() {
            return Err(Error::invalid_correspondence(format!(
                "empty source URI (target: {:?})",
                c.target()
            )));
        }
        if c.target().trim().is_empty() {
            return Err(Error::invalid_correspondence(format!(
                "empty target URI (source: {:?})",
                c.source()
            )));
        }
        Ok(())
    }

    /// Insert a pre-validated correspondence, updating all active indices.
    fn insert_entry(&mut self, correspondence: Correspondence) {
        let id = correspondence.id();
        if let Some(old) = self.entries.remove(&id) {
            // Replacement: the confidence index entry may move buckets.
            self.deindex(&old);
        } else {
            self.order.push(id.clone());
        }
        self.index(&correspondence);
        self.entries.insert(id, correspondence);
    }

    fn index(&mut self, c: &Correspondence) {
        let id = c.id();
        if self.config.source {
            self.source_index
                .entry(c.source().to_owned())
                .or_default()
                .insert(id.clone());
        }
        if self.config.target {
            self.target_index
                .entry(c.target().to_owned())
                .or_default()
                .insert(id.clone());
        }
        if self.config.relation {
            self.relation_index
                .entry(c.relation())
                .or_default()
                .insert(id.clone());
        }
        if self.config.confidence {
            self.confidence_index
                .entry(c.confidence().to_bits())
                .or_default()
                .insert(id);
        }
    }

    fn deindex(&mut self, c: &Correspondence) {
        let id = c.id();
        if self.config.source {
            if let Some(set) = self.source_index.get_mut(c.source()) {
                set.remove(&id);
                if set.is_empty() {
                    self.source_index.remove(c.source());
                }
            }
        }
        if self.config.target {
            if let Some(set) = self.target_index.get_mut(c.target()) {
                set.remove(&id);
                if set.is_empty() {
                    self.target_index.remove(c.target());
                }
            }
        }
        if self.config.relation {
            if let Some(set) = self.relation_index.get_mut(&c.relation()) {
                set.remove(&id);
                if set.is_empty() {
                    self.relation_index.remove(&c.relation());
                }
            }
        }
        if self.config.confidence {
            let bits = c.confidence().to_bits();
            if let Some(set) = self.confidence_index.get_mut(&bits) {
                set.remove(&id);
                if set.is_empty() {
                    self.confidence_index.remove(&bits);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Look up a mapping by identity.
    pub fn get(&self, id: &CorrespondenceId) -> Option<&Correspondence> {
        self.entries.get(id)
    }

    /// Look up a mapping by its identity components.
    pub fn get_correspondence(
        &self,
        source: &str,
        target: &str,
        relation: Relation,
    ) -> Option<&Correspondence> {
        self.entries.get(&CorrespondenceId {
            source: source.to_owned(),
            target: target.to_owned(),
            relation,
        })
    }

    /// Whether the given mapping (by identity) is a member.
    pub fn contains(&self, c: &Correspondence) -> bool {
        self.entries.contains_key(&c.id())
    }

    /// All mappings with the given source URI. Index-backed (O(1) amortized
    /// plus the result size) when the source index is active, full scan
    /// otherwise. Result order is unspecified.
    pub fn correspondences_by_source(&self, source: &str) -> Vec<&Correspondence> {
        if self.config.source {
            self.collect_ids(self.source_index.get(source))
        } else {
            self.iter().filter(|c| c.source() == source).collect()
        }
    }

    /// All mappings with the given target URI. Result order is unspecified.
    pub fn correspondences_by_target(&self, target: &str) -> Vec<&Correspondence> {
        if self.config.target {
            self.collect_ids(self.target_index.get(target))
        } else {
            self.iter().filter(|c| c.target() == target).collect()
        }
    }

    /// All mappings with the given relation. Result order is unspecified.
    pub fn correspondences_by_relation(&self, relation: Relation) -> Vec<&Correspondence> {
        if self.config.relation {
            self.collect_ids(self.relation_index.get(&relation))
        } else {
            self.iter().filter(|c| c.relation() == relation).collect()
        }
    }

    fn collect_ids(&self, ids: Option<&IdSet>) -> Vec<&Correspondence> {
        // Cost is proportional to the result, not the member count.
        match ids {
            Some(ids) => ids.iter().filter_map(|id| self.entries.get(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Restartable iteration over members, in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Correspondence> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Distinct source URIs, sorted.
    pub fn distinct_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = if self.config.source {
            self.source_index.keys().cloned().collect()
        } else {
            self.iter()
                .map(|c| c.source().to_owned())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };
        sources.sort();
        sources
    }

    /// Distinct target URIs, sorted.
    pub fn distinct_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = if self.config.target {
            self.target_index.keys().cloned().collect()
        } else {
            self.iter()
                .map(|c| c.target().to_owned())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };
        targets.sort();
        targets
    }

    /// Distinct relations, sorted.
    pub fn distinct_relations(&self) -> Vec<Relation> {
        let mut relations: Vec<Relation> = if self.config.relation {
            self.relation_index.keys().copied().collect()
        } else {
            self.iter()
                .map(|c| c.relation())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };
        relations.sort();
        relations
    }

    // -------------------------------------------------------------------------
    // Confidence
    // -------------------------------------------------------------------------

    /// New alignment containing only mappings with confidence `>= threshold`.
    ///
    /// The boundary is inclusive so that sweeping thresholds over exactly the
    /// observed confidence values keeps each value's own mappings.
    #[must_use]
    pub fn filter_by_confidence(&self, threshold: f64) -> Alignment {
        let threshold = if threshold.is_nan() { 0.0 } else { threshold };
        let mut filtered = Alignment::with_config(self.config);
        filtered.extensions = self.extensions.clone();
        if threshold > 1.0 {
            return filtered;
        }
        let threshold = threshold.max(0.0);
        if self.config.confidence {
            let qualifying: HashSet<&CorrespondenceId> = self
                .confidence_index
                .range(threshold.to_bits()..)
                .flat_map(|(_, ids)| ids.iter())
                .collect();
            for id in &self.order {
                if qualifying.contains(id) {
                    if let Some(c) = self.entries.get(id) {
                        filtered.insert_entry(c.clone());
                    }
                }
            }
        } else {
            for c in self.iter() {
                if c.confidence() >= threshold {
                    filtered.insert_entry(c.clone());
                }
            }
        }
        filtered
    }

    /// Distinct confidence values present, ascending.
    pub fn occurring_confidences(&self) -> Vec<f64> {
        let mut bits: Vec<u64> = if self.config.confidence {
            self.confidence_index.keys().copied().collect()
        } else {
            let set: HashSet<u64> = self.iter().map(|c| c.confidence().to_bits()).collect();
            let mut v: Vec<u64> = set.into_iter().collect();
            v.sort_unstable();
            v
        };
        bits.dedup();
        bits.into_iter().map(f64::from_bits).collect()
    }

    /// Distinct confidence values rounded to `decimals` places, ascending.
    ///
    /// Rounding is half-away-from-zero at the given number of decimal places
    /// (a fixed, deterministic bucketing rule; accumulating a floating-point
    /// step would drift). `decimals` must be in `1..=10`.
    pub fn occurring_confidences_rounded(&self, decimals: u32) -> Result<Vec<f64>> {
        if !(1..=10).contains(&decimals) {
            return Err(Error::invalid_input(format!(
                "rounding precision must be in 1..=10, got {decimals}"
            )));
        }
        let factor = 10f64.powi(decimals as i32);
        let set: HashSet<u64> = self
            .iter()
            .map(|c| ((c.confidence() * factor).round() / factor).to_bits())
            .collect();
        let mut bits: Vec<u64> = set.into_iter().collect();
        bits.sort_unstable();
        Ok(bits.into_iter().map(f64::from_bits).collect())
    }

    // -------------------------------------------------------------------------
    // Set algebra (identity-triple based, non-mutating)
    // -------------------------------------------------------------------------

    /// Union of the two alignments. On identity collision the left operand's
    /// correspondence (self) is kept.
    #[must_use]
    pub fn union(&self, other: &Alignment) -> Alignment {
        let mut result = self.clone();
        for c in other.iter() {
            if !result.entries.contains_key(&c.id()) {
                result.insert_entry(c.clone());
            }
        }
        result
    }

    /// Mappings present in both alignments (self's entries are kept).
    #[must_use]
    pub fn intersection(&self, other: &Alignment) -> Alignment {
        let mut result = Alignment::with_config(self.config);
        for c in self.iter() {
            if other.entries.contains_key(&c.id()) {
                result.insert_entry(c.clone());
            }
        }
        result
    }

    /// Mappings of self that are absent from other.
    #[must_use]
    pub fn subtraction(&self, other: &Alignment) -> Alignment {
        let mut result = Alignment::with_config(self.config);
        for c in self.iter() {
            if !other.entries.contains_key(&c.id()) {
                result.insert_entry(c.clone());
            }
        }
        result
    }

    /// The alignment seen from the other side: every correspondence reversed.
    #[must_use]
    pub fn reversed(&self) -> Alignment {
        let mut result = Alignment::with_config(self.config);
        result.extensions = self.extensions.clone();
        for c in self.iter() {
            result.insert_entry(c.reversed());
        }
        result
    }
}

impl<'a> IntoIterator for &'a Alignment {
    type Item = &'a Correspondence;
    type IntoIter = Box<dyn Iterator<Item = &'a Correspondence> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl PartialEq for Alignment {
    /// Set equality over identity triples, ignoring order, indices, and
    /// collection extensions.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.keys().all(|id| other.entries.contains_key(id))
    }
}

impl Eq for Alignment {}

// Serialized form: the members plus configuration; indices are rebuilt on
// deserialization.
#[derive(Serialize, Deserialize)]
struct AlignmentSerde {
    #[serde(default)]
    extensions: BTreeMap<String, String>,
    #[serde(default)]
    index: Option<IndexConfig>,
    correspondences: Vec<Correspondence>,
}

impl From<AlignmentSerde> for Alignment {
    fn from(raw: AlignmentSerde) -> Self {
        let mut alignment = Alignment::with_config(raw.index.unwrap_or_default());
        alignment.extensions = raw.extensions;
        for c in raw.correspondences {
            if let Err(e) = alignment.add(c) {
                log::warn!("skipping correspondence during deserialization: {e}");
            }
        }
        alignment
    }
}

impl From<Alignment> for AlignmentSerde {
    fn from(alignment: Alignment) -> Self {
        let correspondences = alignment.iter().cloned().collect();
        AlignmentSerde {
            extensions: alignment.extensions.clone(),
            index: Some(alignment.config),
            correspondences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(source: &str, target: &str, conf: f64) -> Correspondence {
        Correspondence::new(source, target, Relation::Equivalence, conf)
    }

    #[test]
    fn add_is_idempotent_and_last_write_wins() {
        let mut a = Alignment::new();
        a.add(c("http://a#X", "http://b#Y", 0.4)).unwrap();
        a.add(c("http://a#X", "http://b#Y", 0.9)).unwrap();
        assert_eq!(a.len(), 1);
        let stored = a
            .get_correspondence("http://a#X", "http://b#Y", Relation::Equivalence)
            .unwrap();
        assert_eq!(stored.confidence(), 0.9);
    }

    #[test]
    fn add_or_use_highest_confidence_keeps_max() {
        let mut a = Alignment::new();
        a.add_or_use_highest_confidence(c("s", "t", 0.8)).unwrap();
        a.add_or_use_highest_confidence(c("s", "t", 0.3)).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(
            a.get_correspondence("s", "t", Relation::Equivalence)
                .unwrap()
                .confidence(),
            0.8
        );
        a.add_or_use_highest_confidence(c("s", "t", 0.95)).unwrap();
        assert_eq!(
            a.get_correspondence("s", "t", Relation::Equivalence)
                .unwrap()
                .confidence(),
            0.95
        );
    }

    #[test]
    fn invalid_add_leaves_set_and_indices_untouched() {
        let mut a = Alignment::with_config(IndexConfig::all());
        a.add(c("s", "t", 0.5)).unwrap();

        let err = a.add(c("", "t2", 0.5)).unwrap_err();
        assert!(matches!(err, Error::InvalidCorrespondence(_)));
        let err = a.add(c("s2", "   ", 0.5)).unwrap_err();
        assert!(matches!(err, Error::InvalidCorrespondence(_)));

        assert_eq!(a.len(), 1);
        assert_eq!(a.correspondences_by_source("s").len(), 1);
        assert!(a.correspondences_by_source("s2").is_empty());
        assert_eq!(a.distinct_sources(), vec!["s".to_string()]);
    }

    #[test]
    fn indexed_and_scanned_lookups_agree() {
        let mut indexed = Alignment::with_config(IndexConfig::all());
        let mut scanned = Alignment::with_config(IndexConfig::none());
        for i in 0..50 {
            let corr = Correspondence::new(
                format!("s{}", i % 7),
                format!("t{}", i % 11),
                if i % 2 == 0 {
                    Relation::Equivalence
                } else {
                    Relation::Subsumed
                },
                (i as f64) / 50.0,
            );
            indexed.add(corr.clone()).unwrap();
            scanned.add(corr).unwrap();
        }
        assert_eq!(
            indexed.correspondences_by_source("s3").len(),
            scanned.correspondences_by_source("s3").len()
        );
        assert_eq!(
            indexed.correspondences_by_target("t5").len(),
            scanned.correspondences_by_target("t5").len()
        );
        assert_eq!(
            indexed
                .correspondences_by_relation(Relation::Subsumed)
                .len(),
            scanned
                .correspondences_by_relation(Relation::Subsumed)
                .len()
        );
        assert_eq!(indexed.distinct_sources(), scanned.distinct_sources());
        assert_eq!(indexed.distinct_targets(), scanned.distinct_targets());
        assert_eq!(indexed.distinct_relations(), scanned.distinct_relations());
        assert_eq!(
            indexed.filter_by_confidence(0.5).len(),
            scanned.filter_by_confidence(0.5).len()
        );
    }

    #[test]
    fn indexed_lookup_cost_is_independent_of_member_count() {
        use std::time::{Duration, Instant};

        fn build(members: usize) -> Alignment {
            let mut a = Alignment::with_config(IndexConfig::all());
            for i in 0..members {
                a.add(c(&format!("s{i}"), &format!("t{i}"), (i % 100) as f64 / 100.0))
                    .unwrap();
            }
            a
        }

        fn time_lookups(a: &Alignment, queries: usize) -> Duration {
            let start = Instant::now();
            let mut hits = 0;
            for i in 0..queries {
                hits += a.correspondences_by_source(&format!("s{}", i % 1000)).len();
            }
            assert_eq!(hits, queries);
            start.elapsed()
        }

        let small = build(10_000);
        let big = build(100_000);
        let t_small = time_lookups(&small, 20_000);
        let t_big = time_lookups(&big, 20_000);

        // Ten times the members must not mean ten times the lookup cost;
        // allow generous noise headroom on the smaller run.
        let floor = Duration::from_millis(5);
        assert!(
            t_big < 4 * t_small.max(floor),
            "indexed lookups degraded with member count: {t_small:?} at 10k vs {t_big:?} at 100k"
        );
    }

    #[test]
    fn confidence_filter_boundary_is_inclusive() {
        // Ten confidence buckets 0.1..=1.0, ten correspondences each.
        let mut a = Alignment::with_config(IndexConfig::all());
        for bucket in 1..=10 {
            let conf = bucket as f64 / 10.0;
            for i in 0..10 {
                a.add(c(&format!("s{bucket}_{i}"), &format!("t{bucket}_{i}"), conf))
                    .unwrap();
            }
        }
        assert_eq!(a.len(), 100);

        // 0.96 keeps only the 1.0 bucket.
        let cut = a.filter_by_confidence(0.96);
        assert_eq!(cut.len(), 10);
        assert!(cut.iter().all(|c| c.confidence() >= 0.96));

        // Exactly on a bucket boundary keeps that bucket.
        let cut = a.filter_by_confidence(0.5);
        assert_eq!(cut.len(), 60);
    }

    #[test]
    fn filter_by_confidence_edge_thresholds() {
        let mut a = Alignment::new();
        a.add(c("s", "t", 0.0)).unwrap();
        a.add(c("s2", "t2", 1.0)).unwrap();
        assert_eq!(a.filter_by_confidence(0.0).len(), 2);
        assert_eq!(a.filter_by_confidence(1.0).len(), 1);
        assert_eq!(a.filter_by_confidence(1.5).len(), 0);
        assert_eq!(a.filter_by_confidence(-3.0).len(), 2);
    }

    #[test]
    fn occurring_confidences_sorted_and_distinct() {
        let mut a = Alignment::new();
        a.add(c("a", "b", 0.7)).unwrap();
        a.add(c("c", "d", 0.2)).unwrap();
        a.add(c("e", "f", 0.7)).unwrap();
        assert_eq!(a.occurring_confidences(), vec![0.2, 0.7]);
    }

    #[test]
    fn occurring_confidences_rounded_buckets_deterministically() {
        let mut a = Alignment::new();
        a.add(c("a", "b", 0.124)).unwrap();
        a.add(c("c", "d", 0.125)).unwrap();
        a.add(c("e", "f", 0.1251)).unwrap();
        let rounded = a.occurring_confidences_rounded(2).unwrap();
        assert_eq!(rounded, vec![0.12, 0.13]);

        assert!(a.occurring_confidences_rounded(0).is_err());
        assert!(a.occurring_confidences_rounded(11).is_err());
    }

    #[test]
    fn set_algebra() {
        let mut left = Alignment::new();
        left.add(c("a", "1", 0.9)).unwrap();
        left.add(c("b", "2", 0.8)).unwrap();
        let mut right = Alignment::new();
        right.add(c("b", "2", 0.1)).unwrap();
        right.add(c("d", "4", 0.7)).unwrap();

        let union = left.union(&right);
        assert_eq!(union.len(), 3);
        // Left operand wins on collision.
        assert_eq!(
            union
                .get_correspondence("b", "2", Relation::Equivalence)
                .unwrap()
                .confidence(),
            0.8
        );

        let inter = left.intersection(&right);
        assert_eq!(inter.len(), 1);
        assert!(inter
            .get_correspondence("b", "2", Relation::Equivalence)
            .is_some());

        let diff = left.subtraction(&right);
        assert_eq!(diff.len(), 1);
        assert!(diff
            .get_correspondence("a", "1", Relation::Equivalence)
            .is_some());

        left.remove_all(&right);
        assert_eq!(left, diff);
    }

    #[test]
    fn remove_updates_indices() {
        let mut a = Alignment::with_config(IndexConfig::all());
        let corr = Correspondence::new("s", "t", Relation::Subsume, 0.6);
        a.add(corr.clone()).unwrap();
        a.add(c("s", "t2", 0.4)).unwrap();

        let removed = a.remove(&corr.id()).unwrap();
        assert_eq!(removed.relation(), Relation::Subsume);
        assert_eq!(a.len(), 1);
        assert_eq!(a.correspondences_by_source("s").len(), 1);
        assert!(a.correspondences_by_relation(Relation::Subsume).is_empty());
        assert_eq!(a.filter_by_confidence(0.5).len(), 0);
        assert!(a.remove(&corr.id()).is_none());
    }

    #[test]
    fn reversed_alignment_round_trips() {
        let mut a = Alignment::new();
        a.add(Correspondence::new("x", "y", Relation::Subsumed, 0.3))
            .unwrap();
        a.add(Correspondence::new("p", "q", Relation::Equivalence, 0.9))
            .unwrap();
        let r = a.reversed();
        assert!(r
            .get_correspondence("y", "x", Relation::Subsume)
            .is_some());
        assert_eq!(r.reversed(), a);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut a = Alignment::new();
        for name in ["c", "a", "b"] {
            a.add(c(name, "t", 1.0)).unwrap();
        }
        // Re-adding must not move the entry.
        a.add(c("a", "t", 0.5)).unwrap();
        let order: Vec<&str> = a.iter().map(|c| c.source()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn collection_extensions_survive_serde() {
        let mut a = Alignment::new();
        a.set_extension("title", "anatomy reference v1");
        a.add(c("s", "t", 0.5)).unwrap();

        let json = serde_json::to_string(&a).unwrap();
        let back: Alignment = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extension("title"), Some("anatomy reference v1"));
        assert_eq!(back.len(), 1);
        assert_eq!(back, a);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_correspondences() -> impl Strategy<Value = Vec<(String, String, f64)>> {
            proptest::collection::vec(
                ("[a-d]{1,3}", "[w-z]{1,3}", 0.0f64..=1.0),
                1..40,
            )
        }

        proptest! {
            #[test]
            fn filter_matches_scan(entries in arb_correspondences(), threshold in 0.0f64..=1.0) {
                let mut indexed = Alignment::with_config(IndexConfig::all());
                for (s, t, conf) in &entries {
                    indexed.add(Correspondence::new(s.clone(), t.clone(), Relation::Equivalence, *conf)).unwrap();
                }
                let filtered = indexed.filter_by_confidence(threshold);
                let expected: usize = indexed.iter().filter(|c| c.confidence() >= threshold).count();
                prop_assert_eq!(filtered.len(), expected);
            }

            #[test]
            fn size_never_exceeds_distinct_ids(entries in arb_correspondences()) {
                let mut a = Alignment::new();
                let mut ids = std::collections::HashSet::new();
                for (s, t, conf) in entries {
                    let corr = Correspondence::new(s, t, Relation::Equivalence, conf);
                    ids.insert(corr.id());
                    a.add(corr).unwrap();
                }
                prop_assert_eq!(a.len(), ids.len());
            }
        }
    }
}
