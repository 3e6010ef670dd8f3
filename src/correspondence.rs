//! Correspondences: single proposed mappings between two ontology entities.
//!
//! A [`Correspondence`] pairs one source entity with one target entity under
//! a [`Relation`], with a confidence in `[0.0, 1.0]` and an open-ended
//! extension map for provenance metadata.
//!
//! Identity is deliberately narrower than the full value: two correspondences
//! are the same mapping when they agree on `(source, target, relation)`.
//! Confidence and extensions never participate in equality or hashing, so a
//! mapping re-discovered by a different matcher (or re-added with an updated
//! confidence) is recognized as the same entry. [`CorrespondenceId`] is the
//! key type realizing that identity.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Relation
// =============================================================================

/// The semantic relation asserted between the source and target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Relation {
    /// Source and target denote the same concept (`=`).
    Equivalence,
    /// Source is more general than target (`>`).
    Subsume,
    /// Source is more specific than target (`<`).
    Subsumed,
    /// Source is an instance of target.
    InstanceOf,
    /// Source has target as an instance.
    HasInstance,
    /// Source and target are related in an unspecified way (`%`).
    Related,
    /// Source and target are close but not equivalent.
    Close,
    /// Source and target are known to be incompatible.
    Incompatible,
    /// Relation could not be determined (`?`).
    Unknown,
}

impl Relation {
    /// All relation variants.
    pub fn all() -> &'static [Relation] {
        &[
            Relation::Equivalence,
            Relation::Subsume,
            Relation::Subsumed,
            Relation::InstanceOf,
            Relation::HasInstance,
            Relation::Related,
            Relation::Close,
            Relation::Incompatible,
            Relation::Unknown,
        ]
    }

    /// The canonical surface label for this relation.
    pub fn label(&self) -> &'static str {
        match self {
            Relation::Equivalence => "=",
            Relation::Subsume => ">",
            Relation::Subsumed => "<",
            Relation::InstanceOf => "InstanceOf",
            Relation::HasInstance => "HasInstance",
            Relation::Related => "%",
            Relation::Close => "~",
            Relation::Incompatible => "%incompatible",
            Relation::Unknown => "?",
        }
    }

    /// Parse a surface label. Unrecognized labels map to [`Relation::Unknown`].
    pub fn from_label(label: &str) -> Relation {
        match label.trim() {
            "=" | "equivalence" | "EQ" => Relation::Equivalence,
            ">" | "subsume" => Relation::Subsume,
            "<" | "subsumed" => Relation::Subsumed,
            "InstanceOf" | "instanceOf" => Relation::InstanceOf,
            "HasInstance" | "hasInstance" => Relation::HasInstance,
            "%" | "related" => Relation::Related,
            "~" | "close" => Relation::Close,
            "%incompatible" | "incompatible" => Relation::Incompatible,
            _ => Relation::Unknown,
        }
    }

    /// The relation that holds when source and target are swapped.
    ///
    /// Directional variants flip (`Subsume` <-> `Subsumed`,
    /// `InstanceOf` <-> `HasInstance`); symmetric variants are unchanged.
    #[must_use]
    pub fn reverse(&self) -> Relation {
        match self {
            Relation::Subsume => Relation::Subsumed,
            Relation::Subsumed => Relation::Subsume,
            Relation::InstanceOf => Relation::HasInstance,
            Relation::HasInstance => Relation::InstanceOf,
            other => *other,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Correspondence
// =============================================================================

/// Identity key of a correspondence: `(source, target, relation)`.
///
/// Confidence and extensions are excluded on purpose, so that re-adding a
/// mapping with a different confidence hits the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrespondenceId {
    /// Source entity URI.
    pub source: String,
    /// Target entity URI.
    pub target: String,
    /// Asserted relation.
    pub relation: Relation,
}

/// A single proposed mapping between a source and a target entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correspondence {
    source: String,
    target: String,
    relation: Relation,
    confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extensions: BTreeMap<String, String>,
}

impl Correspondence {
    /// Create a correspondence. Confidence is clamped to `[0.0, 1.0]`
    /// (NaN clamps to 0.0).
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: Relation,
        confidence: f64,
    ) -> Self {
        Correspondence {
            source: source.into(),
            target: target.into(),
            relation,
            confidence: clamp_confidence(confidence),
            extensions: BTreeMap::new(),
        }
    }

    /// Equivalence correspondence with confidence 1.0.
    pub fn equivalence(source: impl Into<String>, target: impl Into<String>) -> Self {
        Correspondence::new(source, target, Relation::Equivalence, 1.0)
    }

    /// Source entity URI.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Target entity URI.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Asserted relation.
    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// Confidence in `[0.0, 1.0]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Replace the confidence (clamped to `[0.0, 1.0]`).
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_confidence(confidence);
    }

    /// Extension metadata (provenance, explanations, ...).
    pub fn extensions(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }

    /// Attach an extension value, builder style.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Set an extension value.
    pub fn set_extension(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extensions.insert(key.into(), value.into());
    }

    /// Look up an extension value.
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }

    /// The identity key `(source, target, relation)` of this correspondence.
    pub fn id(&self) -> CorrespondenceId {
        CorrespondenceId {
            source: self.source.clone(),
            target: self.target.clone(),
            relation: self.relation,
        }
    }

    /// The mapping seen from the other side: source and target swapped,
    /// relation reversed. Confidence and extensions are preserved.
    #[must_use]
    pub fn reversed(&self) -> Correspondence {
        Correspondence {
            source: self.target.clone(),
            target: self.source.clone(),
            relation: self.relation.reverse(),
            confidence: self.confidence,
            extensions: self.extensions.clone(),
        }
    }
}

/// Equality over `(source, target, relation)` only.
impl PartialEq for Correspondence {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.relation == other.relation
    }
}

impl Eq for Correspondence {}

impl std::hash::Hash for Correspondence {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.target.hash(state);
        self.relation.hash(state);
    }
}

impl fmt::Display for Correspondence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {} {} ({:.3})>",
            self.source, self.relation, self.target, self.confidence
        )
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return 0.0;
    }
    let clamped = confidence.clamp(0.0, 1.0);
    // Normalize -0.0: confidence bit patterns key the confidence index.
    if clamped == 0.0 {
        0.0
    } else {
        clamped
    }
}
