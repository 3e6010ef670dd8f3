//! Hierarchy-aware alignment enhancement.
//!
//! When reference correspondences carry hierarchical relations, a mapping of
//! one relation type entails further mappings once combined with the class
//! hierarchies of the two ontologies (A subsumed-by B and B equivalent-to C
//! entails A subsumed-by C). Scoring a raw system alignment against a raw
//! reference would count those entailed mappings as spurious false
//! positives/negatives, so both sides can be expanded with
//! [`enhance_alignment`] before the confusion matrix is computed.
//!
//! The expansion is idempotent: enhancing an already-enhanced alignment
//! against the same hierarchies returns an equal alignment. Where both
//! subsumption directions become derivable for an entity pair, an
//! [`Relation::Equivalence`] correspondence is added as well; equivalence
//! dominates the directional relations when consumers need a single verdict
//! per pair.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::alignment::Alignment;
use crate::correspondence::{Correspondence, Relation};

/// Read-only view of one ontology's class hierarchy.
///
/// Implementations are external collaborators (an RDF model, a database);
/// [`InMemoryHierarchy`] serves in-process use and tests.
pub trait ClassHierarchy {
    /// Whether the ontology contains the given class URI.
    fn contains(&self, uri: &str) -> bool;

    /// `(subclass, superclass)` edges.
    fn subclass_edges(&self) -> Vec<(String, String)>;

    /// Pairs of equivalent classes.
    fn equivalence_edges(&self) -> Vec<(String, String)>;
}

/// A class hierarchy held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHierarchy {
    classes: HashSet<String>,
    subclass: Vec<(String, String)>,
    equivalent: Vec<(String, String)>,
}

impl InMemoryHierarchy {
    /// Empty hierarchy.
    pub fn new() -> Self {
        InMemoryHierarchy::default()
    }

    /// Register a class without edges.
    pub fn add_class(&mut self, uri: impl Into<String>) {
        self.classes.insert(uri.into());
    }

    /// Register a `(subclass, superclass)` edge; both classes are added.
    pub fn add_subclass(&mut self, sub: impl Into<String>, sup: impl Into<String>) {
        let (sub, sup) = (sub.into(), sup.into());
        self.classes.insert(sub.clone());
        self.classes.insert(sup.clone());
        self.subclass.push((sub, sup));
    }

    /// Register an equivalence edge; both classes are added.
    pub fn add_equivalence(&mut self, a: impl Into<String>, b: impl Into<String>) {
        let (a, b) = (a.into(), b.into());
        self.classes.insert(a.clone());
        self.classes.insert(b.clone());
        self.equivalent.push((a, b));
    }
}

impl ClassHierarchy for InMemoryHierarchy {
    fn contains(&self, uri: &str) -> bool {
        self.classes.contains(uri)
    }

    fn subclass_edges(&self) -> Vec<(String, String)> {
        self.subclass.clone()
    }

    fn equivalence_edges(&self) -> Vec<(String, String)> {
        self.equivalent.clone()
    }
}

/// Expand an alignment by transitively propagating subsumption and
/// equivalence along the subclass edges of both ontologies.
///
/// All input correspondences are kept unchanged; derived correspondences are
/// added with confidence 1.0 and only where the entity pair is not already
/// mapped with that relation. Derived mappings always run from a source-side
/// entity to a target-side entity.
pub fn enhance_alignment(
    source: &dyn ClassHierarchy,
    target: &dyn ClassHierarchy,
    alignment: &Alignment,
) -> Alignment {
    // edges[x] = everything x is a subclass of (equivalence in both
    // directions).
    let mut edges: HashMap<String, HashSet<String>> = HashMap::new();
    let mut edge = |from: &str, to: &str| {
        edges
            .entry(from.to_owned())
            .or_default()
            .insert(to.to_owned());
    };

    let mut enhanced = alignment.clone();
    for c in alignment.iter() {
        match c.relation() {
            Relation::Equivalence => {
                edge(c.source(), c.target());
                edge(c.target(), c.source());
            }
            // Source is the superclass: target is below it.
            Relation::Subsume => edge(c.target(), c.source()),
            // Source is the subclass.
            Relation::Subsumed => edge(c.source(), c.target()),
            _ => {}
        }
        if !source.contains(c.source()) {
            log::warn!(
                "correspondence source not found in source ontology: {}",
                c.source()
            );
        }
        if !target.contains(c.target()) {
            log::warn!(
                "correspondence target not found in target ontology: {}",
                c.target()
            );
        }
    }
    for (sub, sup) in source.subclass_edges().into_iter().chain(target.subclass_edges()) {
        edge(&sub, &sup);
    }
    for (a, b) in source
        .equivalence_edges()
        .into_iter()
        .chain(target.equivalence_edges())
    {
        edge(&a, &b);
        edge(&b, &a);
    }

    let starts: Vec<String> = edges.keys().cloned().collect();
    for start in starts {
        let start_in_source = source.contains(&start);
        let start_in_target = target.contains(&start);
        if !start_in_source && !start_in_target {
            log::warn!("class {start} occurs in neither ontology, skipping");
            continue;
        }
        for reachable in bfs(&edges, &start) {
            let reachable_in_source = source.contains(&reachable);
            let reachable_in_target = target.contains(&reachable);
            if !reachable_in_source && !reachable_in_target {
                log::warn!("class {reachable} occurs in neither ontology, skipping");
                continue;
            }
            // start is below reachable.
            if start_in_source && reachable_in_target {
                add_if_absent(&mut enhanced, &start, &reachable, Relation::Subsumed);
            }
            if reachable_in_source && start_in_target {
                add_if_absent(&mut enhanced, &reachable, &start, Relation::Subsume);
            }
        }
    }

    // Where both directions are derivable, equivalence holds and dominates.
    let mut equivalences = Vec::new();
    for c in enhanced.iter() {
        let counterpart = match c.relation() {
            Relation::Subsume => Relation::Subsumed,
            Relation::Subsumed => Relation::Subsume,
            _ => continue,
        };
        if enhanced
            .get_correspondence(c.source(), c.target(), counterpart)
            .is_some()
        {
            equivalences.push((c.source().to_owned(), c.target().to_owned()));
        }
    }
    for (s, t) in equivalences {
        add_if_absent(&mut enhanced, &s, &t, Relation::Equivalence);
    }

    enhanced
}

fn add_if_absent(alignment: &mut Alignment, source: &str, target: &str, relation: Relation) {
    if alignment.get_correspondence(source, target, relation).is_none() {
        if let Err(e) = alignment.add(Correspondence::new(source, target, relation, 1.0)) {
            log::warn!("dropping derived correspondence: {e}");
        }
    }
}

/// All nodes reachable from `start` along `edges`, excluding `start` itself.
fn bfs(edges: &HashMap<String, HashSet<String>>, start: &str) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    let mut reachable = Vec::new();
    while let Some(current) = queue.pop_front() {
        if let Some(successors) = edges.get(current) {
            for succ in successors {
                if visited.insert(succ) {
                    reachable.push(succ.clone());
                    queue.push_back(succ);
                }
            }
        }
    }
    reachable
}
