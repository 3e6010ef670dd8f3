//! # matcheval
//!
//! Evaluation core for ontology and knowledge-graph matching: indexed
//! correspondence sets, confusion-matrix metrics with micro/macro
//! aggregation, hierarchy-aware alignment expansion, pairwise matcher
//! similarity, and McNemar significance testing.
//!
//! ## Model
//!
//! - [`Correspondence`]: one proposed mapping `(source, target, relation,
//!   confidence)`; identity covers the triple only, so confidence updates
//!   never duplicate entries.
//! - [`Alignment`]: a deduplicated correspondence set with construction-time
//!   index selection ([`IndexConfig`]) over source, target, relation, and
//!   confidence, plus the set algebra evaluation needs.
//! - [`TestCase`] / [`ExecutionResult`]: one matching problem and one
//!   matcher's output on it; results are the memoization keys for metrics.
//!
//! ## Quick start
//!
//! ```rust
//! use matcheval::{Alignment, Correspondence, ExecutionResult, TestCase};
//! use matcheval::eval::confusion::ConfusionMatrixMetric;
//!
//! let mut reference = Alignment::new();
//! reference.add(Correspondence::equivalence("http://a#Cat", "http://b#Feline"))?;
//! let mut system = Alignment::new();
//! system.add(Correspondence::equivalence("http://a#Cat", "http://b#Feline"))?;
//!
//! let test_case = TestCase::new("animals", "cats", reference);
//! let result = ExecutionResult::new(test_case, "my-matcher", system);
//!
//! let metric = ConfusionMatrixMetric::new();
//! let matrix = metric.compute(&result);
//! assert_eq!(matrix.f1(), 1.0);
//! # Ok::<(), matcheval::Error>(())
//! ```
//!
//! ## Scope
//!
//! Ontology loading, alignment file parsing, and report rendering are
//! external collaborators: this crate consumes already-parsed alignments and
//! produces result values for report writers to persist. No operation here
//! performs I/O.
//!
//! Alignments are not thread-safe for concurrent mutation; fully-built
//! alignments and all metric types are safe to share across readers.

#![warn(missing_docs)]

mod alignment;
mod correspondence;
mod error;
mod execution;
pub mod eval;

pub use alignment::{Alignment, IndexConfig};
pub use correspondence::{Correspondence, CorrespondenceId, Relation};
pub use error::{Error, Result};
pub use execution::{ExecutionResult, ExecutionResultSet, TestCase};
