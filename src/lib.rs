//! Familiar Datatypes
//!
//! Canonicalization and deduplication of message datatype graphs declared by
//! many independent topics.
//!
//! ## Features
//!
//! - **Closure Extraction**: The minimal sub-catalog that transitively defines a set of datatypes
//! - **Structural Keys**: Name-independent identity of a datatype graph
//! - **Canonical Names**: Identical graphs share one generated name, distinct graphs never collide
//! - **Batching**: Topics with identical declarations are processed once
//!
//! ## Architecture
//!
//! ```text
//! Source ──local_catalog──▶ Catalog ──closure──▶ sub-Catalog ──▶ StructuralKey
//!                                                                    │
//!                              CanonicalBatch ◀──rewrite── NameGenerator
//! ```
//!
//! ## Example
//!
//! ```
//! use familiar_datatypes::{
//!     BatchCounter, CanonicalizeOptions, Canonicalizer, FieldDescriptor, Source, TypeDeclaration,
//! };
//!
//! let sources = vec![
//!     Source::new("/foo", "R", vec![TypeDeclaration::root(vec![FieldDescriptor::primitive("v", "float64")])]),
//!     Source::new("/bar", "S", vec![TypeDeclaration::root(vec![FieldDescriptor::primitive("v", "float64")])]),
//! ];
//! let counter = BatchCounter::new();
//! let batch = Canonicalizer::with_counter(CanonicalizeOptions::default(), &counter).canonicalize(&sources);
//! assert_eq!(batch.name_of("/foo"), batch.name_of("/bar"));
//! ```

pub mod canonical;
pub mod config;
pub mod datatype;
pub mod error;
pub mod graph;
pub mod loader;

pub use canonical::{
    explain_difference, reset_batch_counter, BatchCounter, BatchStats, CanonicalBatch,
    CanonicalizeOptions, Canonicalizer, GroupFailure, NameGenerator, NameMapping, StructuralKey,
};
pub use config::CanonConfig;
pub use datatype::{Catalog, FieldDescriptor, Source, TypeDeclaration, TypeDefinition, TypeName};
pub use error::{DatatypeError, Result};
pub use graph::{closure, closure_with_policy, CyclePolicy, ReferenceGraph};
