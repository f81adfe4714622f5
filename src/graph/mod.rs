//! Directed acyclic graph used to describe a target object set
//!
//! The DAG holds opaque vertices and ordered edges. It is single-rooted when
//! valid, and offers topological, reverse-topological and level-order walks.

pub mod dag;
pub mod errors;

pub use dag::{Comparator, Dag, Edge, VertexId};
pub use errors::GraphError;
