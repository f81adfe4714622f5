//! Error types for DAG validation and walks

use std::fmt;

use super::VertexId;

/// Errors raised when a DAG is malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No vertex has zero in-degree
    NoRoot,

    /// More than one vertex has zero in-degree
    MultipleRoots { count: usize },

    /// An edge points from a vertex to itself
    SelfCycle { vertex: VertexId },

    /// A cycle was found while walking from the root
    Cycle { vertex: VertexId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::NoRoot => write!(f, "no root vertex found"),
            GraphError::MultipleRoots { count } => {
                write!(f, "found {} root vertices, expected exactly one", count)
            }
            GraphError::SelfCycle { vertex } => {
                write!(f, "self-cycle found on vertex {}", vertex)
            }
            GraphError::Cycle { vertex } => write!(f, "cycle detected at vertex {}", vertex),
        }
    }
}

impl std::error::Error for GraphError {}
