//! Error types for the reconciliation engine

use std::time::Duration;

use thiserror::Error;

use crate::graph::GraphError;
use crate::model::ObjectKey;
use crate::store::StoreError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Delay applied after an optimistic-concurrency conflict
pub const CONFLICT_REQUEUE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum Error {
    /// A self-resolving condition; retry after `delay`
    #[error("requeue after {delay:?}: {reason}")]
    Requeue { reason: String, delay: Duration },

    /// Stop building and execute whatever plan exists
    #[error("fast return")]
    FastReturn,

    /// Malformed plan graph
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Object store failure
    #[error("store error: {0}")]
    Store(StoreError),

    /// A vertex reached execution without a resolved action
    #[error("vertex {0} has no resolved action")]
    UnresolvedAction(ObjectKey),

    /// The root Cluster vertex may only be patched, deleted or left alone
    #[error("cluster {0} can't be created or updated by a plan")]
    ClusterMutation(String),

    /// Precheck rejected the Cluster
    #[error("validation failed: {0}")]
    Validation(String),

    /// Scaling in would remove the consensus leader
    #[error("can't scale in component {component}: pod {pod} is the current leader")]
    LeaderScaleIn { component: String, pod: String },

    /// Malformed input
    #[error("invalid: {0}")]
    Invalid(String),

    /// Unreadable configuration
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn requeue(reason: impl Into<String>, delay: Duration) -> Self {
        Error::Requeue {
            reason: reason.into(),
            delay,
        }
    }

    pub fn is_requeue(&self) -> bool {
        matches!(self, Error::Requeue { .. })
    }

    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Error::Requeue { delay, .. } => Some(*delay),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Error::Requeue {
                reason: err.to_string(),
                delay: CONFLICT_REQUEUE_DELAY,
            },
            other => Error::Store(other),
        }
    }
}
