//! Reconciliation engine for database Clusters
//!
//! A Cluster declares components; each reconcile turns that declaration and
//! the live platform objects into a lifecycle DAG of create, update, delete
//! and status actions, then applies it in dependency order.

pub mod component;
pub mod config;
pub mod consensus;
pub mod error;
pub mod event;
pub mod graph;
pub mod model;
pub mod plan;
pub mod reconciler;
pub mod store;
pub mod transformers;

#[cfg(test)]
mod testing;

pub use config::ReconcilerConfig;
pub use error::{Error, Result};
pub use event::{ClusterEvent, EventBus, EventType};
pub use graph::{Dag, GraphError, VertexId};
pub use plan::{Action, ClusterPlanBuilder, LifecycleVertex, Plan, Transformer, TransformerChain};
pub use reconciler::{ClusterReconciler, ReconcileOutcome};
pub use store::{InMemoryStore, ObjectStore, StoreError};
