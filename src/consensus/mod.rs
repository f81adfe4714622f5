//! Role tracking and quorum-safe updates for role-bearing workloads
//!
//! Roles are written to pod labels by an external probe. This module maps
//! them through the declared role spec, publishes them to status and to the
//! component's environment, and plans pod replacement so that write quorum
//! is never lost.

pub mod replication;
pub mod role;
pub mod update_plan;

pub use role::{
    role_env, role_priority, sort_pods, sync_consensus_status, DEFAULT_POD_NAME, ROLE_ENV_PREFIX,
};
pub use update_plan::{plan_pod_restarts, rollout_converged, StepOutcome, UpdatePlan, WalkResult};
