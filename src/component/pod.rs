//! Helpers for reading pod observations

use std::time::{Duration, SystemTime};

use crate::model::{labels, Object, PodConditionType, PodPhase};

/// Ordinal parsed from a generated pod name such as `mycluster-db-2`
pub fn ordinal(name: &str) -> Option<i32> {
    name.rsplit_once('-').and_then(|(_, n)| n.parse().ok())
}

pub fn is_ready(pod: &Object) -> bool {
    pod.as_pod().map(|p| p.is_ready()).unwrap_or(false)
}

pub fn is_terminating(pod: &Object) -> bool {
    pod.meta.is_deleting()
}

/// Role label written by the probe; empty labels count as absent
pub fn role(pod: &Object) -> Option<&str> {
    pod.label(labels::ROLE).filter(|r| !r.is_empty())
}

pub fn is_ready_with_role(pod: &Object) -> bool {
    is_ready(pod) && role(pod).is_some()
}

pub fn revision(pod: &Object) -> Option<&str> {
    pod.label(labels::POD_REVISION)
}

/// A pod that is failing to start or run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodFailure {
    pub message: String,
    /// The failure outlasted the allowed timeout
    pub timed_out: bool,
    /// Time left before it does
    pub remaining: Duration,
}

/// Inspect a pod for scheduling or container failures
///
/// The failure clock starts at the last transition of the Ready condition,
/// falling back to the scheduling condition and then the pod's creation.
pub fn failure(pod: &Object, now: SystemTime, timeout: Duration) -> Option<PodFailure> {
    let data = pod.as_pod()?;
    if data.is_ready() || is_terminating(pod) {
        return None;
    }

    let unscheduled = data
        .condition(PodConditionType::PodScheduled)
        .filter(|c| !c.status);
    let message = if let Some(cond) = unscheduled {
        format!("Failed to schedule: {}", cond.message)
    } else if data.phase == PodPhase::Failed {
        "Pod failed".to_string()
    } else if let Some(reason) = data.containers.iter().find_map(|c| {
        c.waiting_reason
            .as_ref()
            .filter(|r| r.as_str() != "ContainerCreating" && r.as_str() != "PodInitializing")
            .or(c.terminated_reason.as_ref())
    }) {
        format!("Container failed: {}", reason)
    } else {
        return None;
    };

    let since = data
        .condition(PodConditionType::Ready)
        .and_then(|c| c.last_transition_time)
        .or_else(|| unscheduled.and_then(|c| c.last_transition_time))
        .or(pod.meta.creation_timestamp);
    let elapsed = since
        .and_then(|t| now.duration_since(t).ok())
        .unwrap_or_default();
    Some(PodFailure {
        message,
        timed_out: elapsed >= timeout,
        remaining: timeout.saturating_sub(elapsed),
    })
}
