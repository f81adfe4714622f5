//! Component phase state machine
//!
//! [`next_phase`] is the pure core: the same inputs always produce the same
//! phase. [`evaluate_phase`] gathers those inputs from an observation, keeps
//! the pods-ready clock and the per-object messages, and suggests when to
//! look again.

use std::time::{Duration, SystemTime};

use super::pod;
use super::workload::{Observation, WorkloadHandler};
use crate::model::{ComponentPhase, ComponentStatus, MessageMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseInputs {
    pub is_running: bool,
    pub pods_ready: bool,
    pub replicas: i32,
    /// Pods stayed ready past the role-probe timeout
    pub probe_timed_out: bool,
    /// Verdict of the role check once the probe timed out
    pub probe_phase: Option<ComponentPhase>,
    /// Some pod has been failing longer than allowed
    pub failed_pod_timed_out: bool,
    /// Verdict for unready pods
    pub not_ready_phase: Option<ComponentPhase>,
}

/// Returns the new phase, or None to keep the current one
pub fn next_phase(inputs: &PhaseInputs) -> Option<ComponentPhase> {
    if inputs.is_running {
        return Some(if inputs.replicas == 0 {
            ComponentPhase::Stopped
        } else {
            ComponentPhase::Running
        });
    }
    if inputs.pods_ready {
        return if inputs.probe_timed_out {
            inputs.probe_phase
        } else {
            None
        };
    }
    if inputs.failed_pod_timed_out {
        return inputs.not_ready_phase;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub role_probe: Duration,
    pub pod_failed: Duration,
    /// Delay suggested while waiting on a pending condition
    pub requeue: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseDecision {
    pub phase: Option<ComponentPhase>,
    pub messages: MessageMap,
    pub pods_ready: bool,
    pub pods_ready_time: Option<SystemTime>,
    pub requeue_after: Option<Duration>,
}

impl PhaseDecision {
    /// Fold this decision into a component status; returns the previous phase if it changed
    pub fn apply_to(&self, status: &mut ComponentStatus) -> Option<ComponentPhase> {
        let previous = status.phase;
        if let Some(phase) = self.phase {
            status.phase = phase;
        }
        status.message = self.messages.clone();
        status.pods_ready = Some(self.pods_ready);
        status.pods_ready_time = self.pods_ready_time;
        (previous != status.phase).then_some(previous)
    }
}

fn min_delay(current: Option<Duration>, candidate: Duration) -> Option<Duration> {
    Some(current.map_or(candidate, |c| c.min(candidate)))
}

pub fn evaluate_phase(
    handler: &WorkloadHandler,
    obs: &Observation<'_>,
    status: &ComponentStatus,
    timeouts: PhaseTimeouts,
    now: SystemTime,
) -> PhaseDecision {
    let is_running = handler.is_running(obs);
    let pods_ready = handler.pods_ready(obs);
    let pods_ready_time = if pods_ready {
        status.pods_ready_time.or(Some(now))
    } else {
        None
    };

    let mut inputs = PhaseInputs {
        is_running,
        pods_ready,
        replicas: obs.replicas,
        probe_timed_out: false,
        probe_phase: None,
        failed_pod_timed_out: false,
        not_ready_phase: None,
    };
    let mut messages = if is_running {
        MessageMap::new()
    } else {
        status.message.clone()
    };
    let mut requeue_after = None;

    if !is_running && pods_ready {
        if handler.has_roles() {
            let since = pods_ready_time.unwrap_or(now);
            let elapsed = now.duration_since(since).unwrap_or_default();
            if elapsed >= timeouts.role_probe {
                let (phase, probe_messages) = handler.probe_timeout_phase(obs);
                inputs.probe_timed_out = true;
                inputs.probe_phase = phase;
                messages.extend(probe_messages);
            } else {
                let remaining = timeouts.role_probe - elapsed;
                requeue_after = min_delay(requeue_after, remaining.min(timeouts.requeue));
            }
        } else {
            // Waiting for the workload's own rollout to converge.
            requeue_after = min_delay(requeue_after, timeouts.requeue);
        }
    } else if !is_running {
        for p in obs.pods {
            let Some(failure) = pod::failure(p, now, timeouts.pod_failed) else {
                continue;
            };
            if failure.timed_out {
                inputs.failed_pod_timed_out = true;
                messages.insert(p.key().message_key(), failure.message);
            } else {
                requeue_after = min_delay(requeue_after, failure.remaining);
            }
        }
        if inputs.failed_pod_timed_out {
            inputs.not_ready_phase = handler.phase_when_pods_not_ready(obs);
        }
    }

    PhaseDecision {
        phase: next_phase(&inputs),
        messages,
        pods_ready,
        pods_ready_time,
        requeue_after,
    }
}
