//! Consensus roles: priority, status and environment

use std::collections::BTreeMap;

use crate::component::pod;
use crate::model::{
    AccessMode, ComponentStatus, ConsensusMemberStatus, ConsensusSetStatus, ConsensusSpec, Object,
};

pub const LEADER_PRIORITY: i32 = 1 << 5;
pub const FOLLOWER_READ_WRITE_PRIORITY: i32 = 1 << 4;
pub const FOLLOWER_READONLY_PRIORITY: i32 = 1 << 3;
pub const FOLLOWER_NONE_PRIORITY: i32 = 1 << 2;
pub const LEARNER_PRIORITY: i32 = 1 << 1;
pub const EMPTY_PRIORITY: i32 = 1;
pub const UNKNOWN_PRIORITY: i32 = 0;

/// Placeholder pod name for a leader slot nobody holds
pub const DEFAULT_POD_NAME: &str = "Unknown";

pub const ROLE_ENV_PREFIX: &str = "KB_";

/// Priority of a role label; absent or empty labels rank above unrecognized ones
pub fn role_priority(spec: &ConsensusSpec, role: Option<&str>) -> i32 {
    let Some(role) = role.filter(|r| !r.is_empty()) else {
        return EMPTY_PRIORITY;
    };
    if role == spec.leader.name {
        return LEADER_PRIORITY;
    }
    if let Some(follower) = spec.followers.iter().find(|f| f.name == role) {
        return match follower.access_mode {
            AccessMode::ReadWrite => FOLLOWER_READ_WRITE_PRIORITY,
            AccessMode::Readonly => FOLLOWER_READONLY_PRIORITY,
            AccessMode::None => FOLLOWER_NONE_PRIORITY,
        };
    }
    if spec.learner.as_ref().is_some_and(|l| l.name == role) {
        return LEARNER_PRIORITY;
    }
    UNKNOWN_PRIORITY
}

pub fn pod_priority(spec: &ConsensusSpec, p: &Object) -> i32 {
    role_priority(spec, pod::role(p))
}

/// Stable sort by ascending priority, ties broken by ordinal
pub fn sort_pods(spec: &ConsensusSpec, pods: &mut [Object]) {
    pods.sort_by_key(|p| (pod_priority(spec, p), pod::ordinal(p.name()).unwrap_or(i32::MAX)));
}

fn default_status(spec: &ConsensusSpec) -> ConsensusSetStatus {
    ConsensusSetStatus {
        leader: ConsensusMemberStatus {
            name: spec.leader.name.clone(),
            pod: DEFAULT_POD_NAME.to_string(),
            access_mode: spec.leader.access_mode,
        },
        followers: Vec::new(),
        learner: None,
    }
}

/// Clear whatever slot currently holds `pod_name`
fn reset_slot(status: &mut ConsensusSetStatus, pod_name: &str) {
    if status.leader.pod == pod_name {
        status.leader.pod = DEFAULT_POD_NAME.to_string();
    }
    status.followers.retain(|f| f.pod != pod_name);
    if status.learner.as_ref().is_some_and(|l| l.pod == pod_name) {
        status.learner = None;
    }
}

/// Place every ready, role-labeled pod into the consensus set status
///
/// Members whose pods no longer exist are dropped. Returns true when the
/// status changed.
pub fn sync_consensus_status(
    status: &mut ComponentStatus,
    spec: &ConsensusSpec,
    pods: &[Object],
) -> bool {
    let mut next = status
        .consensus_set_status
        .clone()
        .unwrap_or_else(|| default_status(spec));

    let present = |name: &str| pods.iter().any(|p| p.name() == name);
    if !present(&next.leader.pod) {
        next.leader.pod = DEFAULT_POD_NAME.to_string();
    }
    next.followers.retain(|f| present(&f.pod));
    if next.learner.as_ref().is_some_and(|l| !present(&l.pod)) {
        next.learner = None;
    }

    for p in pods.iter().filter(|p| pod::is_ready_with_role(p)) {
        let Some(role) = pod::role(p) else { continue };
        let name = p.name().to_string();
        reset_slot(&mut next, &name);

        if role == spec.leader.name {
            next.leader = ConsensusMemberStatus {
                name: role.to_string(),
                pod: name,
                access_mode: spec.leader.access_mode,
            };
        } else if let Some(follower) = spec.followers.iter().find(|f| f.name == role) {
            next.followers.push(ConsensusMemberStatus {
                name: role.to_string(),
                pod: name,
                access_mode: follower.access_mode,
            });
        } else if let Some(learner) = spec.learner.as_ref().filter(|l| l.name == role) {
            next.learner = Some(ConsensusMemberStatus {
                name: role.to_string(),
                pod: name,
                access_mode: learner.access_mode,
            });
        }
    }
    next.followers.sort_by(|a, b| a.pod.cmp(&b.pod));

    if status.consensus_set_status.as_ref() == Some(&next) {
        return false;
    }
    status.consensus_set_status = Some(next);
    true
}

fn env_prefix(component: &str) -> String {
    format!(
        "{}{}",
        ROLE_ENV_PREFIX,
        component.to_uppercase().replace('-', "_")
    )
}

/// `KB_<COMP>_LEADER` and `KB_<COMP>_FOLLOWERS` for the environment config
pub fn role_env(component: &str, status: &ConsensusSetStatus) -> BTreeMap<String, String> {
    let prefix = env_prefix(component);
    let leader = if status.leader.pod == DEFAULT_POD_NAME {
        String::new()
    } else {
        status.leader.pod.clone()
    };
    let followers = status
        .followers
        .iter()
        .map(|f| f.pod.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let mut env = BTreeMap::new();
    env.insert(format!("{}_LEADER", prefix), leader);
    env.insert(format!("{}_FOLLOWERS", prefix), followers);
    env
}
