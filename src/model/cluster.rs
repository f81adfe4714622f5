//! The Cluster custom resource: declared spec and observed status

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::definition::AccessMode;

/// Per-object messages keyed by `Kind/name`
pub type MessageMap = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterData {
    pub spec: ClusterSpec,
    #[serde(default)]
    pub status: ClusterStatus,
}

/// What happens to owned data when the Cluster is deleted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationPolicy {
    /// Deletion is blocked
    DoNotTerminate,
    /// Workloads go, volume claims stay
    Halt,
    /// Volume claims go too
    #[default]
    Delete,
    /// Everything goes, including backups not marked for retention
    WipeOut,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub definition_ref: String,
    #[serde(default)]
    pub version_ref: Option<String>,
    #[serde(default)]
    pub termination_policy: TerminationPolicy,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl ClusterSpec {
    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsIssuer {
    /// Certificates are generated and stored in an owned secret
    Operator,
    /// Certificates live in a secret the user maintains
    UserProvided { secret_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSpec {
    pub issuer: TlsIssuer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub size_bytes: u64,
    #[serde(default)]
    pub storage_class: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSpec {
    pub name: String,
    /// Name of the component definition inside the ClusterDefinition
    pub definition_ref: String,
    pub replicas: i32,
    pub tls: Option<TlsSpec>,
    pub volume: Option<VolumeSpec>,
    /// Changing this token restarts every pod of the component
    pub restart_token: Option<String>,
    /// Preferred primary ordinal for replication components
    pub primary_index: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterPhase {
    Creating,
    Running,
    Updating,
    Stopped,
    Deleting,
    Failed,
    Abnormal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentPhase {
    Creating,
    Updating,
    Running,
    Stopped,
    Rebooting,
    Abnormal,
    Failed,
}

impl ComponentPhase {
    /// Phases in which the component is expected to be serving or intentionally idle
    pub fn is_up(&self) -> bool {
        matches!(self, ComponentPhase::Running | ComponentPhase::Stopped)
    }

    pub fn is_failing(&self) -> bool {
        matches!(self, ComponentPhase::Abnormal | ComponentPhase::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: bool,
    pub reason: String,
    pub message: String,
    pub observed_generation: i64,
    pub last_transition_time: Option<SystemTime>,
}

impl Condition {
    pub fn new(type_: &str, status: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_: type_.to_string(),
            status,
            reason: reason.to_string(),
            message: message.into(),
            observed_generation: 0,
            last_transition_time: None,
        }
    }
}

pub mod condition_types {
    pub const PROVISIONING_STARTED: &str = "ProvisioningStarted";
    pub const APPLY_RESOURCES: &str = "ApplyResources";
    pub const REPLICAS_READY: &str = "ReplicasReady";
    pub const READY: &str = "Ready";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMemberStatus {
    /// Role name as declared by the component definition
    pub name: String,
    pub pod: String,
    pub access_mode: AccessMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSetStatus {
    pub leader: ConsensusMemberStatus,
    #[serde(default)]
    pub followers: Vec<ConsensusMemberStatus>,
    #[serde(default)]
    pub learner: Option<ConsensusMemberStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationMemberStatus {
    pub pod: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationSetStatus {
    pub primary: ReplicationMemberStatus,
    #[serde(default)]
    pub secondaries: Vec<ReplicationMemberStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub phase: ComponentPhase,
    #[serde(default)]
    pub message: MessageMap,
    #[serde(default)]
    pub pods_ready: Option<bool>,
    #[serde(default)]
    pub pods_ready_time: Option<SystemTime>,
    #[serde(default)]
    pub consensus_set_status: Option<ConsensusSetStatus>,
    #[serde(default)]
    pub replication_set_status: Option<ReplicationSetStatus>,
}

impl ComponentStatus {
    pub fn new(phase: ComponentPhase) -> Self {
        Self {
            phase,
            message: MessageMap::new(),
            pods_ready: None,
            pods_ready_time: None,
            consensus_set_status: None,
            replication_set_status: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStatus {
    pub phase: Option<ClusterPhase>,
    pub observed_generation: i64,
    pub message: String,
    pub conditions: Vec<Condition>,
    pub components: BTreeMap<String, ComponentStatus>,
}

impl ClusterStatus {
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Insert or replace a condition, keeping the transition time when status is unchanged
    pub fn set_condition(&mut self, mut condition: Condition, now: SystemTime) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                condition.last_transition_time = if existing.status == condition.status {
                    existing.last_transition_time
                } else {
                    Some(now)
                };
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(now);
                self.conditions.push(condition);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_condition_tracks_transitions() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = t0 + Duration::from_secs(10);
        let t2 = t1 + Duration::from_secs(10);
        let mut status = ClusterStatus::default();

        status.set_condition(Condition::new("Ready", false, "NotReady", "waiting"), t0);
        status.set_condition(Condition::new("Ready", false, "NotReady", "still waiting"), t1);
        let ready = status.condition("Ready").unwrap();
        assert_eq!(ready.last_transition_time, Some(t0));
        assert_eq!(ready.message, "still waiting");

        status.set_condition(Condition::new("Ready", true, "Ready", ""), t2);
        assert_eq!(status.condition("Ready").unwrap().last_transition_time, Some(t2));
        assert_eq!(status.conditions.len(), 1);
    }
}
