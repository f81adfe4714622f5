//! Workload, pod and volume claim payloads as observed on the platform

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::cluster::VolumeSpec;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadUpdateStrategy {
    #[default]
    RollingUpdate,
    /// Pods are only replaced when deleted, leaving ordering to the engine
    OnDelete,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSpec {
    pub replicas: i32,
    pub image: String,
    pub ports: Vec<u16>,
    pub update_strategy: WorkloadUpdateStrategy,
    pub template_annotations: BTreeMap<String, String>,
    pub volume: Option<VolumeSpec>,
}

/// Convergence signal reported by the workload controller
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadStatus {
    pub observed_generation: i64,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    pub updated_replicas: i32,
    pub current_revision: String,
    pub update_revision: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadData {
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodConditionType {
    PodScheduled,
    Initialized,
    ContainersReady,
    Ready,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub type_: PodConditionType,
    pub status: bool,
    #[serde(default)]
    pub last_transition_time: Option<SystemTime>,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStatus {
    pub name: String,
    pub ready: bool,
    pub restart_count: u32,
    /// Set while the container is waiting, e.g. `CrashLoopBackOff`
    pub waiting_reason: Option<String>,
    /// Set when the container last terminated abnormally
    pub terminated_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodData {
    pub phase: PodPhase,
    pub conditions: Vec<PodCondition>,
    pub containers: Vec<ContainerStatus>,
}

impl PodData {
    pub fn condition(&self, type_: PodConditionType) -> Option<&PodCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    pub fn is_ready(&self) -> bool {
        self.condition(PodConditionType::Ready)
            .map(|c| c.status)
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeClaimData {
    pub storage_class: Option<String>,
    pub requested_bytes: u64,
    pub capacity_bytes: u64,
}
