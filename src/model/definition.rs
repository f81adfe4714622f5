//! Cluster-scoped templates referenced by a Cluster

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionPhase {
    Available,
    #[default]
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadType {
    Stateless,
    Stateful,
    Consensus,
    Replication,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    #[default]
    None,
    Readonly,
    ReadWrite,
}

/// A role declared by a consensus workload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMember {
    pub name: String,
    #[serde(default)]
    pub access_mode: AccessMode,
}

impl ConsensusMember {
    pub fn new(name: &str, access_mode: AccessMode) -> Self {
        Self {
            name: name.to_string(),
            access_mode,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStrategy {
    #[default]
    Serial,
    Parallel,
    BestEffortParallel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSpec {
    pub leader: ConsensusMember,
    #[serde(default)]
    pub followers: Vec<ConsensusMember>,
    #[serde(default)]
    pub learner: Option<ConsensusMember>,
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub name: String,
    pub workload_type: WorkloadType,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub service_ports: Vec<u16>,
    #[serde(default)]
    pub consensus: Option<ConsensusSpec>,
    /// Overrides the configured role-probe timeout
    #[serde(default)]
    pub role_probe_timeout_secs: Option<u64>,
}

impl ComponentDefinition {
    pub fn role_probe_timeout(&self) -> Option<Duration> {
        self.role_probe_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterDefinitionData {
    #[serde(default)]
    pub phase: DefinitionPhase,
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

impl ClusterDefinitionData {
    pub fn component(&self, name: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterVersionData {
    #[serde(default)]
    pub phase: DefinitionPhase,
    pub definition_ref: String,
    /// Image overrides keyed by component definition name
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}
