//! Resolve component specs against their definitions

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::model::{
    labels, ClusterData, ClusterDefinitionData, ClusterVersionData, ConsensusSpec, Kind,
    ObjectKey, TlsSpec, VolumeSpec, WorkloadType,
};
use crate::store::LabelSelector;

/// Everything needed to render and judge one component
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedComponent {
    pub cluster_name: String,
    pub namespace: String,
    pub name: String,
    pub definition_name: String,
    pub workload_type: WorkloadType,
    pub replicas: i32,
    pub image: String,
    pub ports: Vec<u16>,
    pub consensus: Option<ConsensusSpec>,
    pub role_probe_timeout: Duration,
    pub tls: Option<TlsSpec>,
    pub volume: Option<VolumeSpec>,
    pub restart_token: Option<String>,
    pub primary_index: Option<i32>,
}

impl SynthesizedComponent {
    pub fn workload_name(&self) -> String {
        format!("{}-{}", self.cluster_name, self.name)
    }

    pub fn workload_kind(&self) -> Kind {
        match self.workload_type {
            WorkloadType::Stateless => Kind::Deployment,
            _ => Kind::StatefulSet,
        }
    }

    pub fn workload_key(&self) -> ObjectKey {
        ObjectKey::new(self.workload_kind(), self.namespace.clone(), self.workload_name())
    }

    pub fn env_config_name(&self) -> String {
        format!("{}-env", self.workload_name())
    }

    pub fn env_config_key(&self) -> ObjectKey {
        ObjectKey::new(Kind::ConfigMap, self.namespace.clone(), self.env_config_name())
    }

    pub fn tls_secret_name(&self) -> String {
        format!("{}-tls-certs", self.workload_name())
    }

    pub fn pod_name(&self, ordinal: i32) -> String {
        format!("{}-{}", self.workload_name(), ordinal)
    }

    pub fn volume_claim_name(&self, ordinal: i32) -> String {
        format!("data-{}-{}", self.workload_name(), ordinal)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(labels::INSTANCE.to_string(), self.cluster_name.clone());
        labels.insert(labels::COMPONENT.to_string(), self.name.clone());
        labels.insert(
            labels::MANAGED_BY.to_string(),
            labels::MANAGED_BY_VALUE.to_string(),
        );
        labels
    }

    /// Selects pods, volume claims and workloads of this component
    pub fn selector(&self) -> LabelSelector {
        let mut sel = LabelSelector::new();
        sel.insert(labels::INSTANCE.to_string(), self.cluster_name.clone());
        sel.insert(labels::COMPONENT.to_string(), self.name.clone());
        sel
    }

    pub fn has_roles(&self) -> bool {
        matches!(
            self.workload_type,
            WorkloadType::Consensus | WorkloadType::Replication
        )
    }
}

pub fn synthesize_components(
    cluster_name: &str,
    namespace: &str,
    cluster: &ClusterData,
    definition: &ClusterDefinitionData,
    version: Option<&ClusterVersionData>,
    config: &ReconcilerConfig,
) -> Result<Vec<SynthesizedComponent>> {
    cluster
        .spec
        .components
        .iter()
        .map(|spec| {
            let def = definition.component(&spec.definition_ref).ok_or_else(|| {
                Error::Invalid(format!(
                    "component {} references unknown definition {}",
                    spec.name, spec.definition_ref
                ))
            })?;
            let image = version
                .and_then(|v| v.images.get(&def.name))
                .cloned()
                .unwrap_or_else(|| def.image.clone());
            Ok(SynthesizedComponent {
                cluster_name: cluster_name.to_string(),
                namespace: namespace.to_string(),
                name: spec.name.clone(),
                definition_name: def.name.clone(),
                workload_type: def.workload_type,
                replicas: spec.replicas,
                image,
                ports: def.service_ports.clone(),
                consensus: def.consensus.clone(),
                role_probe_timeout: def
                    .role_probe_timeout()
                    .unwrap_or(config.role_probe_timeout),
                tls: spec.tls.clone(),
                volume: spec.volume.clone(),
                restart_token: spec.restart_token.clone(),
                primary_index: spec.primary_index,
            })
        })
        .collect()
}
