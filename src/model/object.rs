//! Generic object envelope shared by every managed kind

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::cluster::ClusterData;
use super::definition::{ClusterDefinitionData, ClusterVersionData};
use super::labels;
use super::workload::{PodData, VolumeClaimData, WorkloadData};

/// Kinds of objects managed or observed by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Cluster,
    ClusterDefinition,
    ClusterVersion,
    StatefulSet,
    Deployment,
    Service,
    Secret,
    ConfigMap,
    PersistentVolumeClaim,
    PodDisruptionBudget,
    Pod,
    Job,
    CronJob,
    VolumeSnapshot,
    Backup,
    BackupPolicy,
}

impl Kind {
    /// Kinds listed when building the owned-object snapshot
    pub const OWNED: [Kind; 7] = [
        Kind::StatefulSet,
        Kind::Deployment,
        Kind::Service,
        Kind::Secret,
        Kind::ConfigMap,
        Kind::PodDisruptionBudget,
        Kind::CronJob,
    ];

    pub fn is_workload(&self) -> bool {
        matches!(self, Kind::StatefulSet | Kind::Deployment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Cluster => "Cluster",
            Kind::ClusterDefinition => "ClusterDefinition",
            Kind::ClusterVersion => "ClusterVersion",
            Kind::StatefulSet => "StatefulSet",
            Kind::Deployment => "Deployment",
            Kind::Service => "Service",
            Kind::Secret => "Secret",
            Kind::ConfigMap => "ConfigMap",
            Kind::PersistentVolumeClaim => "PersistentVolumeClaim",
            Kind::PodDisruptionBudget => "PodDisruptionBudget",
            Kind::Pod => "Pod",
            Kind::Job => "Job",
            Kind::CronJob => "CronJob",
            Kind::VolumeSnapshot => "VolumeSnapshot",
            Kind::Backup => "Backup",
            Kind::BackupPolicy => "BackupPolicy",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity of an object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `Kind/name`, the key used in component status messages
    pub fn message_key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Durable reference from a child to its parent's stable identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: Kind,
    pub name: String,
    pub uid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub finalizers: Vec<String>,
    pub owner_references: Vec<OwnerReference>,
    pub resource_version: u64,
    pub generation: i64,
    pub creation_timestamp: Option<SystemTime>,
    pub deletion_timestamp: Option<SystemTime>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Returns true if the finalizer was added
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Returns true if the finalizer was present
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        before != self.finalizers.len()
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references.first()
    }
}

/// Kind-specific payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ObjectData {
    Cluster(Box<ClusterData>),
    ClusterDefinition(Box<ClusterDefinitionData>),
    ClusterVersion(ClusterVersionData),
    Workload(WorkloadData),
    Pod(PodData),
    VolumeClaim(VolumeClaimData),
    /// Secret and ConfigMap entries
    KeyValues(BTreeMap<String, String>),
    /// Kinds whose content the engine passes through untouched
    Opaque(serde_json::Value),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub kind: Kind,
    pub meta: ObjectMeta,
    pub data: ObjectData,
}

impl Object {
    pub fn new(kind: Kind, meta: ObjectMeta, data: ObjectData) -> Self {
        Self { kind, meta, data }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind, self.meta.namespace.clone(), self.meta.name.clone())
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.meta.label(key)
    }

    pub fn with_label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.meta.labels.insert(key.to_string(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: impl Into<String>) -> Self {
        self.meta.annotations.insert(key.to_string(), value.into());
        self
    }

    pub fn instance(&self) -> Option<&str> {
        self.label(labels::INSTANCE)
    }

    pub fn component(&self) -> Option<&str> {
        self.label(labels::COMPONENT)
    }

    pub fn is_owned_by(&self, owner: &Object) -> bool {
        self.meta
            .owner_references
            .iter()
            .any(|r| r.kind == owner.kind && r.name == owner.meta.name && r.uid == owner.meta.uid)
    }

    pub fn as_cluster(&self) -> Option<&ClusterData> {
        match &self.data {
            ObjectData::Cluster(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_cluster_mut(&mut self) -> Option<&mut ClusterData> {
        match &mut self.data {
            ObjectData::Cluster(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_workload(&self) -> Option<&WorkloadData> {
        match &self.data {
            ObjectData::Workload(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_workload_mut(&mut self) -> Option<&mut WorkloadData> {
        match &mut self.data {
            ObjectData::Workload(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_pod(&self) -> Option<&PodData> {
        match &self.data {
            ObjectData::Pod(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_volume_claim(&self) -> Option<&VolumeClaimData> {
        match &self.data {
            ObjectData::VolumeClaim(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_key_values(&self) -> Option<&BTreeMap<String, String>> {
        match &self.data {
            ObjectData::KeyValues(kv) => Some(kv),
            _ => None,
        }
    }

    pub fn as_key_values_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        match &mut self.data {
            ObjectData::KeyValues(kv) => Some(kv),
            _ => None,
        }
    }
}
