#![allow(dead_code)]

use std::sync::Arc;

use clusterflow::model::{
    labels, AccessMode, ClusterData, ClusterDefinitionData, ComponentDefinition, ComponentSpec,
    ConsensusMember, ConsensusSpec, DefinitionPhase, Kind, Object, ObjectData, ObjectKey,
    ObjectMeta, PodCondition, PodConditionType, PodData, TerminationPolicy, UpdateStrategy,
    VolumeClaimData, WorkloadType,
};
use clusterflow::{ClusterReconciler, InMemoryStore, ObjectStore, ReconcilerConfig};
use slog::{o, Logger};

pub const NAMESPACE: &str = "default";
pub const CLUSTER: &str = "c";

pub fn logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

pub fn definition() -> Object {
    let data = ClusterDefinitionData {
        phase: DefinitionPhase::Available,
        components: vec![ComponentDefinition {
            name: "consensus".to_string(),
            workload_type: WorkloadType::Consensus,
            image: "db:1".to_string(),
            service_ports: vec![3306],
            consensus: Some(ConsensusSpec {
                leader: ConsensusMember::new("leader", AccessMode::ReadWrite),
                followers: vec![ConsensusMember::new("follower", AccessMode::Readonly)],
                learner: None,
                update_strategy: UpdateStrategy::Serial,
            }),
            role_probe_timeout_secs: None,
        }],
    };
    Object::new(
        Kind::ClusterDefinition,
        ObjectMeta::new("", "mydef"),
        ObjectData::ClusterDefinition(Box::new(data)),
    )
}

pub fn cluster(replicas: i32, policy: TerminationPolicy) -> Object {
    let mut data = ClusterData::default();
    data.spec.definition_ref = "mydef".to_string();
    data.spec.termination_policy = policy;
    data.spec.components.push(ComponentSpec {
        name: "db".to_string(),
        definition_ref: "consensus".to_string(),
        replicas,
        ..Default::default()
    });
    let mut meta = ObjectMeta::new(NAMESPACE, CLUSTER);
    meta.uid = "c-uid".to_string();
    meta.generation = 1;
    meta.resource_version = 1;
    Object::new(Kind::Cluster, meta, ObjectData::Cluster(Box::new(data)))
}

pub fn cluster_key() -> ObjectKey {
    ObjectKey::new(Kind::Cluster, NAMESPACE, CLUSTER)
}

pub fn workload_key() -> ObjectKey {
    ObjectKey::new(Kind::StatefulSet, NAMESPACE, "c-db")
}

pub fn env_key() -> ObjectKey {
    ObjectKey::new(Kind::ConfigMap, NAMESPACE, "c-db-env")
}

pub fn pod_key(ordinal: i32) -> ObjectKey {
    ObjectKey::new(Kind::Pod, NAMESPACE, format!("c-db-{}", ordinal))
}

/// A ready pod of component `db` at `revision`
pub fn pod(ordinal: i32, role: &str, revision: &str) -> Object {
    let data = PodData {
        conditions: vec![PodCondition {
            type_: PodConditionType::Ready,
            status: true,
            last_transition_time: None,
            message: String::new(),
        }],
        ..Default::default()
    };
    Object::new(
        Kind::Pod,
        ObjectMeta::new(NAMESPACE, format!("c-db-{}", ordinal)),
        ObjectData::Pod(data),
    )
    .with_label(labels::INSTANCE, CLUSTER)
    .with_label(labels::COMPONENT, "db")
    .with_label(labels::ROLE, role)
    .with_label(labels::POD_REVISION, revision)
}

/// Data volume claim of pod `ordinal`
pub fn claim(ordinal: i32) -> Object {
    Object::new(
        Kind::PersistentVolumeClaim,
        ObjectMeta::new(NAMESPACE, format!("data-c-db-{}", ordinal)),
        ObjectData::VolumeClaim(VolumeClaimData::default()),
    )
    .with_label(labels::INSTANCE, CLUSTER)
    .with_label(labels::COMPONENT, "db")
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub reconciler: ClusterReconciler,
}

impl Harness {
    pub async fn new(cluster: Object) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.seed(definition()).await;
        store.seed(cluster).await;
        let reconciler =
            ClusterReconciler::new(store.clone(), ReconcilerConfig::default(), logger());
        Self { store, reconciler }
    }

    pub async fn get(&self, key: &ObjectKey) -> Object {
        self.store.get(key).await.unwrap()
    }

    pub async fn cluster(&self) -> Object {
        self.get(&cluster_key()).await
    }

    /// Play the workload controller: report the workload converged at the given revisions
    pub async fn converge_workload(&self, current_revision: &str, update_revision: &str) {
        let mut sts = self.get(&workload_key()).await;
        let generation = sts.meta.generation;
        let data = sts.as_workload_mut().unwrap();
        let replicas = data.spec.replicas;
        data.status.observed_generation = generation;
        data.status.replicas = replicas;
        data.status.ready_replicas = replicas;
        data.status.available_replicas = replicas;
        data.status.updated_replicas = replicas;
        data.status.current_revision = current_revision.to_string();
        data.status.update_revision = update_revision.to_string();
        self.store.update_status(sts).await.unwrap();
    }
}
