//! Fixtures shared by unit tests

use std::sync::Arc;
use std::time::SystemTime;

use slog::{o, Logger};

use crate::component::DefaultRenderer;
use crate::config::ReconcilerConfig;
use crate::event::EventBus;
use crate::model::{
    labels, AccessMode, ClusterData, ClusterDefinitionData, ComponentDefinition, ComponentSpec,
    ConsensusMember, ConsensusSpec, DefinitionPhase, Kind, Object, ObjectData, ObjectMeta,
    PodCondition, PodConditionType, PodData, UpdateStrategy, WorkloadType,
};
use crate::plan::{Precheck, TransformContext};
use crate::store::{InMemoryStore, ObjectStore, ReadonlyClient};

pub fn logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

pub fn consensus_spec() -> ConsensusSpec {
    ConsensusSpec {
        leader: ConsensusMember::new("leader", AccessMode::ReadWrite),
        followers: vec![ConsensusMember::new("follower", AccessMode::Readonly)],
        learner: Some(ConsensusMember::new("learner", AccessMode::Readonly)),
        update_strategy: UpdateStrategy::Serial,
    }
}

pub fn definition() -> ClusterDefinitionData {
    ClusterDefinitionData {
        phase: DefinitionPhase::Available,
        components: vec![ComponentDefinition {
            name: "consensus".to_string(),
            workload_type: WorkloadType::Consensus,
            image: "db:1".to_string(),
            service_ports: vec![3306],
            consensus: Some(consensus_spec()),
            role_probe_timeout_secs: None,
        }],
    }
}

pub fn cluster_data(replicas: i32) -> ClusterData {
    let mut data = ClusterData::default();
    data.spec.definition_ref = "mydef".to_string();
    data.spec.components.push(ComponentSpec {
        name: "db".to_string(),
        definition_ref: "consensus".to_string(),
        replicas,
        ..Default::default()
    });
    data
}

pub fn cluster(name: &str, replicas: i32) -> Object {
    let mut meta = ObjectMeta::new("default", name);
    meta.uid = format!("{}-uid", name);
    meta.generation = 1;
    Object::new(
        Kind::Cluster,
        meta,
        ObjectData::Cluster(Box::new(cluster_data(replicas))),
    )
}

/// A pod of component `db` in cluster `c`
pub fn pod(ordinal: i32, role: Option<&str>, ready: bool) -> Object {
    let data = PodData {
        conditions: vec![PodCondition {
            type_: PodConditionType::Ready,
            status: ready,
            last_transition_time: None,
            message: String::new(),
        }],
        ..Default::default()
    };
    let mut obj = Object::new(
        Kind::Pod,
        ObjectMeta::new("default", format!("c-db-{}", ordinal)),
        ObjectData::Pod(data),
    )
    .with_label(labels::INSTANCE, "c")
    .with_label(labels::COMPONENT, "db");
    if let Some(role) = role {
        obj = obj.with_label(labels::ROLE, role);
    }
    obj
}

/// A context over `store` for the given Cluster object, components synthesized
pub fn context(store: Arc<InMemoryStore>, cluster: &Object) -> TransformContext {
    let data = cluster.as_cluster().cloned().unwrap_or_default();
    let config = ReconcilerConfig::default();
    let definition = definition();
    let components = crate::component::synthesize_components(
        cluster.name(),
        cluster.namespace(),
        &data,
        &definition,
        None,
        &config,
    )
    .unwrap();
    let store: Arc<dyn ObjectStore> = store;
    TransformContext {
        client: ReadonlyClient::new(store),
        logger: logger(),
        events: Arc::new(EventBus::new(16)),
        config,
        renderer: Arc::new(DefaultRenderer),
        cluster_meta: cluster.meta.clone(),
        cluster: data,
        definition: Some(definition),
        version: None,
        components,
        precheck: Precheck::Passed,
        now: SystemTime::now(),
    }
}
