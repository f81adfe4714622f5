//! Rendering of component objects
//!
//! Each method builds one object from a synthesized component and is pure.
//! Deployments supply their own [`Renderer`] when the defaults don't fit.

use std::collections::BTreeMap;

use serde_json::json;
use uuid::Uuid;

use super::synthesize::SynthesizedComponent;
use crate::model::{
    labels, Kind, Object, ObjectData, ObjectMeta, WorkloadData, WorkloadSpec, WorkloadType,
    WorkloadUpdateStrategy,
};

pub trait Renderer: Send + Sync {
    fn workload(&self, comp: &SynthesizedComponent) -> Object;

    fn services(&self, comp: &SynthesizedComponent) -> Vec<Object>;

    fn env_config(&self, comp: &SynthesizedComponent) -> Object;

    fn disruption_budget(&self, comp: &SynthesizedComponent) -> Option<Object>;

    /// One per Cluster, shared by every component
    fn credential_secret(&self, cluster_name: &str, namespace: &str) -> Object;

    fn tls_secret(&self, comp: &SynthesizedComponent) -> Object;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRenderer;

fn meta(comp: &SynthesizedComponent, name: String) -> ObjectMeta {
    ObjectMeta {
        labels: comp.labels(),
        ..ObjectMeta::new(comp.namespace.clone(), name)
    }
}

fn random_secret() -> String {
    Uuid::new_v4().simple().to_string()
}

impl Renderer for DefaultRenderer {
    fn workload(&self, comp: &SynthesizedComponent) -> Object {
        let mut template_annotations = BTreeMap::new();
        if let Some(token) = &comp.restart_token {
            template_annotations.insert(labels::RESTARTED_AT.to_string(), token.clone());
        }
        let update_strategy = match comp.workload_type {
            WorkloadType::Consensus => WorkloadUpdateStrategy::OnDelete,
            _ => WorkloadUpdateStrategy::RollingUpdate,
        };
        let spec = WorkloadSpec {
            replicas: comp.replicas,
            image: comp.image.clone(),
            ports: comp.ports.clone(),
            update_strategy,
            template_annotations,
            volume: comp.volume.clone(),
        };
        Object::new(
            comp.workload_kind(),
            meta(comp, comp.workload_name()),
            ObjectData::Workload(WorkloadData {
                spec,
                status: Default::default(),
            }),
        )
    }

    fn services(&self, comp: &SynthesizedComponent) -> Vec<Object> {
        let mut services = vec![Object::new(
            Kind::Service,
            meta(comp, comp.workload_name()),
            ObjectData::Opaque(json!({ "ports": comp.ports, "headless": false })),
        )];
        if comp.workload_type != WorkloadType::Stateless {
            services.push(Object::new(
                Kind::Service,
                meta(comp, format!("{}-headless", comp.workload_name())),
                ObjectData::Opaque(json!({ "ports": comp.ports, "headless": true })),
            ));
        }
        services
    }

    fn env_config(&self, comp: &SynthesizedComponent) -> Object {
        let mut env = BTreeMap::new();
        env.insert("KB_CLUSTER_NAME".to_string(), comp.cluster_name.clone());
        env.insert("KB_COMP_NAME".to_string(), comp.name.clone());
        env.insert("KB_REPLICA_COUNT".to_string(), comp.replicas.to_string());
        if let Some(index) = comp.primary_index {
            env.insert("KB_PRIMARY_INDEX".to_string(), index.to_string());
        }
        Object::new(
            Kind::ConfigMap,
            meta(comp, comp.env_config_name()),
            ObjectData::KeyValues(env),
        )
        .with_label(labels::CONFIG_TYPE, labels::CONFIG_TYPE_ENV)
    }

    fn disruption_budget(&self, comp: &SynthesizedComponent) -> Option<Object> {
        if comp.workload_type == WorkloadType::Stateless || comp.replicas < 2 {
            return None;
        }
        // Quorum workloads must keep a majority.
        let min_available = match comp.workload_type {
            WorkloadType::Consensus => comp.replicas / 2 + 1,
            _ => comp.replicas - 1,
        };
        Some(Object::new(
            Kind::PodDisruptionBudget,
            meta(comp, comp.workload_name()),
            ObjectData::Opaque(json!({ "minAvailable": min_available })),
        ))
    }

    fn credential_secret(&self, cluster_name: &str, namespace: &str) -> Object {
        let mut data = BTreeMap::new();
        data.insert("username".to_string(), "root".to_string());
        data.insert("password".to_string(), random_secret());
        let mut meta = ObjectMeta::new(
            namespace,
            format!("{}-{}", cluster_name, labels::CREDENTIAL_SUFFIX),
        );
        meta.labels
            .insert(labels::INSTANCE.to_string(), cluster_name.to_string());
        Object::new(Kind::Secret, meta, ObjectData::KeyValues(data))
    }

    fn tls_secret(&self, comp: &SynthesizedComponent) -> Object {
        let mut data = BTreeMap::new();
        data.insert("ca.crt".to_string(), random_secret());
        data.insert("tls.crt".to_string(), random_secret());
        data.insert("tls.key".to_string(), random_secret());
        Object::new(
            Kind::Secret,
            meta(comp, comp.tls_secret_name()),
            ObjectData::KeyValues(data),
        )
    }
}
