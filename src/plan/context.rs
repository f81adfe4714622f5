//! Read-only context shared by every transformer of one build

use std::sync::Arc;
use std::time::SystemTime;

use slog::Logger;

use crate::component::{Renderer, SynthesizedComponent};
use crate::config::ReconcilerConfig;
use crate::event::{ClusterEvent, EventBus};
use crate::model::{
    ClusterData, ClusterDefinitionData, ClusterVersionData, Kind, Object, ObjectData, ObjectKey,
    ObjectMeta,
};
use crate::store::ReadonlyClient;

/// Outcome of the builder's validation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    Passed,
    /// `retry` is set when the failure may resolve without a spec change
    Failed { message: String, retry: bool },
}

pub struct TransformContext {
    pub client: ReadonlyClient,
    pub logger: Logger,
    pub events: Arc<EventBus<ClusterEvent>>,
    pub config: ReconcilerConfig,
    pub renderer: Arc<dyn Renderer>,
    /// Cluster metadata as loaded at the start of the reconcile
    pub cluster_meta: ObjectMeta,
    /// Cluster spec and status as loaded at the start of the reconcile
    pub cluster: ClusterData,
    pub definition: Option<ClusterDefinitionData>,
    pub version: Option<ClusterVersionData>,
    pub components: Vec<SynthesizedComponent>,
    pub precheck: Precheck,
    pub now: SystemTime,
}

impl TransformContext {
    pub fn cluster_object(&self) -> Object {
        Object::new(
            Kind::Cluster,
            self.cluster_meta.clone(),
            ObjectData::Cluster(Box::new(self.cluster.clone())),
        )
    }

    pub fn cluster_key(&self) -> ObjectKey {
        ObjectKey::new(
            Kind::Cluster,
            self.cluster_meta.namespace.clone(),
            self.cluster_meta.name.clone(),
        )
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_meta.name
    }

    pub fn namespace(&self) -> &str {
        &self.cluster_meta.namespace
    }

    pub fn is_deleting(&self) -> bool {
        self.cluster_meta.is_deleting()
    }

    /// The spec changed since status was last reconciled
    pub fn is_updating(&self) -> bool {
        self.cluster_meta.generation != self.cluster.status.observed_generation
    }

    /// Neither deleting nor updating: only status needs refreshing
    pub fn is_status_updating(&self) -> bool {
        !self.is_deleting() && !self.is_updating()
    }

    pub fn component(&self, name: &str) -> Option<&SynthesizedComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn record(&self, event: ClusterEvent) {
        self.events.publish(event);
    }
}
