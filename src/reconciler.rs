//! One reconcile of one Cluster: Init, Validate, Build, Execute

use std::sync::Arc;
use std::time::Duration;

use slog::{info, o, warn, Logger};

use crate::component::{DefaultRenderer, Renderer};
use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::event::{ClusterEvent, EventBus};
use crate::model::{labels, Kind, Object, ObjectKey};
use crate::plan::ClusterPlanBuilder;
use crate::store::ObjectStore;

/// What the host loop should do next with a Cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Done,
    Requeue { reason: String, after: Duration },
}

pub struct ClusterReconciler {
    store: Arc<dyn ObjectStore>,
    events: Arc<EventBus<ClusterEvent>>,
    config: ReconcilerConfig,
    renderer: Arc<dyn Renderer>,
    logger: Logger,
}

impl ClusterReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, config: ReconcilerConfig, logger: Logger) -> Self {
        let events = Arc::new(EventBus::new(config.event_capacity));
        Self {
            store,
            events,
            config,
            renderer: Arc::new(DefaultRenderer),
            logger: logger.new(o!("component" => "reconciler")),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn events(&self) -> Arc<EventBus<ClusterEvent>> {
        self.events.clone()
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconcile the Cluster `namespace/name` once
    ///
    /// Requeue errors become [`ReconcileOutcome::Requeue`]; anything else is
    /// returned for the host loop to retry with backoff.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome> {
        let mut builder = ClusterPlanBuilder::new(
            self.store.clone(),
            self.events.clone(),
            self.config.clone(),
            self.logger.clone(),
            namespace,
            name,
        )
        .with_renderer(self.renderer.clone());

        if !builder.init().await? {
            return Ok(ReconcileOutcome::Done);
        }
        builder.validate().await?;
        let result = match builder.build().await {
            Ok(plan) => plan.execute().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(self.logger, "Reconciled cluster"; "namespace" => namespace, "name" => name);
                Ok(ReconcileOutcome::Done)
            }
            Err(Error::Requeue { reason, delay }) => {
                info!(self.logger, "Requeueing cluster";
                    "namespace" => namespace, "name" => name,
                    "reason" => reason.as_str(), "after" => ?delay);
                Ok(ReconcileOutcome::Requeue {
                    reason,
                    after: delay,
                })
            }
            Err(e) => {
                warn!(self.logger, "Reconcile failed";
                    "namespace" => namespace, "name" => name, "error" => %e);
                Err(e)
            }
        }
    }

    /// The Cluster an owned object belongs to
    ///
    /// Owner references win over the instance label.
    pub fn cluster_for(obj: &Object) -> Option<ObjectKey> {
        if obj.kind == Kind::Cluster {
            return Some(obj.key());
        }
        let name = obj
            .meta
            .owner_references
            .iter()
            .find(|r| r.kind == Kind::Cluster)
            .map(|r| r.name.as_str())
            .or_else(|| obj.label(labels::INSTANCE))?;
        Some(ObjectKey::new(Kind::Cluster, obj.namespace(), name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectData, ObjectMeta, OwnerReference};

    #[test]
    fn test_cluster_for_prefers_owner_reference() {
        let mut obj = Object::new(
            Kind::StatefulSet,
            ObjectMeta::new("ns", "a-db"),
            ObjectData::Opaque(serde_json::Value::Null),
        )
        .with_label(labels::INSTANCE, "b");
        assert_eq!(
            ClusterReconciler::cluster_for(&obj),
            Some(ObjectKey::new(Kind::Cluster, "ns", "b"))
        );

        obj.meta.owner_references.push(OwnerReference {
            kind: Kind::Cluster,
            name: "a".to_string(),
            uid: "uid-a".to_string(),
        });
        assert_eq!(
            ClusterReconciler::cluster_for(&obj),
            Some(ObjectKey::new(Kind::Cluster, "ns", "a"))
        );

        let stray = Object::new(
            Kind::Pod,
            ObjectMeta::new("ns", "p"),
            ObjectData::Opaque(serde_json::Value::Null),
        );
        assert_eq!(ClusterReconciler::cluster_for(&stray), None);
    }
}
