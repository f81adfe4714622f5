//! Plan execution
//!
//! A plan applies its vertices in reverse topological order so that
//! dependencies are created before their dependents and removed after them.
//! The first failing vertex aborts the walk; nothing is rolled back.

use std::sync::Arc;

use slog::{debug, error, info, warn};

use super::context::TransformContext;
use super::vertex::{root_vertex, weight_compare, Action, LifecycleDag, LifecycleVertex};
use crate::consensus::ROLE_ENV_PREFIX;
use crate::error::{Error, Result};
use crate::event::{reasons, ClusterEvent};
use crate::graph::Comparator;
use crate::model::{condition_types, labels, Condition, Object, ObjectData};
use crate::store::{DeleteOptions, ObjectStore, StoreError};

pub struct Plan {
    dag: LifecycleDag,
    ctx: TransformContext,
    store: Arc<dyn ObjectStore>,
    requeue: Option<Error>,
}

/// Treat a store error matching `ignore` as success
fn tolerate<T>(
    result: std::result::Result<T, StoreError>,
    ignore: fn(&StoreError) -> bool,
) -> std::result::Result<Option<T>, StoreError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if ignore(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lay the desired object over its live revision
///
/// Identity and versioning come from `live`. Labels, annotations and
/// finalizers are unioned with the desired values winning. Environment keys
/// published on the live object survive when the desired one lacks them.
pub fn merge_onto_live(desired: &Object, live: &Object) -> Object {
    let mut merged = desired.clone();
    merged.meta.uid = live.meta.uid.clone();
    merged.meta.resource_version = live.meta.resource_version;
    merged.meta.generation = live.meta.generation;
    merged.meta.creation_timestamp = live.meta.creation_timestamp;
    merged.meta.deletion_timestamp = live.meta.deletion_timestamp;

    for (k, v) in &live.meta.labels {
        merged.meta.labels.entry(k.clone()).or_insert_with(|| v.clone());
    }
    for (k, v) in &live.meta.annotations {
        merged.meta.annotations.entry(k.clone()).or_insert_with(|| v.clone());
    }
    for f in &live.meta.finalizers {
        merged.meta.add_finalizer(f);
    }
    if merged.meta.owner_references.is_empty() {
        merged.meta.owner_references = live.meta.owner_references.clone();
    }

    match (&mut merged.data, &live.data) {
        (ObjectData::Workload(new), ObjectData::Workload(old)) => {
            new.status = old.status.clone();
        }
        (ObjectData::VolumeClaim(new), ObjectData::VolumeClaim(old)) => {
            new.capacity_bytes = old.capacity_bytes;
        }
        (ObjectData::KeyValues(new), ObjectData::KeyValues(old))
            if desired.label(labels::CONFIG_TYPE) == Some(labels::CONFIG_TYPE_ENV) =>
        {
            for (k, v) in old.iter().filter(|(k, _)| k.starts_with(ROLE_ENV_PREFIX)) {
                new.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        _ => {}
    }
    merged
}

fn cluster_phase(obj: &Object) -> Option<crate::model::ClusterPhase> {
    obj.as_cluster().and_then(|c| c.status.phase)
}

impl Plan {
    pub(crate) fn new(
        dag: LifecycleDag,
        ctx: TransformContext,
        store: Arc<dyn ObjectStore>,
        requeue: Option<Error>,
    ) -> Self {
        Self {
            dag,
            ctx,
            store,
            requeue,
        }
    }

    pub fn dag(&self) -> &LifecycleDag {
        &self.dag
    }

    pub fn context(&self) -> &TransformContext {
        &self.ctx
    }

    /// Requeue raised while building, returned after execution
    pub fn pending_requeue(&self) -> Option<&Error> {
        self.requeue.as_ref()
    }

    /// Apply every vertex
    ///
    /// On success returns the requeue carried over from the build, if any.
    pub async fn execute(self) -> Result<()> {
        if let Err(e) = self.walk().await {
            if !e.is_requeue() {
                self.record_failure(&e).await;
            }
            return Err(e);
        }
        match self.requeue {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn walk(&self) -> Result<()> {
        let root = root_vertex(&self.dag)?;
        let cmp: Comparator<'_, LifecycleVertex> = &weight_compare;
        let order = self.dag.reverse_topological_order(Some(cmp))?;
        for id in order {
            let Some(vertex) = self.dag.vertex(id) else { continue };
            self.apply(vertex, id == root).await?;
        }
        Ok(())
    }

    async fn apply(&self, v: &LifecycleVertex, is_root: bool) -> Result<()> {
        let key = v.key();
        let action = v.action.ok_or_else(|| Error::UnresolvedAction(key.clone()))?;
        if is_root && matches!(action, Action::Create | Action::Update) {
            return Err(Error::ClusterMutation(key.to_string()));
        }

        match action {
            Action::Noop => return Ok(()),
            Action::Create => {
                tolerate(self.store.create(v.obj.clone()).await, StoreError::is_already_exists)?;
            }
            Action::Update | Action::Patch if is_root => {
                self.write_cluster(v, false).await?;
            }
            Action::Update | Action::Patch => {
                if v.immutable {
                    debug!(self.ctx.logger, "Skipping immutable vertex"; "key" => %key);
                    return Ok(());
                }
                let live = match &v.prior {
                    Some(prior) => Some(prior.clone()),
                    None => tolerate(self.store.get(&key).await, StoreError::is_not_found)?,
                };
                let Some(live) = live else { return Ok(()) };
                let merged = merge_onto_live(&v.obj, &live);
                if merged == live {
                    debug!(self.ctx.logger, "Vertex already up to date"; "key" => %key);
                    return Ok(());
                }
                tolerate(self.store.update(merged).await, StoreError::is_not_found)?;
            }
            Action::Delete => self.delete(v).await?,
            Action::Status if is_root => self.write_cluster(v, true).await?,
            Action::Status => {
                tolerate(self.store.update_status(v.obj.clone()).await, StoreError::is_not_found)?;
            }
        }
        info!(self.ctx.logger, "Applied vertex"; "key" => %key, "action" => %action);
        Ok(())
    }

    async fn delete(&self, v: &LifecycleVertex) -> Result<()> {
        let key = v.key();
        if v.orphan {
            tolerate(
                self.store.delete(&key, DeleteOptions::force()).await,
                StoreError::is_not_found,
            )?;
            return Ok(());
        }
        let Some(mut live) = tolerate(self.store.get(&key).await, StoreError::is_not_found)? else {
            return Ok(());
        };
        if live.meta.remove_finalizer(&self.ctx.config.finalizer) {
            // Releasing the last finalizer of a deleting object removes it.
            let deleting = live.meta.is_deleting();
            tolerate(self.store.update(live).await, StoreError::is_not_found)?;
            if deleting {
                return Ok(());
            }
        }
        tolerate(
            self.store.delete(&key, DeleteOptions::default()).await,
            StoreError::is_not_found,
        )?;
        Ok(())
    }

    /// Write the root Cluster: metadata and spec when repaired, then status
    async fn write_cluster(&self, v: &LifecycleVertex, with_status: bool) -> Result<()> {
        let prior = v.prior.as_ref().unwrap_or(&v.obj);
        let mut resource_version = prior.meta.resource_version;

        let spec_differs = match (v.obj.as_cluster(), prior.as_cluster()) {
            (Some(a), Some(b)) => a.spec != b.spec,
            _ => false,
        };
        if v.obj.meta != prior.meta || spec_differs {
            let mut obj = v.obj.clone();
            obj.meta.resource_version = resource_version;
            let updated = self.store.update(obj).await?;
            resource_version = updated.meta.resource_version;
        }
        let status_changed =
            v.obj.as_cluster().map(|c| &c.status) != prior.as_cluster().map(|c| &c.status);
        if !with_status || !status_changed {
            return Ok(());
        }

        let mut obj = v.obj.clone();
        obj.meta.resource_version = resource_version;
        self.store.update_status(obj).await?;

        let (before, after) = (cluster_phase(prior), cluster_phase(&v.obj));
        if before != after {
            if let Some(after) = after {
                info!(self.ctx.logger, "Cluster phase changed";
                    "from" => ?before, "to" => ?after);
                self.ctx.record(ClusterEvent::normal(
                    v.key(),
                    reasons::CLUSTER_PHASE,
                    format!("Cluster phase changed to {:?}", after),
                ));
            }
        }
        Ok(())
    }

    /// Mark ApplyResources false on the Cluster; failures here are only logged
    async fn record_failure(&self, err: &Error) {
        error!(self.ctx.logger, "Failed to apply plan"; "error" => %err);
        let key = self.ctx.cluster_key();
        self.ctx.record(ClusterEvent::warning(
            key.clone(),
            reasons::APPLY_FAILED,
            err.to_string(),
        ));

        let mut live = match self.store.get(&key).await {
            Ok(live) => live,
            Err(e) => {
                warn!(self.ctx.logger, "Can't load cluster to record failure"; "error" => %e);
                return;
            }
        };
        let generation = live.meta.generation;
        if let Some(cluster) = live.as_cluster_mut() {
            let mut condition = Condition::new(
                condition_types::APPLY_RESOURCES,
                false,
                "ApplyResourcesFailed",
                err.to_string(),
            );
            condition.observed_generation = generation;
            cluster.status.set_condition(condition, self.ctx.now);
        }
        if let Err(e) = self.store.update_status(live).await {
            warn!(self.ctx.logger, "Can't record apply failure"; "error" => %e);
        }
    }
}
