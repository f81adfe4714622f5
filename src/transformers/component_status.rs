//! Status refresh of every component
//!
//! Runs only when the Cluster spec is unchanged. Each component's roles are
//! synced from pod labels and published to its environment config, one step
//! of a pending rolling update is taken, and the phase machine classifies its
//! health.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use slog::{debug, info};

use super::root_status;
use crate::component::{
    evaluate_phase, Observation, PhaseTimeouts, SynthesizedComponent, WorkloadHandler,
};
use crate::consensus::replication::sync_replication_status;
use crate::consensus::{
    plan_pod_restarts, role_env, rollout_converged, sync_consensus_status, UpdatePlan,
};
use crate::error::{Error, Result};
use crate::event::{reasons, ClusterEvent};
use crate::model::{
    ComponentPhase, ComponentStatus, ConsensusSpec, Kind, Object, ObjectData,
    WorkloadUpdateStrategy,
};
use crate::plan::{
    add_child, find_vertex, root_vertex, Action, LifecycleDag, LifecycleVertex, TransformContext,
    Transformer,
};

pub struct ComponentStatusTransformer;

/// Write role keys into the component's environment config vertex
///
/// The vertex is made mutable only when the keys differ from the live config.
fn publish_role_env(
    dag: &mut LifecycleDag,
    comp: &SynthesizedComponent,
    keys: BTreeMap<String, String>,
) {
    let Some(id) = find_vertex(dag, &comp.env_config_key()) else {
        return;
    };
    let Some(v) = dag.vertex_mut(id) else { return };
    let live_differs = match v.prior.as_ref().and_then(|p| p.as_key_values()) {
        Some(live) => keys.iter().any(|(k, val)| live.get(k) != Some(val)),
        None => false,
    };
    if let ObjectData::KeyValues(env) = &mut v.obj.data {
        env.extend(keys);
    }
    if live_differs {
        v.immutable = false;
    }
}

/// Delete the next pods of a pending OnDelete rollout
fn rolling_update_step(
    ctx: &TransformContext,
    dag: &mut LifecycleDag,
    spec: &ConsensusSpec,
    workload: &Object,
    pods: &[Object],
) -> Result<()> {
    let Some(data) = workload.as_workload() else {
        return Ok(());
    };
    let revision = &data.status.update_revision;
    if data.spec.update_strategy != WorkloadUpdateStrategy::OnDelete
        || revision.is_empty()
        || !rollout_converged(workload, pods)
    {
        return Ok(());
    }
    let plan = UpdatePlan::build(spec, spec.update_strategy, pods);
    let root = root_vertex(dag)?;
    for p in plan_pod_restarts(&plan, revision) {
        info!(ctx.logger, "Restarting pod for update";
            "pod" => p.name(), "revision" => revision.as_str());
        add_child(
            dag,
            root,
            LifecycleVertex {
                prior: Some(p.clone()),
                ..LifecycleVertex::with_action(p, Action::Delete)
            },
        );
    }
    Ok(())
}

fn min_delay(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl ComponentStatusTransformer {
    async fn refresh(
        &self,
        ctx: &TransformContext,
        dag: &mut LifecycleDag,
        comp: &SynthesizedComponent,
    ) -> Result<Option<Duration>> {
        let selector = comp.selector();
        let workloads = ctx
            .client
            .list(comp.workload_kind(), ctx.namespace(), &selector)
            .await?;
        let pods = ctx.client.list(Kind::Pod, ctx.namespace(), &selector).await?;

        let mut status = root_status(dag)?
            .components
            .get(&comp.name)
            .cloned()
            .unwrap_or_else(|| ComponentStatus::new(ComponentPhase::Creating));

        let handler = WorkloadHandler::for_component(comp);
        let role_synced = match &handler {
            WorkloadHandler::Consensus(spec) => {
                if sync_consensus_status(&mut status, spec, &pods) {
                    debug!(ctx.logger, "Consensus set changed"; "component" => comp.name.as_str());
                }
                if let Some(set) = &status.consensus_set_status {
                    publish_role_env(dag, comp, role_env(&comp.name, set));
                }
                if let [workload] = workloads.as_slice() {
                    rolling_update_step(ctx, dag, spec, workload, &pods)?;
                }
                true
            }
            WorkloadHandler::Replication => {
                sync_replication_status(&mut status, &pods);
                true
            }
            _ => false,
        };

        let obs = Observation {
            replicas: comp.replicas,
            workloads: &workloads,
            pods: &pods,
            role_synced,
        };
        let timeouts = PhaseTimeouts {
            role_probe: comp.role_probe_timeout,
            pod_failed: ctx.config.pod_failed_timeout,
            requeue: ctx.config.probe_requeue_interval,
        };
        let decision = evaluate_phase(&handler, &obs, &status, timeouts, ctx.now);
        if let Some(previous) = decision.apply_to(&mut status) {
            info!(ctx.logger, "Component phase changed";
                "component" => comp.name.as_str(), "from" => ?previous, "to" => ?status.phase);
            let message = format!("component {} is {:?}", comp.name, status.phase);
            let event = if status.phase.is_failing() {
                ClusterEvent::warning(ctx.cluster_key(), reasons::COMPONENT_PHASE, message)
            } else {
                ClusterEvent::normal(ctx.cluster_key(), reasons::COMPONENT_PHASE, message)
            };
            ctx.record(event);
        }
        root_status(dag)?.components.insert(comp.name.clone(), status);
        Ok(decision.requeue_after)
    }
}

#[async_trait]
impl Transformer for ComponentStatusTransformer {
    fn name(&self) -> &'static str {
        "component-status"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if !ctx.is_status_updating() {
            return Ok(());
        }
        let mut requeue = None;
        for comp in &ctx.components {
            let after = self.refresh(ctx, dag, comp).await?;
            requeue = min_delay(requeue, after);
        }
        match requeue {
            Some(after) => Err(Error::requeue("waiting for components to become ready", after)),
            None => Ok(()),
        }
    }
}
