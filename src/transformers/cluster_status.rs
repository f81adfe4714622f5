use async_trait::async_trait;
use slog::debug;

use super::root_status;
use crate::error::Result;
use crate::model::{
    condition_types, ClusterPhase, ClusterStatus, ComponentPhase, ComponentStatus, Condition,
};
use crate::plan::{find_vertex, root_vertex, Action, LifecycleDag, TransformContext, Transformer};

/// Aggregates component phases into the Cluster phase and conditions
pub struct ClusterStatusTransformer;

/// Cluster phase implied by its component phases
///
/// `previous` decides between Creating and Updating while components are
/// still coming up.
pub fn aggregate_phase(
    phases: &[ComponentPhase],
    previous: Option<ClusterPhase>,
) -> Option<ClusterPhase> {
    use ComponentPhase as C;
    if phases.is_empty() {
        return previous;
    }
    let all = |p: C| phases.iter().all(|x| *x == p);
    if all(C::Failed) {
        return Some(ClusterPhase::Failed);
    }
    if phases.iter().any(|p| p.is_failing()) {
        return Some(ClusterPhase::Abnormal);
    }
    if all(C::Stopped) {
        return Some(ClusterPhase::Stopped);
    }
    if phases.iter().all(|p| p.is_up()) {
        return Some(ClusterPhase::Running);
    }
    match previous {
        None | Some(ClusterPhase::Creating) => Some(ClusterPhase::Creating),
        _ => Some(ClusterPhase::Updating),
    }
}

/// Phase for a component whose spec just changed
///
/// Compares the desired workload with the live one: absent means Creating,
/// a change limited to the restart annotations means Rebooting.
fn phase_on_spec_change(
    ctx: &TransformContext,
    dag: &LifecycleDag,
    name: &str,
) -> Option<ComponentPhase> {
    let comp = ctx.component(name)?;
    let Some(v) = find_vertex(dag, &comp.workload_key()).and_then(|id| dag.vertex(id)) else {
        return Some(ComponentPhase::Creating);
    };
    let Some(prior) = v.prior.as_ref().and_then(|p| p.as_workload()) else {
        return Some(ComponentPhase::Creating);
    };
    let desired = v.obj.as_workload()?;
    if desired.spec == prior.spec {
        return None;
    }
    let mut without_restart = desired.spec.clone();
    without_restart.template_annotations = prior.spec.template_annotations.clone();
    if without_restart == prior.spec {
        Some(ComponentPhase::Rebooting)
    } else {
        Some(ComponentPhase::Updating)
    }
}

fn set_conditions(status: &mut ClusterStatus, generation: i64, ctx: &TransformContext) {
    let components: Vec<&ComponentStatus> = status.components.values().collect();
    let replicas_ready =
        !components.is_empty() && components.iter().all(|c| c.pods_ready == Some(true));
    let ready = status.phase == Some(ClusterPhase::Running);

    let mut conditions = vec![
        if replicas_ready {
            Condition::new(condition_types::REPLICAS_READY, true, "AllReplicasReady", "")
        } else {
            Condition::new(
                condition_types::REPLICAS_READY,
                false,
                "ReplicasNotReady",
                "some component pods are not ready",
            )
        },
        if ready {
            Condition::new(condition_types::READY, true, "ClusterReady", "")
        } else {
            Condition::new(
                condition_types::READY,
                false,
                "ComponentsNotReady",
                format!("cluster phase is {:?}", status.phase),
            )
        },
    ];
    if ctx.is_updating() {
        conditions.push(Condition::new(
            condition_types::APPLY_RESOURCES,
            true,
            "ApplyResourcesSucceed",
            "",
        ));
    }
    for mut condition in conditions {
        condition.observed_generation = generation;
        status.set_condition(condition, ctx.now);
    }
}

#[async_trait]
impl Transformer for ClusterStatusTransformer {
    fn name(&self) -> &'static str {
        "cluster-status"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if ctx.is_deleting() {
            return Ok(());
        }
        let generation = ctx.cluster_meta.generation;
        let updating = ctx.is_updating();

        let marks: Vec<(String, Option<ComponentPhase>)> = if updating {
            ctx.components
                .iter()
                .map(|c| (c.name.clone(), phase_on_spec_change(ctx, dag, &c.name)))
                .collect()
        } else {
            Vec::new()
        };

        let status = root_status(dag)?;
        if updating {
            status.observed_generation = generation;
            for (name, phase) in marks {
                match (status.components.get_mut(&name), phase) {
                    (Some(existing), Some(phase)) => existing.phase = phase,
                    (Some(_), None) => {}
                    (None, phase) => {
                        let phase = phase.unwrap_or(ComponentPhase::Creating);
                        status.components.insert(name, ComponentStatus::new(phase));
                    }
                }
            }
        }
        status
            .components
            .retain(|name, _| ctx.cluster.spec.component(name).is_some());

        let phases: Vec<ComponentPhase> = status.components.values().map(|c| c.phase).collect();
        let previous = status.phase;
        status.phase = aggregate_phase(&phases, previous);
        set_conditions(status, generation, ctx);
        debug!(ctx.logger, "Aggregated cluster status"; "phase" => ?status.phase);

        let root = root_vertex(dag)?;
        if let Some(v) = dag.vertex_mut(root) {
            v.action = Some(Action::Status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComponentPhase as C;

    #[test]
    fn test_aggregate_phase() {
        assert_eq!(aggregate_phase(&[C::Failed, C::Failed], None), Some(ClusterPhase::Failed));
        assert_eq!(
            aggregate_phase(&[C::Failed, C::Running], None),
            Some(ClusterPhase::Abnormal)
        );
        assert_eq!(
            aggregate_phase(&[C::Abnormal, C::Running], Some(ClusterPhase::Running)),
            Some(ClusterPhase::Abnormal)
        );
        assert_eq!(
            aggregate_phase(&[C::Running, C::Running], None),
            Some(ClusterPhase::Running)
        );
        assert_eq!(
            aggregate_phase(&[C::Stopped, C::Stopped], None),
            Some(ClusterPhase::Stopped)
        );
        assert_eq!(
            aggregate_phase(&[C::Creating, C::Running], None),
            Some(ClusterPhase::Creating)
        );
        assert_eq!(
            aggregate_phase(&[C::Updating, C::Running], Some(ClusterPhase::Running)),
            Some(ClusterPhase::Updating)
        );
        assert_eq!(aggregate_phase(&[], Some(ClusterPhase::Running)), Some(ClusterPhase::Running));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let phases = [C::Rebooting, C::Running];
        let first = aggregate_phase(&phases, Some(ClusterPhase::Running));
        for _ in 0..3 {
            assert_eq!(aggregate_phase(&phases, Some(ClusterPhase::Running)), first);
        }
    }
}
