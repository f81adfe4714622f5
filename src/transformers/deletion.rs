use async_trait::async_trait;
use slog::{info, warn};

use crate::error::{Error, Result};
use crate::event::{reasons, ClusterEvent};
use crate::model::{labels, Kind, TerminationPolicy};
use crate::plan::{
    add_child, root_vertex, Action, LifecycleDag, LifecycleVertex, TransformContext, Transformer,
};
use crate::store::client::selector;

/// Applies the Cluster's termination policy while it is being deleted
pub struct DeletionPolicyTransformer;

impl DeletionPolicyTransformer {
    /// Delete every listed object of `kind` under the root, after the workloads
    async fn delete_kind(
        ctx: &TransformContext,
        dag: &mut LifecycleDag,
        kind: Kind,
        keep_retained: bool,
    ) -> Result<usize> {
        let root = root_vertex(dag)?;
        let workloads: Vec<_> = dag
            .vertices()
            .filter(|(_, v)| v.kind().is_workload())
            .map(|(id, _)| id)
            .collect();
        let sel = selector(&[(labels::INSTANCE, ctx.cluster_name())]);
        let mut count = 0;
        for obj in ctx.client.list(kind, ctx.namespace(), &sel).await? {
            if keep_retained
                && obj.label(labels::BACKUP_PROTECTION) == Some(labels::BACKUP_RETAIN)
            {
                continue;
            }
            let id = add_child(
                dag,
                root,
                LifecycleVertex {
                    prior: Some(obj.clone()),
                    ..LifecycleVertex::with_action(obj, Action::Delete)
                },
            );
            for workload in &workloads {
                dag.connect(id, *workload);
            }
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl Transformer for DeletionPolicyTransformer {
    fn name(&self) -> &'static str {
        "deletion-policy"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if !ctx.is_deleting() {
            return Ok(());
        }
        let policy = ctx.cluster.spec.termination_policy;
        match policy {
            TerminationPolicy::DoNotTerminate => {
                let root = root_vertex(dag)?;
                for id in dag.vertex_ids() {
                    if id != root {
                        dag.remove_vertex(id);
                    }
                }
                if let Some(v) = dag.vertex_mut(root) {
                    v.action = Some(Action::Status);
                    if let Some(cluster) = v.obj.as_cluster_mut() {
                        cluster.status.message =
                            "deletion is blocked by termination policy DoNotTerminate".to_string();
                    }
                }
                warn!(ctx.logger, "Cluster deletion blocked"; "policy" => ?policy);
                ctx.record(ClusterEvent::warning(
                    ctx.cluster_key(),
                    reasons::DELETION_BLOCKED,
                    "termination policy DoNotTerminate forbids deleting this cluster",
                ));
                return Err(Error::FastReturn);
            }
            TerminationPolicy::Halt => {}
            TerminationPolicy::Delete => {
                Self::delete_kind(ctx, dag, Kind::PersistentVolumeClaim, false).await?;
            }
            TerminationPolicy::WipeOut => {
                Self::delete_kind(ctx, dag, Kind::PersistentVolumeClaim, false).await?;
                Self::delete_kind(ctx, dag, Kind::Backup, true).await?;
                Self::delete_kind(ctx, dag, Kind::VolumeSnapshot, true).await?;
            }
        }
        info!(ctx.logger, "Applying termination policy"; "policy" => ?policy);
        Ok(())
    }
}
