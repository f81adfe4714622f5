//! Horizontal scaling side effects
//!
//! The workload itself is scaled by the ordinary update of its vertex. This
//! transformer guards scale-in of consensus sets and manages the jobs that
//! clean up volume claims left behind by removed ordinals.

use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde_json::json;
use slog::{info, warn};

use super::ownership::stamp_ownership;
use crate::component::{pod, SynthesizedComponent};
use crate::error::{Error, Result};
use crate::event::{reasons, ClusterEvent};
use crate::model::{labels, Kind, Object, ObjectData, ObjectMeta, WorkloadType};
use crate::plan::{
    add_child, root_vertex, Action, LifecycleDag, LifecycleVertex, TransformContext, Transformer,
};

pub struct HorizontalScaleTransformer;

fn cleanup_job_name(claim: &str) -> String {
    format!("{}-cleanup", claim)
}

/// A scheduled job deleting `claim` once the grace window has passed
fn cleanup_job(ctx: &TransformContext, comp: &SynthesizedComponent, claim: &str) -> Object {
    let run_at = (ctx.now + ctx.config.pvc_cleanup_grace)
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let mut obj = Object::new(
        Kind::CronJob,
        ObjectMeta {
            labels: comp.labels(),
            ..ObjectMeta::new(comp.namespace.clone(), cleanup_job_name(claim))
        },
        ObjectData::Opaque(json!({ "action": "delete-pvc", "claim": claim, "runAt": run_at })),
    )
    .with_label(labels::PVC_CLEANUP, claim);
    stamp_ownership(ctx, &mut obj);
    obj
}

impl HorizontalScaleTransformer {
    async fn scale_in(
        &self,
        ctx: &TransformContext,
        dag: &mut LifecycleDag,
        comp: &SynthesizedComponent,
        from: i32,
    ) -> Result<()> {
        let to = comp.replicas;
        if let Some(spec) = &comp.consensus {
            let pods = ctx.client.list(Kind::Pod, ctx.namespace(), &comp.selector()).await?;
            let leader = pods.iter().find(|p| {
                pod::role(p) == Some(spec.leader.name.as_str())
                    && pod::ordinal(p.name()).is_some_and(|o| o >= to)
            });
            if let Some(leader) = leader {
                warn!(ctx.logger, "Refusing to scale in away from the leader";
                    "component" => comp.name.as_str(), "pod" => leader.name());
                ctx.record(ClusterEvent::warning(
                    ctx.cluster_key(),
                    reasons::HORIZONTAL_SCALE,
                    format!(
                        "can't scale in component {} to {}: pod {} is the leader",
                        comp.name,
                        to,
                        leader.name()
                    ),
                ));
                return Err(Error::LeaderScaleIn {
                    component: comp.name.clone(),
                    pod: leader.name().to_string(),
                });
            }
        }

        let root = root_vertex(dag)?;
        let claims = ctx
            .client
            .list(Kind::PersistentVolumeClaim, ctx.namespace(), &comp.selector())
            .await?;
        for claim in claims
            .iter()
            .filter(|c| pod::ordinal(c.name()).is_some_and(|o| o >= to))
        {
            let job = cleanup_job(ctx, comp, claim.name());
            add_child(dag, root, LifecycleVertex::with_action(job, Action::Create));
        }

        info!(ctx.logger, "Scaling in";
            "component" => comp.name.as_str(), "from" => from, "to" => to);
        ctx.record(ClusterEvent::normal(
            ctx.cluster_key(),
            reasons::HORIZONTAL_SCALE,
            format!("scale in component {} from {} to {}", comp.name, from, to),
        ));
        Ok(())
    }

    async fn scale_out(
        &self,
        ctx: &TransformContext,
        dag: &mut LifecycleDag,
        comp: &SynthesizedComponent,
        from: i32,
    ) -> Result<()> {
        let to = comp.replicas;
        let root = root_vertex(dag)?;
        // Cleanup jobs for ordinals coming back are obsolete.
        let jobs = ctx.client.list(Kind::CronJob, ctx.namespace(), &comp.selector()).await?;
        for job in jobs {
            let Some(claim) = job.label(labels::PVC_CLEANUP) else { continue };
            if pod::ordinal(claim).is_some_and(|o| o < to) {
                add_child(dag, root, LifecycleVertex::orphan(job));
            }
        }

        info!(ctx.logger, "Scaling out";
            "component" => comp.name.as_str(), "from" => from, "to" => to);
        ctx.record(ClusterEvent::normal(
            ctx.cluster_key(),
            reasons::HORIZONTAL_SCALE,
            format!("scale out component {} from {} to {}", comp.name, from, to),
        ));
        Ok(())
    }
}

#[async_trait]
impl Transformer for HorizontalScaleTransformer {
    fn name(&self) -> &'static str {
        "horizontal-scale"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if ctx.is_deleting() {
            return Ok(());
        }
        for comp in &ctx.components {
            if comp.workload_type == WorkloadType::Stateless {
                continue;
            }
            let Some(live) = ctx.client.find(&comp.workload_key()).await? else {
                continue;
            };
            let Some(from) = live.as_workload().map(|w| w.spec.replicas) else {
                continue;
            };
            if comp.replicas < from {
                self.scale_in(ctx, dag, comp, from).await?;
            } else if comp.replicas > from {
                self.scale_out(ctx, dag, comp, from).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{VolumeClaimData, WorkloadData};
    use crate::plan::find_all;
    use crate::store::{InMemoryStore, ObjectStore};
    use crate::testing;

    use std::sync::Arc;

    async fn seed(store: &InMemoryStore, replicas: i32, leader: i32) {
        let mut data = WorkloadData::default();
        data.spec.replicas = replicas;
        let sts = Object::new(
            Kind::StatefulSet,
            ObjectMeta::new("default", "c-db"),
            ObjectData::Workload(data),
        );
        store.create(sts).await.unwrap();
        for i in 0..replicas {
            let role = if i == leader { "leader" } else { "follower" };
            store.create(testing::pod(i, Some(role), true)).await.unwrap();
            let claim = Object::new(
                Kind::PersistentVolumeClaim,
                ObjectMeta::new("default", format!("data-c-db-{}", i)),
                ObjectData::VolumeClaim(VolumeClaimData::default()),
            )
            .with_label(labels::INSTANCE, "c")
            .with_label(labels::COMPONENT, "db");
            store.create(claim).await.unwrap();
        }
    }

    fn dag_for(cluster: Object) -> LifecycleDag {
        let mut dag = LifecycleDag::new();
        dag.add_vertex(LifecycleVertex::new(cluster));
        dag
    }

    #[tokio::test]
    async fn test_scale_in_rejects_removing_leader() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, 3, 2).await;
        let cluster = testing::cluster("c", 2);
        let ctx = testing::context(store, &cluster);
        let mut dag = dag_for(cluster);

        let err = HorizontalScaleTransformer.transform(&ctx, &mut dag).await.unwrap_err();
        match err {
            Error::LeaderScaleIn { component, pod } => {
                assert_eq!(component, "db");
                assert_eq!(pod, "c-db-2");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(dag.len(), 1);
    }

    #[tokio::test]
    async fn test_scale_in_schedules_claim_cleanup() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, 3, 0).await;
        let cluster = testing::cluster("c", 1);
        let ctx = testing::context(store, &cluster);
        let mut dag = dag_for(cluster);

        HorizontalScaleTransformer.transform(&ctx, &mut dag).await.unwrap();
        let jobs = find_all(&dag, Kind::CronJob);
        assert_eq!(jobs.len(), 2);
        for id in jobs {
            let v = dag.vertex(id).unwrap();
            assert_eq!(v.action, Some(Action::Create));
            assert!(v.obj.label(labels::PVC_CLEANUP).is_some());
            assert!(v.obj.meta.has_finalizer(&ctx.config.finalizer));
            assert_eq!(v.obj.instance(), Some("c"));
        }
    }

    #[tokio::test]
    async fn test_scale_out_removes_obsolete_cleanup_jobs() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, 1, 0).await;
        let cluster = testing::cluster("c", 3);
        let ctx = testing::context(store.clone(), &cluster);
        store
            .create(cleanup_job(&ctx, &ctx.components[0], "data-c-db-1"))
            .await
            .unwrap();
        store
            .create(cleanup_job(&ctx, &ctx.components[0], "data-c-db-4"))
            .await
            .unwrap();
        let mut dag = dag_for(cluster);

        HorizontalScaleTransformer.transform(&ctx, &mut dag).await.unwrap();
        let jobs = find_all(&dag, Kind::CronJob);
        assert_eq!(jobs.len(), 1);
        let v = dag.vertex(jobs[0]).unwrap();
        assert!(v.orphan);
        assert_eq!(v.obj.name(), "data-c-db-1-cleanup");
    }
}
