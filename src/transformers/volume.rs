use async_trait::async_trait;
use slog::{debug, warn};

use crate::error::Result;
use crate::event::{reasons, ClusterEvent};
use crate::model::{Kind, ObjectData};
use crate::plan::{
    add_child, find_vertex, root_vertex, Action, LifecycleDag, LifecycleVertex, TransformContext,
    Transformer,
};

/// Grows volume claims to the declared size; shrinking is refused
pub struct VolumeExpansionTransformer;

#[async_trait]
impl Transformer for VolumeExpansionTransformer {
    fn name(&self) -> &'static str {
        "volume-expansion"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if ctx.is_deleting() {
            return Ok(());
        }
        let root = root_vertex(dag)?;
        for comp in &ctx.components {
            let Some(volume) = &comp.volume else { continue };
            let parent = find_vertex(dag, &comp.workload_key()).unwrap_or(root);
            let claims = ctx
                .client
                .list(Kind::PersistentVolumeClaim, ctx.namespace(), &comp.selector())
                .await?;
            for claim in claims {
                let Some(requested) = claim.as_volume_claim().map(|c| c.requested_bytes) else {
                    continue;
                };
                if requested > volume.size_bytes {
                    warn!(ctx.logger, "Volume shrink is not supported";
                        "claim" => claim.name(), "requested" => requested,
                        "declared" => volume.size_bytes);
                    ctx.record(ClusterEvent::warning(
                        claim.key(),
                        reasons::VOLUME_SHRINK,
                        format!(
                            "can't shrink volume claim {} from {} to {} bytes",
                            claim.name(),
                            requested,
                            volume.size_bytes
                        ),
                    ));
                    continue;
                }
                if requested == volume.size_bytes {
                    continue;
                }
                debug!(ctx.logger, "Expanding volume claim";
                    "claim" => claim.name(), "from" => requested, "to" => volume.size_bytes);
                let mut desired = claim.clone();
                if let ObjectData::VolumeClaim(data) = &mut desired.data {
                    data.requested_bytes = volume.size_bytes;
                }
                add_child(
                    dag,
                    parent,
                    LifecycleVertex {
                        prior: Some(claim),
                        ..LifecycleVertex::with_action(desired, Action::Update)
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{labels, Object, ObjectData, ObjectMeta, VolumeClaimData, VolumeSpec};
    use crate::plan::find_all;
    use crate::store::{InMemoryStore, ObjectStore};
    use crate::testing;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_grows_claims_and_refuses_shrink() {
        let store = Arc::new(InMemoryStore::new());
        for (i, size) in [(0, 10u64), (1, 20), (2, 40)] {
            let claim = Object::new(
                Kind::PersistentVolumeClaim,
                ObjectMeta::new("default", format!("data-c-db-{}", i)),
                ObjectData::VolumeClaim(VolumeClaimData {
                    storage_class: None,
                    requested_bytes: size,
                    capacity_bytes: size,
                }),
            )
            .with_label(labels::INSTANCE, "c")
            .with_label(labels::COMPONENT, "db");
            store.create(claim).await.unwrap();
        }
        let cluster = testing::cluster("c", 3);
        let mut ctx = testing::context(store, &cluster);
        ctx.components[0].volume = Some(VolumeSpec {
            size_bytes: 20,
            storage_class: None,
        });
        let mut events = ctx.events.subscribe();
        let mut dag = LifecycleDag::new();
        dag.add_vertex(LifecycleVertex::new(cluster));

        VolumeExpansionTransformer.transform(&ctx, &mut dag).await.unwrap();

        let claims = find_all(&dag, Kind::PersistentVolumeClaim);
        assert_eq!(claims.len(), 1);
        let v = dag.vertex(claims[0]).unwrap();
        assert_eq!(v.obj.name(), "data-c-db-0");
        assert_eq!(v.obj.as_volume_claim().unwrap().requested_bytes, 20);
        assert_eq!(v.action, Some(Action::Update));
        assert_eq!(events.recv().await.unwrap().reason, reasons::VOLUME_SHRINK);
    }
}
