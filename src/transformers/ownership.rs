use async_trait::async_trait;

use crate::error::Result;
use crate::model::{labels, Kind, Object, OwnerReference};
use crate::plan::{root_vertex, LifecycleDag, TransformContext, Transformer};

/// Tag `obj` as owned by the Cluster in `ctx`
///
/// The owner reference names the Cluster's uid so a recreated Cluster of
/// the same name does not adopt it.
pub fn stamp_ownership(ctx: &TransformContext, obj: &mut Object) {
    obj.meta.add_finalizer(&ctx.config.finalizer);
    let owner = OwnerReference {
        kind: Kind::Cluster,
        name: ctx.cluster_meta.name.clone(),
        uid: ctx.cluster_meta.uid.clone(),
    };
    if !obj.meta.owner_references.contains(&owner) {
        obj.meta.owner_references.push(owner);
    }
    obj.meta
        .labels
        .insert(labels::INSTANCE.to_string(), ctx.cluster_meta.name.clone());
    obj.meta.labels.insert(
        labels::MANAGED_BY.to_string(),
        labels::MANAGED_BY_VALUE.to_string(),
    );
}

/// Stamps finalizer, owner reference and instance labels on every owned vertex
pub struct OwnershipTransformer;

#[async_trait]
impl Transformer for OwnershipTransformer {
    fn name(&self) -> &'static str {
        "ownership"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        let root = root_vertex(dag)?;
        for (id, v) in dag.vertices_mut() {
            if id == root || v.orphan || v.obj.kind == Kind::Pod {
                continue;
            }
            stamp_ownership(ctx, &mut v.obj);
        }
        Ok(())
    }
}
