use async_trait::async_trait;
use slog::debug;

use crate::error::Result;
use crate::model::labels;
use crate::plan::{root_vertex, LifecycleDag, TransformContext, Transformer};

/// Repairs the Cluster's own metadata: finalizer and reference labels
pub struct MetadataTransformer;

#[async_trait]
impl Transformer for MetadataTransformer {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if ctx.is_deleting() {
            return Ok(());
        }
        let root = root_vertex(dag)?;
        let Some(v) = dag.vertex_mut(root) else {
            return Ok(());
        };
        let meta = &mut v.obj.meta;
        if meta.add_finalizer(&ctx.config.finalizer) {
            debug!(ctx.logger, "Added cluster finalizer");
        }
        meta.labels.insert(
            labels::CLUSTER_DEFINITION.to_string(),
            ctx.cluster.spec.definition_ref.clone(),
        );
        match &ctx.cluster.spec.version_ref {
            Some(version) => {
                meta.labels
                    .insert(labels::CLUSTER_VERSION.to_string(), version.clone());
            }
            None => {
                meta.labels.remove(labels::CLUSTER_VERSION);
            }
        }
        Ok(())
    }
}
