use async_trait::async_trait;

use crate::error::Result;
use crate::model::{labels, Kind};
use crate::plan::{LifecycleDag, TransformContext, Transformer};

/// Secrets and rendered template configs are written once
///
/// Environment configs stay mutable: role keys are published into them.
pub struct ImmutableTransformer;

#[async_trait]
impl Transformer for ImmutableTransformer {
    fn name(&self) -> &'static str {
        "immutable"
    }

    async fn transform(&self, _ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        for (_, v) in dag.vertices_mut() {
            let immutable = match v.obj.kind {
                Kind::Secret => true,
                Kind::ConfigMap => {
                    v.obj.label(labels::CONFIG_TYPE) == Some(labels::CONFIG_TYPE_TEMPLATE)
                }
                _ => false,
            };
            if immutable {
                v.immutable = true;
            }
        }
        Ok(())
    }
}
