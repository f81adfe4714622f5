use async_trait::async_trait;
use slog::debug;

use crate::error::Result;
use crate::plan::{
    add_child, root_vertex, LifecycleDag, LifecycleVertex, TransformContext, Transformer,
};

/// Renders the desired objects of every component
///
/// The workload depends on its environment config and the shared credential
/// secret, so both are its children and get created first.
pub struct ComponentTransformer;

#[async_trait]
impl Transformer for ComponentTransformer {
    fn name(&self) -> &'static str {
        "component"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if ctx.components.is_empty() {
            return Ok(());
        }
        let root = root_vertex(dag)?;
        let renderer = &ctx.renderer;

        let secret = renderer.credential_secret(ctx.cluster_name(), ctx.namespace());
        let secret = add_child(dag, root, LifecycleVertex::new(secret));

        for comp in &ctx.components {
            let workload = add_child(dag, root, LifecycleVertex::new(renderer.workload(comp)));
            dag.connect(workload, secret);
            add_child(dag, workload, LifecycleVertex::new(renderer.env_config(comp)));
            for svc in renderer.services(comp) {
                add_child(dag, root, LifecycleVertex::new(svc));
            }
            if let Some(pdb) = renderer.disruption_budget(comp) {
                add_child(dag, root, LifecycleVertex::new(pdb));
            }
            debug!(ctx.logger, "Rendered component"; "component" => comp.name.as_str());
        }
        Ok(())
    }
}
