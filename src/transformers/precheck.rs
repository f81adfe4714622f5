use async_trait::async_trait;
use slog::{debug, warn};

use super::root_status;
use crate::error::{Error, Result};
use crate::event::{reasons, ClusterEvent};
use crate::model::{condition_types, Condition};
use crate::plan::{root_vertex, Action, LifecycleDag, Precheck, TransformContext, Transformer};

/// Records the builder's precheck and stops the build when it failed
pub struct PrecheckTransformer;

#[async_trait]
impl Transformer for PrecheckTransformer {
    fn name(&self) -> &'static str {
        "precheck"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        if ctx.is_deleting() {
            return Ok(());
        }
        let generation = ctx.cluster_meta.generation;
        let (condition, failed) = match &ctx.precheck {
            Precheck::Passed => (
                Condition::new(condition_types::PROVISIONING_STARTED, true, "PreCheckSucceed", ""),
                None,
            ),
            Precheck::Failed { message, .. } => (
                Condition::new(
                    condition_types::PROVISIONING_STARTED,
                    false,
                    "PreCheckFailed",
                    message.as_str(),
                ),
                Some(message),
            ),
        };
        let condition = Condition {
            observed_generation: generation,
            ..condition
        };
        root_status(dag)?.set_condition(condition, ctx.now);

        let Some(message) = failed else {
            debug!(ctx.logger, "Precheck passed");
            return Ok(());
        };
        warn!(ctx.logger, "Stopping build after failed precheck"; "message" => message.as_str());
        let root = root_vertex(dag)?;
        if let Some(v) = dag.vertex_mut(root) {
            v.action = Some(Action::Status);
        }
        ctx.record(ClusterEvent::warning(
            ctx.cluster_key(),
            reasons::PRECHECK_FAILED,
            message.clone(),
        ));
        Err(Error::FastReturn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::testing;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_failed_precheck_fast_returns_with_status_root() {
        let cluster = testing::cluster("c", 3);
        let mut ctx = testing::context(Arc::new(InMemoryStore::new()), &cluster);
        ctx.precheck = Precheck::Failed {
            message: "cluster definition mydef not found".to_string(),
            retry: true,
        };
        let mut events = ctx.events.subscribe();
        let mut dag = LifecycleDag::new();
        let root = dag.add_vertex(crate::plan::LifecycleVertex::new(cluster));

        let err = PrecheckTransformer.transform(&ctx, &mut dag).await.unwrap_err();
        assert!(matches!(err, Error::FastReturn));
        let v = dag.vertex(root).unwrap();
        assert_eq!(v.action, Some(Action::Status));
        let cond = v
            .obj
            .as_cluster()
            .unwrap()
            .status
            .condition(condition_types::PROVISIONING_STARTED)
            .unwrap();
        assert!(!cond.status);
        assert_eq!(cond.reason, "PreCheckFailed");
        assert_eq!(events.recv().await.unwrap().reason, reasons::PRECHECK_FAILED);
    }

    #[tokio::test]
    async fn test_passed_precheck_records_condition() {
        let cluster = testing::cluster("c", 3);
        let ctx = testing::context(Arc::new(InMemoryStore::new()), &cluster);
        let mut dag = LifecycleDag::new();
        let root = dag.add_vertex(crate::plan::LifecycleVertex::new(cluster));

        PrecheckTransformer.transform(&ctx, &mut dag).await.unwrap();
        let v = dag.vertex(root).unwrap();
        assert!(v.action.is_none());
        let cond = v
            .obj
            .as_cluster()
            .unwrap()
            .status
            .condition(condition_types::PROVISIONING_STARTED)
            .unwrap();
        assert!(cond.status);
        assert_eq!(cond.observed_generation, 1);
    }
}
