use std::time::Duration;

use async_trait::async_trait;
use slog::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Kind, ObjectKey, TlsIssuer};
use crate::plan::{
    add_child, find_vertex, LifecycleDag, LifecycleVertex, TransformContext, Transformer,
};

/// Delay before checking again for a user-provided TLS secret
pub const TLS_SECRET_REQUEUE_DELAY: Duration = Duration::from_secs(10);

/// Adds certificate secrets for components with TLS enabled
pub struct TlsTransformer;

#[async_trait]
impl Transformer for TlsTransformer {
    fn name(&self) -> &'static str {
        "tls"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        let mut missing = Vec::new();
        for comp in &ctx.components {
            let Some(tls) = &comp.tls else { continue };
            let Some(workload) = find_vertex(dag, &comp.workload_key()) else {
                continue;
            };
            match &tls.issuer {
                TlsIssuer::Operator => {
                    let secret = ctx.renderer.tls_secret(comp);
                    add_child(dag, workload, LifecycleVertex::new(secret));
                    debug!(ctx.logger, "Added TLS secret"; "component" => comp.name.as_str());
                }
                TlsIssuer::UserProvided { .. } if ctx.is_deleting() => {}
                TlsIssuer::UserProvided { secret_name } => {
                    let key = ObjectKey::new(Kind::Secret, ctx.namespace(), secret_name.as_str());
                    if ctx.client.find(&key).await?.is_none() {
                        warn!(ctx.logger, "User-provided TLS secret not found";
                            "component" => comp.name.as_str(), "secret" => secret_name.as_str());
                        missing.push(secret_name.clone());
                    }
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::requeue(
            format!("TLS secrets not found: {}", missing.join(", ")),
            TLS_SECRET_REQUEUE_DELAY,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectData, ObjectMeta, Object, TlsSpec};
    use crate::store::{InMemoryStore, ObjectStore};
    use crate::testing;
    use crate::transformers::ComponentTransformer;
    use std::sync::Arc;

    async fn run(issuer: TlsIssuer, store: Arc<InMemoryStore>) -> (LifecycleDag, Result<()>) {
        let cluster = testing::cluster("c", 1);
        let mut ctx = testing::context(store, &cluster);
        ctx.components[0].tls = Some(TlsSpec { issuer });
        let mut dag = LifecycleDag::new();
        dag.add_vertex(LifecycleVertex::new(cluster));
        ComponentTransformer.transform(&ctx, &mut dag).await.unwrap();
        let result = TlsTransformer.transform(&ctx, &mut dag).await;
        (dag, result)
    }

    #[tokio::test]
    async fn test_operator_issuer_adds_secret_under_workload() {
        let (dag, result) = run(TlsIssuer::Operator, Arc::new(InMemoryStore::new())).await;
        result.unwrap();
        let secret = find_vertex(&dag, &ObjectKey::new(Kind::Secret, "default", "c-db-tls-certs"))
            .unwrap();
        let workload = find_vertex(&dag, &ObjectKey::new(Kind::StatefulSet, "default", "c-db"))
            .unwrap();
        assert!(dag.has_edge(workload, secret));
    }

    #[tokio::test]
    async fn test_missing_user_secret_requeues() {
        let issuer = TlsIssuer::UserProvided {
            secret_name: "my-certs".to_string(),
        };
        let (_, result) = run(issuer.clone(), Arc::new(InMemoryStore::new())).await;
        assert_eq!(result.unwrap_err().requeue_after(), Some(TLS_SECRET_REQUEUE_DELAY));

        let store = Arc::new(InMemoryStore::new());
        store
            .create(Object::new(
                Kind::Secret,
                ObjectMeta::new("default", "my-certs"),
                ObjectData::KeyValues(Default::default()),
            ))
            .await
            .unwrap();
        let (_, result) = run(issuer, store).await;
        assert!(result.is_ok());
    }
}
