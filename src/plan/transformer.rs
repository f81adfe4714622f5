//! Transformers and the chains that run them
//!
//! A transformer mutates the plan DAG in place. A chain runs its members in
//! order: `FastReturn` stops building without failing, `Requeue` is remembered
//! and returned once the chain completes, any other error aborts.

use async_trait::async_trait;
use futures::future::join_all;
use slog::{debug, warn};

use super::context::TransformContext;
use super::vertex::LifecycleDag;
use crate::error::{Error, Result};

#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()>;
}

#[derive(Default)]
pub struct TransformerChain {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    pub fn push(&mut self, transformer: Box<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    /// Run every transformer in order
    ///
    /// Returns the first delayed requeue raised along the way, if any.
    pub async fn apply(
        &self,
        ctx: &TransformContext,
        dag: &mut LifecycleDag,
    ) -> Result<Option<Error>> {
        let mut delayed = None;
        for transformer in &self.transformers {
            debug!(ctx.logger, "Running transformer"; "transformer" => transformer.name());
            match transformer.transform(ctx, dag).await {
                Ok(()) => {}
                Err(Error::FastReturn) => {
                    debug!(ctx.logger, "Fast return"; "transformer" => transformer.name());
                    return Ok(delayed);
                }
                Err(e @ Error::Requeue { .. }) => {
                    warn!(ctx.logger, "Transformer requested requeue";
                        "transformer" => transformer.name(), "reason" => %e);
                    delayed.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(delayed)
    }
}

/// Runs its members concurrently, each against a private copy of the DAG
///
/// Copies are merged back serially in member order. Merging only adds
/// vertices and edges, so members may add to the graph but their changes to
/// vertices that already existed are discarded.
pub struct ParallelTransformers {
    name: &'static str,
    members: Vec<Box<dyn Transformer>>,
}

impl ParallelTransformers {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            members: Vec::new(),
        }
    }

    pub fn with<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.members.push(Box::new(transformer));
        self
    }
}

#[async_trait]
impl Transformer for ParallelTransformers {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        let runs = self.members.iter().map(|member| {
            let mut scratch = dag.clone();
            async move {
                let result = member.transform(ctx, &mut scratch).await;
                (result, scratch)
            }
        });
        let results = join_all(runs).await;

        let mut fast_return = false;
        let mut requeue = None;
        let mut failure = None;
        for (result, scratch) in results {
            match result {
                Ok(()) => dag.merge(scratch),
                Err(Error::FastReturn) => {
                    dag.merge(scratch);
                    fast_return = true;
                }
                Err(e @ Error::Requeue { .. }) => {
                    dag.merge(scratch);
                    requeue.get_or_insert(e);
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if fast_return {
            return Err(Error::FastReturn);
        }
        match requeue {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
