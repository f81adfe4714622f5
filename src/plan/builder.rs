//! Cluster plan builder: Init, Validate, Build
//!
//! The builder loads one Cluster, checks what it references, synthesizes its
//! components and runs the transformer chain over a DAG seeded with the
//! Cluster as root. The result is a [`Plan`] ready to execute.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use slog::{debug, info, o, warn, Logger};

use super::context::{Precheck, TransformContext};
use super::executor::Plan;
use super::transformer::TransformerChain;
use super::vertex::{LifecycleDag, LifecycleVertex};
use crate::component::{synthesize_components, DefaultRenderer, Renderer};
use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::event::{ClusterEvent, EventBus};
use crate::model::{
    ClusterData, ClusterDefinitionData, ClusterVersionData, DefinitionPhase, Kind, ObjectData,
    ObjectKey,
};
use crate::store::{ObjectStore, ReadonlyClient};
use crate::transformers::default_chain;

/// Delay before retrying a Cluster whose references are not usable yet
pub const PRECHECK_REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// A pluggable precheck rule
///
/// Returning `Err(message)` fails the precheck; the Cluster is left alone
/// until its spec changes.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(
        &self,
        cluster: &ClusterData,
        definition: &ClusterDefinitionData,
        version: Option<&ClusterVersionData>,
    ) -> std::result::Result<(), String>;
}

/// The version must target the definition the Cluster references
pub struct VersionMatchesDefinition;

impl Validator for VersionMatchesDefinition {
    fn name(&self) -> &'static str {
        "version-matches-definition"
    }

    fn validate(
        &self,
        cluster: &ClusterData,
        _definition: &ClusterDefinitionData,
        version: Option<&ClusterVersionData>,
    ) -> std::result::Result<(), String> {
        match version {
            Some(v) if v.definition_ref != cluster.spec.definition_ref => Err(format!(
                "cluster version targets definition {}, cluster uses {}",
                v.definition_ref, cluster.spec.definition_ref
            )),
            _ => Ok(()),
        }
    }
}

pub struct ComponentDefinitionsKnown;

impl Validator for ComponentDefinitionsKnown {
    fn name(&self) -> &'static str {
        "component-definitions-known"
    }

    fn validate(
        &self,
        cluster: &ClusterData,
        definition: &ClusterDefinitionData,
        _version: Option<&ClusterVersionData>,
    ) -> std::result::Result<(), String> {
        for comp in &cluster.spec.components {
            if definition.component(&comp.definition_ref).is_none() {
                return Err(format!(
                    "component {} references unknown component definition {}",
                    comp.name, comp.definition_ref
                ));
            }
        }
        Ok(())
    }
}

pub struct NonNegativeReplicas;

impl Validator for NonNegativeReplicas {
    fn name(&self) -> &'static str {
        "non-negative-replicas"
    }

    fn validate(
        &self,
        cluster: &ClusterData,
        _definition: &ClusterDefinitionData,
        _version: Option<&ClusterVersionData>,
    ) -> std::result::Result<(), String> {
        match cluster.spec.components.iter().find(|c| c.replicas < 0) {
            Some(comp) => Err(format!(
                "component {} has negative replicas {}",
                comp.name, comp.replicas
            )),
            None => Ok(()),
        }
    }
}

pub fn default_validators() -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(VersionMatchesDefinition),
        Box::new(ComponentDefinitionsKnown),
        Box::new(NonNegativeReplicas),
    ]
}

pub struct ClusterPlanBuilder {
    store: Arc<dyn ObjectStore>,
    events: Arc<EventBus<ClusterEvent>>,
    config: ReconcilerConfig,
    logger: Logger,
    key: ObjectKey,
    renderer: Arc<dyn Renderer>,
    validators: Vec<Box<dyn Validator>>,
    chain: Option<TransformerChain>,
    ctx: Option<TransformContext>,
}

impl ClusterPlanBuilder {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        events: Arc<EventBus<ClusterEvent>>,
        config: ReconcilerConfig,
        logger: Logger,
        namespace: &str,
        name: &str,
    ) -> Self {
        let logger = logger.new(o!("cluster" => format!("{}/{}", namespace, name)));
        Self {
            store,
            events,
            config,
            logger,
            key: ObjectKey::new(Kind::Cluster, namespace, name),
            renderer: Arc::new(DefaultRenderer),
            validators: default_validators(),
            chain: None,
            ctx: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_validator<T: Validator + 'static>(mut self, validator: T) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Replace the default transformer chain
    pub fn with_chain(mut self, chain: TransformerChain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn context(&self) -> Option<&TransformContext> {
        self.ctx.as_ref()
    }

    /// Load the Cluster
    ///
    /// Returns false when it no longer exists and there is nothing to do.
    pub async fn init(&mut self) -> Result<bool> {
        let client = ReadonlyClient::new(self.store.clone());
        let Some(obj) = client.find(&self.key).await? else {
            debug!(self.logger, "Cluster not found, nothing to reconcile");
            return Ok(false);
        };
        let cluster = match obj.data {
            ObjectData::Cluster(data) => *data,
            _ => return Err(Error::Invalid(format!("{} does not hold a Cluster", self.key))),
        };

        self.ctx = Some(TransformContext {
            client,
            logger: self.logger.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
            renderer: self.renderer.clone(),
            cluster_meta: obj.meta,
            cluster,
            definition: None,
            version: None,
            components: Vec::new(),
            precheck: Precheck::Passed,
            now: SystemTime::now(),
        });
        Ok(true)
    }

    /// Check referenced resources and run the validator chain
    ///
    /// Failures are recorded on the context, not returned. Only store
    /// failures surface as errors.
    pub async fn validate(&mut self) -> Result<()> {
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| Error::Invalid("validate called before init".to_string()))?;

        let precheck = Self::check_references(ctx).await?;
        let precheck = match (&precheck, &ctx.definition) {
            (Precheck::Passed, Some(definition)) => self
                .validators
                .iter()
                .find_map(|v| {
                    v.validate(&ctx.cluster, definition, ctx.version.as_ref())
                        .err()
                        .map(|message| (v.name(), message))
                })
                .map(|(name, message)| {
                    debug!(ctx.logger, "Validator rejected cluster"; "validator" => name);
                    Precheck::Failed {
                        message,
                        retry: false,
                    }
                })
                .unwrap_or(Precheck::Passed),
            _ => precheck,
        };

        if let (Precheck::Passed, Some(definition)) = (&precheck, &ctx.definition) {
            ctx.components = synthesize_components(
                &ctx.cluster_meta.name,
                &ctx.cluster_meta.namespace,
                &ctx.cluster,
                definition,
                ctx.version.as_ref(),
                &ctx.config,
            )?;
        }
        if let Precheck::Failed { message, .. } = &precheck {
            warn!(ctx.logger, "Precheck failed"; "message" => message.as_str());
        }
        ctx.precheck = precheck;
        Ok(())
    }

    async fn check_references(ctx: &mut TransformContext) -> Result<Precheck> {
        let def_ref = ctx.cluster.spec.definition_ref.clone();
        let def_key = ObjectKey::new(Kind::ClusterDefinition, "", def_ref.as_str());
        let Some(def_obj) = ctx.client.find(&def_key).await? else {
            return Ok(Precheck::Failed {
                message: format!("cluster definition {} not found", def_ref),
                retry: true,
            });
        };
        let ObjectData::ClusterDefinition(definition) = def_obj.data else {
            return Err(Error::Invalid(format!("{} does not hold a definition", def_key)));
        };
        if definition.phase != DefinitionPhase::Available {
            return Ok(Precheck::Failed {
                message: format!("cluster definition {} is not available", def_ref),
                retry: true,
            });
        }
        ctx.definition = Some(*definition);

        let Some(version_ref) = ctx.cluster.spec.version_ref.clone() else {
            return Ok(Precheck::Passed);
        };
        let version_key = ObjectKey::new(Kind::ClusterVersion, "", version_ref.as_str());
        let Some(version_obj) = ctx.client.find(&version_key).await? else {
            return Ok(Precheck::Failed {
                message: format!("cluster version {} not found", version_ref),
                retry: true,
            });
        };
        let ObjectData::ClusterVersion(version) = version_obj.data else {
            return Err(Error::Invalid(format!("{} does not hold a version", version_key)));
        };
        if version.phase != DefinitionPhase::Available {
            return Ok(Precheck::Failed {
                message: format!("cluster version {} is not available", version_ref),
                retry: true,
            });
        }
        ctx.version = Some(version);
        Ok(Precheck::Passed)
    }

    /// Seed the root vertex and run the chain
    pub async fn build(self) -> Result<Plan> {
        let ctx = self
            .ctx
            .ok_or_else(|| Error::Invalid("build called before init".to_string()))?;
        let chain = self.chain.unwrap_or_else(default_chain);

        let cluster = ctx.cluster_object();
        let mut dag = LifecycleDag::new();
        dag.add_vertex(LifecycleVertex {
            prior: Some(cluster.clone()),
            ..LifecycleVertex::new(cluster)
        });

        let mut requeue = chain.apply(&ctx, &mut dag).await?;
        if let Precheck::Failed { retry: true, message } = &ctx.precheck {
            requeue.get_or_insert_with(|| Error::requeue(message.clone(), PRECHECK_REQUEUE_DELAY));
        }
        info!(self.logger, "Built plan"; "vertices" => dag.len(), "requeue" => requeue.is_some());
        Ok(Plan::new(dag, ctx, self.store, requeue))
    }
}
