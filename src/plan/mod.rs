//! Plans: lifecycle DAGs, the transformers that build them and their execution
//!
//! Building starts from a DAG holding only the Cluster. A fixed chain of
//! [`Transformer`]s adds the desired objects, resolves each one against the
//! live snapshot into an [`Action`], and the resulting [`Plan`] applies them.

pub mod builder;
pub mod context;
pub mod executor;
pub mod resolver;
pub mod snapshot;
pub mod transformer;
pub mod vertex;

pub use builder::{default_validators, ClusterPlanBuilder, Validator, PRECHECK_REQUEUE_DELAY};
pub use context::{Precheck, TransformContext};
pub use executor::{merge_onto_live, Plan};
pub use resolver::{diff_keys, KeyDiff, ObjectActionTransformer};
pub use snapshot::{read_cluster_snapshot, ClusterSnapshot};
pub use transformer::{ParallelTransformers, Transformer, TransformerChain};
pub use vertex::{
    add_child, find_all, find_vertex, key_compare, root_vertex, weight_compare, Action,
    LifecycleDag, LifecycleVertex,
};
