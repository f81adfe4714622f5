//! Members of the cluster build chain
//!
//! [`default_chain`] wires them in the order a reconcile needs: metadata and
//! desired objects first, then action resolution, then the policies and
//! status passes that read the resolved graph.

mod cluster_status;
mod component;
mod component_status;
mod deletion;
mod hscale;
mod immutable;
mod metadata;
mod ownership;
mod precheck;
mod tls;
mod volume;

pub use cluster_status::{aggregate_phase, ClusterStatusTransformer};
pub use component::ComponentTransformer;
pub use component_status::ComponentStatusTransformer;
pub use deletion::DeletionPolicyTransformer;
pub use hscale::HorizontalScaleTransformer;
pub use immutable::ImmutableTransformer;
pub use metadata::MetadataTransformer;
pub use ownership::{stamp_ownership, OwnershipTransformer};
pub use precheck::PrecheckTransformer;
pub use tls::TlsTransformer;
pub use volume::VolumeExpansionTransformer;

use crate::error::Result;
use crate::model::ClusterStatus;
use crate::plan::{
    root_vertex, LifecycleDag, ObjectActionTransformer, ParallelTransformers, TransformerChain,
};

pub fn default_chain() -> TransformerChain {
    TransformerChain::new()
        .with(PrecheckTransformer)
        .with(MetadataTransformer)
        .with(ComponentTransformer)
        .with(TlsTransformer)
        .with(OwnershipTransformer)
        .with(ImmutableTransformer)
        .with(ObjectActionTransformer)
        .with(DeletionPolicyTransformer)
        .with(
            ParallelTransformers::new("scale-and-volume")
                .with(HorizontalScaleTransformer)
                .with(VolumeExpansionTransformer),
        )
        .with(ComponentStatusTransformer)
        .with(ClusterStatusTransformer)
}

/// Status of the Cluster held by the root vertex
fn root_status(dag: &mut LifecycleDag) -> Result<&mut ClusterStatus> {
    let root = root_vertex(dag)?;
    dag.vertex_mut(root)
        .and_then(|v| v.obj.as_cluster_mut())
        .map(|c| &mut c.status)
        .ok_or_else(|| crate::error::Error::Invalid("root vertex is not a Cluster".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_order() {
        assert_eq!(
            default_chain().names(),
            vec![
                "precheck",
                "metadata",
                "component",
                "tls",
                "ownership",
                "immutable",
                "object-action",
                "deletion-policy",
                "scale-and-volume",
                "component-status",
                "cluster-status",
            ]
        );
    }
}
