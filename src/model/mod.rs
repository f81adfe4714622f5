//! Object model for managed platform objects and the Cluster resources
//!
//! Every object the engine touches is an [`Object`]: common metadata plus a
//! kind-specific payload. Objects are addressed by [`ObjectKey`], a value type
//! combining kind, namespace and name.

pub mod cluster;
pub mod definition;
pub mod labels;
pub mod object;
pub mod workload;

pub use cluster::{
    condition_types, ClusterData, ClusterPhase, ClusterSpec, ClusterStatus, ComponentPhase,
    ComponentSpec, ComponentStatus, Condition, ConsensusMemberStatus, ConsensusSetStatus,
    MessageMap, ReplicationMemberStatus, ReplicationSetStatus, TerminationPolicy, TlsIssuer,
    TlsSpec, VolumeSpec,
};
pub use definition::{
    AccessMode, ClusterDefinitionData, ClusterVersionData, ComponentDefinition, ConsensusMember,
    ConsensusSpec, DefinitionPhase, UpdateStrategy, WorkloadType,
};
pub use object::{Kind, Object, ObjectData, ObjectKey, ObjectMeta, OwnerReference};
pub use workload::{
    ContainerStatus, PodCondition, PodConditionType, PodData, PodPhase, VolumeClaimData,
    WorkloadData, WorkloadSpec, WorkloadStatus, WorkloadUpdateStrategy,
};
