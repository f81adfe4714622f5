//! Snapshot of every live object owned by one Cluster

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{labels, Kind, Object, ObjectKey, ObjectMeta};
use crate::store::client::selector;
use crate::store::ReadonlyClient;

pub type ClusterSnapshot = HashMap<ObjectKey, Object>;

fn owned_by(obj: &Object, cluster: &ObjectMeta) -> bool {
    obj.meta
        .owner_references
        .iter()
        .any(|r| r.kind == Kind::Cluster && r.name == cluster.name && r.uid == cluster.uid)
}

/// List each owned kind by instance label and keep what the Cluster owns
pub async fn read_cluster_snapshot(
    client: &ReadonlyClient,
    cluster: &ObjectMeta,
) -> Result<ClusterSnapshot> {
    let sel = selector(&[
        (labels::INSTANCE, cluster.name.as_str()),
        (labels::MANAGED_BY, labels::MANAGED_BY_VALUE),
    ]);
    let mut snapshot = ClusterSnapshot::new();
    for kind in Kind::OWNED {
        for obj in client.list(kind, &cluster.namespace, &sel).await? {
            if owned_by(&obj, cluster) {
                snapshot.insert(obj.key(), obj);
            }
        }
    }
    Ok(snapshot)
}
