//! Object-action resolver
//!
//! Diffs the vertices built so far against the live snapshot and assigns
//! every vertex its action. Objects that are live but no longer desired
//! become orphan vertices under the root.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use slog::debug;

use super::context::TransformContext;
use super::snapshot::read_cluster_snapshot;
use super::transformer::Transformer;
use super::vertex::{add_child, root_vertex, Action, LifecycleDag, LifecycleVertex};
use crate::error::Result;
use crate::graph::VertexId;
use crate::model::{labels, Kind, Object, ObjectKey};

/// Partition of desired ∪ live keys
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub create: BTreeSet<ObjectKey>,
    pub update: BTreeSet<ObjectKey>,
    pub delete: BTreeSet<ObjectKey>,
}

pub fn diff_keys<'a>(
    desired: impl IntoIterator<Item = &'a ObjectKey>,
    live: impl IntoIterator<Item = &'a ObjectKey>,
) -> KeyDiff {
    let desired: BTreeSet<ObjectKey> = desired.into_iter().cloned().collect();
    let live: BTreeSet<ObjectKey> = live.into_iter().cloned().collect();
    KeyDiff {
        create: desired.difference(&live).cloned().collect(),
        update: desired.intersection(&live).cloned().collect(),
        delete: live.difference(&desired).cloned().collect(),
    }
}

/// Objects another process manages even though they carry our labels
///
/// Only honored while the Cluster lives; deletion takes everything.
fn managed_elsewhere(obj: &Object) -> bool {
    (obj.kind == Kind::Secret && obj.label(labels::ACCOUNT_MANAGED).is_some())
        || obj.label(labels::PVC_CLEANUP).is_some()
}

/// Make every non-workload vertex in `ids` a parent of every workload vertex
///
/// Executed in reverse order, this deletes workloads before what they use.
pub fn add_delete_ordering(dag: &mut LifecycleDag, ids: &[VertexId]) {
    let (workloads, others): (Vec<VertexId>, Vec<VertexId>) = ids
        .iter()
        .copied()
        .partition(|id| dag.vertex(*id).map(|v| v.kind().is_workload()).unwrap_or(false));
    for other in &others {
        for workload in &workloads {
            dag.connect(*other, *workload);
        }
    }
}

pub struct ObjectActionTransformer;

#[async_trait]
impl Transformer for ObjectActionTransformer {
    fn name(&self) -> &'static str {
        "object-action"
    }

    async fn transform(&self, ctx: &TransformContext, dag: &mut LifecycleDag) -> Result<()> {
        let root = root_vertex(dag)?;
        let snapshot = read_cluster_snapshot(&ctx.client, &ctx.cluster_meta).await?;

        let desired: HashMap<ObjectKey, VertexId> = dag
            .vertices()
            .filter(|(id, _)| *id != root)
            .map(|(id, v)| (v.key(), id))
            .collect();
        let diff = diff_keys(desired.keys(), snapshot.keys());
        debug!(ctx.logger, "Resolved object actions";
            "create" => diff.create.len(), "update" => diff.update.len(),
            "delete" => diff.delete.len());

        for key in &diff.create {
            if let Some(v) = desired.get(key).and_then(|id| dag.vertex_mut(*id)) {
                v.action = Some(Action::Create);
            }
        }
        for key in &diff.update {
            if let Some(v) = desired.get(key).and_then(|id| dag.vertex_mut(*id)) {
                v.prior = snapshot.get(key).cloned();
                v.action = Some(Action::Update);
            }
        }

        let mut deletes = Vec::new();
        for key in &diff.delete {
            let Some(live) = snapshot.get(key) else { continue };
            if !ctx.is_deleting() && managed_elsewhere(live) {
                continue;
            }
            deletes.push(add_child(dag, root, LifecycleVertex::orphan(live.clone())));
        }
        add_delete_ordering(dag, &deletes);

        if ctx.is_deleting() {
            // Tear everything down: flatten under the root, then reimpose workload-first order.
            let edges: Vec<(VertexId, VertexId)> = dag.edges().map(|e| (e.from, e.to)).collect();
            for (from, to) in edges {
                dag.remove_edge(from, to);
            }
            let others: Vec<VertexId> = dag
                .vertex_ids()
                .into_iter()
                .filter(|id| *id != root)
                .collect();
            for id in &others {
                dag.connect(root, *id);
                if let Some(v) = dag.vertex_mut(*id) {
                    v.action = Some(Action::Delete);
                }
            }
            add_delete_ordering(dag, &others);
            if let Some(v) = dag.vertex_mut(root) {
                v.action = Some(Action::Delete);
            }
            return Ok(());
        }

        if let Some(v) = dag.vertex_mut(root) {
            v.action = Some(Action::Status);
        }
        if ctx.is_status_updating() {
            for (id, v) in dag.vertices_mut() {
                if id != root {
                    v.immutable = true;
                }
            }
        }
        Ok(())
    }
}
