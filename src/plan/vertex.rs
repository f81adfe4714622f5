//! Lifecycle vertices: a managed object plus what to do with it

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{Dag, GraphError, VertexId};
use crate::model::{Kind, Object, ObjectKey};

/// CRUD action resolved for a vertex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Patch,
    Delete,
    Status,
    Noop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Patch => "PATCH",
            Action::Delete => "DELETE",
            Action::Status => "STATUS",
            Action::Noop => "NOOP",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LifecycleVertex {
    /// Desired end state
    pub obj: Object,
    /// Last observed state, present for Update and Delete
    pub prior: Option<Object>,
    /// Must be resolved before execution
    pub action: Option<Action>,
    /// Skip Update even when the object differs from `prior`
    pub immutable: bool,
    /// Delete unconditionally, bypassing finalizers
    pub orphan: bool,
}

impl LifecycleVertex {
    pub fn new(obj: Object) -> Self {
        Self {
            obj,
            prior: None,
            action: None,
            immutable: false,
            orphan: false,
        }
    }

    pub fn with_action(obj: Object, action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::new(obj)
        }
    }

    /// A live object that is no longer desired
    pub fn orphan(live: Object) -> Self {
        Self {
            obj: live.clone(),
            prior: Some(live),
            action: Some(Action::Delete),
            immutable: false,
            orphan: true,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.obj.key()
    }

    pub fn kind(&self) -> Kind {
        self.obj.kind
    }
}

impl fmt::Display for LifecycleVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = self
            .action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "nil".to_string());
        write!(
            f,
            "{{{}, action: {}, immutable: {}, orphan: {}}}",
            self.key(),
            action,
            self.immutable,
            self.orphan
        )
    }
}

pub type LifecycleDag = Dag<LifecycleVertex>;

/// Execution weight: plain objects first, then workloads, the Cluster last
fn weight(v: &LifecycleVertex) -> u8 {
    match v.obj.kind {
        Kind::Cluster => 2,
        k if k.is_workload() => 1,
        _ => 0,
    }
}

pub fn weight_compare(a: &LifecycleVertex, b: &LifecycleVertex) -> Ordering {
    weight(a).cmp(&weight(b))
}

/// Total order by kind, namespace and name, used to canonicalize plans in tests
pub fn key_compare(a: &LifecycleVertex, b: &LifecycleVertex) -> Ordering {
    a.key().cmp(&b.key()).then_with(|| a.action.cmp(&b.action))
}

pub fn root_vertex(dag: &LifecycleDag) -> Result<VertexId> {
    dag.root().ok_or(Error::Graph(GraphError::NoRoot))
}

pub fn find_vertex(dag: &LifecycleDag, key: &ObjectKey) -> Option<VertexId> {
    dag.vertices()
        .find(|(_, v)| &v.key() == key)
        .map(|(id, _)| id)
}

pub fn find_all(dag: &LifecycleDag, kind: Kind) -> Vec<VertexId> {
    dag.vertices()
        .filter(|(_, v)| v.obj.kind == kind)
        .map(|(id, _)| id)
        .collect()
}

/// Add `vertex` as a child of `parent`
pub fn add_child(dag: &mut LifecycleDag, parent: VertexId, vertex: LifecycleVertex) -> VertexId {
    let id = dag.add_vertex(vertex);
    dag.connect(parent, id);
    id
}
