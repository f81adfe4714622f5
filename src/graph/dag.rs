//! Generic DAG with stable, comparator-driven walks
//!
//! Vertex identity is the [`VertexId`] handed out by [`Dag::add_vertex`], never
//! the vertex value. Ids are unique process-wide, so a cloned DAG shares identity
//! with its source and can be merged back into it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::GraphError;

static NEXT_VERTEX_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a vertex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(u64);

impl VertexId {
    fn next() -> Self {
        VertexId(NEXT_VERTEX_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Ordered edge: `from` is the parent, `to` the child
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
}

/// Caller-supplied total order used to stabilize walks
pub type Comparator<'a, V> = &'a dyn Fn(&V, &V) -> Ordering;

/// Directed graph that is expected to be acyclic and single-rooted
///
/// Mutations never validate; every walk does.
#[derive(Debug, Clone)]
pub struct Dag<V> {
    vertices: BTreeMap<VertexId, V>,
    edges: BTreeSet<Edge>,
}

impl<V> Default for Dag<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Dag<V> {
    pub fn new() -> Self {
        Self {
            vertices: BTreeMap::new(),
            edges: BTreeSet::new(),
        }
    }

    /// Add a vertex and return its new identity
    pub fn add_vertex(&mut self, vertex: V) -> VertexId {
        let id = VertexId::next();
        self.vertices.insert(id, vertex);
        id
    }

    /// Insert a vertex under an identity minted by another DAG
    ///
    /// Returns false if the identity is already present.
    pub fn insert_vertex(&mut self, id: VertexId, vertex: V) -> bool {
        if self.vertices.contains_key(&id) {
            return false;
        }
        self.vertices.insert(id, vertex);
        true
    }

    /// Remove a vertex together with every incident edge
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<V> {
        let removed = self.vertices.remove(&id)?;
        self.edges.retain(|e| e.from != id && e.to != id);
        Some(removed)
    }

    /// Add an edge between two existing vertices
    ///
    /// Returns false when the edge already exists or an endpoint is missing.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        if !self.vertices.contains_key(&from) || !self.vertices.contains_key(&to) {
            return false;
        }
        self.edges.insert(Edge { from, to })
    }

    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        self.edges.remove(&Edge { from, to })
    }

    /// Make `to` a child of `from`, ignoring duplicates
    pub fn connect(&mut self, from: VertexId, to: VertexId) {
        self.add_edge(from, to);
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.edges.contains(&Edge { from, to })
    }

    pub fn vertex(&self, id: VertexId) -> Option<&V> {
        self.vertices.get(&id)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut V> {
        self.vertices.get_mut(&id)
    }

    /// Vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &V)> {
        self.vertices.iter().map(|(id, v)| (*id, v))
    }

    pub fn vertices_mut(&mut self) -> impl Iterator<Item = (VertexId, &mut V)> {
        self.vertices.iter_mut().map(|(id, v)| (*id, v))
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.keys().copied().collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Children of `id`
    pub fn out_adjacent(&self, id: VertexId) -> Vec<VertexId> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect()
    }

    /// Parents of `id`
    pub fn in_adjacent(&self, id: VertexId) -> Vec<VertexId> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from)
            .collect()
    }

    fn zero_in_degree(&self) -> Vec<VertexId> {
        let targets: HashSet<VertexId> = self.edges.iter().map(|e| e.to).collect();
        self.vertices
            .keys()
            .filter(|id| !targets.contains(id))
            .copied()
            .collect()
    }

    /// The unique zero-in-degree vertex
    ///
    /// Returns None for an empty graph or when several vertices qualify.
    pub fn root(&self) -> Option<VertexId> {
        match self.zero_in_degree().as_slice() {
            [root] => Some(*root),
            _ => None,
        }
    }

    /// Check for a single root, self-cycles and cycles
    pub fn validate(&self) -> Result<(), GraphError> {
        let roots = self.zero_in_degree();
        let root = match roots.len() {
            0 => return Err(GraphError::NoRoot),
            1 => roots[0],
            count => return Err(GraphError::MultipleRoots { count }),
        };

        if let Some(edge) = self.edges.iter().find(|e| e.from == e.to) {
            return Err(GraphError::SelfCycle { vertex: edge.from });
        }

        // Every vertex is reachable from a single root unless it sits behind a cycle.
        let mut state: HashMap<VertexId, bool> = HashMap::new();
        self.detect_cycle(root, &mut state)?;
        if let Some(unreached) = self.vertices.keys().find(|id| !state.contains_key(id)) {
            return Err(GraphError::Cycle { vertex: *unreached });
        }
        Ok(())
    }

    // state: false while on the DFS stack, true once finished
    fn detect_cycle(
        &self,
        id: VertexId,
        state: &mut HashMap<VertexId, bool>,
    ) -> Result<(), GraphError> {
        match state.get(&id) {
            Some(false) => return Err(GraphError::Cycle { vertex: id }),
            Some(true) => return Ok(()),
            None => {}
        }
        state.insert(id, false);
        for child in self.out_adjacent(id) {
            self.detect_cycle(child, state)?;
        }
        state.insert(id, true);
        Ok(())
    }

    fn sort_ids(&self, ids: &mut [VertexId], cmp: Option<Comparator<'_, V>>) {
        if let Some(cmp) = cmp {
            ids.sort_by(|a, b| match (self.vertices.get(a), self.vertices.get(b)) {
                (Some(va), Some(vb)) => cmp(va, vb),
                _ => Ordering::Equal,
            });
        }
    }

    // Children before parents; start vertices and siblings are taken in `cmp` order.
    fn post_order(&self, cmp: Option<Comparator<'_, V>>) -> Vec<VertexId> {
        let mut ids = self.vertex_ids();
        self.sort_ids(&mut ids, cmp);

        let mut visited = HashSet::with_capacity(ids.len());
        let mut order = Vec::with_capacity(ids.len());
        for id in ids {
            self.visit(id, cmp, &mut visited, &mut order);
        }
        order
    }

    fn visit(
        &self,
        id: VertexId,
        cmp: Option<Comparator<'_, V>>,
        visited: &mut HashSet<VertexId>,
        order: &mut Vec<VertexId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let mut children = self.out_adjacent(id);
        self.sort_ids(&mut children, cmp);
        for child in children {
            self.visit(child, cmp, visited, order);
        }
        order.push(id);
    }

    /// Parents before children, root first
    ///
    /// Always the exact reverse of [`Dag::reverse_topological_order`] under the
    /// same comparator.
    pub fn topological_order(
        &self,
        cmp: Option<Comparator<'_, V>>,
    ) -> Result<Vec<VertexId>, GraphError> {
        let mut order = self.reverse_topological_order(cmp)?;
        order.reverse();
        Ok(order)
    }

    /// Children before parents, root last
    pub fn reverse_topological_order(
        &self,
        cmp: Option<Comparator<'_, V>>,
    ) -> Result<Vec<VertexId>, GraphError> {
        self.validate()?;
        Ok(self.post_order(cmp))
    }

    /// Visit every vertex in topological order, stopping at the first error
    pub fn walk_topo_order<E, F>(&self, mut f: F, cmp: Option<Comparator<'_, V>>) -> Result<(), E>
    where
        E: From<GraphError>,
        F: FnMut(VertexId, &V) -> Result<(), E>,
    {
        for id in self.topological_order(cmp)? {
            if let Some(v) = self.vertices.get(&id) {
                f(id, v)?;
            }
        }
        Ok(())
    }

    /// Visit every vertex in reverse topological order, stopping at the first error
    pub fn walk_reverse_topo_order<E, F>(
        &self,
        mut f: F,
        cmp: Option<Comparator<'_, V>>,
    ) -> Result<(), E>
    where
        E: From<GraphError>,
        F: FnMut(VertexId, &V) -> Result<(), E>,
    {
        for id in self.reverse_topological_order(cmp)? {
            if let Some(v) = self.vertices.get(&id) {
                f(id, v)?;
            }
        }
        Ok(())
    }

    /// Level-order walk from the root; each level is sorted by `cmp`
    pub fn walk_bfs<E, F>(&self, mut f: F, cmp: Option<Comparator<'_, V>>) -> Result<(), E>
    where
        E: From<GraphError>,
        F: FnMut(VertexId, &V) -> Result<(), E>,
    {
        let root = self.root().ok_or(GraphError::NoRoot)?;
        let mut visited = HashSet::new();
        let mut level = vec![root];

        while !level.is_empty() {
            self.sort_ids(&mut level, cmp);
            let mut next = Vec::new();
            for id in level {
                if !visited.insert(id) {
                    continue;
                }
                if let Some(v) = self.vertices.get(&id) {
                    f(id, v)?;
                }
                for child in self.out_adjacent(id) {
                    if !visited.contains(&child) && !next.contains(&child) {
                        next.push(child);
                    }
                }
            }
            level = next;
        }
        Ok(())
    }

    /// Structural equality under a caller-supplied total order
    ///
    /// Identities are ignored: vertices and edges are compared by value.
    pub fn equals(&self, other: &Dag<V>, cmp: Comparator<'_, V>) -> bool {
        if self.vertices.len() != other.vertices.len() || self.edges.len() != other.edges.len() {
            return false;
        }

        let mut mine: Vec<&V> = self.vertices.values().collect();
        let mut theirs: Vec<&V> = other.vertices.values().collect();
        mine.sort_by(|a, b| cmp(a, b));
        theirs.sort_by(|a, b| cmp(a, b));
        if mine
            .iter()
            .zip(theirs.iter())
            .any(|(a, b)| cmp(a, b) != Ordering::Equal)
        {
            return false;
        }

        let mine = self.sorted_edge_values(cmp);
        let theirs = other.sorted_edge_values(cmp);
        mine.iter().zip(theirs.iter()).all(|((af, at), (bf, bt))| {
            cmp(af, bf) == Ordering::Equal && cmp(at, bt) == Ordering::Equal
        })
    }

    fn sorted_edge_values(&self, cmp: Comparator<'_, V>) -> Vec<(&V, &V)> {
        let mut pairs: Vec<(&V, &V)> = self
            .edges
            .iter()
            .filter_map(|e| Some((self.vertices.get(&e.from)?, self.vertices.get(&e.to)?)))
            .collect();
        pairs.sort_by(|(af, at), (bf, bt)| cmp(af, bf).then_with(|| cmp(at, bt)));
        pairs
    }

    /// Splice another DAG into this one
    ///
    /// Vertices not already present are added, the other DAG's own roots are
    /// re-parented under this root, and its edges are copied. Nothing already
    /// present is removed or overwritten.
    pub fn merge(&mut self, other: Dag<V>) {
        let root = self.root();
        let sub_roots = other.zero_in_degree();

        for (id, vertex) in other.vertices {
            self.insert_vertex(id, vertex);
        }
        if let Some(root) = root {
            for sub_root in sub_roots {
                if sub_root != root {
                    self.add_edge(root, sub_root);
                }
            }
        }
        for edge in other.edges {
            self.add_edge(edge.from, edge.to);
        }
    }
}

impl<V: fmt::Display> fmt::Display for Dag<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "vertices:")?;
        for (id, v) in &self.vertices {
            writeln!(f, "  {}: {}", id, v)?;
        }
        writeln!(f, "edges:")?;
        for e in &self.edges {
            writeln!(f, "  {} -> {}", e.from, e.to)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_name(a: &&'static str, b: &&'static str) -> Ordering {
        a.cmp(b)
    }

    fn names(dag: &Dag<&'static str>, ids: &[VertexId]) -> Vec<&'static str> {
        ids.iter().map(|id| *dag.vertex(*id).unwrap()).collect()
    }

    /// root -> {b, a}, a -> c
    fn sample() -> (Dag<&'static str>, [VertexId; 4]) {
        let mut dag = Dag::new();
        let root = dag.add_vertex("root");
        let b = dag.add_vertex("b");
        let a = dag.add_vertex("a");
        let c = dag.add_vertex("c");
        dag.connect(root, b);
        dag.connect(root, a);
        dag.connect(a, c);
        (dag, [root, a, b, c])
    }

    #[test]
    fn test_root_requires_exactly_one_candidate() {
        let mut dag: Dag<&str> = Dag::new();
        assert_eq!(dag.root(), None);

        let r = dag.add_vertex("r");
        assert_eq!(dag.root(), Some(r));

        let other = dag.add_vertex("other");
        assert_eq!(dag.root(), None);
        assert_eq!(dag.validate(), Err(GraphError::MultipleRoots { count: 2 }));

        dag.connect(r, other);
        assert_eq!(dag.root(), Some(r));
    }

    #[test]
    fn test_validate_rejects_cycles() {
        let (mut dag, [root, a, _, c]) = sample();
        assert!(dag.validate().is_ok());

        dag.connect(c, a);
        assert!(matches!(dag.validate(), Err(GraphError::Cycle { .. })));
        assert!(dag.topological_order(None).is_err());

        dag.remove_edge(c, a);
        dag.connect(c, c);
        assert_eq!(dag.validate(), Err(GraphError::SelfCycle { vertex: c }));

        dag.remove_edge(c, c);
        dag.connect(a, root);
        // The root gained a parent, so nothing has zero in-degree.
        assert_eq!(dag.validate(), Err(GraphError::NoRoot));
    }

    #[test]
    fn test_cycle_unreachable_from_root_is_detected() {
        let mut dag = Dag::new();
        let root = dag.add_vertex("root");
        let x = dag.add_vertex("x");
        let y = dag.add_vertex("y");
        dag.connect(x, y);
        dag.connect(y, x);
        assert_eq!(dag.root(), Some(root));
        assert!(matches!(dag.validate(), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_edges_are_idempotent_and_cascade_on_remove() {
        let (mut dag, [root, a, _, c]) = sample();
        assert!(!dag.add_edge(root, a));
        assert_eq!(dag.edges().count(), 3);

        dag.remove_vertex(a);
        assert!(!dag.has_edge(root, a));
        assert!(!dag.has_edge(a, c));
        assert_eq!(dag.edges().count(), 1);
    }

    #[test]
    fn test_topological_order_visits_every_vertex_once() {
        let (dag, [root, ..]) = sample();
        let cmp: Comparator<'_, &'static str> = &by_name;

        let forward = dag.topological_order(Some(cmp)).unwrap();
        assert_eq!(forward.len(), 4);
        assert_eq!(forward[0], root);
        assert_eq!(names(&dag, &forward), vec!["root", "b", "a", "c"]);

        let reverse = dag.reverse_topological_order(Some(cmp)).unwrap();
        assert_eq!(reverse.len(), 4);
        assert_eq!(*reverse.last().unwrap(), root);
        assert_eq!(names(&dag, &reverse), vec!["c", "a", "b", "root"]);
    }

    #[test]
    fn test_reverse_order_is_exact_reverse_of_forward() {
        let (mut dag, [root, _, b, c]) = sample();
        let d = dag.add_vertex("d");
        dag.connect(b, d);
        dag.connect(c, d);
        dag.connect(root, c);

        let by_name_desc = |x: &&'static str, y: &&'static str| y.cmp(x);
        let asc: Comparator<'_, &'static str> = &by_name;
        let desc: Comparator<'_, &'static str> = &by_name_desc;
        for cmp in [None, Some(asc), Some(desc)] {
            let forward = dag.topological_order(cmp).unwrap();
            let mut reverse = dag.reverse_topological_order(cmp).unwrap();
            assert_eq!(reverse.len(), 5);
            reverse.reverse();
            assert_eq!(forward, reverse);
        }
        let forward = dag.topological_order(Some(asc)).unwrap();
        assert_eq!(names(&dag, &forward), vec!["root", "b", "a", "c", "d"]);
        assert_eq!(forward[0], root);
    }

    #[test]
    fn test_walks_on_invalid_graph_visit_nothing() {
        let (mut dag, [_, a, _, c]) = sample();
        dag.connect(c, a);

        let mut seen = Vec::new();
        let result: Result<(), GraphError> = dag.walk_topo_order(
            |_, v| {
                seen.push(*v);
                Ok(())
            },
            None,
        );
        assert!(matches!(result, Err(GraphError::Cycle { .. })));
        let result: Result<(), GraphError> = dag.walk_reverse_topo_order(
            |_, v| {
                seen.push(*v);
                Ok(())
            },
            None,
        );
        assert!(result.is_err());
        assert!(seen.is_empty());
    }

    #[test]
    fn test_every_edge_is_respected_in_both_directions() {
        let (dag, _) = sample();
        let forward = dag.topological_order(None).unwrap();
        let reverse = dag.reverse_topological_order(None).unwrap();
        let pos = |order: &Vec<VertexId>, id| order.iter().position(|v| *v == id).unwrap();
        for e in dag.edges() {
            assert!(pos(&forward, e.from) < pos(&forward, e.to));
            assert!(pos(&reverse, e.to) < pos(&reverse, e.from));
        }
    }

    #[test]
    fn test_walk_stops_at_first_error() {
        let (dag, _) = sample();
        let cmp: Comparator<'_, &'static str> = &by_name;
        let mut seen = Vec::new();
        let result: Result<(), GraphError> = dag.walk_reverse_topo_order(
            |_, v| {
                seen.push(*v);
                if *v == "a" {
                    Err(GraphError::NoRoot)
                } else {
                    Ok(())
                }
            },
            Some(cmp),
        );
        assert!(result.is_err());
        assert_eq!(seen, vec!["c", "a"]);
    }

    #[test]
    fn test_walk_bfs_goes_level_by_level() {
        let (dag, _) = sample();
        let cmp: Comparator<'_, &'static str> = &by_name;
        let mut seen = Vec::new();
        dag.walk_bfs::<GraphError, _>(
            |_, v| {
                seen.push(*v);
                Ok(())
            },
            Some(cmp),
        )
        .unwrap();
        assert_eq!(seen, vec!["root", "a", "b", "c"]);
    }

    #[test]
    fn test_equals_ignores_identity() {
        let (left, _) = sample();
        let (mut right, [root, ..]) = sample();
        assert!(left.equals(&right, &by_name));

        let d = right.add_vertex("d");
        right.connect(root, d);
        assert!(!left.equals(&right, &by_name));
    }

    #[test]
    fn test_merge_reparents_sub_roots_and_keeps_existing() {
        let (mut host, [root, a, ..]) = sample();

        let mut scratch = host.clone();
        let tls = scratch.add_vertex("tls");
        scratch.connect(a, tls);
        let loose = scratch.add_vertex("loose");
        scratch.remove_edge(root, a);

        host.merge(scratch);
        assert_eq!(host.len(), 6);
        assert!(host.has_edge(a, tls));
        assert!(host.has_edge(root, loose));
        // Removals in the scratch copy do not propagate.
        assert!(host.has_edge(root, a));
        assert!(host.validate().is_ok());
    }
}
