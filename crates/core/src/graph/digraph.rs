use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use hashbrown::{HashMap, HashSet};

/// Transitively closed directed graph backed by forward and backward
/// adjacency maps.
///
/// Edges are only ever inserted through [`insert_closed`](Self::insert_closed),
/// which keeps the relation closed: `has_edge(a, b)` answers reachability
/// directly. Cycles are not rejected; a cycle shows up as a self edge on
/// every vertex that lies on it.
///
/// Used by the history to store the real-time order and the extended
/// (inferred) order over operations.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DiGraph<T>
where
    T: Hash + Eq + Clone + Debug,
{
    /// Maps each vertex to the set of vertices it reaches.
    pub adj_map: HashMap<T, HashSet<T>>,
    /// Maps each vertex to the set of vertices reaching it.
    pub rev_map: HashMap<T, HashSet<T>>,
}

impl<T> DiGraph<T>
where
    T: Hash + Eq + Clone + Debug,
{
    /// Adds a vertex with no edges (if not already present).
    pub fn add_vertex(&mut self, source: T) {
        self.adj_map.entry(source.clone()).or_default();
        self.rev_map.entry(source).or_default();
    }

    /// Returns `true` if the vertex is present.
    pub fn contains(&self, source: &T) -> bool {
        self.adj_map.contains_key(source)
    }

    /// Returns `true` if `target` is reachable from `source`.
    pub fn has_edge(&self, source: &T, target: &T) -> bool {
        self.adj_map
            .get(source)
            .is_some_and(|neighbor| neighbor.contains(target))
    }

    /// Vertices reachable from `source`.
    pub fn successors<'a>(&'a self, source: &T) -> impl Iterator<Item = &'a T> + 'a {
        self.adj_map.get(source).into_iter().flatten()
    }

    /// Vertices reaching `target`.
    pub fn predecessors<'a>(&'a self, target: &T) -> impl Iterator<Item = &'a T> + 'a {
        self.rev_map.get(target).into_iter().flatten()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &T> {
        self.adj_map.keys()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.adj_map.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adj_map.values().map(HashSet::len).sum()
    }

    /// Inserts the edge `source -> target` and every edge it implies.
    ///
    /// Because the graph is already closed, the ancestors of `source` are
    /// exactly its direct predecessors and the descendants of `target` its
    /// direct successors, so the closure is their cross product.
    ///
    /// Returns `true` if any edge was added.
    pub fn insert_closed(&mut self, source: T, target: T) -> bool {
        if self.has_edge(&source, &target) {
            return false;
        }
        self.add_vertex(source.clone());
        self.add_vertex(target.clone());

        let mut ancestors: Vec<T> = self.predecessors(&source).cloned().collect();
        if !ancestors.contains(&source) {
            ancestors.push(source);
        }
        let mut descendants: Vec<T> = self.successors(&target).cloned().collect();
        if !descendants.contains(&target) {
            descendants.push(target);
        }

        let mut changed = false;
        for a in &ancestors {
            for d in &descendants {
                if self.add_raw_edge(a.clone(), d.clone()) {
                    changed = true;
                }
            }
        }
        changed
    }

    /// Removes the single edge `source -> target` without touching the rest
    /// of the closure. Returns `true` if it was present.
    pub fn remove_edge(&mut self, source: &T, target: &T) -> bool {
        let removed = self
            .adj_map
            .get_mut(source)
            .is_some_and(|neighbors| neighbors.remove(target));
        if removed {
            if let Some(preds) = self.rev_map.get_mut(target) {
                preds.remove(source);
            }
        }
        removed
    }

    /// Removes a vertex and every edge touching it.
    ///
    /// Edges between the remaining vertices are kept as is, so reachability
    /// that passed through the removed vertex is preserved.
    pub fn remove_vertex(&mut self, source: &T) {
        if let Some(succs) = self.adj_map.remove(source) {
            for s in succs {
                if let Some(preds) = self.rev_map.get_mut(&s) {
                    preds.remove(source);
                }
            }
        }
        if let Some(preds) = self.rev_map.remove(source) {
            for p in preds {
                if let Some(succs) = self.adj_map.get_mut(&p) {
                    succs.remove(source);
                }
            }
        }
    }

    /// Returns some vertex that reaches itself, or `None` if the graph is acyclic.
    #[must_use]
    pub fn cyclic_vertex(&self) -> Option<T> {
        self.adj_map
            .iter()
            .find(|(v, succs)| succs.contains(*v))
            .map(|(v, _)| v.clone())
    }

    /// Returns `true` if the graph has no cycles.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.cyclic_vertex().is_none()
    }

    /// Returns all edges as a list of (source, target) pairs.
    #[must_use]
    pub fn to_edge_list(&self) -> Vec<(T, T)> {
        let mut edges = Vec::new();
        for (src, dsts) in &self.adj_map {
            for dst in dsts {
                edges.push((src.clone(), dst.clone()));
            }
        }
        edges
    }

    fn add_raw_edge(&mut self, source: T, target: T) -> bool {
        let added = self
            .adj_map
            .entry(source.clone())
            .or_default()
            .insert(target.clone());
        if added {
            self.rev_map.entry(target).or_default().insert(source);
        }
        added
    }
}
