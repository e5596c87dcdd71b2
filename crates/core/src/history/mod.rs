//! Partial-order history of method calls.
//!
//! A [`History`] records operations in call order and maintains two
//! transitively closed orders over them:
//!
//! - **`before`** -- real-time order: `a` is before `b` iff `a` completed
//!   before `b` was called. It is extended on every [`start`](History::start)
//!   and never recomputed.
//! - **`ext_before`** -- the real-time order plus every ordering fact a
//!   checker inferred through [`order`](History::order). A self edge in this
//!   relation means no linearization exists.
//!
//! Histories are plain values: cloning one gives an independent version that
//! can be completed, weakened or linearized without touching the original.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::Error;
use crate::graph::digraph::DiGraph;

pub mod completion;
pub mod linearization;
pub mod types;

pub use completion::{Completions, ReturnGenerator, SchemeReturns};
pub use linearization::Linearizations;
pub use types::{Event, OpId, Operation, Value};

#[derive(Debug, Clone, Default)]
pub struct History {
    operations: BTreeMap<OpId, Operation>,
    pending: BTreeSet<OpId>,
    next_id: u64,
    before: DiGraph<OpId>,
    ext_before: DiGraph<OpId>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call and returns the id of the new pending operation.
    ///
    /// Every operation completed so far is ordered before the new one, in
    /// both `before` and `ext_before`.
    pub fn start(&mut self, method: impl Into<String>, args: Vec<Value>) -> OpId {
        let id = OpId(self.next_id);
        self.next_id += 1;

        self.before.add_vertex(id);
        self.ext_before.add_vertex(id);
        for (&prev, op) in &self.operations {
            if op.is_completed() {
                self.before.insert_closed(prev, id);
                self.ext_before.insert_closed(prev, id);
            }
        }

        self.operations.insert(
            id,
            Operation {
                id,
                method: method.into(),
                args,
                rets: None,
            },
        );
        self.pending.insert(id);

        tracing::trace!(?id, "history: started");
        id
    }

    /// Records the return of a pending operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if `id` is not in the history and
    /// [`Error::AlreadyCompleted`] if it already returned.
    pub fn complete(&mut self, id: OpId, rets: Vec<Value>) -> Result<(), Error> {
        let op = self
            .operations
            .get_mut(&id)
            .ok_or(Error::UnknownOperation(id))?;
        if op.is_completed() {
            return Err(Error::AlreadyCompleted(id));
        }
        op.rets = Some(rets);
        self.pending.remove(&id);
        tracing::trace!(?id, "history: completed");
        Ok(())
    }

    /// Deletes an operation from the history.
    ///
    /// Both orders are stored closed, so dropping the vertex keeps every
    /// ordering fact between the remaining operations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if `id` is not in the history.
    pub fn remove(&mut self, id: OpId) -> Result<Operation, Error> {
        let op = self
            .operations
            .remove(&id)
            .ok_or(Error::UnknownOperation(id))?;
        self.pending.remove(&id);
        self.before.remove_vertex(&id);
        self.ext_before.remove_vertex(&id);
        tracing::trace!(?id, "history: removed");
        Ok(op)
    }

    /// Adds `x -> y` to `ext_before`, closing it transitively.
    ///
    /// Returns `true` if the relation grew. The call may close a cycle; that
    /// is how a violation is recorded, and callers detect it afterwards with
    /// [`has_ext_cycle`](Self::has_ext_cycle).
    pub fn order(&mut self, x: OpId, y: OpId) -> bool {
        let changed = self.ext_before.insert_closed(x, y);
        if changed {
            tracing::trace!(?x, ?y, "history: ordered");
        }
        changed
    }

    /// Drops the real-time edge `x -> y` unless another operation lies
    /// between them, in which case the edge is implied and kept.
    ///
    /// Returns `true` if the edge was removed.
    pub fn unorder(&mut self, x: OpId, y: OpId) -> bool {
        if !self.before.has_edge(&x, &y) || Self::has_two_hop(&self.before, x, y) {
            return false;
        }
        self.before.remove_edge(&x, &y);
        if !Self::has_two_hop(&self.ext_before, x, y) {
            self.ext_before.remove_edge(&x, &y);
        }
        true
    }

    fn has_two_hop(graph: &DiGraph<OpId>, x: OpId, y: OpId) -> bool {
        graph
            .successors(&x)
            .any(|z| *z != x && *z != y && graph.has_edge(z, &y))
    }

    #[must_use]
    pub fn is_before(&self, x: OpId, y: OpId) -> bool {
        self.before.has_edge(&x, &y)
    }

    #[must_use]
    pub fn is_ext_before(&self, x: OpId, y: OpId) -> bool {
        self.ext_before.has_edge(&x, &y)
    }

    /// Some operation that is ext-before itself, if any.
    #[must_use]
    pub fn ext_cycle_witness(&self) -> Option<OpId> {
        self.ext_before.cyclic_vertex()
    }

    #[must_use]
    pub fn has_ext_cycle(&self) -> bool {
        self.ext_cycle_witness().is_some()
    }

    /// Real-time predecessors of `id`.
    pub fn predecessors(&self, id: OpId) -> impl Iterator<Item = OpId> + '_ {
        self.before.predecessors(&id).copied()
    }

    /// Operations with no real-time predecessor, in id order.
    #[must_use]
    pub fn minimals(&self) -> Vec<OpId> {
        self.operations
            .keys()
            .copied()
            .filter(|id| self.before.predecessors(id).next().is_none())
            .collect()
    }

    /// Operations with no real-time successor, in id order.
    #[must_use]
    pub fn maximals(&self) -> Vec<OpId> {
        self.operations
            .keys()
            .copied()
            .filter(|id| self.before.successors(id).next().is_none())
            .collect()
    }

    /// Every real-time edge, sorted.
    #[must_use]
    pub fn before_pairs(&self) -> Vec<(OpId, OpId)> {
        let mut pairs = self.before.to_edge_list();
        pairs.sort_unstable();
        pairs
    }

    /// Total orders consistent with `before`. See [`Linearizations`].
    #[must_use]
    pub fn linearizations(&self) -> Linearizations<'_> {
        Linearizations::new(self)
    }

    /// Completed versions of this history. See [`Completions`].
    #[must_use]
    pub fn completions<'a>(&self, generator: &'a dyn ReturnGenerator) -> Completions<'a> {
        Completions::new(self.clone(), generator)
    }

    /// Histories obtained by dropping one immediate real-time edge each.
    pub fn weakenings(&self) -> impl Iterator<Item = Self> + '_ {
        self.before_pairs().into_iter().filter_map(|(x, y)| {
            let mut weaker = self.clone();
            weaker.unorder(x, y).then_some(weaker)
        })
    }

    #[must_use]
    pub fn get(&self, id: OpId) -> Option<&Operation> {
        self.operations.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: OpId) -> bool {
        self.operations.contains_key(&id)
    }

    /// Operations in id order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = OpId> + '_ {
        self.operations.keys().copied()
    }

    /// Pending operation ids, in id order.
    pub fn pending(&self) -> impl Iterator<Item = OpId> + '_ {
        self.pending.iter().copied()
    }

    #[must_use]
    pub fn is_pending(&self, id: OpId) -> bool {
        self.pending.contains(&id)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of pending operations.
    #[must_use]
    pub fn width(&self) -> usize {
        self.pending.len()
    }

    /// Size of the extended order.
    #[must_use]
    pub fn ext_edge_count(&self) -> usize {
        self.ext_before.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    #[test]
    fn test_real_time_order() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        let b = h.start("push", vec![int(2)]);
        h.complete(a, vec![]).unwrap();
        let c = h.start("pop", vec![]);
        h.complete(b, vec![]).unwrap();
        h.complete(c, vec![int(2)]).unwrap();
        let d = h.start("pop", vec![]);

        assert!(h.is_before(a, c));
        assert!(!h.is_before(b, c));
        assert!(!h.is_before(a, b));
        assert!(h.is_before(a, d) && h.is_before(b, d) && h.is_before(c, d));
        assert!(h.is_ext_before(a, c));
        assert_eq!(h.minimals(), vec![a, b]);
        assert_eq!(h.maximals(), vec![d]);
        assert_eq!(h.width(), 1);
    }

    #[test]
    fn test_complete_errors() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        assert_eq!(h.complete(OpId(9), vec![]), Err(Error::UnknownOperation(OpId(9))));
        h.complete(a, vec![]).unwrap();
        assert_eq!(h.complete(a, vec![]), Err(Error::AlreadyCompleted(a)));
        assert!(h.remove(OpId(9)).is_err());
    }

    #[test]
    fn test_order_closes_and_detects_cycle() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        let b = h.start("push", vec![int(2)]);
        let c = h.start("pop", vec![]);

        assert!(h.order(a, b));
        assert!(h.order(b, c));
        assert!(h.is_ext_before(a, c));
        assert!(!h.order(a, c));
        assert!(!h.is_before(a, b));
        assert!(!h.has_ext_cycle());

        h.order(c, a);
        assert!(h.has_ext_cycle());
    }

    #[test]
    fn test_unorder_keeps_implied_edges() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        h.complete(a, vec![]).unwrap();
        let b = h.start("push", vec![int(2)]);
        h.complete(b, vec![]).unwrap();
        let c = h.start("pop", vec![]);
        h.complete(c, vec![int(2)]).unwrap();

        assert!(!h.unorder(a, c), "a -> b -> c implies a -> c");
        assert!(h.unorder(a, b));
        assert!(!h.is_before(a, b));
        assert!(h.is_before(a, c));
        assert!(!h.unorder(a, b));
    }

    #[test]
    fn test_start_complete_remove_round_trip() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        h.complete(a, vec![]).unwrap();
        let b = h.start("push", vec![int(2)]);
        let reference = h.clone();

        let x = h.start("pop", vec![]);
        h.complete(x, vec![int(1)]).unwrap();
        h.remove(x).unwrap();

        let ids: Vec<OpId> = h.ids().collect();
        assert_eq!(ids, reference.ids().collect::<Vec<_>>());
        assert_eq!(h.before_pairs(), reference.before_pairs());
        assert_eq!(h.ext_edge_count(), reference.ext_edge_count());
        assert_eq!(h.pending().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_remove_keeps_transitive_order() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        let b = h.start("push", vec![int(2)]);
        let c = h.start("pop", vec![]);
        h.order(a, b);
        h.order(b, c);
        h.remove(b).unwrap();
        assert!(h.is_ext_before(a, c));
    }

    #[test]
    fn test_weakenings_drop_one_immediate_edge() {
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        h.complete(a, vec![]).unwrap();
        let b = h.start("push", vec![int(2)]);
        h.complete(b, vec![]).unwrap();
        let c = h.start("pop", vec![]);
        h.complete(c, vec![int(2)]).unwrap();

        let weaker: Vec<History> = h.weakenings().collect();
        assert_eq!(weaker.len(), 2);
        assert!(weaker.iter().all(|w| w.before_pairs().len() == 2));
    }
}
