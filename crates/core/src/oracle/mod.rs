//! Decision oracles.
//!
//! The enumeration, symbolic and counting checkers reduce linearizability
//! to ground satisfiability queries: given an object [`Scheme`] (which
//! fixes the axioms) and a set of [`GroundFacts`] (operations plus the
//! happens-before edges they must respect), an [`Oracle`] answers
//! [`OracleVerdict::Sat`] if some total order of the operations satisfies
//! both, [`OracleVerdict::Unsat`] if none does, and
//! [`OracleVerdict::Unknown`] when it ran out of resources.
//!
//! Oracles are stateful: facts are asserted into a stack of scopes, so a
//! caller can keep stable facts in the base scope and re-assert only what
//! changed inside a pushed scope.
//!
//! `linmon_core` ships the [`ReplayOracle`]; `linmon_sat` provides a
//! SAT-backed one.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec;
use alloc::vec::Vec;

use crate::history::{History, OpId, Operation};
use crate::scheme::Scheme;

pub mod replay;

pub use replay::ReplayOracle;

/// Answer of a satisfiability query. `Unknown` is never a refutation.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleVerdict {
    Sat,
    Unsat,
    Unknown,
}

/// Operations and the ordering facts between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundFacts {
    pub operations: BTreeMap<OpId, Operation>,
    /// `(x, y)`: `x` must be linearized before `y`. Need not be closed.
    pub order: BTreeSet<(OpId, OpId)>,
}

impl GroundFacts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation of `history` with its real-time order.
    #[must_use]
    pub fn from_history(history: &History) -> Self {
        Self {
            operations: history.operations().map(|op| (op.id, op.clone())).collect(),
            order: history.before_pairs().into_iter().collect(),
        }
    }

    /// Every operation of `history`, ordered as the total order `chain`.
    #[must_use]
    pub fn chain(history: &History, chain: &[OpId]) -> Self {
        Self {
            operations: history.operations().map(|op| (op.id, op.clone())).collect(),
            order: chain.windows(2).map(|w| (w[0], w[1])).collect(),
        }
    }

    pub fn insert_operation(&mut self, op: Operation) {
        self.operations.insert(op.id, op);
    }

    pub fn insert_order(&mut self, x: OpId, y: OpId) {
        self.order.insert((x, y));
    }

    /// Adds every fact of `other`; an operation present in both takes
    /// `other`'s version.
    pub fn extend(&mut self, other: &Self) {
        self.operations
            .extend(other.operations.iter().map(|(id, op)| (*id, op.clone())));
        self.order.extend(other.order.iter().copied());
    }

    /// Order facts whose endpoints are both known operations.
    pub fn known_order(&self) -> impl Iterator<Item = (OpId, OpId)> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|(x, y)| self.operations.contains_key(x) && self.operations.contains_key(y))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Stack of fact scopes shared by the oracle implementations.
///
/// The base scope can never be popped.
#[derive(Debug, Clone)]
pub struct ScopedFacts {
    scopes: Vec<GroundFacts>,
}

impl Default for ScopedFacts {
    fn default() -> Self {
        Self {
            scopes: vec![GroundFacts::new()],
        }
    }
}

impl ScopedFacts {
    pub fn push(&mut self) {
        self.scopes.push(GroundFacts::new());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Asserts `facts` into the innermost scope.
    pub fn assert(&mut self, facts: &GroundFacts) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend(facts);
        }
    }

    /// Every asserted fact; inner scopes override outer ones.
    #[must_use]
    pub fn flatten(&self) -> GroundFacts {
        let mut all = GroundFacts::new();
        for scope in &self.scopes {
            all.extend(scope);
        }
        all
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A black-box decision procedure for ground linearizability queries.
pub trait Oracle {
    fn name(&self) -> &'static str;

    /// Opens a scope.
    fn push(&mut self);

    /// Discards the innermost scope and every fact asserted in it.
    fn pop(&mut self);

    fn assert(&mut self, facts: &GroundFacts);

    /// Decides the conjunction of the scheme's axioms and every asserted fact.
    fn check(&mut self, scheme: &Scheme) -> OracleVerdict;

    /// Drops every scope, including the base one.
    fn reset(&mut self);

    /// One-shot query in a fresh scope on top of the current facts.
    fn decide(&mut self, scheme: &Scheme, facts: &GroundFacts) -> OracleVerdict {
        self.push();
        self.assert(facts);
        let verdict = self.check(scheme);
        self.pop();
        verdict
    }
}

impl<O: Oracle + ?Sized> Oracle for alloc::boxed::Box<O> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn push(&mut self) {
        (**self).push();
    }

    fn pop(&mut self) {
        (**self).pop();
    }

    fn assert(&mut self, facts: &GroundFacts) {
        (**self).assert(facts);
    }

    fn check(&mut self, scheme: &Scheme) -> OracleVerdict {
        (**self).check(scheme)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
