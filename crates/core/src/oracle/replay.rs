//! Oracle that decides queries by replaying the operations against the
//! object's sequential [`Model`].
//!
//! # Algorithm
//!
//! A depth-first search over topological orders of the fact graph:
//!
//! 1. Count, for every operation, the ordering facts still blocking it; the
//!    unblocked ones form the frontier.
//! 2. Pick an operation from the frontier and apply it to the model. A
//!    completed operation must reproduce its recorded value; a pending one
//!    may also have had no effect at all.
//! 3. Recurse on each successor state; on failure, undo and try the next
//!    candidate.
//!
//! Two branches that placed the same set of operations and reached the same
//! model state are interchangeable, so the pair (Zobrist hash of the placed
//! set, model state) is memoized and revisits are pruned. A cyclic fact
//! graph leaves operations that never become unblocked, which the search
//! reports as unsatisfiable.
//!
//! The search is exponential in the worst case; it stops with
//! [`OracleVerdict::Unknown`] after `max_steps` expansions.

use alloc::vec::Vec;
use core::hash::{BuildHasher, Hash, Hasher};

use hashbrown::{DefaultHashBuilder, HashMap, HashSet};

use super::{GroundFacts, Oracle, OracleVerdict, ScopedFacts};
use crate::history::{OpId, Operation};
use crate::scheme::model::Model;
use crate::scheme::{MethodSchema, Scheme};

/// Default expansion budget of a single query.
pub const DEFAULT_MAX_STEPS: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct ReplayOracle {
    facts: ScopedFacts,
    max_steps: usize,
}

impl Default for ReplayOracle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl ReplayOracle {
    #[must_use]
    pub fn new(max_steps: usize) -> Self {
        Self {
            facts: ScopedFacts::default(),
            max_steps,
        }
    }

    /// Decides `facts` alone, ignoring anything asserted.
    #[must_use]
    pub fn solve(&self, scheme: &Scheme, facts: &GroundFacts) -> OracleVerdict {
        let mut schemas = Vec::with_capacity(facts.len());
        for op in facts.operations.values() {
            let Some(schema) = scheme.method(&op.method) else {
                tracing::debug!(id = ?op.id, method = %op.method, "replay: undeclared method");
                return OracleVerdict::Unknown;
            };
            schemas.push(*schema);
        }

        let mut search = Search::new(facts, schemas, self.max_steps);
        let verdict = search.run(Model::initial(scheme.kind));
        tracing::trace!(
            operations = facts.len(),
            steps = search.steps,
            ?verdict,
            "replay: decided"
        );
        verdict
    }
}

impl Oracle for ReplayOracle {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn push(&mut self) {
        self.facts.push();
    }

    fn pop(&mut self) {
        self.facts.pop();
    }

    fn assert(&mut self, facts: &GroundFacts) {
        self.facts.assert(facts);
    }

    fn check(&mut self, scheme: &Scheme) -> OracleVerdict {
        self.solve(scheme, &self.facts.flatten())
    }

    fn reset(&mut self) {
        self.facts.clear();
    }
}

/// Signals that the step budget ran out.
struct Exhausted;

struct Search<'a> {
    operations: Vec<&'a Operation>,
    schemas: Vec<MethodSchema>,
    children: Vec<Vec<usize>>,
    active_parent: Vec<usize>,
    zobrist: Vec<u128>,
    seen: HashSet<(u128, Model)>,
    steps: usize,
    max_steps: usize,
}

impl<'a> Search<'a> {
    fn new(facts: &'a GroundFacts, schemas: Vec<MethodSchema>, max_steps: usize) -> Self {
        let operations: Vec<&Operation> = facts.operations.values().collect();
        let index: HashMap<OpId, usize> = operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.id, i))
            .collect();

        let mut children = alloc::vec![Vec::new(); operations.len()];
        let mut active_parent = alloc::vec![0; operations.len()];
        for (x, y) in facts.known_order() {
            if let (Some(&i), Some(&j)) = (index.get(&x), index.get(&y)) {
                children[i].push(j);
                active_parent[j] += 1;
            }
        }

        let zobrist = operations.iter().map(|op| zobrist_value(&op.id)).collect();

        Self {
            operations,
            schemas,
            children,
            active_parent,
            zobrist,
            seen: HashSet::new(),
            steps: 0,
            max_steps,
        }
    }

    fn run(&mut self, initial: Model) -> OracleVerdict {
        let mut frontier: Vec<usize> = (0..self.operations.len())
            .filter(|i| self.active_parent[*i] == 0)
            .collect();
        match self.do_dfs(&mut frontier, 0, 0, &initial) {
            Ok(true) => OracleVerdict::Sat,
            Ok(false) => OracleVerdict::Unsat,
            Err(Exhausted) => OracleVerdict::Unknown,
        }
    }

    fn do_dfs(
        &mut self,
        frontier: &mut Vec<usize>,
        placed: usize,
        placed_hash: u128,
        model: &Model,
    ) -> Result<bool, Exhausted> {
        if placed == self.operations.len() {
            return Ok(true);
        }
        if !self.seen.insert((placed_hash, model.clone())) {
            return Ok(false);
        }
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(Exhausted);
        }

        let candidates = frontier.clone();
        for u in candidates {
            let next_states = model.successors(&self.schemas[u], self.operations[u]);
            if next_states.is_empty() {
                continue;
            }

            frontier.retain(|v| *v != u);
            let mut newly_activated = Vec::new();
            for v in self.children[u].clone() {
                self.active_parent[v] -= 1;
                if self.active_parent[v] == 0 {
                    frontier.push(v);
                    newly_activated.push(v);
                }
            }

            let mut found = Ok(false);
            for next in &next_states {
                found = self.do_dfs(frontier, placed + 1, placed_hash ^ self.zobrist[u], next);
                if !matches!(found, Ok(false)) {
                    break;
                }
            }

            frontier.retain(|v| !newly_activated.contains(v));
            for v in self.children[u].clone() {
                self.active_parent[v] += 1;
            }
            frontier.push(u);

            if !matches!(found, Ok(false)) {
                return found;
            }
        }
        Ok(false)
    }
}

fn zobrist_value<T: Hash>(v: &T) -> u128 {
    let builder = DefaultHashBuilder::default();
    let mut h1 = builder.build_hasher();
    0u64.hash(&mut h1);
    v.hash(&mut h1);
    let lo = h1.finish();

    let mut h2 = builder.build_hasher();
    1u64.hash(&mut h2);
    v.hash(&mut h2);
    let hi = h2.finish();

    (u128::from(hi) << 64) | u128::from(lo)
}
