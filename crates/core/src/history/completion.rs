//! Completion of pending operations.

use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use super::{History, OpId, Value};
use crate::scheme::{Kind, Role, Scheme, ValueSource};

/// Proposes return values for a pending operation.
///
/// Implementations are specialized per object kind and should only propose
/// returns the object could plausibly have produced given the history.
pub trait ReturnGenerator {
    fn candidates(&self, history: &History, id: OpId) -> Vec<Vec<Value>>;
}

/// Default generator driven by an object's [`Scheme`].
///
/// - producers and argument-valued consumers (`push`, `lock`, `unlock`,
///   `write`) return nothing;
/// - a collection remove may return any value still unclaimed by a completed
///   remove, or [`Value::Empty`];
/// - a register read may return any written value, or the initial value;
/// - a set operation returns `true` or `false`.
#[derive(Debug, Clone)]
pub struct SchemeReturns {
    scheme: Scheme,
}

impl SchemeReturns {
    #[must_use]
    pub const fn new(scheme: Scheme) -> Self {
        Self { scheme }
    }

    /// Values produced in the history, minus those already consumed when the
    /// scheme is injective. Sorted, without duplicates.
    fn available_values(&self, history: &History) -> Vec<Value> {
        let mut counts: HashMap<Value, i64> = HashMap::new();
        for op in history.operations() {
            let Some(role) = self.scheme.role_of(op) else {
                continue;
            };
            let Some(value) = self.scheme.value_of(op) else {
                continue;
            };
            if role.is_producer() {
                *counts.entry(value).or_default() += 1;
            } else if self.scheme.kind.is_injective() && !value.is_empty() {
                *counts.entry(value).or_default() -= 1;
            }
        }
        let mut values: Vec<Value> = counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(value, _)| value)
            .collect();
        values.sort();
        values
    }
}

impl ReturnGenerator for SchemeReturns {
    fn candidates(&self, history: &History, id: OpId) -> Vec<Vec<Value>> {
        let Some(schema) = history.get(id).and_then(|op| self.scheme.method(&op.method)) else {
            return vec![Vec::new()];
        };
        if self.scheme.kind == Kind::Set {
            return vec![vec![Value::Bool(true)], vec![Value::Bool(false)]];
        }
        match (schema.role, schema.value) {
            (Role::Remove | Role::Read, ValueSource::Ret(_)) => self
                .available_values(history)
                .into_iter()
                .chain(core::iter::once(Value::Empty))
                .map(|value| vec![value])
                .collect(),
            _ => vec![Vec::new()],
        }
    }
}

/// Lazy iterator over completions of a history.
///
/// The lowest pending id is resolved first; each candidate return tuple
/// becomes one branch, and a final branch drops the pending call entirely
/// (it may never have taken effect). Branches are explored depth first and
/// every yielded history has no pending operation.
pub struct Completions<'a> {
    generator: &'a dyn ReturnGenerator,
    stack: Vec<History>,
}

impl<'a> Completions<'a> {
    pub(crate) fn new(history: History, generator: &'a dyn ReturnGenerator) -> Self {
        Self {
            generator,
            stack: vec![history],
        }
    }
}

impl Iterator for Completions<'_> {
    type Item = History;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(history) = self.stack.pop() {
            let Some(id) = history.pending().next() else {
                return Some(history);
            };

            let mut dropped = history.clone();
            if dropped.remove(id).is_ok() {
                self.stack.push(dropped);
            }
            for rets in self.generator.candidates(&history, id).into_iter().rev() {
                let mut next = history.clone();
                if next.complete(id, rets).is_ok() {
                    self.stack.push(next);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_candidates() {
        let mut h = History::new();
        let a = h.start("push", vec![Value::Int(1)]);
        let b = h.start("push", vec![Value::Int(2)]);
        h.complete(a, vec![]).unwrap();
        h.complete(b, vec![]).unwrap();
        let c = h.start("pop", vec![]);
        h.complete(c, vec![Value::Int(2)]).unwrap();
        let d = h.start("pop", vec![]);

        let generator = SchemeReturns::new(Scheme::stack());
        assert_eq!(
            generator.candidates(&h, d),
            vec![vec![Value::Int(1)], vec![Value::Empty]]
        );
        assert_eq!(generator.candidates(&h, a), vec![Vec::<Value>::new()]);
    }

    #[test]
    fn test_set_candidates_are_booleans() {
        let mut h = History::new();
        let a = h.start("contains", vec![Value::Int(3)]);
        let generator = SchemeReturns::new(Scheme::set());
        assert_eq!(
            generator.candidates(&h, a),
            vec![vec![Value::Bool(true)], vec![Value::Bool(false)]]
        );
        h.complete(a, vec![Value::Bool(false)]).unwrap();
        assert_eq!(h.completions(&generator).count(), 1);
    }

    struct NoReturns;

    impl ReturnGenerator for NoReturns {
        fn candidates(&self, _history: &History, _id: OpId) -> Vec<Vec<Value>> {
            Vec::new()
        }
    }

    #[test]
    fn test_dropped_call_keeps_remaining_order() {
        let mut h = History::new();
        let a = h.start("push", vec![Value::Int(1)]);
        h.complete(a, vec![]).unwrap();
        let b = h.start("pop", vec![]);
        let c = h.start("push", vec![Value::Int(2)]);
        h.complete(c, vec![]).unwrap();

        let all: Vec<History> = h.completions(&NoReturns).collect();
        assert_eq!(all.len(), 1);
        assert!(!all[0].contains(b));
        assert!(all[0].is_before(a, c));
    }

    #[test]
    fn test_completions_resolve_every_pending() {
        let mut h = History::new();
        let a = h.start("push", vec![Value::Int(1)]);
        let b = h.start("pop", vec![]);

        let generator = SchemeReturns::new(Scheme::stack());
        let all: Vec<History> = h.completions(&generator).collect();

        // push: complete or drop; pop: {1, empty} or drop when push kept,
        // {empty} or drop when push dropped
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(History::is_complete));
        assert_eq!(
            all[0].get(a).and_then(|op| op.rets.clone()),
            Some(Vec::new())
        );
        assert_eq!(
            all[0].get(b).and_then(|op| op.rets.clone()),
            Some(vec![Value::Int(1)])
        );
        assert!(all.iter().any(|c| !c.contains(a) && !c.contains(b)));
        assert!(h.width() == 2, "original untouched");
    }
}
