//! Symbolic checker: one oracle query per history.
//!
//! The whole real-time order is handed to the oracle at once, which then
//! searches for a linearization itself. In incremental mode the oracle keeps
//! the stable facts (completed operations and the real-time edges, which
//! never change once recorded) in its base scope; each check only asserts
//! the pending operations inside a pushed scope. A removal invalidates the
//! base scope, which is then rebuilt on the next check.

use alloc::boxed::Box;
use alloc::collections::BTreeSet;

use super::{any_linearizable, CheckerBase, Context, HistoryChecker, Verdict};
use crate::history::{History, OpId};
use crate::oracle::{GroundFacts, Oracle};

pub struct SymbolicChecker {
    base: CheckerBase,
    oracle: Box<dyn Oracle>,
    asserted_ops: BTreeSet<OpId>,
    asserted_order: BTreeSet<(OpId, OpId)>,
    rebuild: bool,
}

impl SymbolicChecker {
    #[must_use]
    pub fn new(base: CheckerBase, oracle: Box<dyn Oracle>) -> Self {
        Self {
            base,
            oracle,
            asserted_ops: BTreeSet::new(),
            asserted_order: BTreeSet::new(),
            rebuild: false,
        }
    }

    /// Facts asserted into the oracle's base scope so far.
    #[must_use]
    pub fn asserted(&self) -> (usize, usize) {
        (self.asserted_ops.len(), self.asserted_order.len())
    }

    /// Asserts the facts of `history` that are new and stable, then decides
    /// with its pending operations in a scope of their own.
    fn decide_incremental(&mut self, ctx: &Context<'_>) -> Verdict {
        if self.rebuild {
            tracing::debug!("symbolic: rebuilding base scope");
            self.oracle.reset();
            self.asserted_ops.clear();
            self.asserted_order.clear();
            self.rebuild = false;
        }

        let history: &History = &*ctx.history;
        let mut stable = GroundFacts::new();
        for op in history.operations().filter(|op| op.is_completed()) {
            if self.asserted_ops.insert(op.id) {
                stable.insert_operation(op.clone());
            }
        }
        for (x, y) in history.before_pairs() {
            if self.asserted_order.insert((x, y)) {
                stable.insert_order(x, y);
            }
        }
        if !stable.is_empty() || !stable.order.is_empty() {
            tracing::trace!(
                operations = stable.len(),
                facts = stable.order.len(),
                "symbolic: extending base scope"
            );
            self.oracle.assert(&stable);
        }

        let mut pending = GroundFacts::new();
        for id in history.pending() {
            if let Some(op) = history.get(id) {
                pending.insert_operation(op.clone());
            }
        }
        self.oracle.decide(ctx.scheme, &pending).into()
    }
}

impl HistoryChecker for SymbolicChecker {
    fn name(&self) -> &'static str {
        "symbolic"
    }

    fn base(&self) -> &CheckerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CheckerBase {
        &mut self.base
    }

    fn removed(&mut self, _ctx: &mut Context<'_>, _id: OpId) {
        self.rebuild = true;
    }

    fn evaluate(&mut self, ctx: &mut Context<'_>) -> Verdict {
        let completing = self.base.completion && !ctx.history.is_complete();
        let verdict = if self.base.incremental && !completing {
            self.decide_incremental(ctx)
        } else {
            let scheme = ctx.scheme;
            let oracle = &mut self.oracle;
            any_linearizable(
                ctx.candidates(self.base.completion)
                    .map(|h| Verdict::from(oracle.decide(scheme, &GroundFacts::from_history(&h)))),
            )
        };
        tracing::debug!(?verdict, "symbolic: decided");
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{SchemeReturns, Value};
    use crate::matcher::Matcher;
    use crate::oracle::ReplayOracle;
    use crate::scheme::Scheme;

    #[test]
    fn test_incremental_base_scope_grows() {
        let scheme = Scheme::queue();
        let matcher = Matcher::new();
        let returns = SchemeReturns::new(scheme.clone());
        let mut checker =
            SymbolicChecker::new(CheckerBase::new(false, true), Box::new(ReplayOracle::default()));
        let mut h = History::new();

        let a = h.start("enqueue", vec![Value::Int(1)]);
        {
            let mut ctx = Context::new(&mut h, &matcher, &scheme, &returns);
            assert_eq!(checker.check(&mut ctx), Verdict::Linearizable);
        }
        assert_eq!(checker.asserted(), (0, 0));

        h.complete(a, vec![]).unwrap();
        let b = h.start("dequeue", vec![]);
        h.complete(b, vec![Value::Int(1)]).unwrap();
        let c = h.start("dequeue", vec![]);
        h.complete(c, vec![Value::Int(1)]).unwrap();
        {
            let mut ctx = Context::new(&mut h, &matcher, &scheme, &returns);
            assert_eq!(checker.check(&mut ctx), Verdict::Violation);
        }
        assert_eq!(checker.asserted(), (3, 3));
    }

    #[test]
    fn test_rebuild_after_removal() {
        let scheme = Scheme::stack();
        let matcher = Matcher::new();
        let returns = SchemeReturns::new(scheme.clone());
        let mut checker =
            SymbolicChecker::new(CheckerBase::new(false, true), Box::new(ReplayOracle::default()));
        let mut h = History::new();
        let a = h.start("push", vec![Value::Int(1)]);
        h.complete(a, vec![]).unwrap();
        let b = h.start("pop", vec![]);
        h.complete(b, vec![Value::Int(1)]).unwrap();
        {
            let mut ctx = Context::new(&mut h, &matcher, &scheme, &returns);
            assert_eq!(checker.check(&mut ctx), Verdict::Linearizable);
            checker.removed(&mut ctx, a);
            checker.removed(&mut ctx, b);
        }
        h.remove(a).unwrap();
        h.remove(b).unwrap();
        let c = h.start("pop", vec![]);
        h.complete(c, vec![Value::Empty]).unwrap();

        let mut ctx = Context::new(&mut h, &matcher, &scheme, &returns);
        assert_eq!(checker.check(&mut ctx), Verdict::Linearizable);
        assert_eq!(checker.asserted(), (1, 0));
    }
}
