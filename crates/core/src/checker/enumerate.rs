//! Enumeration checker: one oracle query per linearization.
//!
//! Ground truth for the other checkers. Every total order consistent with
//! the real-time order is handed to the oracle as a chain of facts, and the
//! first satisfiable one ends the search. The number of candidates grows
//! factorially with the number of overlapping calls.

use alloc::boxed::Box;

use super::{any_linearizable, CheckerBase, Context, HistoryChecker, Verdict};
use crate::history::History;
use crate::oracle::{GroundFacts, Oracle, OracleVerdict};
use crate::scheme::Scheme;

pub struct EnumerateChecker {
    base: CheckerBase,
    oracle: Box<dyn Oracle>,
    candidates: usize,
}

impl EnumerateChecker {
    #[must_use]
    pub fn new(base: CheckerBase, oracle: Box<dyn Oracle>) -> Self {
        Self {
            base,
            oracle,
            candidates: 0,
        }
    }

    /// Linearizations queried by the last check.
    #[must_use]
    pub const fn candidates(&self) -> usize {
        self.candidates
    }

    fn decide_one(&mut self, history: &History, scheme: &Scheme) -> Verdict {
        let mut unknown = false;
        for order in history.linearizations() {
            self.candidates += 1;
            match self.oracle.decide(scheme, &GroundFacts::chain(history, &order)) {
                OracleVerdict::Sat => {
                    tracing::trace!(?order, "enumerate: satisfiable linearization");
                    return Verdict::Linearizable;
                }
                OracleVerdict::Unknown => unknown = true,
                OracleVerdict::Unsat => {}
            }
        }
        if unknown {
            Verdict::Inconclusive
        } else {
            Verdict::Violation
        }
    }
}

impl HistoryChecker for EnumerateChecker {
    fn name(&self) -> &'static str {
        "enumerate"
    }

    fn base(&self) -> &CheckerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CheckerBase {
        &mut self.base
    }

    fn evaluate(&mut self, ctx: &mut Context<'_>) -> Verdict {
        self.candidates = 0;
        let scheme = ctx.scheme;
        let mut histories = 0usize;
        let verdict = any_linearizable(ctx.candidates(self.base.completion).map(|h| {
            histories += 1;
            self.decide_one(&h, scheme)
        }));
        tracing::debug!(
            histories,
            candidates = self.candidates,
            ?verdict,
            "enumerate: checked {} candidates",
            self.candidates
        );
        verdict
    }
}
