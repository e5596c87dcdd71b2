//! Linearizability checkers.
//!
//! Every checker observes the history through three callbacks, invoked
//! synchronously right after the history (and the matcher) processed an
//! event, and exposes [`check`](HistoryChecker::check), which decides the
//! current history:
//!
//! | algorithm | decides by | complete |
//! |---|---|---|
//! | [`SaturateChecker`] | rule-based order inference, cycle detection | no |
//! | [`CountingChecker`] | oracle over a bounded epoch grid | while width <= bound |
//! | [`EnumerateChecker`] | one oracle query per linearization | yes |
//! | [`SymbolicChecker`] | one oracle query per history | yes |
//!
//! A violation is sticky: once a check found one, every later check reports
//! it again without doing any work.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::fmt::{Display, Formatter};

use crate::history::{History, OpId, ReturnGenerator};
use crate::matcher::Matcher;
use crate::oracle::{Oracle, OracleVerdict};
use crate::scheme::Scheme;

pub mod counting;
pub mod enumerate;
pub mod saturation;
pub mod symbolic;

pub use counting::CountingChecker;
pub use enumerate::EnumerateChecker;
pub use saturation::SaturateChecker;
pub use symbolic::SymbolicChecker;

/// Outcome of one check.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Linearizable,
    Violation,
    /// The oracle gave up; neither verdict is justified.
    Inconclusive,
}

impl From<OracleVerdict> for Verdict {
    fn from(verdict: OracleVerdict) -> Self {
        match verdict {
            OracleVerdict::Sat => Self::Linearizable,
            OracleVerdict::Unsat => Self::Violation,
            OracleVerdict::Unknown => Self::Inconclusive,
        }
    }
}

/// Checking algorithm, as selected in the monitor configuration.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    Saturate,
    Counting,
    Enumerate,
    Symbolic,
}

impl Algorithm {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Saturate => "saturate",
            Self::Counting => "counting",
            Self::Enumerate => "enumerate",
            Self::Symbolic => "symbolic",
        }
    }

    /// Whether the algorithm consults a decision oracle.
    #[must_use]
    pub const fn uses_oracle(self) -> bool {
        !matches!(self, Self::Saturate)
    }

    /// Builds a checker running this algorithm. `oracle` is ignored by
    /// [`Algorithm::Saturate`]; `bound` is only used by
    /// [`Algorithm::Counting`].
    #[must_use]
    pub fn build(
        self,
        base: CheckerBase,
        bound: usize,
        oracle: Box<dyn Oracle>,
    ) -> Box<dyn HistoryChecker> {
        match self {
            Self::Saturate => Box::new(SaturateChecker::new(base)),
            Self::Counting => Box::new(CountingChecker::new(base, bound, oracle)),
            Self::Enumerate => Box::new(EnumerateChecker::new(base, oracle)),
            Self::Symbolic => Box::new(SymbolicChecker::new(base, oracle)),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a checker may look at or update while handling an event.
pub struct Context<'a> {
    pub history: &'a mut History,
    pub matcher: &'a Matcher,
    pub scheme: &'a Scheme,
    pub returns: &'a dyn ReturnGenerator,
}

impl<'a> Context<'a> {
    pub fn new(
        history: &'a mut History,
        matcher: &'a Matcher,
        scheme: &'a Scheme,
        returns: &'a dyn ReturnGenerator,
    ) -> Self {
        Self {
            history,
            matcher,
            scheme,
            returns,
        }
    }

    /// The histories a check must decide: the current one, or all of its
    /// completions when `completion` is set and some call is pending.
    ///
    /// Completions are built one at a time as the caller pulls them, so a
    /// check that stops at the first linearizable one never builds the rest.
    pub fn candidates(
        &self,
        completion: bool,
    ) -> Box<dyn Iterator<Item = Cow<'_, History>> + '_> {
        if completion && !self.history.is_complete() {
            Box::new(self.history.completions(self.returns).map(Cow::Owned))
        } else {
            Box::new(core::iter::once(Cow::Borrowed(&*self.history)))
        }
    }
}

/// State shared by every checker.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerBase {
    /// Close pending calls through their completions before deciding.
    pub completion: bool,
    /// Check after every event instead of once at the end.
    pub incremental: bool,
    violation: bool,
    inconclusive: bool,
    checks: usize,
}

impl CheckerBase {
    #[must_use]
    pub const fn new(completion: bool, incremental: bool) -> Self {
        Self {
            completion,
            incremental,
            violation: false,
            inconclusive: false,
            checks: 0,
        }
    }

    #[must_use]
    pub const fn violation(&self) -> bool {
        self.violation
    }

    /// Whether any check so far was inconclusive.
    #[must_use]
    pub const fn inconclusive(&self) -> bool {
        self.inconclusive
    }

    #[must_use]
    pub const fn checks(&self) -> usize {
        self.checks
    }
}

/// A linearizability checking algorithm observing a history.
pub trait HistoryChecker {
    fn name(&self) -> &'static str;

    fn base(&self) -> &CheckerBase;

    fn base_mut(&mut self) -> &mut CheckerBase;

    /// `id` was just called. `group` is the element the matcher put it in.
    fn started(&mut self, _ctx: &mut Context<'_>, _id: OpId, _group: Option<OpId>) {}

    /// `id` just returned. `group` is the element the matcher put it in.
    fn completed(&mut self, _ctx: &mut Context<'_>, _id: OpId, _group: Option<OpId>) {}

    /// `id` is about to be removed from the history and the matcher.
    fn removed(&mut self, _ctx: &mut Context<'_>, _id: OpId) {}

    /// Decides the current history.
    fn evaluate(&mut self, ctx: &mut Context<'_>) -> Verdict;

    /// Runs one check and records its outcome.
    fn check(&mut self, ctx: &mut Context<'_>) -> Verdict {
        let base = self.base_mut();
        base.checks += 1;
        if base.violation {
            return Verdict::Violation;
        }

        let verdict = self.evaluate(ctx);
        tracing::debug!(checker = self.name(), ?verdict, "check finished");
        let base = self.base_mut();
        match verdict {
            Verdict::Violation => base.violation = true,
            Verdict::Inconclusive => base.inconclusive = true,
            Verdict::Linearizable => {}
        }
        verdict
    }

    fn violation(&self) -> bool {
        self.base().violation
    }
}

/// Folds the verdicts of several candidate histories: one linearizable
/// candidate suffices, and without one an inconclusive answer wins over a
/// violation.
pub(crate) fn any_linearizable(verdicts: impl IntoIterator<Item = Verdict>) -> Verdict {
    let mut inconclusive = false;
    for verdict in verdicts {
        match verdict {
            Verdict::Linearizable => return Verdict::Linearizable,
            Verdict::Inconclusive => inconclusive = true,
            Verdict::Violation => {}
        }
    }
    if inconclusive {
        Verdict::Inconclusive
    } else {
        Verdict::Violation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_linearizable() {
        use Verdict::{Inconclusive, Linearizable, Violation};
        assert_eq!(any_linearizable([Violation, Linearizable]), Linearizable);
        assert_eq!(any_linearizable([Violation, Inconclusive]), Inconclusive);
        assert_eq!(any_linearizable([Violation, Violation]), Violation);
        assert_eq!(any_linearizable([]), Violation);
    }

    #[test]
    fn test_candidates() {
        use crate::history::{SchemeReturns, Value};

        let scheme = Scheme::stack();
        let matcher = Matcher::new();
        let returns = SchemeReturns::new(scheme.clone());
        let mut h = History::new();
        let a = h.start("push", vec![Value::Int(1)]);
        h.complete(a, vec![]).unwrap();
        let _pending = h.start("pop", vec![]);
        let ctx = Context::new(&mut h, &matcher, &scheme, &returns);

        let mut current = ctx.candidates(false);
        assert!(matches!(current.next(), Some(Cow::Borrowed(h)) if h.len() == 2));
        assert!(current.next().is_none());

        let mut completions = 0;
        for h in ctx.candidates(true) {
            assert!(matches!(h, Cow::Owned(_)));
            assert!(h.is_complete());
            completions += 1;
        }
        assert!(completions >= 2);
    }

    #[test]
    fn test_oracle_verdicts_map() {
        assert_eq!(Verdict::from(OracleVerdict::Unknown), Verdict::Inconclusive);
        assert_eq!(Verdict::from(OracleVerdict::Unsat), Verdict::Violation);
    }
}
