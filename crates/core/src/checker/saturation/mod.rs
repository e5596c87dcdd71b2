//! Saturation checker: order inference without an oracle.
//!
//! # Algorithm
//!
//! For every element the matcher creates, the engine instantiates the
//! [`Rule`]s the object's kind calls for: an [`AddRemoveOrder`] for the
//! element itself, plus one pairwise rule against every element and empty
//! witness it already knows. Then:
//!
//! 1. Groups touched by an event go on a worklist of dirty groups.
//! 2. For every dirty group, each live rule mentioning it is tried. A rule
//!    that concludes an edge is retired for good (edges are never retracted,
//!    so its conclusion stays true) and, if the edge is new, the groups it
//!    mentions are re-enqueued.
//! 3. When the worklist drains and the extended order grew since the last
//!    sweep, every group is enqueued once more: closing the order may have
//!    satisfied premises of rules whose groups were not touched. A return
//!    forces the same sweep, since it may complete a producer or close a
//!    consumer that kept other rules waiting.
//!
//! Each step either retires a rule or stops, so the fixpoint is reached
//! after at most one firing per rule. The history is in violation iff some
//! operation is ext-before itself, which is checked on demand rather than
//! on every insertion.
//!
//! Every inferred edge follows from the object's sequential specification,
//! so a reported violation is real. The rule set is not complete: some
//! violations are only found by the oracle-backed checkers. Registers,
//! sets and semaphores with more than one permit have no ordering rules.
//!
//! [`AddRemoveOrder`]: Rule::AddRemoveOrder

use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use super::{any_linearizable, CheckerBase, Context, HistoryChecker, Verdict};
use crate::history::{History, OpId};
use crate::matcher::Matcher;
use crate::scheme::{Kind, Scheme};

pub mod rule;

pub use rule::{Rule, RuleState};

/// Rule store and worklist of the fixpoint computation.
#[derive(Debug, Clone, Default)]
pub struct Saturation {
    rules: Vec<Option<Rule>>,
    by_group: HashMap<OpId, Vec<usize>>,
    elements: BTreeSet<OpId>,
    witnesses: BTreeSet<OpId>,
    dirty: VecDeque<OpId>,
    queued: HashSet<OpId>,
    swept_at: usize,
    stale: bool,
    fired: usize,
}

impl Saturation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine seeded with every element of a (typically completed) history.
    #[must_use]
    pub fn from_matcher(matcher: &Matcher, scheme: &Scheme) -> Self {
        let mut engine = Self::new();
        for (group, _) in matcher.groups() {
            engine.see_group(matcher, scheme, group);
        }
        engine
    }

    /// Number of rules that have not fired yet.
    #[must_use]
    pub fn live_rules(&self) -> usize {
        self.rules.iter().flatten().count()
    }

    /// Number of rules that fired so far.
    #[must_use]
    pub const fn fired(&self) -> usize {
        self.fired
    }

    /// Registers `group` (instantiating its rules on first sight) and marks
    /// it dirty.
    pub fn see_group(&mut self, matcher: &Matcher, scheme: &Scheme, group: OpId) {
        if !self.elements.contains(&group) && !self.witnesses.contains(&group) {
            self.instantiate(matcher, scheme, group);
        }
        self.enqueue(group);
    }

    /// Requests a sweep over every group on the next saturation.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    fn instantiate(&mut self, matcher: &Matcher, scheme: &Scheme, group: OpId) {
        let Some(g) = matcher.group(group) else {
            return;
        };
        let kind = scheme.kind;
        if matches!(kind, Kind::Register | Kind::Set) {
            return;
        }

        if g.is_orphan() && !g.has_value() {
            if kind.is_collection() {
                let elements: Vec<OpId> = self.elements.iter().copied().collect();
                for element in elements {
                    self.add_rule(Rule::RemoveEmpty {
                        element,
                        witness: group,
                    });
                }
            }
            self.witnesses.insert(group);
            return;
        }

        self.add_rule(Rule::AddRemoveOrder(group));
        if g.is_orphan() {
            return;
        }

        if kind.is_collection() {
            let witnesses: Vec<OpId> = self.witnesses.iter().copied().collect();
            for witness in witnesses {
                self.add_rule(Rule::RemoveEmpty {
                    element: group,
                    witness,
                });
            }
        }
        let others: Vec<OpId> = self.elements.iter().copied().collect();
        for other in others {
            match kind {
                Kind::Queue => self.add_rule(Rule::FifoOrder(other, group)),
                Kind::Stack => self.add_rule(Rule::LifoOrder(other, group)),
                Kind::Lock | Kind::Semaphore { permits: 1 } => {
                    self.add_rule(Rule::MutexOrder(other, group));
                }
                Kind::Bag | Kind::Register | Kind::Semaphore { .. } | Kind::Set => {}
            }
        }
        self.elements.insert(group);
    }

    fn add_rule(&mut self, rule: Rule) {
        let index = self.rules.len();
        self.rules.push(Some(rule));
        let (g1, g2) = rule.groups();
        self.by_group.entry(g1).or_default().push(index);
        if let Some(g2) = g2 {
            self.by_group.entry(g2).or_default().push(index);
        }
    }

    fn enqueue(&mut self, group: OpId) {
        if self.queued.insert(group) {
            self.dirty.push_back(group);
        }
    }

    /// Drops `group` and every rule mentioning it.
    pub fn forget(&mut self, group: OpId) {
        self.elements.remove(&group);
        self.witnesses.remove(&group);
        if let Some(indices) = self.by_group.remove(&group) {
            for index in indices {
                if let Some(slot) = self.rules.get_mut(index) {
                    *slot = None;
                }
            }
        }
    }

    /// Applies rules until nothing new can be derived. Returns `true` if the
    /// extended order is still acyclic.
    pub fn saturate(&mut self, history: &mut History, matcher: &Matcher, scheme: &Scheme) -> bool {
        let mut rounds = 0u32;
        loop {
            let weight = history.ext_edge_count();
            if weight != self.swept_at || self.stale {
                self.swept_at = weight;
                self.stale = false;
                let groups: Vec<OpId> = self.by_group.keys().copied().collect();
                for group in groups {
                    self.enqueue(group);
                }
            }
            if self.dirty.is_empty() {
                break;
            }

            while let Some(group) = self.dirty.pop_front() {
                self.queued.remove(&group);
                let indices = self.by_group.get(&group).cloned().unwrap_or_default();
                for index in indices {
                    let Some(rule) = self.rules.get(index).copied().flatten() else {
                        continue;
                    };
                    let Some((x, y)) = rule.fire(&RuleState::new(history, matcher, scheme)) else {
                        continue;
                    };
                    self.rules[index] = None;
                    self.fired += 1;
                    if history.order(x, y) {
                        tracing::trace!(?rule, ?x, ?y, "saturation: rule fired");
                        let (g1, g2) = rule.groups();
                        self.enqueue(g1);
                        if let Some(g2) = g2 {
                            self.enqueue(g2);
                        }
                    }
                }
            }
            rounds += 1;
        }

        tracing::debug!(
            rounds,
            fired = self.fired,
            live = self.live_rules(),
            "saturation: fixpoint reached"
        );
        !history.has_ext_cycle()
    }
}

/// Saturates `history` from scratch. Returns `true` if it stays acyclic.
///
/// A history whose matching cannot be built (a consumer observed a value
/// nobody produced) cannot be linearized and reports `false`.
#[must_use]
pub fn saturate_history(history: &mut History, scheme: &Scheme) -> bool {
    let Ok(matcher) = Matcher::from_history(history, scheme) else {
        return false;
    };
    Saturation::from_matcher(&matcher, scheme).saturate(history, &matcher, scheme)
}

#[derive(Debug, Clone)]
pub struct SaturateChecker {
    base: CheckerBase,
    engine: Saturation,
}

impl SaturateChecker {
    #[must_use]
    pub fn new(base: CheckerBase) -> Self {
        Self {
            base,
            engine: Saturation::new(),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &Saturation {
        &self.engine
    }
}

impl HistoryChecker for SaturateChecker {
    fn name(&self) -> &'static str {
        "saturate"
    }

    fn base(&self) -> &CheckerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CheckerBase {
        &mut self.base
    }

    fn started(&mut self, ctx: &mut Context<'_>, _id: OpId, group: Option<OpId>) {
        if let Some(group) = group {
            self.engine.see_group(ctx.matcher, ctx.scheme, group);
        }
    }

    fn completed(&mut self, ctx: &mut Context<'_>, id: OpId, group: Option<OpId>) {
        // a returning producer is reported without a group
        let group = group.unwrap_or_else(|| ctx.matcher.group_of(id));
        if ctx.matcher.group(group).is_some() {
            self.engine.see_group(ctx.matcher, ctx.scheme, group);
        }
        self.engine.mark_stale();
    }

    fn removed(&mut self, ctx: &mut Context<'_>, id: OpId) {
        self.engine.forget(ctx.matcher.group_of(id));
    }

    fn evaluate(&mut self, ctx: &mut Context<'_>) -> Verdict {
        if !self.engine.saturate(ctx.history, ctx.matcher, ctx.scheme) {
            tracing::debug!(witness = ?ctx.history.ext_cycle_witness(), "saturate: cycle");
            return Verdict::Violation;
        }
        if !self.base.completion || ctx.history.is_complete() {
            return Verdict::Linearizable;
        }

        let scheme = ctx.scheme;
        let mut candidates = 0usize;
        let verdict = any_linearizable(ctx.history.completions(ctx.returns).map(|mut h| {
            candidates += 1;
            if saturate_history(&mut h, scheme) {
                Verdict::Linearizable
            } else {
                Verdict::Violation
            }
        }));
        tracing::debug!(candidates, ?verdict, "saturate: completions checked");
        verdict
    }
}
