//! Counting checker: oracle queries over a bounded epoch grid.
//!
//! Real time is discretized into `bound + 1` epochs. Each operation still on
//! the grid lives in a cell `[i, j]` of a triangular grid (called in epoch
//! `i`, returned in epoch `j`, `0 <= i <= j <= bound`; a pending operation
//! only has its call epoch). A completion closes the current epoch; once
//! the last epoch is reached, the grid is aged instead:
//!
//! 1. operations that returned in epoch 0 are *retired*: handed once to the
//!    oracle's base scope together with the retired operations known to
//!    precede them, and dropped from the grid;
//! 2. every remaining position moves one epoch toward the origin.
//!
//! Nothing left on the grid returned in epoch 0, so merging epochs 0 and 1
//! loses no ordering fact between grid operations. Each grid operation keeps
//! the retired operations that precede it, reduced to those not preceding
//! another one; a new call inherits the same reduction over everything
//! retired so far (the *frontier*). Retired operations in such a set overlap
//! pairwise, so there are never more of them than the concurrency width.
//! Both sets are capped at `bound` entries (at least one), dropping the
//! oldest: while the width stays within the cap every real-time fact
//! survives, past it some are dropped. Dropping facts only ever hides
//! violations, so a violation reported here is real.
//!
//! The checker itself therefore holds at most `bound + 1` returned
//! operations plus the pending ones, however long the history runs. Each
//! check asserts only those in a pushed scope.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::{CheckerBase, Context, HistoryChecker, Verdict};
use crate::history::{History, OpId};
use crate::oracle::{GroundFacts, Oracle};

/// Grid position of a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

/// An operation on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    start: usize,
    end: Option<usize>,
    /// Retired operations known to precede this one.
    preds: Vec<OpId>,
}

impl Slot {
    const fn interval(&self) -> Option<Interval> {
        match self.end {
            Some(end) => Some(Interval {
                start: self.start,
                end,
            }),
            None => None,
        }
    }

    fn age(&mut self) {
        self.start = self.start.saturating_sub(1);
        self.end = self.end.map(|end| end.saturating_sub(1));
    }
}

/// Adds `x` to a set of retired operations, dropping the members `x` is
/// known to follow, and keeps at most `cap` of them.
fn advance_frontier(set: &mut Vec<OpId>, x: OpId, x_preds: &[OpId], cap: usize) {
    set.retain(|p| !x_preds.contains(p));
    set.push(x);
    if set.len() > cap {
        let excess = set.len() - cap;
        set.drain(..excess);
    }
}

/// Members of `ids` that precede no other member.
fn latest(history: &History, ids: &[OpId], cap: usize) -> Vec<OpId> {
    let mut latest: Vec<OpId> = ids
        .iter()
        .copied()
        .filter(|x| !ids.iter().any(|y| history.is_before(*x, *y)))
        .collect();
    if latest.len() > cap {
        latest.drain(..latest.len() - cap);
    }
    latest
}

pub struct CountingChecker {
    base: CheckerBase,
    oracle: Box<dyn Oracle>,
    bound: usize,
    epoch: usize,
    slots: BTreeMap<OpId, Slot>,
    frontier: Vec<OpId>,
    retired: usize,
    shifts: usize,
    rebuild: bool,
}

impl CountingChecker {
    #[must_use]
    pub fn new(base: CheckerBase, bound: usize, oracle: Box<dyn Oracle>) -> Self {
        Self {
            base,
            oracle,
            bound,
            epoch: 0,
            slots: BTreeMap::new(),
            frontier: Vec::new(),
            retired: 0,
            shifts: 0,
            rebuild: false,
        }
    }

    #[must_use]
    pub const fn bound(&self) -> usize {
        self.bound
    }

    #[must_use]
    pub const fn epoch(&self) -> usize {
        self.epoch
    }

    /// How many times the grid was aged.
    #[must_use]
    pub const fn shifts(&self) -> usize {
        self.shifts
    }

    /// How many operations left the grid for the oracle's base scope.
    #[must_use]
    pub const fn retired(&self) -> usize {
        self.retired
    }

    /// Operations currently on the grid, pending ones included.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }

    /// Retired operations a call starting now would follow.
    #[must_use]
    pub fn frontier(&self) -> &[OpId] {
        &self.frontier
    }

    /// Position of a completed operation still on the grid.
    #[must_use]
    pub fn interval(&self, id: OpId) -> Option<Interval> {
        self.slots.get(&id).and_then(Slot::interval)
    }

    /// Most retired operations remembered per set.
    const fn cap(&self) -> usize {
        if self.bound == 0 {
            1
        } else {
            self.bound
        }
    }

    /// Number of grid cells.
    #[must_use]
    pub const fn cells(&self) -> usize {
        (self.bound + 1) * (self.bound + 2) / 2
    }

    /// Number of distinct occupied cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        let mut cells: Vec<Interval> = self.slots.values().filter_map(Slot::interval).collect();
        cells.sort_unstable();
        cells.dedup();
        cells.len()
    }

    /// Retires what returned in epoch 0, then ages every position one epoch
    /// toward the origin.
    fn shift_intervals(&mut self, history: &History) {
        let leaving: Vec<OpId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.end == Some(0))
            .map(|(id, _)| *id)
            .collect();
        for id in leaving {
            self.retire(history, id);
        }
        for slot in self.slots.values_mut() {
            slot.age();
        }
        self.shifts += 1;
        tracing::trace!(shifts = self.shifts, tracked = self.slots.len(), "counting: aged grid");
    }

    fn retire(&mut self, history: &History, id: OpId) {
        let Some(slot) = self.slots.remove(&id) else {
            return;
        };
        if let Some(op) = history.get(id) {
            let mut facts = GroundFacts::new();
            facts.insert_operation(op.clone());
            for p in &slot.preds {
                facts.insert_order(*p, id);
            }
            self.oracle.assert(&facts);
        }

        let cap = self.cap();
        for other in self.slots.values_mut().filter(|other| other.start > 0) {
            advance_frontier(&mut other.preds, id, &slot.preds, cap);
        }
        advance_frontier(&mut self.frontier, id, &slot.preds, cap);
        self.retired += 1;
        tracing::trace!(?id, frontier = self.frontier.len(), "counting: retired");
    }

    /// Re-asserts every retired operation after one of them was removed.
    fn rebuild_base(&mut self, history: &History) {
        tracing::debug!("counting: rebuilding base scope");
        self.oracle.reset();
        let retired: Vec<OpId> = history.ids().filter(|id| !self.slots.contains_key(id)).collect();

        let mut facts = GroundFacts::new();
        for id in &retired {
            if let Some(op) = history.get(*id) {
                facts.insert_operation(op.clone());
            }
        }
        for (x, y) in history.before_pairs() {
            if facts.operations.contains_key(&x) && facts.operations.contains_key(&y) {
                facts.insert_order(x, y);
            }
        }
        self.oracle.assert(&facts);

        let cap = self.cap();
        self.frontier = latest(history, &retired, cap);
        for (id, slot) in &mut self.slots {
            let before: Vec<OpId> = retired
                .iter()
                .copied()
                .filter(|x| history.is_before(*x, *id))
                .collect();
            slot.preds = latest(history, &before, cap);
        }
        self.rebuild = false;
    }

    /// Lazily yields the ordering facts of the grid: `(x, y)` such that `x`
    /// returned in an epoch before the one `y` was called in, and every
    /// retired `x` recorded as preceding `y`. `y` may be pending.
    pub fn happens_before_pairs(&self) -> impl Iterator<Item = (OpId, OpId)> + '_ {
        let grid = self.slots.iter().flat_map(move |(x, slot)| {
            let end = slot.end;
            self.slots
                .iter()
                .filter(move |(_, other)| end.is_some_and(|end| end < other.start))
                .map(move |(y, _)| (*x, *y))
        });
        let retired = self
            .slots
            .iter()
            .flat_map(|(y, slot)| slot.preds.iter().map(move |p| (*p, *y)));
        grid.chain(retired)
    }
}

impl HistoryChecker for CountingChecker {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn base(&self) -> &CheckerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CheckerBase {
        &mut self.base
    }

    fn started(&mut self, _ctx: &mut Context<'_>, id: OpId, _group: Option<OpId>) {
        self.slots.insert(
            id,
            Slot {
                start: self.epoch,
                end: None,
                preds: self.frontier.clone(),
            },
        );
    }

    fn completed(&mut self, ctx: &mut Context<'_>, id: OpId, _group: Option<OpId>) {
        let epoch = self.epoch;
        let preds = &self.frontier;
        self.slots
            .entry(id)
            .or_insert_with(|| Slot {
                start: epoch,
                end: None,
                preds: preds.clone(),
            })
            .end = Some(epoch);
        if self.epoch < self.bound {
            self.epoch += 1;
        } else {
            self.shift_intervals(ctx.history);
        }
    }

    fn removed(&mut self, _ctx: &mut Context<'_>, id: OpId) {
        if self.slots.remove(&id).is_none() {
            // already in the oracle's base scope
            self.rebuild = true;
        }
    }

    fn evaluate(&mut self, ctx: &mut Context<'_>) -> Verdict {
        if self.rebuild {
            self.rebuild_base(ctx.history);
        }

        let mut facts = GroundFacts::new();
        for id in self.slots.keys() {
            if let Some(op) = ctx.history.get(*id) {
                facts.insert_operation(op.clone());
            }
        }
        for (x, y) in self.happens_before_pairs() {
            facts.insert_order(x, y);
        }

        let verdict = self.oracle.decide(ctx.scheme, &facts);
        tracing::debug!(
            operations = facts.len(),
            facts = facts.order.len(),
            retired = self.retired,
            shifts = self.shifts,
            ?verdict,
            "counting: decided"
        );
        verdict.into()
    }
}
