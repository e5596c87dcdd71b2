//! Inference rules of the saturation engine.
//!
//! Each rule relates one or two elements (matched producer/consumer groups)
//! and, when its premises hold in the current extended order, concludes one
//! new ordering edge. Some conclusions are contradictions (an element that
//! must have been removed never was); those are expressed as an edge that
//! closes a cycle, which is how the history records a violation.
//!
//! Premises on pending calls are careful about the future: a conclusion that
//! relies on "nobody removed this element" only fires once no consumer that
//! could still do so is in flight.

use crate::history::{History, OpId};
use crate::matcher::{Group, Matcher};
use crate::scheme::{Scheme, ValueSource};

/// Read-only view a rule is evaluated against.
pub struct RuleState<'a> {
    history: &'a History,
    matcher: &'a Matcher,
    scheme: &'a Scheme,
}

impl<'a> RuleState<'a> {
    pub const fn new(history: &'a History, matcher: &'a Matcher, scheme: &'a Scheme) -> Self {
        Self {
            history,
            matcher,
            scheme,
        }
    }

    fn group(&self, g: OpId) -> Option<&'a Group> {
        self.matcher.group(g)
    }

    /// Producer and (first) consumer of an element with a producer.
    fn element(&self, g: OpId) -> Option<(OpId, Option<OpId>)> {
        let group = self.group(g)?;
        Some((group.producer?, group.consumers.first().copied()))
    }

    fn before(&self, x: OpId, y: OpId) -> bool {
        self.history.is_ext_before(x, y)
    }

    fn completed(&self, id: OpId) -> bool {
        self.history.get(id).is_some_and(|op| op.is_completed())
    }

    /// Whether a pending consumer whose value is still unknown could take
    /// effect before `bound` returned.
    fn open_consumer_before(&self, bound: OpId) -> bool {
        self.history.pending().any(|p| {
            !self.history.is_before(bound, p)
                && self.history.get(p).is_some_and(|op| {
                    self.scheme.method(&op.method).is_some_and(|m| {
                        m.role.is_consumer() && matches!(m.value, ValueSource::Ret(_))
                    })
                })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// An element's producer precedes its consumer. A consumer with no
    /// producer at all (a value claimed twice, a release of something never
    /// acquired) is contradictory once it returned.
    AddRemoveOrder(OpId),
    /// An element against a consumer that found the object empty: if the
    /// element was added before the witness, it was removed before it too;
    /// if the witness precedes the removal, it precedes the addition.
    RemoveEmpty { element: OpId, witness: OpId },
    /// Queue elements leave in the order they entered.
    FifoOrder(OpId, OpId),
    /// Stack elements nest.
    LifoOrder(OpId, OpId),
    /// Lock holding intervals are disjoint.
    MutexOrder(OpId, OpId),
}

impl Rule {
    /// Groups the rule mentions.
    #[must_use]
    pub const fn groups(&self) -> (OpId, Option<OpId>) {
        match *self {
            Self::AddRemoveOrder(g) => (g, None),
            Self::RemoveEmpty { element, witness } => (element, Some(witness)),
            Self::FifoOrder(g1, g2) | Self::LifoOrder(g1, g2) | Self::MutexOrder(g1, g2) => {
                (g1, Some(g2))
            }
        }
    }

    #[must_use]
    pub fn mentions(&self, group: OpId) -> bool {
        let (g1, g2) = self.groups();
        g1 == group || g2 == Some(group)
    }

    /// Whether the premises currently hold.
    #[must_use]
    pub fn applies(&self, state: &RuleState<'_>) -> bool {
        self.fire(state).is_some()
    }

    /// The edge the rule concludes, if its premises hold.
    #[must_use]
    pub fn fire(&self, state: &RuleState<'_>) -> Option<(OpId, OpId)> {
        match *self {
            Self::AddRemoveOrder(g) => add_remove(state, g),
            Self::RemoveEmpty { element, witness } => remove_empty(state, element, witness),
            Self::FifoOrder(g1, g2) => fifo(state, g1, g2).or_else(|| fifo(state, g2, g1)),
            Self::LifoOrder(g1, g2) => lifo(state, g1, g2).or_else(|| lifo(state, g2, g1)),
            Self::MutexOrder(g1, g2) => mutex(state, g1, g2).or_else(|| mutex(state, g2, g1)),
        }
    }
}

fn add_remove(state: &RuleState<'_>, g: OpId) -> Option<(OpId, OpId)> {
    let group = state.group(g)?;
    let r = group.consumers.first().copied()?;
    match group.producer {
        Some(a) => Some((a, r)),
        None if group.has_value() && state.completed(r) => Some((r, r)),
        None => None,
    }
}

fn remove_empty(state: &RuleState<'_>, g: OpId, e: OpId) -> Option<(OpId, OpId)> {
    let (a, r) = state.element(g)?;
    if state.before(a, e) {
        return match r {
            Some(r) => Some((r, e)),
            // still present when the witness saw nothing
            None if !state.open_consumer_before(e) => Some((e, a)),
            None => None,
        };
    }
    match r {
        Some(r) if state.before(e, r) => Some((e, a)),
        _ => None,
    }
}

/// One orientation of the FIFO rule; `1` is assumed to be added first.
fn fifo(state: &RuleState<'_>, g1: OpId, g2: OpId) -> Option<(OpId, OpId)> {
    let (a1, r1) = state.element(g1)?;
    let (a2, r2) = state.element(g2)?;
    match (r1, r2) {
        (Some(r1), Some(r2)) => {
            if state.before(a1, a2) {
                Some((r1, r2))
            } else if state.before(r1, r2) {
                Some((a1, a2))
            } else {
                None
            }
        }
        // the later element left while the earlier one stays forever
        (None, Some(r2))
            if state.before(a1, a2) && state.completed(r2) && !state.open_consumer_before(r2) =>
        {
            Some((r2, a1))
        }
        _ => None,
    }
}

/// One orientation of the LIFO rule.
fn lifo(state: &RuleState<'_>, g1: OpId, g2: OpId) -> Option<(OpId, OpId)> {
    let (a1, r1) = state.element(g1)?;
    let (a2, r2) = state.element(g2)?;
    match (r1, r2) {
        (Some(r1), Some(r2)) => {
            if state.before(a1, a2) && state.before(r1, r2) {
                Some((r1, a2))
            } else if state.before(a1, a2) && state.before(a2, r1) {
                Some((r2, r1))
            } else if state.before(a2, r1) && state.before(r1, r2) {
                Some((a2, a1))
            } else {
                None
            }
        }
        // 1 is never removed, so 2 was popped before 1 was pushed on top.
        // The mirrored case (2 still pending removal) has no rule yet.
        (None, Some(r2))
            if state.before(a2, a1) && state.completed(r2) && !state.open_consumer_before(r2) =>
        {
            Some((r2, a1))
        }
        _ => None,
    }
}

/// One orientation of the mutual exclusion rule.
fn mutex(state: &RuleState<'_>, g1: OpId, g2: OpId) -> Option<(OpId, OpId)> {
    let (l1, u1) = state.element(g1)?;
    let (l2, u2) = state.element(g2)?;
    if !state.completed(l1) || !state.completed(l2) {
        return None;
    }
    match (u1, u2) {
        (Some(u1), _) if state.before(l1, l2) => Some((u1, l2)),
        (Some(u1), Some(u2)) if state.before(l2, u1) => Some((u2, l1)),
        // 1 is still held; 2 must have been released before 1 was acquired
        (None, Some(u2)) if state.completed(u2) => Some((u2, l1)),
        // both held at once
        (None, None) => Some((l1, l1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Value;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    struct Fixture {
        history: History,
        matcher: Matcher,
        scheme: Scheme,
    }

    impl Fixture {
        fn new(scheme: Scheme) -> Self {
            Self {
                history: History::new(),
                matcher: Matcher::new(),
                scheme,
            }
        }

        fn call(&mut self, method: &str, args: Vec<Value>) -> OpId {
            let id = self.history.start(method, args);
            self.matcher.started(&self.history, &self.scheme, id).unwrap();
            id
        }

        fn ret(&mut self, id: OpId, rets: Vec<Value>) {
            self.history.complete(id, rets).unwrap();
            self.matcher.completed(&self.history, &self.scheme, id).unwrap();
        }

        fn op(&mut self, method: &str, args: Vec<Value>, rets: Vec<Value>) -> OpId {
            let id = self.call(method, args);
            self.ret(id, rets);
            id
        }

        fn fire(&self, rule: Rule) -> Option<(OpId, OpId)> {
            rule.fire(&RuleState::new(&self.history, &self.matcher, &self.scheme))
        }
    }

    #[test]
    fn test_add_remove_order() {
        let mut f = Fixture::new(Scheme::queue());
        let a = f.call("enqueue", vec![int(1)]);
        let r = f.op("dequeue", vec![], vec![int(1)]);
        assert_eq!(f.fire(Rule::AddRemoveOrder(a)), Some((a, r)));

        // second claim on the same value
        let r2 = f.op("dequeue", vec![], vec![int(1)]);
        assert_eq!(f.fire(Rule::AddRemoveOrder(r2)), Some((r2, r2)));
    }

    #[test]
    fn test_remove_empty_waits_for_open_consumers() {
        let mut f = Fixture::new(Scheme::stack());
        let a = f.op("push", vec![int(1)], vec![]);
        let p = f.call("pop", vec![]);
        let e = f.op("pop", vec![], vec![Value::Empty]);
        let rule = Rule::RemoveEmpty {
            element: a,
            witness: e,
        };
        assert_eq!(f.fire(rule), None, "p may still remove 1 before e");

        f.ret(p, vec![int(1)]);
        assert_eq!(f.fire(rule), Some((p, e)));
    }

    #[test]
    fn test_remove_empty_forces_cycle() {
        let mut f = Fixture::new(Scheme::queue());
        let a = f.op("enqueue", vec![int(1)], vec![]);
        let e = f.op("dequeue", vec![], vec![Value::Empty]);
        let rule = Rule::RemoveEmpty {
            element: a,
            witness: e,
        };
        assert_eq!(f.fire(rule), Some((e, a)));
        assert!(f.history.is_ext_before(a, e));
    }

    #[test]
    fn test_fifo_both_orientations() {
        let mut f = Fixture::new(Scheme::queue());
        let a1 = f.op("enqueue", vec![int(1)], vec![]);
        let a2 = f.op("enqueue", vec![int(2)], vec![]);
        let r2 = f.call("dequeue", vec![]);
        let r1 = f.call("dequeue", vec![]);
        f.ret(r2, vec![int(2)]);
        f.ret(r1, vec![int(1)]);

        assert_eq!(f.fire(Rule::FifoOrder(a2, a1)), Some((r1, r2)));
        assert_eq!(f.fire(Rule::FifoOrder(a1, a2)), Some((r1, r2)));
    }

    #[test]
    fn test_fifo_unremoved_earlier_element() {
        let mut f = Fixture::new(Scheme::queue());
        let a1 = f.op("enqueue", vec![int(1)], vec![]);
        let a2 = f.op("enqueue", vec![int(2)], vec![]);
        let r2 = f.op("dequeue", vec![], vec![int(2)]);
        assert_eq!(f.fire(Rule::FifoOrder(a1, a2)), Some((r2, a1)));
    }

    #[test]
    fn test_lifo_nesting() {
        let mut f = Fixture::new(Scheme::stack());
        let a1 = f.op("push", vec![int(1)], vec![]);
        let a2 = f.op("push", vec![int(2)], vec![]);
        let r1 = f.op("pop", vec![], vec![int(1)]);
        f.op("pop", vec![], vec![int(2)]);
        assert_eq!(f.fire(Rule::LifoOrder(a1, a2)), Some((r1, a2)));
        assert_eq!(f.fire(Rule::LifoOrder(a2, a1)), Some((r1, a2)));
    }

    #[test]
    fn test_lifo_unremoved_later_push() {
        let mut f = Fixture::new(Scheme::stack());
        let a1 = f.call("push", vec![int(1)]);
        let a2 = f.op("push", vec![int(2)], vec![]);
        let r2 = f.op("pop", vec![], vec![int(2)]);
        f.ret(a1, vec![]);
        assert!(f.history.is_ext_before(a2, r2));
        assert_eq!(f.fire(Rule::LifoOrder(a1, a2)), None, "a2 < a1 not known");
        f.history.order(a2, a1);
        assert_eq!(f.fire(Rule::LifoOrder(a1, a2)), Some((r2, a1)));
    }

    #[test]
    fn test_mutex() {
        let mut f = Fixture::new(Scheme::lock());
        let l1 = f.call("lock", vec![int(1)]);
        let l2 = f.call("lock", vec![int(2)]);
        f.ret(l1, vec![]);
        f.ret(l2, vec![]);
        assert_eq!(f.fire(Rule::MutexOrder(l1, l2)), Some((l1, l1)));

        let u2 = f.op("unlock", vec![int(2)], vec![]);
        assert_eq!(f.fire(Rule::MutexOrder(l1, l2)), Some((u2, l1)));

        let mut f = Fixture::new(Scheme::lock());
        let l1 = f.op("lock", vec![int(1)], vec![]);
        let u1 = f.op("unlock", vec![int(1)], vec![]);
        let l2 = f.op("lock", vec![int(2)], vec![]);
        let _u2 = f.call("unlock", vec![int(2)]);
        assert_eq!(f.fire(Rule::MutexOrder(l2, l1)), Some((u1, l2)));
    }
}
