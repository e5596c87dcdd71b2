//! Add/remove matching.
//!
//! The matcher pairs every consumer (pop, dequeue, unlock, read) with the
//! producer (push, enqueue, lock, write) whose value it observed. A producer
//! together with its consumers forms an *element*, identified by a group id:
//! the producer's id once matched, the operation's own id otherwise.
//!
//! Matching is first-unclaimed: producers are scanned in id order and the
//! first one carrying the consumer's value that no other consumer claimed
//! yet wins (registers allow any number of consumers per producer). A
//! consumer returning [`Value::Empty`] is an *empty witness* and forms a
//! group of its own. Sets are not matched at all.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::Error;
use crate::history::{History, OpId, Value};
use crate::scheme::{Scheme, ValueSource};

/// One element: a producer and the consumers that observed its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub producer: Option<OpId>,
    pub consumers: Vec<OpId>,
    pub value: Value,
}

impl Group {
    /// Producer first, then consumers in id order.
    pub fn members(&self) -> impl Iterator<Item = OpId> + '_ {
        self.producer.into_iter().chain(self.consumers.iter().copied())
    }

    /// Whether the group carries a real value rather than witnessing emptiness.
    #[must_use]
    pub const fn has_value(&self) -> bool {
        !self.value.is_empty()
    }

    /// A consumer with no producer: an empty witness, or a value claimed
    /// twice.
    #[must_use]
    pub const fn is_orphan(&self) -> bool {
        self.producer.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    groups: BTreeMap<OpId, Group>,
    group_of: HashMap<OpId, OpId>,
    /// Consumers whose value is known from their arguments but whose
    /// producer has not been called yet.
    waiting: BTreeMap<OpId, Value>,
}

impl Matcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the matching of a whole history, treating operations as if
    /// they were called and returned in id order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmatchedRemove`] if a completed consumer observed a
    /// value that was never produced.
    pub fn from_history(history: &History, scheme: &Scheme) -> Result<Self, Error> {
        let mut matcher = Self::new();
        for id in history.ids() {
            matcher.started(history, scheme, id)?;
        }
        for op in history.operations().filter(|op| op.is_completed()) {
            matcher.completed(history, scheme, op.id)?;
        }
        Ok(matcher)
    }

    /// Canonical id of the element containing `id`.
    #[must_use]
    pub fn group_of(&self, id: OpId) -> OpId {
        self.group_of.get(&id).copied().unwrap_or(id)
    }

    #[must_use]
    pub fn group(&self, group: OpId) -> Option<&Group> {
        self.groups.get(&group)
    }

    /// Operations of an element, producer first.
    #[must_use]
    pub fn members(&self, group: OpId) -> Vec<OpId> {
        self.groups
            .get(&group)
            .map_or_else(Vec::new, |g| g.members().collect())
    }

    #[must_use]
    pub fn has_value(&self, group: OpId) -> bool {
        self.groups.get(&group).is_some_and(Group::has_value)
    }

    /// Every element, in group id order.
    pub fn groups(&self) -> impl Iterator<Item = (OpId, &Group)> {
        self.groups.iter().map(|(id, g)| (*id, g))
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Called after `id` was started. Returns the group it joined or
    /// created, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if `id` is not in the history.
    pub fn started(
        &mut self,
        history: &History,
        scheme: &Scheme,
        id: OpId,
    ) -> Result<Option<OpId>, Error> {
        let op = history.get(id).ok_or(Error::UnknownOperation(id))?;
        if !scheme.kind.is_matched() {
            return Ok(None);
        }
        let Some(schema) = scheme.method(&op.method) else {
            return Ok(None);
        };
        let Some(value) = schema.value_of(op) else {
            return Ok(None);
        };

        if schema.role.is_producer() {
            self.insert_group(id, Some(id), Vec::new(), value.clone());
            self.claim_waiting(scheme, id, &value);
            return Ok(Some(id));
        }
        Ok(self.match_consumer(scheme, id, value, false))
    }

    /// Called after `id` returned. Returns the group it joined or created,
    /// if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if `id` is not in the history and
    /// [`Error::UnmatchedRemove`] if its returned value was never produced.
    pub fn completed(
        &mut self,
        history: &History,
        scheme: &Scheme,
        id: OpId,
    ) -> Result<Option<OpId>, Error> {
        let op = history.get(id).ok_or(Error::UnknownOperation(id))?;
        if !scheme.kind.is_matched() {
            return Ok(None);
        }
        let Some(schema) = scheme.method(&op.method) else {
            return Ok(None);
        };
        if !schema.role.is_consumer() {
            return Ok(None);
        }

        match schema.value {
            ValueSource::Arg(_) => {
                // still no producer: the release of something never acquired
                Ok(self
                    .waiting
                    .remove(&id)
                    .map(|value| self.insert_group(id, None, vec![id], value)))
            }
            ValueSource::Ret(_) => {
                if self.group_of.contains_key(&id) {
                    return Ok(None);
                }
                let value = schema.value_of(op).unwrap_or(Value::Empty);
                let produced = value.is_empty()
                    || self.groups.values().any(|g| g.producer.is_some() && g.value == value);
                if !produced {
                    return Err(Error::UnmatchedRemove { id, value });
                }
                Ok(self.match_consumer(scheme, id, value, true))
            }
        }
    }

    /// Forgets `id`. An element whose last member is removed disappears.
    pub fn removed(&mut self, id: OpId) {
        self.waiting.remove(&id);
        let Some(group_id) = self.group_of.remove(&id) else {
            return;
        };
        let Some(group) = self.groups.get_mut(&group_id) else {
            return;
        };
        if group.producer == Some(id) {
            group.producer = None;
        }
        group.consumers.retain(|c| *c != id);
        if group.producer.is_none() && group.consumers.is_empty() {
            self.groups.remove(&group_id);
        }
    }

    fn match_consumer(
        &mut self,
        scheme: &Scheme,
        id: OpId,
        value: Value,
        completed: bool,
    ) -> Option<OpId> {
        if value.is_empty() {
            return Some(self.insert_group(id, None, vec![id], value));
        }

        let injective = scheme.kind.is_injective();
        let found = self
            .groups
            .iter()
            .find(|(_, g)| {
                g.producer.is_some() && g.value == value && (!injective || g.consumers.is_empty())
            })
            .map(|(group_id, _)| *group_id);

        if let Some(group_id) = found {
            if let Some(group) = self.groups.get_mut(&group_id) {
                group.consumers.push(id);
                group.consumers.sort_unstable();
            }
            self.group_of.insert(id, group_id);
            tracing::trace!(?id, group = ?group_id, "matcher: matched");
            return Some(group_id);
        }

        if completed {
            // every producer of this value is already claimed
            tracing::debug!(?id, ?value, "matcher: value claimed twice");
            Some(self.insert_group(id, None, vec![id], value))
        } else {
            self.waiting.insert(id, value);
            None
        }
    }

    fn claim_waiting(&mut self, scheme: &Scheme, producer: OpId, value: &Value) {
        let claimed: Vec<OpId> = self
            .waiting
            .iter()
            .filter(|(_, v)| *v == value)
            .map(|(id, _)| *id)
            .take(if scheme.kind.is_injective() { 1 } else { usize::MAX })
            .collect();
        for id in claimed {
            self.waiting.remove(&id);
            if let Some(group) = self.groups.get_mut(&producer) {
                group.consumers.push(id);
            }
            self.group_of.insert(id, producer);
        }
    }

    fn insert_group(
        &mut self,
        key: OpId,
        producer: Option<OpId>,
        consumers: Vec<OpId>,
        value: Value,
    ) -> OpId {
        for id in producer.iter().chain(&consumers) {
            self.group_of.insert(*id, key);
        }
        self.groups.insert(
            key,
            Group {
                producer,
                consumers,
                value,
            },
        );
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    fn run(h: &mut History, m: &mut Matcher, s: &Scheme, method: &str, args: Vec<Value>, rets: Vec<Value>) -> OpId {
        let id = h.start(method, args);
        m.started(h, s, id).unwrap();
        h.complete(id, rets).unwrap();
        m.completed(h, s, id).unwrap();
        id
    }

    #[test]
    fn test_pairs_by_value() {
        let s = Scheme::stack();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let a = run(&mut h, &mut m, &s, "push", vec![int(1)], vec![]);
        let b = run(&mut h, &mut m, &s, "push", vec![int(2)], vec![]);
        let c = run(&mut h, &mut m, &s, "pop", vec![], vec![int(2)]);
        let d = run(&mut h, &mut m, &s, "pop", vec![], vec![Value::Empty]);

        assert_eq!(m.group_of(c), b);
        assert_eq!(m.members(b), vec![b, c]);
        assert_eq!(m.members(a), vec![a]);
        assert!(m.has_value(b));
        assert_eq!(m.group_of(d), d);
        assert!(!m.has_value(d));
        assert!(m.group(d).unwrap().is_orphan());
    }

    #[test]
    fn test_first_unclaimed_wins() {
        let s = Scheme::queue();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let a = run(&mut h, &mut m, &s, "enqueue", vec![int(1)], vec![]);
        let b = run(&mut h, &mut m, &s, "enqueue", vec![int(1)], vec![]);
        let c = run(&mut h, &mut m, &s, "dequeue", vec![], vec![int(1)]);
        let d = run(&mut h, &mut m, &s, "dequeue", vec![], vec![int(1)]);
        assert_eq!(m.group_of(c), a);
        assert_eq!(m.group_of(d), b);

        // a third claim on the same value gets a group of its own
        let e = run(&mut h, &mut m, &s, "dequeue", vec![], vec![int(1)]);
        assert_eq!(m.group_of(e), e);
        assert!(m.group(e).unwrap().is_orphan());
        assert!(m.has_value(e));
    }

    #[test]
    fn test_value_never_added_is_fatal() {
        let s = Scheme::stack();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let a = h.start("pop", vec![]);
        m.started(&h, &s, a).unwrap();
        h.complete(a, vec![int(5)]).unwrap();
        assert_eq!(
            m.completed(&h, &s, a),
            Err(Error::UnmatchedRemove { id: a, value: int(5) })
        );
    }

    #[test]
    fn test_unlock_matches_at_start() {
        let s = Scheme::lock();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let l = run(&mut h, &mut m, &s, "lock", vec![int(1)], vec![]);
        let u = h.start("unlock", vec![int(1)]);
        assert_eq!(m.started(&h, &s, u), Ok(Some(l)));
        assert_eq!(m.members(l), vec![l, u]);
    }

    #[test]
    fn test_unlock_before_lock_call() {
        let s = Scheme::lock();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let u = h.start("unlock", vec![int(2)]);
        assert_eq!(m.started(&h, &s, u), Ok(None));
        let l = run(&mut h, &mut m, &s, "lock", vec![int(2)], vec![]);
        assert_eq!(m.group_of(u), l);

        let u2 = h.start("unlock", vec![int(3)]);
        m.started(&h, &s, u2).unwrap();
        h.complete(u2, vec![]).unwrap();
        assert_eq!(m.completed(&h, &s, u2), Ok(Some(u2)));
        assert!(m.group(u2).unwrap().is_orphan());
    }

    #[test]
    fn test_semaphore_release_matches_owner() {
        let s = Scheme::semaphore(2);
        let (mut h, mut m) = (History::new(), Matcher::new());
        let a1 = run(&mut h, &mut m, &s, "acquire", vec![int(1)], vec![]);
        let a2 = run(&mut h, &mut m, &s, "acquire", vec![int(2)], vec![]);
        let r2 = run(&mut h, &mut m, &s, "release", vec![int(2)], vec![]);
        assert_eq!(m.members(a2), vec![a2, r2]);
        assert_eq!(m.members(a1), vec![a1]);
    }

    #[test]
    fn test_set_operations_stay_unmatched() {
        let s = Scheme::set();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let a = h.start("add", vec![int(1)]);
        assert_eq!(m.started(&h, &s, a), Ok(None));
        h.complete(a, vec![Value::Bool(true)]).unwrap();
        assert_eq!(m.completed(&h, &s, a), Ok(None));
        let r = h.start("remove", vec![int(9)]);
        h.complete(r, vec![Value::Bool(true)]).unwrap();
        assert_eq!(m.completed(&h, &s, r), Ok(None));
        assert!(m.is_empty());
    }

    #[test]
    fn test_register_reads_share_write() {
        let s = Scheme::register();
        let (mut h, mut m) = (History::new(), Matcher::new());
        let w = run(&mut h, &mut m, &s, "write", vec![int(3)], vec![]);
        let r1 = run(&mut h, &mut m, &s, "read", vec![], vec![int(3)]);
        let r2 = run(&mut h, &mut m, &s, "read", vec![], vec![int(3)]);
        assert_eq!(m.members(w), vec![w, r1, r2]);
    }

    #[test]
    fn test_from_history_and_removed() {
        let s = Scheme::stack();
        let mut h = History::new();
        let a = h.start("push", vec![int(1)]);
        h.complete(a, vec![]).unwrap();
        let b = h.start("pop", vec![]);
        h.complete(b, vec![int(1)]).unwrap();
        let c = h.start("pop", vec![]);

        let mut m = Matcher::from_history(&h, &s).unwrap();
        assert_eq!(m.members(a), vec![a, b]);
        assert_eq!(m.group_of(c), c);
        assert_eq!(m.len(), 1);

        m.removed(a);
        m.removed(b);
        assert!(m.is_empty());
    }
}
