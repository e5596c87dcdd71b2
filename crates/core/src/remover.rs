//! Garbage collection of settled operations.
//!
//! When an operation returns, the calls still pending at that instant are
//! recorded as its dependency set; the set shrinks as those calls return.
//! Once every member of an element has returned with an empty dependency
//! set, no call that overlapped it is still in flight, and the element can
//! be dropped from the history without weakening any future verdict's
//! soundness.
//!
//! For add/remove objects an element is only collectible once its producer
//! is matched; an empty witness is collected on its own. Registers and sets
//! keep their whole history.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::history::{History, OpId};
use crate::matcher::Matcher;
use crate::scheme::{Kind, Scheme};

#[derive(Debug, Clone, Default)]
pub struct ObsoleteRemover {
    dependencies: BTreeMap<OpId, BTreeSet<OpId>>,
    collected: usize,
}

impl ObsoleteRemover {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the dependency set of `id` and settles it in the sets of
    /// earlier operations.
    pub fn completed(&mut self, history: &History, id: OpId) {
        for deps in self.dependencies.values_mut() {
            deps.remove(&id);
        }
        let pending: BTreeSet<OpId> = history.pending().filter(|p| *p != id).collect();
        self.dependencies.insert(id, pending);
    }

    pub fn removed(&mut self, id: OpId) {
        self.dependencies.remove(&id);
        for deps in self.dependencies.values_mut() {
            deps.remove(&id);
        }
    }

    /// Calls still pending that `id` waits on, if `id` returned.
    #[must_use]
    pub fn dependencies(&self, id: OpId) -> Option<&BTreeSet<OpId>> {
        self.dependencies.get(&id)
    }

    fn settled(&self, id: OpId) -> bool {
        self.dependencies.get(&id).is_some_and(BTreeSet::is_empty)
    }

    /// Operations that can be removed now, element by element.
    #[must_use]
    pub fn collectible(&self, matcher: &Matcher, scheme: &Scheme) -> Vec<OpId> {
        if matches!(scheme.kind, Kind::Register | Kind::Set) {
            return Vec::new();
        }
        let mut ids = Vec::new();
        for (_, group) in matcher.groups() {
            let complete = match group.producer {
                Some(_) => !group.consumers.is_empty(),
                None => !group.has_value(),
            };
            if complete && group.members().all(|id| self.settled(id)) {
                ids.extend(group.members());
            }
        }
        ids
    }

    /// Counts operations collected by the caller.
    pub fn record_collected(&mut self, count: usize) {
        self.collected += count;
    }

    /// Operations collected so far.
    #[must_use]
    pub const fn collected(&self) -> usize {
        self.collected
    }
}
