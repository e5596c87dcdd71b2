//! Enumeration of total orders consistent with a history's real-time order.

use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashSet;

use super::{History, OpId};

/// Lazy, finite iterator over the linear extensions of `before`.
///
/// Partial sequences are expanded breadth-first: each step takes a prefix
/// from the front of the queue and appends every remaining operation whose
/// real-time predecessors are all placed. Complete sequences are yielded as
/// soon as they are dequeued, so the iterator yields exactly one item per
/// linear extension. Calling [`History::linearizations`] again restarts the
/// enumeration.
#[derive(Debug)]
pub struct Linearizations<'a> {
    history: &'a History,
    queue: VecDeque<Vec<OpId>>,
}

impl<'a> Linearizations<'a> {
    pub(crate) fn new(history: &'a History) -> Self {
        Self {
            history,
            queue: VecDeque::from(vec![Vec::new()]),
        }
    }

    fn extensions(&self, prefix: &[OpId]) -> Vec<OpId> {
        let placed: HashSet<OpId> = prefix.iter().copied().collect();
        self.history
            .ids()
            .filter(|id| !placed.contains(id))
            .filter(|&id| self.history.predecessors(id).all(|p| placed.contains(&p)))
            .collect()
    }
}

impl Iterator for Linearizations<'_> {
    type Item = Vec<OpId>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(prefix) = self.queue.pop_front() {
            if prefix.len() == self.history.len() {
                return Some(prefix);
            }
            for id in self.extensions(&prefix) {
                let mut next = prefix.clone();
                next.push(id);
                self.queue.push_back(next);
            }
        }
        None
    }
}
