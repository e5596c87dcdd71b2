//! Sequential reference models, one per [`Kind`].
//!
//! A model replays operations one at a time and reports which states an
//! operation may lead to. Completed operations must reproduce their recorded
//! value; pending operations may either not have taken effect yet or take
//! any effect the object allows.

use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;

use super::{Kind, MethodSchema, Role, ValueSource};
use crate::history::types::{Operation, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    Queue(VecDeque<Value>),
    Stack(Vec<Value>),
    /// Kept sorted so equal contents hash equally.
    Bag(Vec<Value>),
    /// Current owner, if held.
    Lock(Option<Value>),
    Register(Value),
    /// Current holders, sorted.
    Semaphore { permits: usize, holders: Vec<Value> },
    /// Members, sorted.
    Set(Vec<Value>),
}

impl Model {
    #[must_use]
    pub const fn initial(kind: Kind) -> Self {
        match kind {
            Kind::Queue => Self::Queue(VecDeque::new()),
            Kind::Stack => Self::Stack(Vec::new()),
            Kind::Bag => Self::Bag(Vec::new()),
            Kind::Lock => Self::Lock(None),
            Kind::Register => Self::Register(Value::Empty),
            Kind::Semaphore { permits } => Self::Semaphore {
                permits,
                holders: Vec::new(),
            },
            Kind::Set => Self::Set(Vec::new()),
        }
    }

    /// States reachable by applying `op`.
    ///
    /// Empty when a completed operation cannot return what it recorded (or a
    /// lock cannot be acquired/released in this state).
    #[must_use]
    pub fn successors(&self, schema: &MethodSchema, op: &Operation) -> Vec<Self> {
        let outcomes = self.outcomes(schema, op);
        if op.is_pending() {
            let mut states: Vec<Self> = outcomes.into_iter().map(|(state, _)| state).collect();
            if !states.contains(self) {
                states.push(self.clone());
            }
            return states;
        }

        let recorded = match schema.value {
            ValueSource::Ret(_) => schema.value_of(op),
            // the value is an argument; a return, if any, is a status
            ValueSource::Arg(_) => op.rets.as_ref().and_then(|rets| rets.first().cloned()),
        };
        outcomes
            .into_iter()
            .filter(|(_, observed)| observed.is_none() || recorded.is_none() || *observed == recorded)
            .map(|(state, _)| state)
            .collect()
    }

    /// Every `(next state, observed value)` pair the object allows.
    fn outcomes(&self, schema: &MethodSchema, op: &Operation) -> Vec<(Self, Option<Value>)> {
        let arg = match schema.value {
            ValueSource::Arg(i) => op.args.get(i).cloned().unwrap_or(Value::Empty),
            ValueSource::Ret(_) => Value::Empty,
        };

        match (self, schema.role) {
            (Self::Queue(items), Role::Add) => {
                let mut next = items.clone();
                next.push_back(arg);
                vec![(Self::Queue(next), None)]
            }
            (Self::Queue(items), Role::Remove) => {
                let mut next = items.clone();
                let observed = next.pop_front().unwrap_or(Value::Empty);
                vec![(Self::Queue(next), Some(observed))]
            }
            (Self::Stack(items), Role::Add) => {
                let mut next = items.clone();
                next.push(arg);
                vec![(Self::Stack(next), None)]
            }
            (Self::Stack(items), Role::Remove) => {
                let mut next = items.clone();
                let observed = next.pop().unwrap_or(Value::Empty);
                vec![(Self::Stack(next), Some(observed))]
            }
            (Self::Bag(items), Role::Add) => {
                let mut next = items.clone();
                let at = next.partition_point(|v| *v < arg);
                next.insert(at, arg);
                vec![(Self::Bag(next), None)]
            }
            (Self::Bag(items), Role::Remove) => {
                if items.is_empty() {
                    return vec![(self.clone(), Some(Value::Empty))];
                }
                let mut outcomes: Vec<(Self, Option<Value>)> = Vec::new();
                for (i, value) in items.iter().enumerate() {
                    if i > 0 && items[i - 1] == *value {
                        continue;
                    }
                    let mut next = items.clone();
                    next.remove(i);
                    outcomes.push((Self::Bag(next), Some(value.clone())));
                }
                outcomes
            }
            (Self::Lock(None), Role::Add) => vec![(Self::Lock(Some(arg)), None)],
            (Self::Lock(Some(owner)), Role::Remove) if *owner == arg => {
                vec![(Self::Lock(None), None)]
            }
            (Self::Register(_), Role::Write) => vec![(Self::Register(arg), None)],
            (Self::Register(current), Role::Read) => {
                vec![(self.clone(), Some(current.clone()))]
            }
            (Self::Semaphore { permits, holders }, Role::Add) if holders.len() < *permits => {
                let mut next = holders.clone();
                let at = next.partition_point(|v| *v < arg);
                next.insert(at, arg);
                vec![(
                    Self::Semaphore {
                        permits: *permits,
                        holders: next,
                    },
                    None,
                )]
            }
            (Self::Semaphore { permits, holders }, Role::Remove) => {
                let Ok(at) = holders.binary_search(&arg) else {
                    return Vec::new();
                };
                let mut next = holders.clone();
                next.remove(at);
                vec![(
                    Self::Semaphore {
                        permits: *permits,
                        holders: next,
                    },
                    None,
                )]
            }
            (Self::Set(members), Role::Add) => match members.binary_search(&arg) {
                Ok(_) => vec![(self.clone(), Some(Value::Bool(false)))],
                Err(at) => {
                    let mut next = members.clone();
                    next.insert(at, arg);
                    vec![(Self::Set(next), Some(Value::Bool(true)))]
                }
            },
            (Self::Set(members), Role::Remove) => match members.binary_search(&arg) {
                Ok(at) => {
                    let mut next = members.clone();
                    next.remove(at);
                    vec![(Self::Set(next), Some(Value::Bool(true)))]
                }
                Err(_) => vec![(self.clone(), Some(Value::Bool(false)))],
            },
            (Self::Set(members), Role::Read) => {
                let present = members.binary_search(&arg).is_ok();
                vec![(self.clone(), Some(Value::Bool(present)))]
            }
            _ => Vec::new(),
        }
    }
}
