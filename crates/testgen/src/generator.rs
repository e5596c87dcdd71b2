use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Duration, Local};
use linmon_core::scheme::DEFAULT_PERMITS;
use linmon_core::{Event, Value};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Object simulated by the generator; each kind has a scheme of the same
/// name in `SchemeRegistry::standard()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    Queue,
    Stack,
    Bag,
    Lock,
    Register,
    Semaphore,
    Set,
}

impl ObjectKind {
    pub const ALL: [Self; 7] = [
        Self::Queue,
        Self::Stack,
        Self::Bag,
        Self::Lock,
        Self::Register,
        Self::Semaphore,
        Self::Set,
    ];

    #[must_use]
    pub const fn object(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Stack => "stack",
            Self::Bag => "bag",
            Self::Lock => "lock",
            Self::Register => "register",
            Self::Semaphore => "semaphore",
            Self::Set => "set",
        }
    }

    /// Owners that may hold the object at once; only meaningful for locks
    /// and semaphores.
    const fn permits(self) -> usize {
        match self {
            Self::Semaphore => DEFAULT_PERMITS,
            _ => 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, TypedBuilder)]
pub struct GenParams {
    #[builder(default)]
    pub id: u64,
    #[builder(default)]
    pub kind: ObjectKind,
    pub n_thread: u64,
    /// Operations per thread. A lock or semaphore thread still holding it
    /// after its last operation releases it with one more.
    pub n_op: u64,
    /// Register writes and set operations draw from `1..=n_value`;
    /// collection values are always distinct.
    #[builder(default = 4)]
    pub n_value: i64,
    /// Probability of corrupting a return (or letting a lock or semaphore
    /// be acquired beyond its permits).
    #[builder(default = 0.0)]
    pub corruption: f64,
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GeneratedHistory {
    params: GenParams,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    events: Vec<Event>,
}

impl GeneratedHistory {
    #[must_use]
    pub const fn new(
        params: GenParams,
        info: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
        events: Vec<Event>,
    ) -> Self {
        Self {
            params,
            info,
            start,
            end,
            events,
        }
    }

    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.params.id
    }

    #[must_use]
    pub const fn get_events(&self) -> &Vec<Event> {
        &self.events
    }

    #[must_use]
    pub const fn get_params(&self) -> &GenParams {
        &self.params
    }

    /// Scheme name to monitor the history with.
    #[must_use]
    pub const fn object(&self) -> &'static str {
        self.params.kind.object()
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add(i64),
    Remove,
    Lock,
    Unlock,
    Write(i64),
    Read,
    Discard(i64),
    Contains(i64),
}

impl Action {
    fn method(self, kind: ObjectKind) -> &'static str {
        match (self, kind) {
            (Self::Add(_), ObjectKind::Queue) => "enqueue",
            (Self::Remove, ObjectKind::Queue) => "dequeue",
            (Self::Add(_), ObjectKind::Stack) => "push",
            (Self::Remove, ObjectKind::Stack) => "pop",
            (Self::Add(_), _) => "add",
            (Self::Remove | Self::Discard(_), _) => "remove",
            (Self::Lock, ObjectKind::Semaphore) => "acquire",
            (Self::Unlock, ObjectKind::Semaphore) => "release",
            (Self::Lock, _) => "lock",
            (Self::Unlock, _) => "unlock",
            (Self::Write(_), _) => "write",
            (Self::Read, _) => "read",
            (Self::Contains(_), _) => "contains",
        }
    }
}

enum Phase {
    Idle,
    Called(Action),
    Applied(Action, Vec<Value>),
}

struct Thread {
    id: u64,
    remaining: u64,
    holding: bool,
    phase: Phase,
}

impl Thread {
    const fn new(id: u64, n_op: u64) -> Self {
        Self {
            id,
            remaining: n_op,
            holding: false,
            phase: Phase::Idle,
        }
    }

    const fn finished(&self) -> bool {
        self.remaining == 0 && !self.holding && matches!(self.phase, Phase::Idle)
    }

    fn owner(&self) -> Value {
        Value::Int(i64::try_from(self.id).unwrap_or(i64::MAX))
    }
}

/// Sequential reference object plus the event log of the run.
struct Simulation<'a> {
    params: &'a GenParams,
    rng: StdRng,
    items: VecDeque<i64>,
    register: Value,
    members: BTreeSet<i64>,
    holders: Vec<u64>,
    produced: Vec<i64>,
    next_value: i64,
    events: Vec<Event>,
}

impl<'a> Simulation<'a> {
    fn new(params: &'a GenParams, rng: StdRng) -> Self {
        Self {
            params,
            rng,
            items: VecDeque::new(),
            register: Value::Empty,
            members: BTreeSet::new(),
            holders: Vec::new(),
            produced: Vec::new(),
            next_value: 1,
            events: Vec::new(),
        }
    }

    fn corrupt(&mut self) -> bool {
        let p = self.params.corruption;
        p > 0.0 && self.rng.random_bool(p.min(1.0))
    }

    fn choose(&mut self, thread: &Thread) -> Action {
        let coin = self.rng.random::<bool>();
        match self.params.kind {
            ObjectKind::Lock | ObjectKind::Semaphore if thread.holding => Action::Unlock,
            ObjectKind::Lock | ObjectKind::Semaphore => Action::Lock,
            ObjectKind::Register if coin => Action::Write(self.random_value()),
            ObjectKind::Register => Action::Read,
            ObjectKind::Set => {
                let value = self.random_value();
                match self.rng.random_range(0..3) {
                    0 => Action::Add(value),
                    1 => Action::Discard(value),
                    _ => Action::Contains(value),
                }
            }
            _ if coin => {
                let value = self.next_value;
                self.next_value += 1;
                Action::Add(value)
            }
            _ => Action::Remove,
        }
    }

    fn random_value(&mut self) -> i64 {
        self.rng.random_range(1..=self.params.n_value.max(1))
    }

    /// Performs the effect of `action`. `None` means the thread is blocked.
    fn apply(&mut self, thread: &mut Thread, action: Action) -> Option<Vec<Value>> {
        match action {
            Action::Add(value) if self.params.kind == ObjectKind::Set => {
                Some(vec![Value::Bool(self.members.insert(value))])
            }
            Action::Discard(value) => Some(vec![Value::Bool(self.members.remove(&value))]),
            Action::Contains(value) => Some(vec![Value::Bool(self.members.contains(&value))]),
            Action::Add(value) => {
                self.items.push_back(value);
                self.produced.push(value);
                Some(vec![])
            }
            Action::Remove => {
                let value = match self.params.kind {
                    ObjectKind::Queue => self.items.pop_front(),
                    ObjectKind::Bag if !self.items.is_empty() => {
                        let at = self.rng.random_range(0..self.items.len());
                        self.items.swap_remove_back(at)
                    }
                    _ => self.items.pop_back(),
                };
                Some(vec![value.map_or(Value::Empty, Value::Int)])
            }
            Action::Lock => {
                if self.holders.len() >= self.params.kind.permits() && !self.corrupt() {
                    return None;
                }
                self.holders.push(thread.id);
                thread.holding = true;
                Some(vec![])
            }
            Action::Unlock => {
                self.holders.retain(|holder| *holder != thread.id);
                thread.holding = false;
                Some(vec![])
            }
            Action::Write(value) => {
                self.register = Value::Int(value);
                self.produced.push(value);
                Some(vec![])
            }
            Action::Read => Some(vec![self.register.clone()]),
        }
    }

    /// Replaces an observed value by another one that was produced before,
    /// or by `Empty`. A boolean return is flipped instead.
    fn corrupted(&mut self, rets: Vec<Value>) -> Vec<Value> {
        if rets.len() != 1 {
            return rets;
        }
        if let Value::Bool(flag) = rets[0] {
            return if self.corrupt() {
                vec![Value::Bool(!flag)]
            } else {
                rets
            };
        }
        if self.produced.is_empty() || !self.corrupt() {
            return rets;
        }
        let other = Value::Int(self.produced[self.rng.random_range(0..self.produced.len())]);
        if rets[0] == other {
            vec![Value::Empty]
        } else {
            vec![other]
        }
    }

    /// Moves `thread` one phase forward: call, effect, return.
    fn advance(&mut self, thread: &mut Thread) -> bool {
        match std::mem::replace(&mut thread.phase, Phase::Idle) {
            Phase::Idle => {
                let action = self.choose(thread);
                thread.remaining = thread.remaining.saturating_sub(1);
                let args = match action {
                    Action::Add(value)
                    | Action::Write(value)
                    | Action::Discard(value)
                    | Action::Contains(value) => vec![Value::Int(value)],
                    Action::Lock | Action::Unlock => vec![thread.owner()],
                    Action::Remove | Action::Read => vec![],
                };
                self.events
                    .push(Event::call(thread.id, action.method(self.params.kind), args));
                thread.phase = Phase::Called(action);
                true
            }
            Phase::Called(action) => {
                if let Some(rets) = self.apply(thread, action) {
                    thread.phase = Phase::Applied(action, rets);
                    true
                } else {
                    thread.phase = Phase::Called(action);
                    false
                }
            }
            Phase::Applied(_, rets) => {
                let rets = self.corrupted(rets);
                self.events.push(Event::ret(thread.id, rets));
                true
            }
        }
    }
}

/// Generate a single history of `n_thread` threads, each running `n_op`
/// operations against the object of kind `kind`.
///
/// The interleaving is random: at each step one unfinished thread either
/// calls its next operation, performs the effect of its pending one, or
/// returns. Without corruption the history is therefore linearizable, with
/// each operation's effect as its linearization point. The thread index is
/// the driver id of its calls.
#[must_use]
pub fn generate_single_history(params: &GenParams) -> Vec<Event> {
    let seed = params.seed.unwrap_or_else(|| rand::rng().random());
    let mut simulation = Simulation::new(params, StdRng::seed_from_u64(seed));
    let mut threads: Vec<Thread> = (0..params.n_thread)
        .map(|id| Thread::new(id, params.n_op))
        .collect();

    loop {
        let live: Vec<usize> = threads
            .iter()
            .enumerate()
            .filter(|(_, thread)| !thread.finished())
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            break;
        }
        let offset = simulation.rng.random_range(0..live.len());
        let advanced = (0..live.len())
            .map(|k| live[(offset + k) % live.len()])
            .any(|i| simulation.advance(&mut threads[i]));
        if !advanced {
            break;
        }
    }
    simulation.events
}

#[must_use]
pub fn generate_mult_histories(n_hist: u64, params: &GenParams) -> Vec<GeneratedHistory> {
    (0..n_hist)
        .into_par_iter()
        .map(|i_hist| {
            let params = GenParams {
                id: params.id + i_hist,
                seed: params.seed.map(|seed| seed.wrapping_add(i_hist)),
                ..params.clone()
            };
            let start_time = Local::now();
            let events = generate_single_history(&params);
            let end_time = Local::now();
            GeneratedHistory::new(params, "generated".to_string(), start_time, end_time, events)
        })
        .collect()
}
