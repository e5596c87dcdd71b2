#![allow(dead_code)]

/// DSL macros for building driver event streams.
///
/// Produces `Vec<linmon_core::Event>`.
///
/// # Syntax
///
/// ```ignore
/// history! {
///     call(1, push, 1),       // driver call 1: push(1)
///     call(2, pop),           // driver call 2: pop()
///     ret(1),                 // call 1 returns nothing
///     ret(2, 1),              // call 2 returns 1
///     call(3, pop), ret(3, empty),
/// }
/// ```
///
/// - `call(id, method, args..)` → `Event::call(id, "method", args)`
/// - `ret(id, values..)`        → `Event::ret(id, values)`
/// - `empty` / `true` / `false` / integer literal → `Value`
///
/// Build a single Value.
#[macro_export]
macro_rules! val {
    (empty) => {
        linmon_core::Value::Empty
    };
    (true) => {
        linmon_core::Value::Bool(true)
    };
    (false) => {
        linmon_core::Value::Bool(false)
    };
    ($v:literal) => {
        linmon_core::Value::Int($v)
    };
}

/// Build a single Event.
#[macro_export]
macro_rules! event {
    (call($id:literal, $method:ident $(, $arg:tt)*)) => {
        linmon_core::Event::call($id, stringify!($method), vec![$($crate::val!($arg)),*])
    };
    (ret($id:literal $(, $value:tt)*)) => {
        linmon_core::Event::ret($id, vec![$($crate::val!($value)),*])
    };
}

/// Build an event stream.
#[macro_export]
macro_rules! history {
    ($($kind:ident($($args:tt)*)),* $(,)?) => {
        vec![$($crate::event!($kind($($args)*))),*]
    };
}

use std::collections::HashMap;

use linmon_core::checker::Algorithm;
use linmon_core::{Event, History, Monitor, MonitorConfig, Report, SchemeRegistry};

pub const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Saturate,
    Algorithm::Counting,
    Algorithm::Enumerate,
    Algorithm::Symbolic,
];

/// Monitors `events` on `object` with the default configuration.
pub fn monitor(object: &str, algorithm: Algorithm, events: &[Event]) -> Report {
    let config = MonitorConfig::builder()
        .object(object)
        .algorithm(algorithm)
        .build();
    run(config, events)
}

pub fn run(config: MonitorConfig, events: &[Event]) -> Report {
    Monitor::new(config, &SchemeRegistry::standard())
        .unwrap()
        .run(events.iter().cloned())
        .unwrap()
}

/// Replays a driver event stream into a history.
pub fn history_of(events: &[Event]) -> History {
    let mut history = History::new();
    let mut in_flight = HashMap::new();
    for event in events {
        match event {
            Event::Call { id, method, args } => {
                in_flight.insert(*id, history.start(method.clone(), args.clone()));
            }
            Event::Return { id, rets } => {
                let op = in_flight.remove(id).unwrap();
                history.complete(op, rets.clone()).unwrap();
            }
        }
    }
    history
}
