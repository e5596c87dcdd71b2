//! Runtime linearizability monitoring for concurrent objects.
//!
//! `linmon_core` decides whether a recorded history of concurrent calls and
//! returns is *linearizable*: whether some total order of its operations,
//! consistent with real time, is a legal sequential run of the object. The
//! objects it understands are described by a [`Scheme`]:
//!
//! - **queue** -- `enqueue(v)` / `dequeue() => v`, first in first out.
//! - **stack** -- `push(v)` / `pop() => v`, last in first out.
//! - **bag** -- `add(v)` / `remove() => v`, any order.
//! - **lock** -- `lock(t)` / `unlock(t)`, mutual exclusion.
//! - **register** -- `write(v)` / `read() => v`.
//! - **semaphore** -- `acquire(t)` / `release(t)`, at most `permits` holders.
//! - **set** -- `add(v)`, `remove(v)`, `contains(v)`, each returning a boolean.
//!
//! A remove that found nothing returns [`Value::Empty`].
//!
//! # Algorithms
//!
//! Four checkers implement [`HistoryChecker`]. The saturation checker infers
//! ordering facts from per-object rules until a fixed point or a cycle; it is
//! fast and sound but incomplete. The counting, enumeration and symbolic
//! checkers hand ground facts to a decision [`Oracle`]; the crate ships the
//! [`ReplayOracle`], which searches for a legal order against a sequential
//! model of the object.
//!
//! # Entry point
//!
//! A [`Monitor`] consumes the event stream produced by a test driver:
//!
//! ```rust
//! use linmon_core::{Event, Monitor, MonitorConfig, SchemeRegistry, Value};
//!
//! let registry = SchemeRegistry::standard();
//! let config = MonitorConfig::builder().object("stack").build();
//! let events = [
//!     Event::call(1, "push", vec![Value::Int(1)]),
//!     Event::call(2, "push", vec![Value::Int(2)]),
//!     Event::ret(1, vec![]),
//!     Event::ret(2, vec![]),
//!     Event::call(1, "pop", vec![]),
//!     Event::ret(1, vec![Value::Int(1)]),
//! ];
//! let report = Monitor::new(config, &registry)?.run(events)?;
//! assert!(!report.violation);
//! # Ok::<(), linmon_core::Error>(())
//! ```
//!
//! # Crate features
//!
//! - **`std`** (default) -- the [`Monitor`] event loop and its wall-clock
//!   budget.
//! - **`serde`** -- `Serialize`/`Deserialize` derives on values, events,
//!   verdicts and reports.
//!
//! Without `std` the crate is `no_std` compatible (requires `alloc`).

#![cfg_attr(not(any(test, feature = "std")), no_std)]
extern crate alloc;

pub mod checker;
pub mod error;
pub mod graph;
pub mod history;
pub mod matcher;
#[cfg(feature = "std")]
pub mod monitor;
pub mod oracle;
pub mod remover;
pub mod scheme;

pub use checker::{Algorithm, HistoryChecker, Verdict};
pub use error::Error;
pub use history::{Event, History, OpId, Operation, Value};
pub use matcher::Matcher;
#[cfg(feature = "std")]
pub use monitor::{Budget, Monitor, MonitorConfig, Report};
pub use oracle::{GroundFacts, Oracle, OracleVerdict, ReplayOracle};
pub use remover::ObsoleteRemover;
pub use scheme::{Scheme, SchemeRegistry};
