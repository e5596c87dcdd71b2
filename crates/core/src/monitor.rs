//! The event loop tying history, matcher, checker and remover together.
//!
//! A [`Monitor`] owns everything it checks and serializes the event stream:
//! each [`Event`] is applied to the history, then to the matcher, then
//! handed to the checker, and in incremental mode checked on the spot.
//! The [`Budget`] is only consulted between events.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use typed_builder::TypedBuilder;

use crate::checker::{Algorithm, CheckerBase, Context, HistoryChecker, Verdict};
use crate::error::Error;
use crate::history::{Event, History, OpId, SchemeReturns};
use crate::matcher::Matcher;
use crate::oracle::{Oracle, ReplayOracle};
use crate::remover::ObsoleteRemover;
use crate::scheme::{Scheme, SchemeRegistry};

/// Limits on a monitoring run. `None` means unlimited.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder)]
pub struct Budget {
    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,
    #[builder(default, setter(strip_option))]
    pub max_steps: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct MonitorConfig {
    /// Name of the scheme in the registry.
    #[builder(setter(into))]
    pub object: String,
    #[builder(default)]
    pub algorithm: Algorithm,
    #[builder(default = false)]
    pub completion: bool,
    #[builder(default = true)]
    pub incremental: bool,
    /// Collect settled elements; only honored with `incremental`.
    #[builder(default = false)]
    pub removal: bool,
    /// Epochs of the counting grid.
    #[builder(default = 8)]
    pub bound: usize,
    #[builder(default)]
    pub budget: Budget,
    #[builder(default, setter(into))]
    pub history_id: String,
}

/// Running minimum, maximum and mean of a sampled quantity.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub samples: usize,
}

impl Stats {
    pub fn sample(&mut self, value: usize) {
        if self.samples == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.samples += 1;
        #[allow(clippy::cast_precision_loss)]
        let (value, samples) = (value as f64, self.samples as f64);
        self.mean += (value - self.mean) / samples;
    }
}

/// Summary of a monitoring run.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub history_id: String,
    pub object: String,
    pub algorithm: Algorithm,
    pub completion: bool,
    pub incremental: bool,
    pub removal: bool,
    pub violation: bool,
    pub inconclusive: bool,
    pub timed_out: bool,
    pub stepped_out: bool,
    /// Events processed.
    pub steps: usize,
    pub checks: usize,
    /// Operations collected by the remover.
    pub collected: usize,
    pub size: Stats,
    pub width: Stats,
    pub weight: Stats,
    pub elapsed: Duration,
}

pub struct Monitor {
    config: MonitorConfig,
    scheme: Scheme,
    returns: SchemeReturns,
    history: History,
    matcher: Matcher,
    checker: Box<dyn HistoryChecker>,
    remover: Option<ObsoleteRemover>,
    in_flight: HashMap<u64, OpId>,
    steps: usize,
    size: Stats,
    width: Stats,
    weight: Stats,
    timed_out: bool,
    stepped_out: bool,
    started_at: Instant,
}

impl Monitor {
    /// Monitor deciding oracle queries with the [`ReplayOracle`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownObject`] if `config.object` is not registered.
    pub fn new(config: MonitorConfig, registry: &SchemeRegistry) -> Result<Self, Error> {
        Self::with_oracle(config, registry, Box::new(ReplayOracle::default()))
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownObject`] if `config.object` is not registered.
    pub fn with_oracle(
        config: MonitorConfig,
        registry: &SchemeRegistry,
        oracle: Box<dyn Oracle>,
    ) -> Result<Self, Error> {
        let scheme = registry.resolve(&config.object)?.clone();
        let base = CheckerBase::new(config.completion, config.incremental);
        let checker = config.algorithm.build(base, config.bound, oracle);
        let remover = (config.removal && config.incremental).then(ObsoleteRemover::new);
        tracing::debug!(
            object = %config.object,
            algorithm = %config.algorithm,
            completion = config.completion,
            incremental = config.incremental,
            removal = remover.is_some(),
            "monitor: created"
        );
        Ok(Self {
            returns: SchemeReturns::new(scheme.clone()),
            scheme,
            history: History::new(),
            matcher: Matcher::new(),
            checker,
            remover,
            in_flight: HashMap::new(),
            steps: 0,
            size: Stats::default(),
            width: Stats::default(),
            weight: Stats::default(),
            timed_out: false,
            stepped_out: false,
            started_at: Instant::now(),
            config,
        })
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub const fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[must_use]
    pub fn violation(&self) -> bool {
        self.checker.violation()
    }

    /// Applies one event. Returns the verdict of the check it triggered, if
    /// any.
    ///
    /// # Errors
    ///
    /// Fails on a malformed event stream ([`Error::DuplicateCall`],
    /// [`Error::UnknownCall`], [`Error::UnknownMethod`]) and on a remove
    /// that observed a value never added ([`Error::UnmatchedRemove`]).
    pub fn step(&mut self, event: Event) -> Result<Option<Verdict>, Error> {
        self.steps += 1;
        match event {
            Event::Call { id, method, args } => {
                if self.in_flight.contains_key(&id) {
                    return Err(Error::DuplicateCall(id));
                }
                self.scheme.resolve(&method)?;
                let op = self.history.start(method, args);
                self.in_flight.insert(id, op);
                let group = self.matcher.started(&self.history, &self.scheme, op)?;
                let mut ctx = Context::new(
                    &mut self.history,
                    &self.matcher,
                    &self.scheme,
                    &self.returns,
                );
                self.checker.started(&mut ctx, op, group);
            }
            Event::Return { id, rets } => {
                let op = self.in_flight.remove(&id).ok_or(Error::UnknownCall(id))?;
                self.history.complete(op, rets)?;
                let group = self.matcher.completed(&self.history, &self.scheme, op)?;
                let mut ctx = Context::new(
                    &mut self.history,
                    &self.matcher,
                    &self.scheme,
                    &self.returns,
                );
                self.checker.completed(&mut ctx, op, group);
                if let Some(remover) = &mut self.remover {
                    remover.completed(&self.history, op);
                }
            }
        }

        let verdict = if self.config.incremental {
            let verdict = self.check();
            if verdict != Verdict::Violation {
                self.collect()?;
            }
            Some(verdict)
        } else {
            None
        };
        self.sample();
        Ok(verdict)
    }

    /// Feeds events until the stream ends or the budget runs out, then
    /// finishes.
    ///
    /// # Errors
    ///
    /// Propagates the first error of [`step`](Self::step).
    pub fn run(mut self, events: impl IntoIterator<Item = Event>) -> Result<Report, Error> {
        for event in events {
            if self.exhausted() {
                break;
            }
            self.step(event)?;
        }
        Ok(self.finish())
    }

    /// Runs the deferred check of a non-incremental monitor and reports.
    #[must_use]
    pub fn finish(mut self) -> Report {
        if !self.config.incremental && !self.timed_out && !self.stepped_out {
            self.check();
        }
        let report = self.report();
        tracing::debug!(
            violation = report.violation,
            steps = report.steps,
            checks = report.checks,
            "monitor: finished"
        );
        report
    }

    #[must_use]
    pub fn report(&self) -> Report {
        let base = self.checker.base();
        Report {
            history_id: self.config.history_id.clone(),
            object: self.config.object.clone(),
            algorithm: self.config.algorithm,
            completion: self.config.completion,
            incremental: self.config.incremental,
            removal: self.remover.is_some(),
            violation: base.violation(),
            inconclusive: base.inconclusive(),
            timed_out: self.timed_out,
            stepped_out: self.stepped_out,
            steps: self.steps,
            checks: base.checks(),
            collected: self.remover.as_ref().map_or(0, ObsoleteRemover::collected),
            size: self.size,
            width: self.width,
            weight: self.weight,
            elapsed: self.started_at.elapsed(),
        }
    }

    fn exhausted(&mut self) -> bool {
        let budget = self.config.budget;
        if budget.max_steps.is_some_and(|max| self.steps >= max) {
            tracing::debug!(steps = self.steps, "monitor: step budget exhausted");
            self.stepped_out = true;
        }
        if budget
            .timeout
            .is_some_and(|timeout| self.started_at.elapsed() >= timeout)
        {
            tracing::debug!(steps = self.steps, "monitor: timed out");
            self.timed_out = true;
        }
        self.stepped_out || self.timed_out
    }

    fn check(&mut self) -> Verdict {
        let mut ctx = Context::new(
            &mut self.history,
            &self.matcher,
            &self.scheme,
            &self.returns,
        );
        self.checker.check(&mut ctx)
    }

    fn collect(&mut self) -> Result<(), Error> {
        let Some(remover) = &mut self.remover else {
            return Ok(());
        };
        let ids = remover.collectible(&self.matcher, &self.scheme);
        if ids.is_empty() {
            return Ok(());
        }
        tracing::trace!(collected = ids.len(), "monitor: collecting settled elements");
        for id in &ids {
            let mut ctx = Context::new(
                &mut self.history,
                &self.matcher,
                &self.scheme,
                &self.returns,
            );
            self.checker.removed(&mut ctx, *id);
        }
        for id in &ids {
            self.matcher.removed(*id);
            self.history.remove(*id)?;
            remover.removed(*id);
        }
        remover.record_collected(ids.len());
        Ok(())
    }

    fn sample(&mut self) {
        self.size.sample(self.history.len());
        self.width.sample(self.history.width());
        self.weight.sample(self.history.ext_edge_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Value;

    fn int(v: i64) -> Vec<Value> {
        vec![Value::Int(v)]
    }

    fn stack_events(second: i64) -> Vec<Event> {
        vec![
            Event::call(1, "push", int(1)),
            Event::ret(1, vec![]),
            Event::call(1, "push", int(2)),
            Event::ret(1, vec![]),
            Event::call(2, "pop", vec![]),
            Event::ret(2, int(2)),
            Event::call(2, "pop", vec![]),
            Event::ret(2, int(second)),
        ]
    }

    fn config(algorithm: Algorithm) -> MonitorConfig {
        MonitorConfig::builder()
            .object("stack")
            .algorithm(algorithm)
            .build()
    }

    #[test]
    fn test_stack_scenario_every_algorithm() {
        let registry = SchemeRegistry::standard();
        for algorithm in [
            Algorithm::Saturate,
            Algorithm::Counting,
            Algorithm::Enumerate,
            Algorithm::Symbolic,
        ] {
            let monitor = Monitor::new(config(algorithm), &registry).unwrap();
            let report = monitor.run(stack_events(1)).unwrap();
            assert!(!report.violation, "{algorithm}");

            let monitor = Monitor::new(config(algorithm), &registry).unwrap();
            let report = monitor.run(stack_events(2)).unwrap();
            assert!(report.violation, "{algorithm}");
            assert_eq!(report.steps, 8);
        }
    }

    #[test]
    fn test_malformed_streams() {
        let registry = SchemeRegistry::standard();
        let mut monitor = Monitor::new(config(Algorithm::Saturate), &registry).unwrap();
        monitor.step(Event::call(1, "push", int(1))).unwrap();
        assert_eq!(
            monitor.step(Event::call(1, "push", int(2))),
            Err(Error::DuplicateCall(1))
        );
        assert_eq!(
            monitor.step(Event::ret(7, vec![])),
            Err(Error::UnknownCall(7))
        );
        assert!(matches!(
            monitor.step(Event::call(2, "enqueue", int(1))),
            Err(Error::UnknownMethod { .. })
        ));

        let mut monitor = Monitor::new(config(Algorithm::Saturate), &registry).unwrap();
        monitor.step(Event::call(1, "pop", vec![])).unwrap();
        assert!(matches!(
            monitor.step(Event::ret(1, int(5))),
            Err(Error::UnmatchedRemove { .. })
        ));

        let unknown = MonitorConfig::builder().object("deque").build();
        assert_eq!(
            Monitor::new(unknown, &registry).err(),
            Some(Error::UnknownObject("deque".into()))
        );
    }

    #[test]
    fn test_non_incremental_checks_once() {
        let registry = SchemeRegistry::standard();
        let config = MonitorConfig::builder()
            .object("stack")
            .incremental(false)
            .build();
        let report = Monitor::new(config, &registry)
            .unwrap()
            .run(stack_events(2))
            .unwrap();
        assert!(report.violation);
        assert_eq!(report.checks, 1);
    }

    #[test]
    fn test_step_budget() {
        let registry = SchemeRegistry::standard();
        let config = MonitorConfig::builder()
            .object("stack")
            .incremental(false)
            .budget(Budget::builder().max_steps(3).build())
            .build();
        let report = Monitor::new(config, &registry)
            .unwrap()
            .run(stack_events(2))
            .unwrap();
        assert!(report.stepped_out);
        assert!(!report.timed_out);
        assert!(!report.violation);
        assert_eq!(report.steps, 3);
        assert_eq!(report.checks, 0);
    }

    #[test]
    fn test_removal_keeps_history_small() {
        let registry = SchemeRegistry::standard();
        let config = MonitorConfig::builder()
            .object("queue")
            .removal(true)
            .build();
        let mut events = Vec::new();
        for v in 0..50 {
            events.push(Event::call(1, "enqueue", int(v)));
            events.push(Event::ret(1, vec![]));
            events.push(Event::call(1, "dequeue", vec![]));
            events.push(Event::ret(1, int(v)));
        }
        let report = Monitor::new(config, &registry).unwrap().run(events).unwrap();
        assert!(!report.violation);
        assert!(report.removal);
        assert_eq!(report.collected, 100);
        assert!(report.size.max <= 2);
    }

    #[test]
    fn test_stats() {
        let mut stats = Stats::default();
        for v in [4, 2, 6] {
            stats.sample(v);
        }
        assert_eq!((stats.min, stats.max, stats.samples), (2, 6, 3));
        assert!((stats.mean - 4.0).abs() < 1e-9);
    }
}
