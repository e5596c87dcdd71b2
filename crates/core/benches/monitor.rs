use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use linmon_core::checker::Algorithm;
use linmon_core::{Event, Monitor, MonitorConfig, SchemeRegistry};
use linmon_testgen::generator::{generate_single_history, GenParams, ObjectKind};

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Saturate,
    Algorithm::Counting,
    Algorithm::Enumerate,
    Algorithm::Symbolic,
];

/// Build a correct stream with given dimensions.
/// threads: number of driver threads
/// `ops_per_thread`: operations each thread performs
fn build_events(kind: ObjectKind, threads: u64, ops_per_thread: u64) -> Vec<Event> {
    let params = GenParams::builder()
        .kind(kind)
        .n_thread(threads)
        .n_op(ops_per_thread)
        .seed(threads * 1000 + ops_per_thread)
        .build();
    generate_single_history(&params)
}

fn monitor(
    registry: &SchemeRegistry,
    kind: ObjectKind,
    algorithm: Algorithm,
    removal: bool,
    events: &[Event],
) -> bool {
    let config = MonitorConfig::builder()
        .object(kind.object())
        .algorithm(algorithm)
        .removal(removal)
        .build();
    Monitor::new(config, registry)
        .and_then(|monitor| monitor.run(events.iter().cloned()))
        .is_ok_and(|report| report.violation)
}

fn bench_algorithms(c: &mut Criterion) {
    let registry = SchemeRegistry::standard();

    for kind in [ObjectKind::Queue, ObjectKind::Stack, ObjectKind::Lock] {
        // Small: 2 threads, 4 ops each; medium: 3 threads, 6 ops each
        let small = build_events(kind, 2, 4);
        let medium = build_events(kind, 3, 6);

        for events in [&small, &medium] {
            assert!(
                !monitor(&registry, kind, Algorithm::Saturate, false, events),
                "benchmark stream generation must produce linearizable histories",
            );
        }

        let mut group = c.benchmark_group(format!("monitor_{}", kind.object()));
        for algorithm in ALGORITHMS {
            for (size, events) in [("small", &small), ("medium", &medium)] {
                group.bench_with_input(
                    BenchmarkId::new(algorithm.name(), size),
                    events,
                    |b, events| {
                        b.iter(|| {
                            black_box(monitor(
                                &registry,
                                kind,
                                black_box(algorithm),
                                false,
                                black_box(events),
                            ))
                        });
                    },
                );
            }
        }
        group.finish();
    }
}

fn bench_removal(c: &mut Criterion) {
    let registry = SchemeRegistry::standard();
    let events = build_events(ObjectKind::Queue, 4, 25);

    let mut group = c.benchmark_group("monitor_removal");
    group.sample_size(20);
    for removal in [false, true] {
        group.bench_function(if removal { "with_removal" } else { "without" }, |b| {
            b.iter(|| {
                black_box(monitor(
                    &registry,
                    ObjectKind::Queue,
                    Algorithm::Saturate,
                    black_box(removal),
                    &events,
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_removal);
criterion_main!(benches);
