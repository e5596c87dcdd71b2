use std::cell::Cell;
use std::collections::HashMap;
use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use linmon_core::oracle::{GroundFacts, OracleVerdict, ReplayOracle};
use linmon_core::{Event, History, Scheme, SchemeRegistry};
use linmon_sat::decide;
use linmon_testgen::generator::{generate_single_history, GenParams, ObjectKind};

fn history_of(events: &[Event]) -> History {
    let mut history = History::new();
    let mut in_flight = HashMap::new();
    for event in events {
        match event {
            Event::Call { id, method, args } => {
                in_flight.insert(*id, history.start(method.clone(), args.clone()));
            }
            Event::Return { id, rets } => {
                let op = in_flight.remove(id).expect("return of a call in flight");
                history.complete(op, rets.clone()).expect("pending operation");
            }
        }
    }
    history
}

fn run_replay(scheme: &Scheme, facts: &GroundFacts) -> OracleVerdict {
    ReplayOracle::default().solve(scheme, facts)
}

fn run_sat(scheme: &Scheme, facts: &GroundFacts) -> OracleVerdict {
    decide(scheme, facts)
}

fn sample_random_queries(kind: ObjectKind, target_count: usize) -> Vec<GroundFacts> {
    let scheme = SchemeRegistry::standard()
        .get(kind.object())
        .cloned()
        .expect("standard scheme");
    let mut queries = Vec::with_capacity(target_count);

    for seed in 0..target_count as u64 {
        let n_thread = 3 + seed % 3; // 3..=5 threads
        let params = GenParams::builder()
            .kind(kind)
            .n_thread(n_thread)
            .n_op(4)
            .corruption(0.1)
            .seed(seed)
            .build();
        let facts = GroundFacts::from_history(&history_of(&generate_single_history(&params)));

        assert_eq!(
            run_replay(&scheme, &facts),
            run_sat(&scheme, &facts),
            "SAT/replay disagreement while sampling {} benchmark input",
            kind.object(),
        );
        queries.push(facts);
    }

    queries
}

fn print_prebench_stats(kind: ObjectKind, scheme: &Scheme, queries: &[GroundFacts]) {
    let rounds = 8usize;
    let mut replay_total = Duration::ZERO;
    let mut sat_total = Duration::ZERO;

    for _ in 0..rounds {
        let replay_start = Instant::now();
        for facts in queries {
            black_box(run_replay(scheme, black_box(facts)));
        }
        replay_total += replay_start.elapsed();

        let sat_start = Instant::now();
        for facts in queries {
            black_box(run_sat(scheme, black_box(facts)));
        }
        sat_total += sat_start.elapsed();
    }

    let samples = u32::try_from(rounds * queries.len()).expect("sample count fits u32");
    let replay_avg = replay_total / samples;
    let sat_avg = sat_total / samples;
    let ratio = sat_avg.as_secs_f64() / replay_avg.as_secs_f64();

    eprintln!(
        "[replay_vs_sat:{}] prebench avg/replay={}ns avg/sat={}ns sat/replay={ratio:.3}",
        kind.object(),
        replay_avg.as_nanos(),
        sat_avg.as_nanos(),
    );
}

fn bench_kind(c: &mut Criterion, kind: ObjectKind) {
    let scheme = SchemeRegistry::standard()
        .get(kind.object())
        .cloned()
        .expect("standard scheme");
    let queries = sample_random_queries(kind, 12);
    print_prebench_stats(kind, &scheme, &queries);

    let mut group = c.benchmark_group(format!("replay_vs_sat_{}", kind.object()));
    group.sample_size(40);
    group.measurement_time(Duration::from_secs(8));

    let replay_idx = Cell::new(0usize);
    group.bench_function("replay_search", |b| {
        b.iter(|| {
            let i = replay_idx.get();
            replay_idx.set((i + 1) % queries.len());
            black_box(run_replay(&scheme, black_box(&queries[i])));
        });
    });

    let sat_idx = Cell::new(0usize);
    group.bench_function("sat_solver", |b| {
        b.iter(|| {
            let i = sat_idx.get();
            sat_idx.set((i + 1) % queries.len());
            black_box(run_sat(&scheme, black_box(&queries[i])));
        });
    });

    group.finish();
}

fn bench_replay_vs_sat(c: &mut Criterion) {
    for kind in ObjectKind::ALL {
        bench_kind(c, kind);
    }
}

criterion_group!(benches, bench_replay_vs_sat);
criterion_main!(benches);
