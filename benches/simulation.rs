//! Criterion benchmarks for the simulation engine.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use std::collections::{BTreeMap, BTreeSet};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use pavlov::aggregate::{group_results, HistoryFilter};
use pavlov::prng::Prng;
use pavlov::runner::run_group_experiments;
use pavlov::{AdaptiveType, Group, GroupParams, Phase};

fn make_group(adaptive_type: AdaptiveType, stimuli: &[&str]) -> Group {
    let stimuli: BTreeSet<String> = stimuli.iter().map(|s| s.to_string()).collect();
    let params = GroupParams::default().with_adaptive_type(adaptive_type);
    Group::new("bench", &BTreeMap::new(), 0.1, &stimuli, params).unwrap()
}

/// Benchmark one deterministic phase under every rule.
fn bench_run_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_phase");
    let phase = Phase::parse("50A+/50AB+/50B-").unwrap();
    group.throughput(Throughput::Elements(phase.len() as u64));

    for adaptive_type in AdaptiveType::ALL {
        group.bench_function(adaptive_type.as_str(), |b| {
            b.iter(|| {
                let mut g = make_group(adaptive_type, &["A", "B"]);
                black_box(g.run_phase(&phase.elems, None).unwrap().len())
            });
        });
    }

    group.finish();
}

/// Benchmark randomized phases with a growing repetition count.
fn bench_randomized(c: &mut Criterion) {
    let mut group = c.benchmark_group("randomized");
    let phases = vec![Phase::parse("10A+/10AX-/rand").unwrap()];

    for num_trials in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*num_trials as u64));

        group.bench_with_input(
            BenchmarkId::new("dualV", num_trials),
            num_trials,
            |b, &num_trials| {
                let mut rng = Prng::new(42);
                b.iter(|| {
                    let mut g = make_group(AdaptiveType::DualV, &["A", "X"]);
                    let results = run_group_experiments(&mut g, &phases, num_trials, &mut rng).unwrap();
                    black_box(results.len())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark aggregation, whose key enumeration grows with the number of letters.
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for letters in ["AB", "ABCD", "ABCDEF"].iter() {
        group.bench_with_input(BenchmarkId::new("letters", letters.len()), letters, |b, letters| {
            let stimuli: Vec<String> = letters.chars().map(String::from).collect();
            let refs: Vec<&str> = stimuli.iter().map(String::as_str).collect();
            let mut g = make_group(AdaptiveType::Linear, &refs);
            let phases = vec![Phase::parse(&format!("20{letters}+")).unwrap()];
            let results = run_group_experiments(&mut g, &phases, 1, &mut Prng::new(1)).unwrap();

            b.iter(|| {
                let out = group_results(&results, "bench", &HistoryFilter::default()).unwrap();
                black_box(out[0].len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_run_phase, bench_randomized, bench_aggregate);

criterion_main!(benches);
