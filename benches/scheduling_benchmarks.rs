use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use tactus::conductor::{Conductor, ConductorConfig};
use tactus::distribution::{CurveDistribution, Distribution, EuclideanDistribution, EvenDistribution, euclidean::bjorklund};
use tactus::markov::MarkovChain;
use tactus::pattern::{Pattern, PulsePattern};
use tokio::time::Instant;

/// One phrase of firing decisions per law (runs on every tick of every pattern)
fn bench_should_fire(c: &mut Criterion) {
    let mut group = c.benchmark_group("should_fire");
    let phrase_length = 16;

    let laws: Vec<(&str, Box<dyn Distribution>)> = vec![
        ("even", Box::new(EvenDistribution::new(4, 1))),
        ("euclidean", Box::new(EuclideanDistribution::new(5, 16).unwrap())),
        ("accelerando", Box::new(CurveDistribution::accelerando(6, 16, 2.0).unwrap())),
        ("ritardando", Box::new(CurveDistribution::ritardando(6, 16, 2.0).unwrap())),
    ];

    for (name, law) in &laws {
        group.bench_with_input(BenchmarkId::from_parameter(name), &phrase_length, |b, &n| {
            b.iter(|| {
                for tick in 0..n {
                    black_box(law.should_fire(tick, n));
                }
            });
        });
    }
    group.finish();
}

/// Construction cost when a pattern swaps its distribution
fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");

    for steps in [8u32, 16, 64] {
        group.bench_with_input(BenchmarkId::new("bjorklund", steps), &steps, |b, &n| {
            b.iter(|| black_box(bjorklund(n * 3 / 8, n)));
        });
        group.bench_with_input(BenchmarkId::new("ritardando", steps), &steps, |b, &n| {
            b.iter(|| black_box(CurveDistribution::ritardando(n / 2, n, 3.0).unwrap()));
        });
    }
    group.finish();
}

fn bench_markov_next(c: &mut Criterion) {
    c.bench_function("markov_next", |b| {
        let mut chain = MarkovChain::seeded(42);
        for from in ["a", "b", "c", "d"] {
            for to in ["a", "b", "c", "d"] {
                chain.set_transition_probability(from, to, 0.25).unwrap();
            }
        }

        b.iter(|| {
            black_box(chain.next().unwrap());
        });
    });
}

/// A gated pulse pattern producing one tick
fn bench_pattern_production(c: &mut Criterion) {
    let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(125)).unwrap());
    let mut gate = MarkovChain::seeded(1);
    gate.set_transition_probability("playing", "playing", 0.8).unwrap();
    gate.set_transition_probability("playing", "silent", 0.2).unwrap();
    gate.set_transition_probability("silent", "playing", 1.0).unwrap();

    let mut pattern = PulsePattern::new(
        "hat",
        conductor.position(),
        Arc::new(EvenDistribution::new(1, 0)),
    )
    .with_param("midi_note", 42.0)
    .with_gate(gate);

    c.bench_function("pulse_pattern_tick", |b| {
        b.iter(|| {
            black_box(
                pattern
                    .produce_for_tick(Instant::now(), Duration::from_millis(125))
                    .unwrap(),
            );
        });
    });
}

criterion_group!(
    benches,
    bench_should_fire,
    bench_construction,
    bench_markov_next,
    bench_pattern_production
);
criterion_main!(benches);
