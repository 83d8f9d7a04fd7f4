use criterion::{black_box, criterion_group, criterion_main, Criterion};
use telemetry::{aggregate, AggregateOptions, EvaluationRecord};

fn long_record() -> EvaluationRecord {
    let checkpoints = 2000i64;
    EvaluationRecord {
        timesteps: (0..checkpoints).map(|i| i * 1000).collect(),
        results: (0..checkpoints)
            .map(|i| {
                (0..10)
                    .map(|j| f64::from((i as i32 * 31 + j * 7) % 500) - 100.0)
                    .collect()
            })
            .collect(),
    }
}

fn bench_aggregate(c: &mut Criterion) {
    let record = long_record();
    let options = AggregateOptions {
        max_points: 30,
        ..AggregateOptions::default()
    };
    c.bench_function("aggregate_2000_checkpoints", |b| {
        b.iter(|| aggregate(black_box(&record), black_box(&options)).unwrap());
    });
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
