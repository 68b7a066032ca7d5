use criterion::{criterion_group, criterion_main, Criterion};
use quill::eval::eval_str;
use std::hint::black_box;

fn evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");

    group.bench_function("simple", |b| {
        b.iter(|| black_box(eval_str("1+2*3", false)))
    });

    group.bench_function("nested_parens", |b| {
        b.iter(|| black_box(eval_str("((1+2)*(3+4))**2 % 97", false)))
    });

    group.bench_function("long_chain", |b| {
        let expr = (0..100).map(|i| i.to_string()).collect::<Vec<_>>().join("+");
        b.iter(|| black_box(eval_str(&expr, false)))
    });

    group.finish();
}

criterion_group!(benches, evaluation);
criterion_main!(benches);
