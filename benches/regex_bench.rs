use criterion::{criterion_group, criterion_main, Criterion};
use quill::regex::{regex_replace, regex_search, Regex};
use std::hint::black_box;

fn compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_compilation");

    group.bench_function("compile_literal", |b| {
        b.iter(|| black_box(Regex::compile(b"simple_literal", false)))
    });

    group.bench_function("compile_classes", |b| {
        b.iter(|| black_box(Regex::compile(b"[a-z]+[0-9][0-9]?", false)))
    });

    group.bench_function("compile_alternation", |b| {
        b.iter(|| black_box(Regex::compile(b"(alpha|beta|gamma)+$", true)))
    });

    group.finish();
}

fn execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_execution");

    let mut text = Vec::new();
    for i in 0..1000 {
        text.extend_from_slice(format!("entry {i} value=0x{i:04x}\n").as_bytes());
    }

    group.bench_function("search_class", |b| {
        b.iter(|| black_box(regex_search(&text, b"value=0x0[a-f]", true, false)))
    });

    group.bench_function("search_anchored", |b| {
        b.iter(|| black_box(regex_search(&text, b"^entry 999", true, true)))
    });

    group.bench_function("replace_all", |b| {
        b.iter(|| black_box(regex_replace(&text, b"value", b"v", false)))
    });

    group.finish();
}

criterion_group!(benches, compilation, execution);
criterion_main!(benches);
