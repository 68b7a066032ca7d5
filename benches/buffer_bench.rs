use criterion::{criterion_group, criterion_main, Criterion};
use quill::gapbuf::{GapBuffer, ReplayKind};
use std::hint::black_box;

fn insert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("gapbuf_insert");

    group.bench_function("insert_str_64k", |b| {
        let chunk = "The quick brown fox jumps over the lazy dog.\n";
        b.iter(|| {
            let mut buf = GapBuffer::new();
            for _ in 0..(64 * 1024 / chunk.len()) {
                buf.insert_str(chunk).unwrap();
            }
            black_box(buf.len())
        })
    });

    group.bench_function("insert_at_front", |b| {
        b.iter(|| {
            let mut buf = GapBuffer::new();
            for _ in 0..2000 {
                buf.insert_ch(b'x').unwrap();
                buf.start_of_buffer();
            }
            black_box(buf.len())
        })
    });

    group.finish();
}

fn movement(c: &mut Criterion) {
    let mut group = c.benchmark_group("gapbuf_movement");

    let setup = || {
        let mut buf = GapBuffer::new();
        for i in 0..1000 {
            buf.insert_str(&format!("line number {i} with some text\n"))
                .unwrap();
        }
        buf
    };

    group.bench_function("cursor_sweep", |b| {
        let mut buf = setup();
        b.iter(|| {
            buf.start_of_buffer();
            buf.end_of_buffer();
            black_box(buf.cursor())
        })
    });

    group.bench_function("vertical_sweep", |b| {
        let mut buf = setup();
        b.iter(|| {
            buf.start_of_buffer();
            while buf.down_line() {}
            black_box(buf.row())
        })
    });

    group.finish();
}

fn undo_redo(c: &mut Criterion) {
    let mut group = c.benchmark_group("gapbuf_history");

    group.bench_function("undo_redo_500_groups", |b| {
        b.iter(|| {
            let mut buf = GapBuffer::new();
            for _ in 0..500 {
                buf.insert_str("word ").unwrap();
            }
            while buf.reverse(ReplayKind::Undo).unwrap()
                == quill::gapbuf::Replay::Applied
            {}
            while buf.reverse(ReplayKind::Redo).unwrap()
                == quill::gapbuf::Replay::Applied
            {}
            black_box(buf.len())
        })
    });

    group.finish();
}

criterion_group!(benches, insert_throughput, movement, undo_redo);
criterion_main!(benches);
