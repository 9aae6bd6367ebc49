use bench::synthetic_program;
use criterion::{criterion_group, criterion_main, Criterion};
use kilo::{parser::parse_program, Options};
use std::hint::black_box;

fn criterion_benchmark(c: &mut Criterion) {
    let input = synthetic_program(500);
    let options = Options::default();

    c.bench_function("parser", |b| {
        b.iter(|| {
            let program = parse_program(black_box(&input)).unwrap();
            black_box(program);
        })
    });

    let mut out = Vec::with_capacity(input.len() * 2);
    c.bench_function("compile", |b| {
        b.iter(|| {
            out.clear();
            kilo::compile(black_box(&input), &mut out, &options).unwrap();
            black_box(&out);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
