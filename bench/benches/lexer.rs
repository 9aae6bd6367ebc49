use bench::synthetic_program;
use criterion::{criterion_group, criterion_main, Criterion};
use kilo::lexer::Lexer;
use std::hint::black_box;

fn lexer(input: &str) {
    let mut i = 0;
    for token in Lexer::new(input) {
        if token.is_err() {
            break;
        }
        i += 1;
    }
    black_box(i);
}

fn criterion_benchmark(c: &mut Criterion) {
    let input = synthetic_program(500);
    c.bench_function("lexer", |b| b.iter(|| lexer(black_box(&input))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
