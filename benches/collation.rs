//! Collation micro-benchmarks: key comparison and mixed-population
//! sorting, the hot path under every cursor step.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trellis_core::collation::{collate, is_canonic_number};

fn mixed_keys(n: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..n)
        .map(|_| {
            if rng.gen_bool(0.5) {
                rng.gen_range(0..1_000_000).to_string()
            } else {
                let len = rng.gen_range(1..12);
                (0..len)
                    .map(|_| (b'A' + rng.gen_range(0..26)) as char)
                    .collect()
            }
        })
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let keys = mixed_keys(1024);
    c.bench_function("is_canonic_number/mixed", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(is_canonic_number(black_box(key)));
            }
        })
    });
}

fn bench_compare(c: &mut Criterion) {
    c.bench_function("collate/numeric_pair", |b| {
        b.iter(|| collate(black_box("104.2"), black_box("99")))
    });
    c.bench_function("collate/string_pair", |b| {
        b.iter(|| collate(black_box("ANDERSON"), black_box("ANDREWS")))
    });
    c.bench_function("collate/cross_pair", |b| {
        b.iter(|| collate(black_box("1040"), black_box("ANDERSON")))
    });
}

fn bench_sort(c: &mut Criterion) {
    let keys = mixed_keys(4096);
    c.bench_function("sort/mixed_4096", |b| {
        b.iter(|| {
            let mut keys = keys.clone();
            keys.sort_by(|a, b| collate(a, b));
            black_box(keys)
        })
    });
}

criterion_group!(benches, bench_classify, bench_compare, bench_sort);
criterion_main!(benches);
