//! Benchmarks for mutant enumeration and application.
//!
//! Run with: cargo bench
//! Run specific benchmark: cargo bench -- list_mutations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mutiny::config::RunConfig;
use mutiny::mutation::{list_mutations, mutate, MutationContext, Target};
use mutiny::parser;

/// A module of `functions` small functions mixing most mutation categories.
fn sample_module(functions: usize) -> String {
    let mut source = String::from("import math\n\nLIMIT = 10\n\n");
    for i in 0..functions {
        source.push_str(&format!(
            "@cached\n\
             def compute_{i}(values, factor=2.5):\n    \
                 total = 0\n    \
                 for v in values:\n        \
                     if v > LIMIT and not v % 2 == 0:\n            \
                         continue\n        \
                     total += v * factor - 1\n    \
                 label = f\"{{total}} items\"\n    \
                 return dict(total=max(total, 0), label=label, ok=True)\n\n\n"
        ));
    }
    source
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for functions in [10, 100] {
        let source = sample_module(functions);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &source, |b, source| {
            b.iter(|| parser::parse(black_box(source), "bench.py".as_ref()).unwrap());
        });
    }
    group.finish();
}

fn bench_list_mutations(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_mutations");
    for functions in [10, 100] {
        let source = sample_module(functions);
        group.throughput(Throughput::Elements(functions as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &source, |b, source| {
            b.iter(|| {
                let mut ctx = MutationContext::new(source.as_str(), Target::All, RunConfig::default())
                    .with_filename("bench.py");
                list_mutations(&mut ctx).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_apply_one(c: &mut Criterion) {
    let source = sample_module(100);
    let mut ctx = MutationContext::new(source.as_str(), Target::All, RunConfig::default());
    let addresses = list_mutations(&mut ctx).unwrap();
    let last = addresses.last().cloned().unwrap();

    c.bench_function("apply_last_mutant", |b| {
        b.iter(|| {
            let mut ctx =
                MutationContext::new(source.as_str(), Target::One(last.clone()), RunConfig::default());
            mutate(&mut ctx).unwrap()
        });
    });
}

criterion_group!(benches, bench_parse, bench_list_mutations, bench_apply_one);
criterion_main!(benches);
