//! Rulebook and literal parsing benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use missionfsm_core::{Literal, Rulebook};
use std::fmt::Write as _;

fn rulebook_text(len: usize) -> String {
    let mut text = String::from("# generated chain\n(");
    for i in 0..len {
        let _ = write!(text, "'S{}', ", i);
    }
    text.push_str(")\n");
    text.push_str("{'trigger': 'start', 'source': 'INIT', 'dest': 'S0'}\n");
    for i in 0..len {
        let dest = if i + 1 == len {
            "DONE".to_string()
        } else {
            format!("S{}", i + 1)
        };
        let _ = writeln!(
            text,
            "{{'trigger': 'next_{}', 'source': 'S{}', 'dest': '{}'}}",
            i, i, dest
        );
    }
    text.push_str("{'trigger': 'bail', 'source': '*', 'dest': 'ABORTED'}\n");
    text
}

fn bench_literal(c: &mut Criterion) {
    let mut group = c.benchmark_group("literal_parse");
    group.throughput(Throughput::Elements(1));

    let transition = "{'trigger': 'look', 'source': ['CHECK', 'SEARCH'], 'dest': 'SEARCH'}";
    group.bench_function("transition_record", |b| {
        b.iter(|| black_box(Literal::parse(black_box(transition)).unwrap()))
    });

    let nested = "(1, -2.5e3, True, None, 'it\\'s', [\"a\", ('b', {'c': 3})])";
    group.bench_function("nested", |b| {
        b.iter(|| black_box(Literal::parse(black_box(nested)).unwrap()))
    });

    group.finish();
}

fn bench_rulebook(c: &mut Criterion) {
    let mut group = c.benchmark_group("rulebook");

    for len in [10, 100, 1000] {
        let text = rulebook_text(len);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", len), &text, |b, text| {
            b.iter(|| black_box(Rulebook::parse_str(text).unwrap()))
        });

        let rulebook = Rulebook::parse_str(&text).unwrap();
        group.bench_with_input(BenchmarkId::new("render", len), &rulebook, |b, rulebook| {
            b.iter(|| black_box(rulebook.render()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_literal, bench_rulebook);
criterion_main!(benches);
