use criterion::{criterion_group, criterion_main, Criterion};
use footprint::record::{parse, parse_with, OddTokenPolicy};

fn output(n: usize) -> String {
    let mut out = String::new();
    for i in 0..n {
        out.push_str(&format!("order_{}\r\n,{}.{},", i, i * 7, i % 10));
    }
    out.push_str("total\r\n");
    out
}

pub fn bench_parse(c: &mut Criterion) {
    let raw = output(1000);
    c.bench_function("Parse", |b| b.iter(|| parse(&raw)));
    c.bench_function("ParseDrop", |b| {
        b.iter(|| parse_with(&raw, OddTokenPolicy::Drop))
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
