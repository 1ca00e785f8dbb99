use bbc_weather::feed_parser::{FeedParser, SMALL_SAMPLE_FEED};
use bbc_weather::UnitSystem;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

pub fn parse_benchmark(c: &mut Criterion) {
    let parser = FeedParser::new();
    let mut group = c.benchmark_group("feed_parser");

    for units in [UnitSystem::Metric, UnitSystem::Imperial] {
        group.bench_function(units.as_str(), |b| {
            b.iter(|| parser.parse(black_box(SMALL_SAMPLE_FEED), units).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, parse_benchmark);
criterion_main!(benches);
