use bbc_weather::cache::{create_cache_key, ForecastCache, InMemoryCache};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Mixed read/write load on the in-memory forecast cache
pub fn cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecast_cache");

    // Benchmark with different numbers of distinct feed paths
    for locations in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(locations),
            locations,
            |b, &locations| {
                b.iter(|| {
                    let cache = Arc::new(InMemoryCache::new());

                    // A serialized forecast is a few KB of JSON
                    let mut rng = thread_rng();
                    let data = Bytes::from((0..4096).map(|_| rng.gen::<u8>()).collect::<Vec<_>>());

                    let keys = (0..locations)
                        .map(|i| {
                            create_cache_key(
                                "bbc_weather",
                                &format!("/weather/feeds/en/{}/3dayforecast.rss", 2643743 + i),
                            )
                        })
                        .collect::<Vec<_>>();

                    let mut handles = vec![];
                    for _ in 0..4 {
                        let cache = Arc::clone(&cache);
                        let keys = keys.clone();
                        let data = data.clone();

                        let handle = thread::spawn(move || {
                            let mut rng = thread_rng();

                            for _ in 0..250 {
                                let key = keys.choose(&mut rng).unwrap();

                                if rng.gen_bool(0.1) {
                                    // 10% writes, one per cache miss in practice
                                    let _ = cache.put(key, data.clone(), Duration::from_secs(3600));
                                } else {
                                    let _ = cache.get(key);
                                }
                            }
                        });

                        handles.push(handle);
                    }

                    for handle in handles {
                        handle.join().unwrap();
                    }

                    black_box(cache.stats())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, cache_benchmark);
criterion_main!(benches);
