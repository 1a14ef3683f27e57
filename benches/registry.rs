//! 站点登记表与结果构建基准测试
//!
//! 测试登记/释放的开销、并发争用下的表现以及结果记录的构建与序列化

use criterion::{criterion_group, criterion_main, Criterion};
use downtime_monitor::health::{PollResult, ProbeOutcome, SiteRegistry};
use downtime_monitor::store::{CsvSiteLoader, Site};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 登记表基准测试
fn registry_benchmark(c: &mut Criterion) {
    c.bench_function("registry_claim_release", |b| {
        let registry = SiteRegistry::new();
        b.iter(|| {
            let claimed = registry.try_claim(black_box(42));
            registry.release(42);
            black_box(claimed)
        });
    });

    c.bench_function("registry_raii_claim", |b| {
        let registry = Arc::new(SiteRegistry::new());
        b.iter(|| {
            let claim = registry.claim(black_box(7));
            black_box(claim.is_some())
        });
    });

    c.bench_function("registry_contended_claims", |b| {
        b.iter(|| {
            let registry = Arc::new(SiteRegistry::new());
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    thread::spawn(move || {
                        (0..256)
                            .filter(|id| registry.try_claim(*id))
                            .count()
                    })
                })
                .collect();
            let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
            black_box(total)
        });
    });
}

/// 结果构建基准测试
fn result_benchmark(c: &mut Criterion) {
    let site = Site::new(1, "example", "http://example.test/ok", 5);

    c.bench_function("poll_result_creation", |b| {
        b.iter(|| {
            let result = PollResult::from_outcome(
                black_box(&site),
                ProbeOutcome::ok(Duration::from_millis(120)),
            );
            black_box(result)
        });
    });

    c.bench_function("poll_result_serialization", |b| {
        let result = PollResult::from_outcome(
            &site,
            ProbeOutcome::unexpected_status(503, Duration::from_millis(80)),
        );
        b.iter(|| {
            let json = serde_json::to_string(black_box(&result)).unwrap();
            black_box(json)
        });
    });

    c.bench_function("csv_parse_100_sites", |b| {
        let content: String = (0..100)
            .map(|i| format!("site{i}.example.test,{}\n", i % 60 + 1))
            .collect();
        let loader = CsvSiteLoader::new();
        b.iter(|| black_box(loader.parse(black_box(&content)).unwrap()));
    });
}

criterion_group!(benches, registry_benchmark, result_benchmark);
criterion_main!(benches);
