use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use miliki_infra::cache::TagCache;

fn org_tag(org: usize) -> String {
    format!("properties-{org}")
}

/// `orgs` organizations with `per_org` cached list reads each.
fn warm_cache(orgs: usize, per_org: usize) -> TagCache {
    let cache = TagCache::new(Duration::from_secs(300));
    for org in 0..orgs {
        for user in 0..per_org {
            cache.put(
                format!("list_properties|{user}|{org}|"),
                vec![org as u64; 16],
                vec![org_tag(org), format!("organizations-user-{user}")],
            );
        }
    }
    cache
}

fn bench_cache_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("tag_cache_get");
    for &orgs in &[10usize, 100, 1000] {
        let cache = warm_cache(orgs, 10);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("hit", orgs), &orgs, |b, &orgs| {
            let key = format!("list_properties|3|{}|", orgs / 2);
            b.iter(|| black_box(cache.get::<Vec<u64>>(black_box(&key))));
        });
        group.bench_with_input(BenchmarkId::new("miss", orgs), &orgs, |b, _| {
            b.iter(|| black_box(cache.get::<Vec<u64>>(black_box("list_units|0|0|"))));
        });
    }
    group.finish();
}

fn bench_invalidation(c: &mut Criterion) {
    let mut group = c.benchmark_group("tag_cache_invalidate");
    for &per_org in &[1usize, 10, 100] {
        group.throughput(Throughput::Elements(per_org as u64));
        group.bench_with_input(BenchmarkId::new("one_tag", per_org), &per_org, |b, &per_org| {
            b.iter_batched(
                || warm_cache(50, per_org),
                |cache| black_box(cache.invalidate(&[org_tag(25)])),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cache_hits, bench_invalidation);
criterion_main!(benches);
