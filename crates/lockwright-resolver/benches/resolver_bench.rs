//! Benchmarks for the dependency resolver.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lockwright_resolver::{
    Artifact, CachingRepository, HashCollector, MemoryRepository, Requirement, ResolveRequest,
    Resolver, ResolverConfig, VersionSpecifiers,
};
use std::hint::black_box;
use std::sync::Arc;

/// Generate a layered registry: every package depends on up to `fan_out`
/// packages with a higher index, and has `versions` releases.
fn generate_registry(packages: usize, versions: usize, fan_out: usize) -> MemoryRepository {
    let repo = MemoryRepository::new();
    for i in 0..packages {
        let name = format!("package{i}");
        let deps: Vec<String> = (1..=fan_out)
            .map(|step| i + step * 3)
            .filter(|&j| j < packages)
            .map(|j| format!("package{j}>=1.0"))
            .collect();
        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
        for v in 0..versions {
            let version = format!("1.{v}.0");
            repo.add_release(&name, &version, &deps).unwrap();
            repo.add_artifact(
                &name,
                &version,
                Artifact::from_bytes(format!("{name}-{version}-py3-none-any.whl"), name.as_bytes()),
            )
            .unwrap();
        }
    }
    repo
}

fn roots() -> Vec<Requirement> {
    (0..3)
        .map(|i| Requirement::parse(&format!("package{i}>=1.0")).unwrap())
        .collect()
}

/// Benchmark specifier parsing.
fn bench_specifier_parsing(c: &mut Criterion) {
    let specifiers = [
        ">=1.0",
        ">=1.0,<2.0",
        "~=1.4.2",
        "==1.0.*",
        "!=1.5,>=1.0,<3",
        "===1.0+local",
        ">1.0a1,<=2.0.post3",
    ];

    c.bench_function("specifier_parse", |b| {
        b.iter(|| {
            for s in &specifiers {
                let _ = black_box(VersionSpecifiers::parse(s));
            }
        });
    });
}

/// Benchmark requirement merging.
fn bench_requirement_merge(c: &mut Criterion) {
    let left = Requirement::parse("pkg[a]>=1.0,<3.0").unwrap();
    let right = Requirement::parse("pkg[b]~=1.4").unwrap();

    c.bench_function("requirement_merge", |b| {
        b.iter(|| black_box(left.merge(&right)));
    });
}

/// Benchmark resolution with different graph sizes.
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for size in [10, 50, 100] {
        let resolver = Resolver::new(
            Arc::new(generate_registry(size, 5, 2)),
            ResolverConfig::default(),
        );
        let request = ResolveRequest::new(roots());

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("packages", size), &size, |b, _| {
            b.iter(|| black_box(resolver.resolve(&request)));
        });
    }

    group.finish();
}

/// Benchmark warm cache resolution.
fn bench_warm_resolution(c: &mut Criterion) {
    let repo = CachingRepository::new(generate_registry(100, 5, 2));
    let resolver = Resolver::new(Arc::new(repo), ResolverConfig::default());
    let request = ResolveRequest::new(roots());

    // Warm up the cache
    let _ = resolver.resolve(&request);

    c.bench_function("resolution_warm_100", |b| {
        b.iter(|| black_box(resolver.resolve(&request)));
    });
}

/// Benchmark parallel hash collection.
fn bench_hash_collection(c: &mut Criterion) {
    let repo = generate_registry(100, 3, 2);
    let resolved = Resolver::new(Arc::new(&repo), ResolverConfig::default())
        .resolve(&ResolveRequest::new(roots()))
        .unwrap();

    let mut group = c.benchmark_group("hashes");
    for workers in [1, 4] {
        let collector = HashCollector::new(&repo, workers);
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.iter(|| black_box(collector.collect(&resolved)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_specifier_parsing,
    bench_requirement_merge,
    bench_resolution,
    bench_warm_resolution,
    bench_hash_collection,
);
criterion_main!(benches);
