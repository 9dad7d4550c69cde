use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quota_governor::{
    calculators::CalculatorSpec,
    models::{DefinitionUpdate, Entity, EntityKind, ResourceQuotaDefinition},
    services::resolver::QuotaResolver,
    storage::{MemoryQuotaStore, QuotaStore},
    utils::{format_storage, to_bytes},
};
use std::sync::Arc;
use uuid::Uuid;

fn bench_format_storage(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_storage");

    let cases = vec![("GB", 0.4), ("MB", 3.5), ("bytes", 1.0), ("TB", 12.0)];
    for (unit, amount) in cases {
        group.bench_with_input(
            BenchmarkId::new("format", format!("{} {}", amount, unit)),
            &(unit, amount),
            |b, (unit, amount)| b.iter(|| format_storage(black_box(unit), black_box(*amount))),
        );
    }

    group.finish();
}

fn bench_to_bytes(c: &mut Criterion) {
    c.bench_function("to_bytes_gb", |b| {
        b.iter(|| to_bytes(black_box("GB"), black_box(1.5)))
    });
}

fn bench_resolution(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(MemoryQuotaStore::new());
    let spec = CalculatorSpec {
        codename: "workspace_quota".to_string(),
        name: "Workspace storage".to_string(),
        description: String::new(),
        default: 1.0,
        units: "GB".to_string(),
        help: String::new(),
        applies_to: vec![EntityKind::User],
    };

    runtime.block_on(async {
        store
            .insert_definition(&ResourceQuotaDefinition::from_spec(&spec, EntityKind::User))
            .await
            .unwrap();
    });

    let resolver = QuotaResolver::new(store.clone());
    let entity = Entity::user(Uuid::new_v4());

    let mut group = c.benchmark_group("resolve");
    group.bench_function("imposed_default", |b| {
        b.iter(|| {
            runtime
                .block_on(resolver.resolve(black_box(&entity), "user_workspace_quota"))
                .unwrap()
        })
    });

    runtime.block_on(async {
        store
            .update_definition(
                "user_workspace_quota",
                &DefinitionUpdate {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    });
    group.bench_function("inactive", |b| {
        b.iter(|| {
            runtime
                .block_on(resolver.resolve(black_box(&entity), "user_workspace_quota"))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_format_storage, bench_to_bytes, bench_resolution);
criterion_main!(benches);
