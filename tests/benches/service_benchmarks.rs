//! # Sirio Service Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Bus | sync dispatch over N listeners |
//! | Locks | uncontended lock + unlock, sorted batch lock |
//! | Auth | TTL cache hit, bearer token sign / verify |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sirio_bus::{listener_fn, BusConfig, BusContext, MessageBus, Originator};
use sirio_lock::{LockService, ResourceLockApi};
use sirio_token_auth::domain::cache::TtlCache;
use sirio_token_auth::{BearerClaims, Keystore};
use std::time::Duration;
use tokio::runtime::Runtime;

// ============================================================================
// BUS
// ============================================================================

fn bench_sync_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-sync-dispatch");

    for listeners in [1, 8, 32] {
        let bus = MessageBus::new(BusConfig::for_testing());
        for i in 0..listeners {
            bus.register_sync_listener(format!("listener-{i:02}"), listener_fn(|_, _, _| Ok(1)));
        }
        let context = BusContext::new().with("sessionID", "s-1");
        let originator = Originator::none();

        group.throughput(Throughput::Elements(listeners as u64));
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, _| b.iter(|| black_box(bus.send_message_sync(42, &originator, &context))),
        );
    }

    group.finish();
}

// ============================================================================
// LOCKS
// ============================================================================

fn bench_lock_unlock(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let service = LockService::new();
    service.create_resource("invoice", 1, false).expect("create");
    service.create_resource("order", 1, false).expect("create");

    let mut group = c.benchmark_group("lock-service");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("lock_unlock_single", |b| {
        b.iter(|| {
            runtime.block_on(async {
                service.lock_resource("invoice", 1, 7).await.expect("lock");
            });
            service.unlock_resource("invoice", 1, 7).expect("unlock");
        })
    });

    for size in [10_i64, 100] {
        let ids: Vec<i64> = (0..size).rev().collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("lock_unlock_batch", size), &ids, |b, ids| {
            b.iter(|| {
                runtime.block_on(async {
                    service.lock_resources("order", ids, 7).await.expect("lock");
                });
                service.unlock_resources("order", ids, 7).expect("unlock");
            })
        });
    }

    group.finish();
}

// ============================================================================
// TOKEN AUTH
// ============================================================================

fn bench_ttl_cache(c: &mut Criterion) {
    let mut cache: TtlCache<String, u64> = TtlCache::new(60_000);
    for i in 0..10_000_u64 {
        cache.insert(format!("client-{i}"), i, 0);
    }

    c.bench_function("ttl-cache/get_hit_10k", |b| {
        b.iter(|| black_box(cache.get("client-5000", 1_000)))
    });
}

fn bench_bearer_tokens(c: &mut Criterion) {
    let keystore = Keystore::generate();
    let verifying = keystore.verifying_key();
    let claims = BearerClaims {
        idclient: "c1".into(),
        user: "mario".into(),
        address: "10.0.0.1".into(),
        time: 1_700_000_000_000,
    };
    let token = claims.encode(keystore.signing_key()).expect("encode");

    let mut group = c.benchmark_group("bearer-token");
    group.bench_function("sign", |b| {
        b.iter(|| black_box(claims.encode(keystore.signing_key())))
    });
    group.bench_function("verify", |b| {
        b.iter(|| black_box(BearerClaims::decode(&token, &verifying)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_sync_dispatch,
    bench_lock_unlock,
    bench_ttl_cache,
    bench_bearer_tokens,
);

criterion_main!(benches);
