//! Throughput Benchmark for lazykv
//!
//! Measures the store and the command parser in isolation.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lazykv::commands::CommandHandler;
use lazykv::protocol::{encode_command, CommandParser};
use lazykv::storage::{ExpiringStore, ManualClock};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark put operations
fn bench_put(c: &mut Criterion) {
    let store = ExpiringStore::new();

    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_no_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.put(format!("key:{}", i), "small_value", None);
            i += 1;
        });
    });

    group.bench_function("put_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.put(
                format!("ttl:{}", i),
                "small_value",
                Some(Duration::from_secs(60)),
            );
            i += 1;
        });
    });

    group.bench_function("put_large", |b| {
        let mut i = 0u64;
        let value = "x".repeat(64 * 1024);
        b.iter(|| {
            store.put(format!("large:{}", i % 1024), value.as_str(), None);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark get operations
fn bench_get(c: &mut Criterion) {
    let store = ExpiringStore::new();

    for i in 0..100_000 {
        store.put(format!("key:{}", i), format!("value:{}", i), None);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark reads that find expired entries
fn bench_lazy_expiry(c: &mut Criterion) {
    let clock = ManualClock::new(0);
    let store = ExpiringStore::with_clock(Arc::new(clock.clone()));

    c.bench_function("get_expired", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i);
            store.put(key.as_str(), "value", Some(Duration::from_millis(1)));
            clock.advance(Duration::from_millis(1));
            black_box(store.get(&key));
            i += 1;
        });
    });
}

/// Benchmark command parsing
fn bench_parse(c: &mut Criterion) {
    let parser = CommandParser::new();
    let set = encode_command(&["SET", "user:101", "Ariz", "px", "60000"]);
    let get = encode_command(&["GET", "user:101"]);

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse_set", |b| {
        b.iter(|| black_box(parser.parse(black_box(&set))));
    });

    group.bench_function("parse_get", |b| {
        b.iter(|| black_box(parser.parse(black_box(&get))));
    });

    group.finish();
}

/// Benchmark full command execution without the network
fn bench_execute(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(ExpiringStore::new()));
    let set: Vec<String> = ["SET", "key", "value"].iter().map(|s| s.to_string()).collect();
    let get: Vec<String> = ["GET", "key"].iter().map(|s| s.to_string()).collect();

    c.bench_function("execute_set_get", |b| {
        b.iter(|| {
            black_box(handler.execute(&set));
            black_box(handler.execute(&get));
        });
    });
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_lazy_expiry,
    bench_parse,
    bench_execute
);
criterion_main!(benches);
