//! End-to-end client-gateway benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridwire_client::{Client, ConnectionConfig};
use gridwire_protocol::Value;
use gridwire_security::SecurityService;
use gridwire_server::{Server, ServerConfig};
use gridwire_store::MemoryCache;
use std::sync::Arc;
use tokio::runtime::Runtime;

struct TestSetup {
    _server_handle: tokio::task::JoinHandle<()>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    let cache = Arc::new(MemoryCache::new().with_region("bench"));

    // Find available port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server_config = ServerConfig::new(addr).with_idle_timeout(None);
    let server = Arc::new(Server::new(server_config, cache, SecurityService::Disabled));

    let server_clone = server.clone();
    let server_handle = rt.spawn(async move {
        let _ = server_clone.run().await;
    });

    // Give server time to start
    std::thread::sleep(std::time::Duration::from_millis(100));

    let client = Client::new(ConnectionConfig::new(addr).with_client_id("bench"));
    rt.block_on(async {
        client.connect().await.unwrap();
        client.put("bench", "warm", "up").await.unwrap();
    });

    TestSetup {
        _server_handle: server_handle,
        client,
    }
}

fn bench_get_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.get("bench", "warm").await.unwrap()) });
    });
    group.bench_function("miss", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.get("bench", "absent").await.unwrap()) });
    });

    group.finish();
}

fn bench_put_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_put");
    group.throughput(Throughput::Elements(1));

    let mut counter = 0i64;
    group.bench_function("put", |b| {
        b.iter(|| {
            counter += 1;
            rt.block_on(setup.client.put("bench", counter, "value")).unwrap();
        });
    });

    group.finish();
}

fn bench_put_all(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_put_all");

    for size in [10, 100, 1000] {
        let entries: Vec<(Value, Value)> = (0..size)
            .map(|i| (Value::from(format!("k{}", i)), Value::Long(i as i64)))
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.to_async(&rt).iter(|| async {
                let invalid = setup
                    .client
                    .put_all("bench", entries.clone())
                    .await
                    .unwrap();
                black_box(invalid)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_latency, bench_put_latency, bench_put_all);
criterion_main!(benches);
