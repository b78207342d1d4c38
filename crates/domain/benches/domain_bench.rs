use std::sync::Arc;

use common::AggregateId;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{
    AggregateStore, CustomerId, Money, Order, OrderEvent, OrderItem, OrderService, SnapshotPolicy,
};
use event_store::InMemoryEventStore;

fn item(n: i64) -> OrderItem {
    OrderItem::new(
        format!("SKU-{n:03}"),
        format!("Product {n}"),
        1,
        Money::from_cents(100 * n),
    )
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service =
                    OrderService::new(InMemoryEventStore::new(), SnapshotPolicy::disabled());
                service
                    .create_order(AggregateId::new(), CustomerId::new())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_command_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/full_create_add_submit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service =
                    OrderService::new(InMemoryEventStore::new(), SnapshotPolicy::disabled());
                let order_id = AggregateId::new();
                service
                    .create_order(order_id, CustomerId::new())
                    .await
                    .unwrap();
                service.add_item(order_id, item(1)).await.unwrap();
                service.submit_order(order_id).await.unwrap();
            });
        });
    });
}

/// Load cost for a 1 + `items` event stream, with and without snapshots.
fn bench_load(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("domain/load");

    for items in [50i64, 200] {
        for (label, policy) in [
            ("replay", SnapshotPolicy::disabled()),
            ("snapshot_every_25", SnapshotPolicy::every(25)),
        ] {
            let orders: AggregateStore<_, Order> = AggregateStore::new(
                InMemoryEventStore::new(),
                Arc::new(OrderEvent::registry()),
                policy,
            );
            let order_id = AggregateId::new();

            rt.block_on(async {
                let mut order = Order::create(order_id, CustomerId::new()).unwrap();
                orders.store(&mut order, None).await.unwrap();
                for n in 1..=items {
                    order.add_item(item(n)).unwrap();
                    orders.store(&mut order, None).await.unwrap();
                }
            });

            group.bench_with_input(BenchmarkId::new(label, items + 1), &order_id, |b, id| {
                b.iter(|| {
                    rt.block_on(async {
                        orders.load(*id).await.unwrap();
                    });
                });
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_order,
    bench_full_command_cycle,
    bench_load,
);
criterion_main!(benches);
