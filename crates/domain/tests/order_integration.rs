//! Integration tests for the Order aggregate.
//!
//! These tests drive orders through `OrderService` and `AggregateStore`
//! against the in-memory event store: persistence, replay from snapshots,
//! and optimistic concurrency.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    Aggregate, AggregateStore, CustomerId, DomainError, DomainEvent, Money, Order, OrderError,
    OrderEvent, OrderItem, OrderService, OrderState, ProductId, SnapshotPolicy, StoreConfig,
};
use event_store::{EventStore, ExpectedVersion, InMemoryEventStore, Version};

fn create_service() -> OrderService<InMemoryEventStore> {
    OrderService::new(InMemoryEventStore::new(), SnapshotPolicy::disabled())
}

fn widget(sku: &str, quantity: u32, cents: i64) -> OrderItem {
    OrderItem::new(sku, format!("Widget {sku}"), quantity, Money::from_cents(cents))
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn complete_order_lifecycle() {
        let service = create_service();
        let order_id = AggregateId::new();
        let customer_id = CustomerId::new();

        let order = service.create_order(order_id, customer_id).await.unwrap();
        assert_eq!(order.state(), OrderState::Draft);
        assert_eq!(order.version(), Version::first());

        service
            .add_item(order_id, widget("SKU-001", 2, 1000))
            .await
            .unwrap();
        let order = service
            .add_item(order_id, widget("SKU-002", 1, 500))
            .await
            .unwrap();
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.total_amount().cents(), 2500);
        assert_eq!(order.version(), Version::new(3));

        let order = service.submit_order(order_id).await.unwrap();
        assert!(order.is_submitted());
        assert_eq!(order.state(), OrderState::Draft);

        let order = service
            .mark_reserved(order_id, Some("RES-123".into()))
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::Reserved);

        let order = service
            .start_processing(order_id, Some("PAY-456".into()))
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::Processing);

        let order = service
            .complete_order(order_id, Some("TRACK-789".into()))
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::Completed);
        assert_eq!(order.version(), Version::new(7));
        assert!(order.is_terminal());
    }

    #[tokio::test]
    async fn cancel_from_each_open_state() {
        let service = create_service();

        // Draft
        let draft = AggregateId::new();
        service.create_order(draft, CustomerId::new()).await.unwrap();
        let order = service
            .cancel_order(draft, "changed my mind".into(), None)
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::Cancelled);

        // Reserved
        let reserved = AggregateId::new();
        service
            .create_order(reserved, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(reserved, widget("SKU-001", 1, 100))
            .await
            .unwrap();
        service.submit_order(reserved).await.unwrap();
        service.mark_reserved(reserved, None).await.unwrap();
        let order = service
            .cancel_order(reserved, "out of stock".into(), Some("inventory".into()))
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::Cancelled);

        // Processing
        let processing = AggregateId::new();
        service
            .create_order(processing, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(processing, widget("SKU-001", 1, 100))
            .await
            .unwrap();
        service.submit_order(processing).await.unwrap();
        service.mark_reserved(processing, None).await.unwrap();
        service.start_processing(processing, None).await.unwrap();
        let order = service
            .cancel_order(processing, "payment declined".into(), None)
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::Cancelled);
    }

    #[tokio::test]
    async fn item_changes_before_submit() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();

        service
            .add_item(order_id, widget("SKU-001", 2, 1000))
            .await
            .unwrap();
        service
            .add_item(order_id, widget("SKU-002", 1, 250))
            .await
            .unwrap();

        // Same product again bumps the quantity
        let order = service
            .add_item(order_id, widget("SKU-001", 1, 1000))
            .await
            .unwrap();
        assert_eq!(order.get_item(&"SKU-001".into()).unwrap().quantity, 3);
        assert_eq!(order.total_amount().cents(), 3250);

        let order = service
            .update_item_quantity(order_id, "SKU-002".into(), 4)
            .await
            .unwrap();
        assert_eq!(order.total_amount().cents(), 4000);

        let order = service
            .remove_item(order_id, ProductId::new("SKU-001"))
            .await
            .unwrap();
        assert_eq!(order.item_count(), 1);
        assert_eq!(order.total_amount().cents(), 1000);

        // Zero quantity removes the line
        let order = service
            .update_item_quantity(order_id, "SKU-002".into(), 0)
            .await
            .unwrap();
        assert!(!order.has_items());
        assert_eq!(order.total_amount(), Money::ZERO);
    }
}

mod business_rules {
    use super::*;

    #[tokio::test]
    async fn cannot_submit_empty_order() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();

        let result = service.submit_order(order_id).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NoItems))
        ));
    }

    #[tokio::test]
    async fn cannot_reserve_before_submit() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(order_id, widget("SKU-001", 1, 100))
            .await
            .unwrap();

        let result = service.mark_reserved(order_id, None).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotSubmitted))
        ));
    }

    #[tokio::test]
    async fn items_are_frozen_after_submit() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(order_id, widget("SKU-001", 1, 100))
            .await
            .unwrap();
        service.submit_order(order_id).await.unwrap();

        let result = service.add_item(order_id, widget("SKU-002", 1, 100)).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::AlreadySubmitted))
        ));

        let result = service.submit_order(order_id).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::AlreadySubmitted))
        ));
    }

    #[tokio::test]
    async fn completed_order_cannot_be_cancelled() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(order_id, widget("SKU-001", 1, 100))
            .await
            .unwrap();
        service.submit_order(order_id).await.unwrap();
        service.mark_reserved(order_id, None).await.unwrap();
        service.start_processing(order_id, None).await.unwrap();
        service.complete_order(order_id, None).await.unwrap();

        let result = service
            .cancel_order(order_id, "too late".into(), None)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(
                OrderError::InvalidStateTransition { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn invalid_item_rejected() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();

        let result = service.add_item(order_id, widget("SKU-001", 0, 100)).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidQuantity { quantity: 0 }))
        ));

        let result = service.add_item(order_id, widget("SKU-001", 1, 0)).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidPrice { price: 0 }))
        ));

        let result = service
            .remove_item(order_id, ProductId::new("SKU-404"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::ItemNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn commands_on_missing_order_are_not_found() {
        let service = create_service();

        let result = service.submit_order(AggregateId::new()).await;
        assert!(result.unwrap_err().is_not_found());
    }
}

mod persistence {
    use super::*;

    #[tokio::test]
    async fn loaded_order_matches_the_stored_one() {
        let events = InMemoryEventStore::new();
        let orders: AggregateStore<_, Order> = AggregateStore::new(
            events.clone(),
            Arc::new(OrderEvent::registry()),
            SnapshotPolicy::disabled(),
        );

        let order_id = AggregateId::new();
        let customer_id = CustomerId::new();
        let mut order = Order::create(order_id, customer_id).unwrap();
        order.add_item(widget("SKU-001", 2, 1000)).unwrap();
        order.add_item(widget("SKU-002", 3, 150)).unwrap();
        order.submit().unwrap();

        let version = orders.store(&mut order, None).await.unwrap();
        assert_eq!(version, Version::new(4));
        assert!(!order.has_uncommitted_events());
        assert_eq!(order.original_version(), Version::new(4));

        let loaded = orders.load(order_id).await.unwrap();
        assert_eq!(loaded.id(), order_id);
        assert_eq!(loaded.version(), Version::new(4));
        assert_eq!(loaded.customer_id(), Some(customer_id));
        assert_eq!(loaded.total_amount(), order.total_amount());
        assert_eq!(loaded.submitted_at(), order.submitted_at());
        assert_eq!(
            loaded.items().collect::<Vec<_>>(),
            order.items().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn stored_records_carry_event_type_and_versions() {
        let events = InMemoryEventStore::new();
        let service = OrderService::new(events.clone(), SnapshotPolicy::disabled());
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(order_id, widget("SKU-001", 1, 100))
            .await
            .unwrap();

        let stored = events.get_events_for_aggregate(order_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].event_type, "OrderCreated");
        assert_eq!(stored[1].event_type, "ItemAdded");
        assert_eq!(stored[0].aggregate_type, "Order");
        assert_eq!(stored[0].version, Version::new(1));
        assert_eq!(stored[1].version, Version::new(2));
        assert_eq!(stored[1].sequence_number(), 1);

        let decoded: OrderEvent = serde_json::from_value(stored[1].payload.clone()).unwrap();
        assert_eq!(decoded.event_type(), "ItemAdded");
    }

    #[tokio::test]
    async fn snapshots_bound_replay() {
        let events = InMemoryEventStore::new();
        let config = StoreConfig::from_lookup(|key| {
            (key == StoreConfig::SNAPSHOT_FREQUENCY).then(|| "3".to_string())
        })
        .unwrap();
        let service = OrderService::new(events.clone(), SnapshotPolicy::from_config(&config));

        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();
        for n in 1..=4 {
            service
                .add_item(order_id, widget(&format!("SKU-{n:03}"), 1, 100 * n))
                .await
                .unwrap();
        }

        // Versions 1..=5; a snapshot was taken at 3.
        let snapshot = events.get_snapshot(order_id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(3));

        events.reset_counters();
        let order = service.get_order(order_id).await.unwrap().unwrap();

        assert_eq!(events.events_read(), 2);
        assert_eq!(order.version(), Version::new(5));
        assert_eq!(order.item_count(), 4);
        assert_eq!(order.total_amount().cents(), 1000);
        assert_eq!(order.root().snapshot_version(), Version::new(3));
    }

    #[tokio::test]
    async fn snapshot_restored_order_keeps_working() {
        let events = InMemoryEventStore::new();
        let service = OrderService::new(events.clone(), SnapshotPolicy::every(2));

        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();
        service
            .add_item(order_id, widget("SKU-001", 2, 500))
            .await
            .unwrap();
        service.submit_order(order_id).await.unwrap();
        service.mark_reserved(order_id, None).await.unwrap();

        let order = service.start_processing(order_id, None).await.unwrap();
        assert_eq!(order.state(), OrderState::Processing);
        assert_eq!(order.version(), Version::new(5));
        assert!(order.is_submitted());
        assert_eq!(order.total_amount().cents(), 1000);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn stale_writer_gets_conflict() {
        let events = InMemoryEventStore::new();
        let orders: AggregateStore<_, Order> = AggregateStore::new(
            events.clone(),
            Arc::new(OrderEvent::registry()),
            SnapshotPolicy::disabled(),
        );

        let order_id = AggregateId::new();
        let mut order = Order::create(order_id, CustomerId::new()).unwrap();
        orders.store(&mut order, None).await.unwrap();

        let mut first = orders.load(order_id).await.unwrap();
        let mut second = orders.load(order_id).await.unwrap();

        first.add_item(widget("SKU-001", 1, 100)).unwrap();
        second.add_item(widget("SKU-002", 1, 100)).unwrap();

        orders.store(&mut first, None).await.unwrap();
        let err = orders.store(&mut second, None).await.unwrap_err();

        match err {
            DomainError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, ExpectedVersion::Exact(Version::new(1)));
                assert_eq!(actual, Version::new(2));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        // The losing writer's events stay buffered for a retry decision.
        assert!(second.has_uncommitted_events());

        let reloaded = orders.load(order_id).await.unwrap();
        assert_eq!(reloaded.version(), Version::new(2));
        assert!(reloaded.get_item(&"SKU-001".into()).is_some());
        assert!(reloaded.get_item(&"SKU-002".into()).is_none());
    }

    #[tokio::test]
    async fn reload_and_retry_succeeds() {
        let service = create_service();
        let order_id = AggregateId::new();
        service
            .create_order(order_id, CustomerId::new())
            .await
            .unwrap();

        let mut stale = service.orders().load(order_id).await.unwrap();
        service
            .add_item(order_id, widget("SKU-001", 1, 100))
            .await
            .unwrap();

        stale.add_item(widget("SKU-002", 1, 100)).unwrap();
        let err = service.orders().store(&mut stale, None).await.unwrap_err();
        assert!(err.is_conflict());

        let order = service
            .add_item(order_id, widget("SKU-002", 1, 100))
            .await
            .unwrap();
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.version(), Version::new(3));
    }

    #[tokio::test]
    async fn parallel_creates_admit_one() {
        let service = Arc::new(create_service());
        let order_id = AggregateId::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.create_order(order_id, CustomerId::new()).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }
}
