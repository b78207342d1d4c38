//! Integration tests for the projector wiring.

use std::time::Duration;

use domain::{OrderEvent, OrderService, OrderState, SnapshotPolicy};
use event_store::{CheckpointStore, InMemoryCheckpointStore, InMemoryEventStore};
use projections::{Projection, ReadModel};
use projector::{Config, OrderViews, run_projector, seed_orders};

fn test_config() -> Config {
    Config {
        poll_interval: Duration::from_millis(5),
        batch_size: 4,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_seeded_orders_reach_the_views() {
    let store = InMemoryEventStore::new();
    let service = OrderService::new(store.clone(), SnapshotPolicy::every(5));
    let ids = seed_orders(&service, 4).await.unwrap();

    // 2 open orders x 3 events + 2 completed orders x 6 events
    assert_eq!(store.event_count().await, 18);

    let config = test_config();
    let checkpoints = InMemoryCheckpointStore::new();
    let views = OrderViews::new();

    run_projector(
        &config,
        store.clone(),
        checkpoints.clone(),
        &views,
        tokio::time::sleep(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    assert_eq!(views.current.count().await, 2);
    assert_eq!(views.history.count().await, 2);
    assert!(views.current.get_order(ids[0]).await.unwrap().submitted);
    assert_eq!(
        views.history.get_order(ids[1]).await.unwrap().state,
        OrderState::Completed
    );
    assert_eq!(checkpoints.load("order-views").await.unwrap(), 18);
}

#[tokio::test]
async fn test_restart_rebuilds_fresh_views_from_the_log() {
    let store = InMemoryEventStore::new();
    let service = OrderService::new(store.clone(), SnapshotPolicy::disabled());
    let checkpoints = InMemoryCheckpointStore::new();
    let config = test_config();

    let ids = seed_orders(&service, 1).await.unwrap();
    let views = OrderViews::new();
    run_projector(
        &config,
        store.clone(),
        checkpoints.clone(),
        &views,
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .unwrap();
    assert_eq!(checkpoints.load("order-views").await.unwrap(), 3);

    // Created before the restart, completed after it.
    service.mark_reserved(ids[0], None).await.unwrap();
    service.start_processing(ids[0], None).await.unwrap();
    service.complete_order(ids[0], None).await.unwrap();
    seed_orders(&service, 1).await.unwrap();

    let restarted = OrderViews::new();
    run_projector(
        &config,
        store.clone(),
        checkpoints.clone(),
        &restarted,
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    assert_eq!(restarted.current.count().await, 1);
    assert_eq!(restarted.history.count().await, 1);
    assert_eq!(
        restarted.history.get_order(ids[0]).await.unwrap().state,
        OrderState::Completed
    );
    assert_eq!(restarted.applied_position().await, 9);
    assert_eq!(checkpoints.load("order-views").await.unwrap(), 9);
}

#[tokio::test]
async fn test_running_views_resume_from_the_checkpoint() {
    let store = InMemoryEventStore::new();
    let service = OrderService::new(store.clone(), SnapshotPolicy::disabled());
    let checkpoints = InMemoryCheckpointStore::new();
    let config = test_config();
    let views = OrderViews::new();

    seed_orders(&service, 1).await.unwrap();
    run_projector(
        &config,
        store.clone(),
        checkpoints.clone(),
        &views,
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    seed_orders(&service, 1).await.unwrap();
    run_projector(
        &config,
        store.clone(),
        checkpoints.clone(),
        &views,
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    assert_eq!(views.current.count().await, 2);
    let position = Projection::<OrderEvent>::position(&views.current).await;
    assert_eq!(position.events_processed, 6);
    assert_eq!(checkpoints.load("order-views").await.unwrap(), 6);
}
