//! Projector entry point.

use std::process::ExitCode;

use domain::{OrderService, SnapshotPolicy};
use event_store::{
    InMemoryCheckpointStore, InMemoryEventStore, PostgresCheckpointStore, PostgresEventStore,
};
use projector::{Config, OrderViews, Result, run_projector, seed_orders, telemetry};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run(config: Config) -> Result<()> {
    telemetry::init_metrics(config.metrics_addr)?;

    let views = OrderViews::new();
    let policy = SnapshotPolicy::from_config(&config.store);

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let store = PostgresEventStore::new(pool.clone());
            store.run_migrations().await?;
            tracing::info!("using postgres event store");

            if config.seed_orders > 0 {
                tracing::warn!("SEED_ORDERS is ignored with a database");
            }

            let checkpoints = PostgresCheckpointStore::new(pool);
            run_projector(&config, store, checkpoints, &views, shutdown_signal()).await
        }
        None => {
            let store = InMemoryEventStore::new();
            tracing::info!("using in-memory event store");

            let service = OrderService::new(store.clone(), policy);
            seed_orders(&service, config.seed_orders).await?;

            let checkpoints = InMemoryCheckpointStore::new();
            run_projector(&config, store, checkpoints, &views, shutdown_signal()).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init_tracing(&config) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        subscription_id = %config.subscription_id,
        batch_size = config.batch_size,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        snapshot_frequency = config.store.snapshot_frequency,
        "starting projector"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!("projector shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "projector failed");
            ExitCode::FAILURE
        }
    }
}
