//! The amber-relay daemon: scheduler ticker plus worker pool.
//!
//! Wires the in-process implementations (memory queue/ledger/stores, the
//! template generation backend, the tracing publisher). Real platform
//! clients, the NATS queue, and the Postgres ledger plug in through the
//! same traits.

use amber_relay_engine::{
    Coordinator, EngineConfig, EngineService, ExecutionLedger, JobQueue, MemoryContentStore,
    MemoryJobQueue, MemoryLedger, MemoryWorkflowRepository, NodeExecutor, WorkflowRepository,
};
use amber_relay_generate::TemplateBackend;
use amber_relay_publish::{StaticConnections, TracingPublisher};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env().expect("failed to load configuration");
    tracing::info!(
        tick_seconds = config.tick_seconds,
        worker_capacity = config.worker_capacity,
        "starting amber-relay daemon"
    );

    let workflows = Arc::new(MemoryWorkflowRepository::new());
    let ledger = Arc::new(MemoryLedger::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let connections = Arc::new(StaticConnections::new());

    let executor = Arc::new(
        NodeExecutor::new(
            Arc::new(TemplateBackend),
            Arc::new(amber_relay_engine::MemoryMediaStore::new()),
            Arc::new(TracingPublisher),
            connections,
        )
        .with_retry_policy(config.retry_policy()),
    );
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&workflows) as Arc<dyn WorkflowRepository>,
        Arc::clone(&ledger) as Arc<dyn ExecutionLedger>,
        Arc::clone(&queue) as Arc<dyn JobQueue>,
        Arc::new(MemoryContentStore::new()),
        executor,
        config.clone(),
    ));
    let service = Arc::new(EngineService::new(
        workflows,
        Arc::clone(&queue) as Arc<dyn JobQueue>,
        ledger,
        coordinator,
        &config,
    ));

    // Scheduler ticker: fires due schedules onto the queue.
    let ticker = {
        let service = Arc::clone(&service);
        let tick = Duration::from_secs(config.tick_seconds.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                match service.tick(chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(fired) => tracing::info!(fired, "scheduler tick"),
                    Err(error) => tracing::error!(%error, "scheduler tick failed"),
                }
            }
        })
    };

    // Worker loop: drains the queue.
    let worker = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            loop {
                match service.run_pending().await {
                    Ok(Some(_)) => {}
                    Ok(None) => tokio::time::sleep(Duration::from_millis(250)).await,
                    Err(error) => {
                        tracing::error!(%error, "job execution failed");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("shutting down");
    ticker.abort();
    worker.abort();
}
