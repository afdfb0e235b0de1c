use job_fanout::{
    config::AppConfig,
    db,
    services::{
        processor::ItemProcessor,
        queue::RedisQueue,
        worker::{Worker, WorkerOptions},
    },
    shutdown, telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    tracing::info!("Starting item worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    let metrics_addr: SocketAddr = config
        .worker_metrics_addr
        .parse()
        .expect("Invalid WORKER_METRICS_ADDR");
    telemetry::install_metrics_exporter(metrics_addr).expect("Failed to install Prometheus exporter");
    tracing::info!(addr = %metrics_addr, "Worker metrics exposed");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    let store = Arc::new(db::PgStore::new(db_pool));

    tracing::info!(queue = %config.queue_name, "Connecting to Redis work queue");
    let queue = RedisQueue::new(&config.redis_url, &config.queue_name, config.max_receive_count)
        .expect("Failed to initialize work queue");

    let options = WorkerOptions {
        batch_size: config.worker_batch_size,
        poll_interval: config.poll_interval(),
        cache_capacity: config.idempotency_cache_capacity,
        cache_ttl: config.idempotency_cache_ttl(),
    };

    let worker = Worker::new(
        store.clone(),
        store,
        Arc::new(queue),
        ItemProcessor::default(),
        options,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown::signal().await;
        tracing::info!("Finishing current batch before exit");
        let _ = shutdown_tx.send(true);
    });

    tracing::info!("Worker ready, starting processing loop");
    worker.run(shutdown_rx).await;
}
