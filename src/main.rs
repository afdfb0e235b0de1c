use axum::routing::get;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use job_fanout::app_state::AppState;
use job_fanout::config::AppConfig;
use job_fanout::services::{auth::TokenVerifier, queue::RedisQueue};
use job_fanout::{db, routes, shutdown, telemetry};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing job-fanout API server");

    let prometheus_handle =
        Arc::new(telemetry::install_metrics_recorder().expect("Failed to install Prometheus metrics recorder"));

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");
    let store = Arc::new(db::PgStore::new(db_pool));

    tracing::info!(queue = %config.queue_name, "Connecting to Redis work queue");
    let queue = RedisQueue::new(&config.redis_url, &config.queue_name, config.max_receive_count)
        .expect("Failed to initialize work queue");

    let state = AppState::new(
        store.clone(),
        store,
        Arc::new(queue),
        TokenVerifier::new(&config.jwt_secret),
    );

    let app = routes::router(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}
