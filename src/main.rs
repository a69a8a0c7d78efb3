use std::sync::Arc;

use asset_ingest::{
    app_state::AppState,
    config::AppConfig,
    db::{self, job_store::JobStore, job_store::PgJobStore, resource_store::PgResourceStore},
    routes,
    services::{
        assets::HttpAssetServiceClient, generation::OpenAiImageClient, ingest::IngestService,
        media::ImageMediaProcessor, queue::IngestQueue, storage::R2Storage, worker::IngestWorker,
    },
};
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing asset-ingest server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "ingest_jobs_submitted_total",
        "Total ingest jobs accepted for processing"
    );
    metrics::describe_counter!(
        "ingest_jobs_processed_total",
        "Total ingest jobs driven to completion"
    );
    metrics::describe_counter!(
        "ingest_items_failed_total",
        "Total job items that ended Failed"
    );
    metrics::describe_histogram!(
        "ingest_job_duration_seconds",
        "Wall-clock time spent processing one ingest job"
    );
    metrics::describe_gauge!(
        "ingest_queue_depth",
        "Current number of work tokens waiting in the queue"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize R2 storage client
    tracing::info!("Initializing R2 storage client");
    let storage = R2Storage::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 storage");

    // Initialize external service clients
    let generation = OpenAiImageClient::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_image_model.clone(),
    );
    let assets = HttpAssetServiceClient::new(
        config.asset_service_url.clone(),
        config.asset_service_api_key.clone(),
    );

    let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(db_pool.clone()));
    let resources = Arc::new(PgResourceStore::new(db_pool.clone()));

    // Wire the work queue and spawn the single consumer
    let (queue, work_rx) = IngestQueue::new();
    let shutdown = CancellationToken::new();

    let worker = IngestWorker::new(
        Arc::clone(&jobs),
        Arc::new(generation),
        Arc::new(assets),
        Arc::new(storage),
        Arc::new(ImageMediaProcessor),
        resources,
    );
    let worker_handle = tokio::spawn(worker.run(work_rx, shutdown.clone()));

    let ingest = IngestService::new(Arc::clone(&jobs), queue.clone());
    let state = AppState::new(db_pool, jobs, ingest, queue);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/ingest", post(routes::ingest::submit_ingest))
        .route("/api/v1/jobs/{job_id}", get(routes::ingest::get_job))
        .route(
            "/api/v1/jobs/{job_id}/cancel",
            post(routes::ingest::cancel_job),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for shutdown signal");
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    // Stop the worker; a job in flight is abandoned at its next await point.
    shutdown.cancel();
    let _ = worker_handle.await;
}
