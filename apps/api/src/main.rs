mod config;
mod curation;
mod db;
mod errors;
mod models;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ReportLocation};
use crate::curation::report::{FileReportSource, ReportSource, S3ReportSource};
use crate::curation::scoring::ScoreModel;
use crate::curation::store::PgCurationStore;
use crate::curation::tracker::SessionTrackers;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Curator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Similarity report source
    let reports = build_report_source(&config.report).await;
    info!("Similarity report source: {}", reports.describe());

    let score_model = ScoreModel::new(config.recency_half_life_days);
    info!(
        "Score model: weights total {:.2}, recency half-life {} days",
        score_model.weights.total(),
        score_model.recency_half_life_days
    );

    // Build app state
    let state = AppState {
        store: Arc::new(PgCurationStore::new(db)),
        reports,
        trackers: SessionTrackers::new(),
        score_model: Arc::new(score_model),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the curation UI origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_report_source(location: &ReportLocation) -> Arc<dyn ReportSource> {
    match location {
        ReportLocation::File(path) => Arc::new(FileReportSource::new(path.clone())),
        ReportLocation::S3 {
            bucket,
            key,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            let client = build_s3_client(endpoint, access_key_id, secret_access_key).await;
            Arc::new(S3ReportSource::new(client, bucket.clone(), key.clone()))
        }
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(
    endpoint: &str,
    access_key_id: &str,
    secret_access_key: &str,
) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        "curator-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
