mod config;
mod db;
mod document;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod routes;
mod state;
mod syllabus;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::extraction::orchestrator::Extractor;
use crate::llm_client::{InferenceClient, OllamaClient};
use crate::routes::build_router;
use crate::state::AppState;
use crate::syllabus::store::PgSyllabusStore;

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

    info!("Starting Syllabus API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and run migrations
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgSyllabusStore::new(db));

    // Initialize inference client
    let client = OllamaClient::new(
        &config.ollama_base_url,
        &config.ollama_model,
        config.llm_timeout,
    )?;
    info!(
        "Inference client initialized (model: {}, base url: {})",
        client.model(),
        config.ollama_base_url
    );

    // One extractor for the whole process, shared by every request and background task
    let extractor = Extractor::new(
        Arc::new(client),
        config.extraction_strategy,
        Arc::new(config.estimation_policy),
    );
    info!(
        "Extraction strategy: {}, estimation policy: {}",
        config.extraction_strategy.name(),
        extractor.estimator().name()
    );

    let state = AppState {
        store,
        extractor: Arc::new(extractor),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
