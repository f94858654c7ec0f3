use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status plus the active model and extraction settings.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "syllabus-api",
        "model": state.config.ollama_model,
        "extraction_strategy": state.extractor.strategy().name(),
        "estimation_policy": state.extractor.estimator().name()
    }))
}
