use std::sync::Arc;

use crate::config::Config;
use crate::extraction::orchestrator::Extractor;
use crate::syllabus::store::SyllabusStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Syllabus and assignment persistence. PostgreSQL in production.
    pub store: Arc<dyn SyllabusStore>,
    /// The one extraction pipeline, built in `main` from configuration.
    pub extractor: Arc<Extractor>,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// In-memory store, scripted inference client, default tunables.
    pub fn for_tests(client: crate::llm_client::MockInferenceClient) -> Self {
        use crate::extraction::estimator::HeuristicEstimator;
        use crate::extraction::orchestrator::ExtractionStrategy;

        let config = Config {
            database_url: "postgres://localhost/syllabus_test".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "mock".to_string(),
            llm_timeout: std::time::Duration::from_secs(5),
            extraction_strategy: ExtractionStrategy::Chat,
            estimation_policy: HeuristicEstimator::current(),
            max_upload_bytes: 1024,
            port: 0,
            rust_log: "debug".to_string(),
        };
        let extractor = Extractor::new(
            Arc::new(client),
            config.extraction_strategy,
            Arc::new(config.estimation_policy),
        );
        AppState {
            store: Arc::new(crate::syllabus::store::MemoryStore::default()),
            extractor: Arc::new(extractor),
            config,
        }
    }
}
