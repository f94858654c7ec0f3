//! Background processing of an uploaded syllabus: document text → extraction →
//! persisted assignments. Every failure is recorded against the syllabus.

use std::sync::Arc;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::document::{self, DocumentError};
use crate::extraction::orchestrator::{ExtractionError, Extractor};
use crate::syllabus::store::SyllabusStore;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Failed to store extraction: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Document conversion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs extraction over already-converted text and stores the result.
/// Returns the number of assignments stored.
pub async fn process_syllabus(
    store: &dyn SyllabusStore,
    extractor: &Extractor,
    syllabus_id: Uuid,
    document_text: &str,
) -> Result<usize, ProcessingError> {
    let result = extractor.extract(document_text).await?;
    let stored = store.complete_extraction(syllabus_id, &result).await?;
    Ok(stored)
}

/// Spawned per upload. Owns the temp file, which is removed when this returns.
pub async fn process_upload(
    store: Arc<dyn SyllabusStore>,
    extractor: Arc<Extractor>,
    syllabus_id: Uuid,
    file: NamedTempFile,
    extension: String,
) {
    info!("Processing syllabus {syllabus_id}");

    match convert_and_extract(store.as_ref(), &extractor, syllabus_id, file, extension).await {
        Ok(count) => info!("Syllabus {syllabus_id} completed with {count} assignments"),
        Err(e) => {
            error!("Syllabus {syllabus_id} failed: {e}");
            if let Err(mark_err) = store.mark_failed(syllabus_id, &e.to_string()).await {
                error!("Could not record failure for syllabus {syllabus_id}: {mark_err:?}");
            }
        }
    }
}

async fn convert_and_extract(
    store: &dyn SyllabusStore,
    extractor: &Extractor,
    syllabus_id: Uuid,
    file: NamedTempFile,
    extension: String,
) -> Result<usize, ProcessingError> {
    let text =
        tokio::task::spawn_blocking(move || document::extract_text(file.path(), &extension))
            .await??;
    process_syllabus(store, extractor, syllabus_id, &text).await
}
