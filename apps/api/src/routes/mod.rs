pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::extraction::handlers as extraction;
use crate::state::AppState;
use crate::syllabus::handlers as syllabus;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/extract", post(extraction::handle_extract))
        // Syllabi
        .route(
            "/api/v1/syllabi",
            post(syllabus::handle_upload).get(syllabus::handle_list_syllabi),
        )
        .route(
            "/api/v1/syllabi/:id/status",
            get(syllabus::handle_syllabus_status),
        )
        .route(
            "/api/v1/syllabi/:id",
            delete(syllabus::handle_delete_syllabus),
        )
        // Assignments
        .route("/api/v1/assignments", get(syllabus::handle_list_assignments))
        .route(
            "/api/v1/assignments/upcoming",
            get(syllabus::handle_upcoming_assignments),
        )
        .route(
            "/api/v1/assignments/stats",
            get(syllabus::handle_assignment_stats),
        )
        .route(
            "/api/v1/assignments/:id",
            get(syllabus::handle_get_assignment)
                .put(syllabus::handle_update_assignment)
                .delete(syllabus::handle_delete_assignment),
        )
        // Exports
        .route("/api/v1/export/ics", get(syllabus::handle_export_ics))
        .route("/api/v1/export/json", get(syllabus::handle_export_json))
        .route("/api/v1/export/csv", get(syllabus::handle_export_csv))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
