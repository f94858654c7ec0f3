use std::io::Write;

use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::document::{self, SUPPORTED_EXTENSIONS};
use crate::errors::AppError;
use crate::extraction::types::AssignmentType;
use crate::models::assignment::{AssignmentRow, AssignmentUpdate};
use crate::models::syllabus::SyllabusRow;
use crate::state::AppState;
use crate::syllabus::export;
use crate::syllabus::pipeline::process_upload;
use crate::syllabus::stats::{compute_stats, AssignmentStats};

const DEFAULT_UPCOMING_DAYS: i64 = 14;
const MAX_UPCOMING_DAYS: i64 = 365;

#[derive(Serialize)]
pub struct UploadResponse {
    pub syllabus_id: Uuid,
    pub filename: String,
    pub processing_status: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct SyllabusStatusResponse {
    pub id: Uuid,
    pub filename: String,
    pub processing_status: String,
    pub error_message: Option<String>,
    pub course_name: Option<String>,
    pub instructor: Option<String>,
    pub semester: Option<String>,
    pub assignment_count: i64,
    pub upload_date: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct AssignmentFilter {
    pub syllabus_id: Option<Uuid>,
    pub assignment_type: Option<String>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub syllabus_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}

/// POST /api/v1/syllabi
/// Accepts a multipart `file`, stores a `processing` syllabus and converts it in the background.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(AppError::Validation("multipart field 'file' is required".to_string()));
    };

    let extension = document::extension_of(&filename)
        .filter(|ext| document::is_supported(ext))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported file type. Allowed: {}",
                SUPPORTED_EXTENSIONS.join(", ")
            ))
        })?;

    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            state.config.max_upload_bytes
        )));
    }

    let mut file = tempfile::Builder::new()
        .prefix("syllabus-")
        .suffix(&extension)
        .tempfile()
        .context("Failed to create temp file for upload")?;
    file.write_all(&bytes)
        .context("Failed to write upload to temp file")?;

    let syllabus = state.store.create_syllabus(&filename).await?;
    info!(
        "Accepted upload {} ({} bytes) as syllabus {}",
        filename,
        bytes.len(),
        syllabus.id
    );

    tokio::spawn(process_upload(
        state.store.clone(),
        state.extractor.clone(),
        syllabus.id,
        file,
        extension,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            syllabus_id: syllabus.id,
            filename: syllabus.filename,
            processing_status: syllabus.processing_status,
            message: "Syllabus uploaded and queued for processing".to_string(),
        }),
    ))
}

/// GET /api/v1/syllabi
pub async fn handle_list_syllabi(
    State(state): State<AppState>,
) -> Result<Json<Vec<SyllabusRow>>, AppError> {
    Ok(Json(state.store.list_syllabi().await?))
}

/// GET /api/v1/syllabi/:id/status
pub async fn handle_syllabus_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SyllabusStatusResponse>, AppError> {
    let syllabus = state
        .store
        .get_syllabus(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Syllabus {id} not found")))?;
    let assignment_count = state.store.count_assignments(id).await?;

    Ok(Json(SyllabusStatusResponse {
        id: syllabus.id,
        filename: syllabus.filename,
        processing_status: syllabus.processing_status,
        error_message: syllabus.error_message,
        course_name: syllabus.course_name,
        instructor: syllabus.instructor,
        semester: syllabus.semester,
        assignment_count,
        upload_date: syllabus.upload_date,
    }))
}

/// DELETE /api/v1/syllabi/:id
pub async fn handle_delete_syllabus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_syllabus(id).await? {
        return Err(AppError::NotFound(format!("Syllabus {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/assignments
pub async fn handle_list_assignments(
    State(state): State<AppState>,
    Query(filter): Query<AssignmentFilter>,
) -> Result<Json<Vec<AssignmentRow>>, AppError> {
    let wanted_type = match filter.assignment_type.as_deref() {
        Some(t) => Some(AssignmentType::parse(&t.trim().to_lowercase()).ok_or_else(|| {
            AppError::Validation(format!("Unknown assignment_type '{t}'"))
        })?),
        None => None,
    };

    let mut rows = state.store.list_assignments(filter.syllabus_id).await?;
    if let Some(t) = wanted_type {
        rows.retain(|a| a.assignment_type == t.as_str());
    }
    Ok(Json(rows))
}

/// GET /api/v1/assignments/upcoming?days=14
pub async fn handle_upcoming_assignments(
    State(state): State<AppState>,
    Query(params): Query<UpcomingQuery>,
) -> Result<Json<Vec<AssignmentRow>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days must be between 1 and {MAX_UPCOMING_DAYS}"
        )));
    }
    let today = Utc::now().date_naive();
    Ok(Json(state.store.upcoming_assignments(today, days).await?))
}

/// GET /api/v1/assignments/stats
pub async fn handle_assignment_stats(
    State(state): State<AppState>,
) -> Result<Json<AssignmentStats>, AppError> {
    let rows = state.store.list_assignments(None).await?;
    Ok(Json(compute_stats(&rows, Utc::now().date_naive())))
}

/// GET /api/v1/assignments/:id
pub async fn handle_get_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AssignmentRow>, AppError> {
    state
        .store
        .get_assignment(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Assignment {id} not found")))
}

/// PUT /api/v1/assignments/:id
pub async fn handle_update_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<AssignmentUpdate>,
) -> Result<Json<AssignmentRow>, AppError> {
    if let Some(msg) = update.validation_error() {
        return Err(AppError::Validation(msg));
    }
    state
        .store
        .update_assignment(id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Assignment {id} not found")))
}

/// DELETE /api/v1/assignments/:id
pub async fn handle_delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_assignment(id).await? {
        return Err(AppError::NotFound(format!("Assignment {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn attachment(content_type: &'static str, filename: &'static str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET /api/v1/export/ics?syllabus_id=
/// Dated assignments as an iCalendar feed named after the syllabus course.
pub async fn handle_export_ics(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let course_name = match params.syllabus_id {
        Some(id) => state
            .store
            .get_syllabus(id)
            .await?
            .and_then(|s| s.course_name),
        None => None,
    };
    let rows = state.store.list_assignments(params.syllabus_id).await?;
    let body = export::assignments_ics(&rows, &export::calendar_name(course_name.as_deref()));
    info!("Exported {} assignments as iCalendar", rows.len());
    Ok(attachment("text/calendar; charset=utf-8", "assignments.ics", body))
}

/// GET /api/v1/export/json?syllabus_id=
pub async fn handle_export_json(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let rows = state.store.list_assignments(params.syllabus_id).await?;
    let body = export::assignments_json(&rows).context("Failed to serialize assignments")?;
    Ok(attachment("application/json", "assignments.json", body))
}

/// GET /api/v1/export/csv?syllabus_id=
pub async fn handle_export_csv(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let rows = state.store.list_assignments(params.syllabus_id).await?;
    let body = export::assignments_csv(&rows)?;
    Ok(attachment("text/csv; charset=utf-8", "assignments.csv", body))
}
