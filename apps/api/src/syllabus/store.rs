//! Persistence for syllabi and their assignments.
//!
//! `complete_extraction` writes a syllabus's assignments and flips its status
//! to `completed` in one transaction, so no reader sees `completed` with a
//! partial assignment set.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::extraction::types::ExtractionResult;
use crate::models::assignment::{AssignmentRow, AssignmentUpdate};
use crate::models::syllabus::{ProcessingStatus, SyllabusRow};

/// Carried in `AppState` as `Arc<dyn SyllabusStore>`.
#[async_trait]
pub trait SyllabusStore: Send + Sync {
    async fn create_syllabus(&self, filename: &str) -> Result<SyllabusRow>;
    async fn get_syllabus(&self, id: Uuid) -> Result<Option<SyllabusRow>>;
    /// Newest upload first.
    async fn list_syllabi(&self) -> Result<Vec<SyllabusRow>>;
    /// Deletes the syllabus and its assignments. Returns false if it did not exist.
    async fn delete_syllabus(&self, id: Uuid) -> Result<bool>;

    /// Persists all assignments and marks the syllabus completed, atomically.
    async fn complete_extraction(&self, id: Uuid, result: &ExtractionResult) -> Result<usize>;
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()>;

    /// Due date ascending, undated last.
    async fn list_assignments(&self, syllabus_id: Option<Uuid>) -> Result<Vec<AssignmentRow>>;
    async fn count_assignments(&self, syllabus_id: Uuid) -> Result<i64>;
    /// Assignments due in `[today, today + days]`.
    async fn upcoming_assignments(&self, today: NaiveDate, days: i64) -> Result<Vec<AssignmentRow>>;
    async fn get_assignment(&self, id: Uuid) -> Result<Option<AssignmentRow>>;
    /// Applies a partial update. A new `estimated_hours` is also written to every
    /// assignment with the same title in the same syllabus.
    async fn update_assignment(
        &self,
        id: Uuid,
        update: &AssignmentUpdate,
    ) -> Result<Option<AssignmentRow>>;
    async fn delete_assignment(&self, id: Uuid) -> Result<bool>;
}

pub struct PgSyllabusStore {
    pool: PgPool,
}

impl PgSyllabusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyllabusStore for PgSyllabusStore {
    async fn create_syllabus(&self, filename: &str) -> Result<SyllabusRow> {
        let row = sqlx::query_as::<_, SyllabusRow>(
            r#"
            INSERT INTO syllabi (id, filename, processing_status)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(filename)
        .bind(ProcessingStatus::Processing.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_syllabus(&self, id: Uuid) -> Result<Option<SyllabusRow>> {
        let row = sqlx::query_as::<_, SyllabusRow>("SELECT * FROM syllabi WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_syllabi(&self) -> Result<Vec<SyllabusRow>> {
        let rows =
            sqlx::query_as::<_, SyllabusRow>("SELECT * FROM syllabi ORDER BY upload_date DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn delete_syllabus(&self, id: Uuid) -> Result<bool> {
        // assignments are removed by ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM syllabi WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_extraction(&self, id: Uuid, result: &ExtractionResult) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let course_name = result.course_info.course_name.as_deref();

        for a in &result.assignments {
            sqlx::query(
                r#"
                INSERT INTO assignments
                    (id, syllabus_id, title, description, assignment_type, due_date, due_time,
                     estimated_hours, weight_percentage, course_name, confidence_score)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(&a.title)
            .bind(&a.description)
            .bind(a.assignment_type.as_str())
            .bind(a.due_date)
            .bind(&a.due_time)
            .bind(a.estimated_hours)
            .bind(a.weight_percentage)
            .bind(course_name)
            .bind(a.confidence_score)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE syllabi
            SET processing_status = $2,
                error_message = NULL,
                course_name = COALESCE($3, course_name),
                instructor = COALESCE($4, instructor),
                semester = COALESCE($5, semester)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(ProcessingStatus::Completed.as_str())
        .bind(course_name)
        .bind(result.course_info.instructor.as_deref())
        .bind(result.course_info.semester.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Stored {} assignments for syllabus {id}",
            result.assignments.len()
        );
        Ok(result.assignments.len())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        sqlx::query("UPDATE syllabi SET processing_status = $2, error_message = $3 WHERE id = $1")
            .bind(id)
            .bind(ProcessingStatus::Failed.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_assignments(&self, syllabus_id: Option<Uuid>) -> Result<Vec<AssignmentRow>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT * FROM assignments
            WHERE ($1::uuid IS NULL OR syllabus_id = $1)
            ORDER BY due_date ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(syllabus_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_assignments(&self, syllabus_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE syllabus_id = $1")
                .bind(syllabus_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn upcoming_assignments(&self, today: NaiveDate, days: i64) -> Result<Vec<AssignmentRow>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT * FROM assignments
            WHERE due_date >= $1 AND due_date <= $2
            ORDER BY due_date ASC
            "#,
        )
        .bind(today)
        .bind(today + Duration::days(days))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<AssignmentRow>> {
        let row = sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_assignment(
        &self,
        id: Uuid,
        update: &AssignmentUpdate,
    ) -> Result<Option<AssignmentRow>> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, AssignmentRow>(
            "SELECT * FROM assignments WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        if let Some(hours) = update.estimated_hours {
            sqlx::query(
                "UPDATE assignments SET estimated_hours = $1 WHERE syllabus_id = $2 AND title = $3",
            )
            .bind(hours)
            .bind(existing.syllabus_id)
            .bind(&existing.title)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, AssignmentRow>(
            r#"
            UPDATE assignments
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                assignment_type = COALESCE($4, assignment_type),
                due_date = COALESCE($5, due_date),
                due_time = COALESCE($6, due_time),
                estimated_hours = COALESCE($7, estimated_hours),
                weight_percentage = COALESCE($8, weight_percentage),
                course_name = COALESCE($9, course_name)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref().map(str::trim))
        .bind(update.description.as_deref())
        .bind(update.assignment_type.map(|t| t.as_str()))
        .bind(update.due_date)
        .bind(update.due_time.as_deref())
        .bind(update.estimated_hours)
        .bind(update.weight_percentage)
        .bind(update.course_name.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store used by tests. Mirrors the ordering and atomicity of the
/// PostgreSQL store.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    inner: std::sync::Mutex<MemoryTables>,
}

#[cfg(test)]
#[derive(Default)]
struct MemoryTables {
    syllabi: Vec<SyllabusRow>,
    assignments: Vec<AssignmentRow>,
}

#[cfg(test)]
fn due_order(a: &AssignmentRow, b: &AssignmentRow) -> std::cmp::Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
#[async_trait]
impl SyllabusStore for MemoryStore {
    async fn create_syllabus(&self, filename: &str) -> Result<SyllabusRow> {
        let row = SyllabusRow {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            course_name: None,
            instructor: None,
            semester: None,
            processing_status: ProcessingStatus::Processing.as_str().to_string(),
            error_message: None,
            upload_date: chrono::Utc::now(),
        };
        self.inner.lock().unwrap().syllabi.push(row.clone());
        Ok(row)
    }

    async fn get_syllabus(&self, id: Uuid) -> Result<Option<SyllabusRow>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.syllabi.iter().find(|s| s.id == id).cloned())
    }

    async fn list_syllabi(&self) -> Result<Vec<SyllabusRow>> {
        let mut rows = self.inner.lock().unwrap().syllabi.clone();
        rows.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(rows)
    }

    async fn delete_syllabus(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.lock().unwrap();
        let before = tables.syllabi.len();
        tables.syllabi.retain(|s| s.id != id);
        tables.assignments.retain(|a| a.syllabus_id != id);
        Ok(tables.syllabi.len() < before)
    }

    async fn complete_extraction(&self, id: Uuid, result: &ExtractionResult) -> Result<usize> {
        let mut tables = self.inner.lock().unwrap();
        let info = &result.course_info;
        let syllabus = tables
            .syllabi
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow::anyhow!("syllabus {id} not found"))?;
        syllabus.processing_status = ProcessingStatus::Completed.as_str().to_string();
        syllabus.error_message = None;
        if info.course_name.is_some() {
            syllabus.course_name = info.course_name.clone();
        }
        if info.instructor.is_some() {
            syllabus.instructor = info.instructor.clone();
        }
        if info.semester.is_some() {
            syllabus.semester = info.semester.clone();
        }

        for a in &result.assignments {
            tables.assignments.push(AssignmentRow {
                id: Uuid::new_v4(),
                syllabus_id: id,
                title: a.title.clone(),
                description: a.description.clone(),
                assignment_type: a.assignment_type.as_str().to_string(),
                due_date: a.due_date,
                due_time: a.due_time.clone(),
                estimated_hours: a.estimated_hours,
                weight_percentage: a.weight_percentage,
                course_name: info.course_name.clone(),
                confidence_score: a.confidence_score,
                created_at: chrono::Utc::now(),
            });
        }
        Ok(result.assignments.len())
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        if let Some(s) = tables.syllabi.iter_mut().find(|s| s.id == id) {
            s.processing_status = ProcessingStatus::Failed.as_str().to_string();
            s.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn list_assignments(&self, syllabus_id: Option<Uuid>) -> Result<Vec<AssignmentRow>> {
        let tables = self.inner.lock().unwrap();
        let mut rows: Vec<_> = tables
            .assignments
            .iter()
            .filter(|a| syllabus_id.map_or(true, |id| a.syllabus_id == id))
            .cloned()
            .collect();
        rows.sort_by(due_order);
        Ok(rows)
    }

    async fn count_assignments(&self, syllabus_id: Uuid) -> Result<i64> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.syllabus_id == syllabus_id)
            .count() as i64)
    }

    async fn upcoming_assignments(&self, today: NaiveDate, days: i64) -> Result<Vec<AssignmentRow>> {
        let end = today + Duration::days(days);
        let tables = self.inner.lock().unwrap();
        let mut rows: Vec<_> = tables
            .assignments
            .iter()
            .filter(|a| a.due_date.is_some_and(|d| d >= today && d <= end))
            .cloned()
            .collect();
        rows.sort_by(due_order);
        Ok(rows)
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<AssignmentRow>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn update_assignment(
        &self,
        id: Uuid,
        update: &AssignmentUpdate,
    ) -> Result<Option<AssignmentRow>> {
        let mut tables = self.inner.lock().unwrap();
        let Some(existing) = tables.assignments.iter().find(|a| a.id == id).cloned() else {
            return Ok(None);
        };

        if let Some(hours) = update.estimated_hours {
            for a in tables.assignments.iter_mut().filter(|a| {
                a.syllabus_id == existing.syllabus_id && a.title == existing.title
            }) {
                a.estimated_hours = Some(hours);
            }
        }

        let Some(row) = tables.assignments.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            row.title = title.trim().to_string();
        }
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        if let Some(t) = update.assignment_type {
            row.assignment_type = t.as_str().to_string();
        }
        if let Some(d) = update.due_date {
            row.due_date = Some(d);
        }
        if let Some(time) = &update.due_time {
            row.due_time = Some(time.clone());
        }
        if let Some(w) = update.weight_percentage {
            row.weight_percentage = Some(w);
        }
        if let Some(c) = &update.course_name {
            row.course_name = Some(c.clone());
        }
        Ok(Some(row.clone()))
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.inner.lock().unwrap();
        let before = tables.assignments.len();
        tables.assignments.retain(|a| a.id != id);
        Ok(tables.assignments.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::types::{
        AssignmentType, CourseInfo, ValidatedAssignment, DEFAULT_CONFIDENCE,
    };

    fn assignment(title: &str, due: Option<NaiveDate>, hours: Option<f64>) -> ValidatedAssignment {
        ValidatedAssignment {
            title: title.to_string(),
            description: None,
            assignment_type: AssignmentType::Homework,
            due_date: due,
            due_time: None,
            estimated_hours: hours,
            weight_percentage: None,
            confidence_score: DEFAULT_CONFIDENCE,
        }
    }

    fn date(m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, m, d)
    }

    async fn seeded() -> (MemoryStore, Uuid) {
        let store = MemoryStore::default();
        let syllabus = store.create_syllabus("cs101.pdf").await.unwrap();
        let result = ExtractionResult {
            course_info: CourseInfo {
                course_name: Some("CS 101".to_string()),
                instructor: None,
                semester: Some("Fall 2025".to_string()),
            },
            assignments: vec![
                assignment("Homework 2", date(9, 20), Some(1.5)),
                assignment("Reading", None, Some(1.0)),
                assignment("Homework 1", date(9, 10), Some(1.5)),
                assignment("Homework 1", date(9, 12), Some(1.5)),
            ],
        };
        store.complete_extraction(syllabus.id, &result).await.unwrap();
        (store, syllabus.id)
    }

    #[tokio::test]
    async fn test_complete_extraction_marks_completed_with_course_info() {
        let (store, id) = seeded().await;
        let s = store.get_syllabus(id).await.unwrap().unwrap();
        assert_eq!(s.processing_status, "completed");
        assert_eq!(s.course_name.as_deref(), Some("CS 101"));
        assert_eq!(s.semester.as_deref(), Some("Fall 2025"));
        assert_eq!(store.count_assignments(id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_assignments_ordered_by_due_date_nulls_last() {
        let (store, id) = seeded().await;
        let rows = store.list_assignments(Some(id)).await.unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.due_date).collect();
        assert_eq!(dates, vec![date(9, 10), date(9, 12), date(9, 20), None]);
        assert!(rows.iter().all(|r| r.course_name.as_deref() == Some("CS 101")));
    }

    #[tokio::test]
    async fn test_upcoming_window_is_inclusive() {
        let (store, _) = seeded().await;
        let rows = store
            .upcoming_assignments(date(9, 12).unwrap(), 8)
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Homework 1", "Homework 2"]);
    }

    #[tokio::test]
    async fn test_hours_update_propagates_to_same_title() {
        let (store, id) = seeded().await;
        let rows = store.list_assignments(Some(id)).await.unwrap();
        let hw1 = rows.iter().find(|r| r.title == "Homework 1").unwrap();

        let update = AssignmentUpdate {
            estimated_hours: Some(4.0),
            due_time: Some("17:00".to_string()),
            ..Default::default()
        };
        let updated = store.update_assignment(hw1.id, &update).await.unwrap().unwrap();
        assert_eq!(updated.estimated_hours, Some(4.0));
        assert_eq!(updated.due_time.as_deref(), Some("17:00"));

        let rows = store.list_assignments(Some(id)).await.unwrap();
        for r in &rows {
            match r.title.as_str() {
                "Homework 1" => assert_eq!(r.estimated_hours, Some(4.0)),
                _ => assert_ne!(r.estimated_hours, Some(4.0)),
            }
        }
        // due_time only changes on the targeted row
        assert_eq!(rows.iter().filter(|r| r.due_time.is_some()).count(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_assignment_returns_none() {
        let store = MemoryStore::default();
        let result = store
            .update_assignment(Uuid::new_v4(), &AssignmentUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_syllabus_cascades() {
        let (store, id) = seeded().await;
        assert!(store.delete_syllabus(id).await.unwrap());
        assert!(store.list_assignments(None).await.unwrap().is_empty());
        assert!(!store.delete_syllabus(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_failed_records_message() {
        let store = MemoryStore::default();
        let s = store.create_syllabus("bad.pdf").await.unwrap();
        store.mark_failed(s.id, "Inference service unavailable").await.unwrap();
        let s = store.get_syllabus(s.id).await.unwrap().unwrap();
        assert_eq!(s.processing_status, "failed");
        assert_eq!(s.error_message.as_deref(), Some("Inference service unavailable"));
    }
}
