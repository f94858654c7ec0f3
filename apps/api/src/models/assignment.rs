use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::extraction::types::AssignmentType;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentRow {
    pub id: Uuid,
    pub syllabus_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignment_type: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
    pub estimated_hours: Option<f64>,
    pub weight_percentage: Option<f64>,
    pub course_name: Option<String>,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Partial update: only provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignment_type: Option<AssignmentType>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
    pub estimated_hours: Option<f64>,
    pub weight_percentage: Option<f64>,
    pub course_name: Option<String>,
}

impl AssignmentUpdate {
    /// Returns a message describing the first invalid field, if any.
    pub fn validation_error(&self) -> Option<String> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() || title.chars().count() > 500 {
                return Some("title must be between 1 and 500 characters".to_string());
            }
        }
        if let Some(hours) = self.estimated_hours {
            if !(0.0..=100.0).contains(&hours) {
                return Some("estimated_hours must be between 0 and 100".to_string());
            }
        }
        None
    }
}
