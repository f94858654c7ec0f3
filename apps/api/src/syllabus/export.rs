//! Assignment exports: iCalendar feed, pretty JSON and CSV.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use icalendar::{Calendar, Component, Event, EventLike};
use serde::Serialize;
use uuid::Uuid;

use crate::models::assignment::AssignmentRow;

pub const DEFAULT_CALENDAR_NAME: &str = "Syllabus Assignments";

const CSV_HEADER: [&str; 9] = [
    "ID",
    "Title",
    "Description",
    "Type",
    "Due Date",
    "Due Time",
    "Estimated Hours",
    "Weight %",
    "Course Name",
];

/// Calendar name for an export, scoped to a course when one is known.
pub fn calendar_name(course_name: Option<&str>) -> String {
    match course_name.map(str::trim).filter(|c| !c.is_empty()) {
        Some(course) => format!("{course} Assignments"),
        None => DEFAULT_CALENDAR_NAME.to_string(),
    }
}

/// One hour-long event per dated assignment. Undated assignments are skipped.
pub fn assignments_ics(assignments: &[AssignmentRow], name: &str) -> String {
    let mut calendar = Calendar::new();
    calendar.name(name);

    for a in assignments {
        let Some(date) = a.due_date else {
            continue;
        };
        let start = event_start(date, a.due_time.as_deref());
        let event = Event::new()
            .uid(&format!("assignment-{}", a.id))
            .summary(&a.title)
            .description(&event_description(a))
            .starts(start)
            .ends(start + Duration::hours(1))
            .done();
        calendar.push(event);
    }

    calendar.to_string()
}

/// `HH:MM` on the due date, or 23:59 when the time is missing or unreadable.
fn event_start(date: NaiveDate, due_time: Option<&str>) -> NaiveDateTime {
    let time = due_time
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok())
        .or_else(|| NaiveTime::from_hms_opt(23, 59, 0))
        .unwrap_or_default();
    date.and_time(time)
}

fn event_description(a: &AssignmentRow) -> String {
    let mut lines = Vec::new();
    if let Some(description) = a.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(description.to_string());
    }
    lines.push(format!("Type: {}", a.assignment_type));
    let hours = a
        .estimated_hours
        .map(|h| h.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    lines.push(format!("Estimated time: {hours} hours"));
    if let Some(weight) = a.weight_percentage {
        lines.push(format!("Weight: {}%", percent(weight)));
    }
    lines.join("\n")
}

/// Weights are stored as fractions (0.2 for 20%).
fn percent(weight: f64) -> f64 {
    (weight * 10_000.0).round() / 100.0
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    id: Uuid,
    title: &'a str,
    description: Option<&'a str>,
    #[serde(rename = "type")]
    assignment_type: &'a str,
    due_date: Option<NaiveDate>,
    due_time: Option<&'a str>,
    estimated_hours: Option<f64>,
    weight_percentage: Option<f64>,
    course_name: Option<&'a str>,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a AssignmentRow> for ExportRecord<'a> {
    fn from(a: &'a AssignmentRow) -> Self {
        Self {
            id: a.id,
            title: &a.title,
            description: a.description.as_deref(),
            assignment_type: &a.assignment_type,
            due_date: a.due_date,
            due_time: a.due_time.as_deref(),
            estimated_hours: a.estimated_hours,
            weight_percentage: a.weight_percentage,
            course_name: a.course_name.as_deref(),
            created_at: a.created_at,
        }
    }
}

pub fn assignments_json(assignments: &[AssignmentRow]) -> serde_json::Result<String> {
    let records: Vec<ExportRecord> = assignments.iter().map(ExportRecord::from).collect();
    serde_json::to_string_pretty(&records)
}

pub fn assignments_csv(assignments: &[AssignmentRow]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for a in assignments {
        writer.write_record([
            a.id.to_string(),
            a.title.clone(),
            a.description.clone().unwrap_or_default(),
            a.assignment_type.clone(),
            a.due_date.map(|d| d.to_string()).unwrap_or_default(),
            a.due_time.clone().unwrap_or_default(),
            a.estimated_hours.map(|h| h.to_string()).unwrap_or_default(),
            a.weight_percentage
                .map(|w| percent(w).to_string())
                .unwrap_or_default(),
            a.course_name.clone().unwrap_or_default(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
