//! Assignment Validator: drops non-assignments, closes the type set, and
//! attaches a policy estimate.
//!
//! Pure and total: invalid items are dropped, never errored. Input order is
//! preserved and duplicates are kept.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::extraction::estimator::EstimationPolicy;
use crate::extraction::types::{
    AssignmentType, ExtractionResult, NormalizedExtraction, RawAssignment, ValidatedAssignment,
    DEFAULT_CONFIDENCE,
};

/// Title keywords that mark an item as graded participation, not an assignment.
const EXCLUDE_TITLE_KEYWORDS: &[&str] = &[
    "participation",
    "attendance",
    "class participation",
    "class attendance",
];

const EXCLUDED_TYPES: &[&str] = &["participation", "attendance"];

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

pub fn validate(
    normalized: NormalizedExtraction,
    estimator: &dyn EstimationPolicy,
) -> ExtractionResult {
    let total = normalized.assignments.len();
    let assignments: Vec<ValidatedAssignment> = normalized
        .assignments
        .into_iter()
        .filter_map(|raw| validate_assignment(raw, estimator))
        .collect();

    debug!(
        "Validated {} of {} extracted items (policy: {})",
        assignments.len(),
        total,
        estimator.name()
    );

    ExtractionResult {
        course_info: normalized.course_info,
        assignments,
    }
}

fn validate_assignment(
    raw: RawAssignment,
    estimator: &dyn EstimationPolicy,
) -> Option<ValidatedAssignment> {
    let title = raw.title.trim();
    if title.is_empty() {
        return None;
    }

    let title_lower = title.to_lowercase();
    if EXCLUDE_TITLE_KEYWORDS.iter().any(|k| title_lower.contains(k)) {
        return None;
    }

    let declared = raw
        .assignment_type
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_else(|| "other".to_string());
    if EXCLUDED_TYPES.contains(&declared.as_str()) {
        return None;
    }

    // Quizzes never carry an estimate, so the override must precede estimation.
    let assignment_type = if title_lower.contains("quiz") {
        AssignmentType::Quiz
    } else {
        AssignmentType::parse(&declared).unwrap_or(AssignmentType::Other)
    };

    let estimated_hours = estimator.estimate(
        assignment_type.as_str(),
        title,
        raw.description.as_deref(),
        raw.estimated_hours,
    );

    Some(ValidatedAssignment {
        title: title.to_string(),
        description: raw.description,
        assignment_type,
        due_date: raw.due_date.as_deref().and_then(parse_due_date),
        due_time: raw.due_time.as_deref().and_then(clean_due_time),
        estimated_hours,
        weight_percentage: raw.weight,
        confidence_score: DEFAULT_CONFIDENCE,
    })
}

/// Strict `YYYY-MM-DD` that is also a real calendar date. Surrounding whitespace is rejected.
fn parse_due_date(value: &str) -> Option<NaiveDate> {
    if !ISO_DATE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn clean_due_time(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(value.to_string())
}
