//! Response Normalizer: turns raw model output into one canonical shape.
//!
//! Never fails. Parse stages form an ordered fallback chain; each returns
//! `Option<Map>` and the first `Some` wins:
//!   1. direct JSON parse
//!   2. last balanced `{...}` span (recovers output cut off mid-array)
//!   3. fenced code block contents
//!   4. canonical empty structure
//!
//! A direct parse that yields a non-object ends the chain at step 4.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::extraction::types::{CourseInfo, NormalizedExtraction, RawAssignment};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// Keyword table for bare-title items, in precedence order.
const TITLE_TYPE_KEYWORDS: &[(&[&str], &str)] = &[
    (&["quiz"], "quiz"),
    (&["exam", "midterm", "final"], "exam"),
    (&["project"], "project"),
    (&["paper", "essay", "report"], "paper"),
    (&["reading", "chapter"], "reading"),
    (&["presentation"], "presentation"),
    (&["lab"], "lab"),
    (&["homework", "hw", "assignment"], "homework"),
];

/// An element of the model's `assignments` list.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    /// Short-form list mode: the model returned only a title.
    Title(String),
    Detailed(Map<String, Value>),
}

impl RawItem {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(title) => Some(RawItem::Title(title)),
            Value::Object(map) => Some(RawItem::Detailed(map)),
            _ => None,
        }
    }

    pub fn into_assignment(self) -> RawAssignment {
        match self {
            RawItem::Title(title) => RawAssignment {
                assignment_type: Some(infer_type_from_title(&title).to_string()),
                title,
                ..RawAssignment::default()
            },
            RawItem::Detailed(map) => RawAssignment {
                title: string_field(&map, "title").unwrap_or_default(),
                assignment_type: string_field(&map, "type")
                    .or_else(|| string_field(&map, "assignment_type")),
                due_date: string_field(&map, "due_date"),
                due_time: string_field(&map, "due_time"),
                description: string_field(&map, "description"),
                weight: number_field(&map, "weight"),
                estimated_hours: number_field(&map, "estimated_hours"),
            },
        }
    }
}

/// Normalizes a raw model response. Total: always returns a well-formed value.
pub fn normalize(raw: &str) -> NormalizedExtraction {
    match parse_object(raw) {
        Some(map) => reconcile(map),
        None => {
            warn!(
                "Model response could not be parsed as a JSON object ({} chars); using empty result",
                raw.chars().count()
            );
            NormalizedExtraction::default()
        }
    }
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => return Some(map),
        Ok(_) => return None,
        Err(_) => {}
    }

    last_balanced_object(raw)
        .and_then(as_object)
        .or_else(|| fenced_block(raw).and_then(as_object))
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Returns the span from the first `{` to the last offset where brace depth
/// returned to zero. Braces inside JSON string literals are not counted.
fn last_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_end = None;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    last_end = Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    last_end.map(|end| &text[start..end])
}

fn fenced_block(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn reconcile(map: Map<String, Value>) -> NormalizedExtraction {
    let nested = map.get("course_info").and_then(Value::as_object);
    let course_field = |key: &str| {
        string_field(&map, key).or_else(|| nested.and_then(|n| string_field(n, key)))
    };

    let course_info = CourseInfo {
        course_name: course_field("course_name"),
        instructor: course_field("instructor"),
        semester: course_field("semester"),
    };

    let assignments = match map.get("assignments") {
        Some(Value::Array(items)) => items
            .iter()
            .cloned()
            .filter_map(RawItem::from_value)
            .map(RawItem::into_assignment)
            .collect(),
        _ => Vec::new(),
    };

    NormalizedExtraction {
        course_info,
        assignments,
    }
}

/// Infers an assignment type for a bare title. First matching rule wins.
pub fn infer_type_from_title(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    TITLE_TYPE_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, t)| *t)
        .unwrap_or("other")
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(String::from)
}

/// Accepts JSON numbers and numeric strings such as `"0.2"`. Non-finite values are absent.
fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}
