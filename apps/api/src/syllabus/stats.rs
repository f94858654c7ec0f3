use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::assignment::AssignmentRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentStats {
    pub total: usize,
    pub upcoming: usize,
    pub overdue: usize,
    /// Sum of estimates, one decimal. Unestimated assignments count as zero.
    pub total_hours: f64,
    pub by_type: BTreeMap<String, usize>,
}

/// Aggregates over all stored assignments relative to `today`.
/// Upcoming is due today or later; overdue is strictly before today.
pub fn compute_stats(assignments: &[AssignmentRow], today: NaiveDate) -> AssignmentStats {
    let mut upcoming = 0;
    let mut overdue = 0;
    let mut hours = 0.0;
    let mut by_type = BTreeMap::new();

    for a in assignments {
        match a.due_date {
            Some(d) if d < today => overdue += 1,
            Some(_) => upcoming += 1,
            None => {}
        }
        hours += a.estimated_hours.unwrap_or(0.0);
        *by_type.entry(a.assignment_type.clone()).or_insert(0) += 1;
    }

    AssignmentStats {
        total: assignments.len(),
        upcoming,
        overdue,
        total_hours: (hours * 10.0).round() / 10.0,
        by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn row(kind: &str, due: Option<NaiveDate>, hours: Option<f64>) -> AssignmentRow {
        AssignmentRow {
            id: Uuid::new_v4(),
            syllabus_id: Uuid::nil(),
            title: "x".to_string(),
            description: None,
            assignment_type: kind.to_string(),
            due_date: due,
            due_time: None,
            estimated_hours: hours,
            weight_percentage: None,
            course_name: None,
            confidence_score: 0.8,
            created_at: chrono::Utc::now(),
        }
    }

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 3, d)
    }

    #[test]
    fn test_empty_stats() {
        let stats = compute_stats(&[], day(1).unwrap());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.total_hours, 0.0);
        assert!(stats.by_type.is_empty());
    }

    #[test]
    fn test_upcoming_overdue_and_hours() {
        let today = day(10).unwrap();
        let rows = vec![
            row("homework", day(9), Some(1.5)),
            row("homework", day(10), Some(1.5)),
            row("exam", day(24), Some(3.0)),
            row("exam", day(25), Some(3.0)),
            row("quiz", day(12), None),
            row("reading", None, Some(0.44)),
        ];
        let stats = compute_stats(&rows, today);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.overdue, 1);
        // due today counts as upcoming; undated counts as neither
        assert_eq!(stats.upcoming, 4);
        assert_eq!(stats.total_hours, 9.4);
        assert_eq!(stats.by_type["homework"], 2);
        assert_eq!(stats.by_type["quiz"], 1);
    }
}
