use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Confidence attached to every extracted assignment. Not calibrated.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// The closed set of assignment types that may leave the extraction core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Homework,
    Quiz,
    Exam,
    Project,
    Paper,
    Reading,
    Presentation,
    Lab,
    Other,
}

impl AssignmentType {
    pub const ALL: [AssignmentType; 9] = [
        AssignmentType::Homework,
        AssignmentType::Quiz,
        AssignmentType::Exam,
        AssignmentType::Project,
        AssignmentType::Paper,
        AssignmentType::Reading,
        AssignmentType::Presentation,
        AssignmentType::Lab,
        AssignmentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Homework => "homework",
            AssignmentType::Quiz => "quiz",
            AssignmentType::Exam => "exam",
            AssignmentType::Project => "project",
            AssignmentType::Paper => "paper",
            AssignmentType::Reading => "reading",
            AssignmentType::Presentation => "presentation",
            AssignmentType::Lab => "lab",
            AssignmentType::Other => "other",
        }
    }

    /// Exact (already lower-cased) match against the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl std::fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub course_name: Option<String>,
    pub instructor: Option<String>,
    pub semester: Option<String>,
}

/// One assignment as the model described it, before any validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAssignment {
    pub title: String,
    pub assignment_type: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub estimated_hours: Option<f64>,
}

/// Model output reduced to one canonical shape. `assignments` is always a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedExtraction {
    pub course_info: CourseInfo,
    pub assignments: Vec<RawAssignment>,
}

/// An assignment that passed every filter and carries a policy estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAssignment {
    pub title: String,
    pub description: Option<String>,
    pub assignment_type: AssignmentType,
    /// Serialized as `YYYY-MM-DD`.
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<String>,
    /// `None` means "no out-of-class effort", which is not the same as zero.
    pub estimated_hours: Option<f64>,
    pub weight_percentage: Option<f64>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub course_info: CourseInfo,
    pub assignments: Vec<ValidatedAssignment>,
}
