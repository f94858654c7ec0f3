//! Time Estimator: deterministic, rule-based effort estimate per assignment.
//!
//! Rule priority (first applicable rule returns):
//! 1. no-estimate types (quiz, participation, attendance, discussion) → `None`
//! 2. no-estimate keywords anywhere in title/description → `None`
//! 3. length signal ("10 pages", "25 problems", ...) → per-unit rate
//! 4. base hours for the type × complexity multiplier
//!
//! The model's own estimate is accepted for diagnostics only and never
//! overrides the rules above.
//!
//! Two versioned policies share this engine and differ only in their tables:
//! `current` (canonical) and `legacy`. Selected at startup via
//! `ESTIMATION_POLICY`; the extractor holds an `Arc<dyn EstimationPolicy>`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Types that describe in-class activity with no out-of-class preparation.
const NO_ESTIMATE_TYPES: &[&str] = &["quiz", "participation", "attendance", "discussion"];

/// A textual signal that overrides a mis-typed item.
const NO_ESTIMATE_KEYWORDS: &[&str] = &["participation", "attendance", "in-class", "in class", "quiz"];

/// Length patterns, tried in order. The first match wins; patterns are never combined.
static LENGTH_PATTERNS: LazyLock<Vec<(Regex, fn(f64) -> f64)>> = LazyLock::new(|| {
    let rules: [(&str, fn(f64) -> f64); 6] = [
        (r"([0-9]+)\s*pages?", |n| n * 0.5),
        (r"([0-9]+)\s*words?", |n| n / 500.0),
        (r"([0-9]+)\s*problems?", |n| n * 0.25),
        (r"([0-9]+)\s*questions?", |n| n * 0.15),
        (r"([0-9]+)\s*chapters?", |n| n * 2.0),
        (r"([0-9]+)\s*exercises?", |n| n * 0.2),
    ];
    rules
        .into_iter()
        .map(|(pattern, rate)| (Regex::new(pattern).unwrap(), rate))
        .collect()
});

/// Pluggable estimation policy. Implement this to swap heuristics without
/// touching the validator or orchestrator.
pub trait EstimationPolicy: Send + Sync {
    fn estimate(
        &self,
        assignment_type: &str,
        title: &str,
        description: Option<&str>,
        model_estimate: Option<f64>,
    ) -> Option<f64>;

    /// Policy name, for logging and configuration round-trips.
    fn name(&self) -> &'static str;
}

/// Constants that distinguish one estimator version from another.
///
/// Resolutions are steps per hour: 10.0 rounds to 0.1 h, 2.0 to 0.5 h,
/// 100.0 to 0.01 h.
#[derive(Debug)]
pub struct EstimatorTables {
    pub name: &'static str,
    pub base_hours: &'static [(&'static str, f64)],
    /// Used when the type is missing from `base_hours`.
    pub default_base_hours: f64,
    /// Iterated in declaration order. > 1.0 amplifies, < 1.0 dampens.
    pub complexity_multipliers: &'static [(&'static str, f64)],
    pub length_clamp: (f64, f64),
    pub length_resolution: f64,
    pub complexity_clamp: (f64, f64),
    pub complexity_resolution: f64,
}

pub static CURRENT_TABLES: EstimatorTables = EstimatorTables {
    name: "current",
    base_hours: &[
        ("homework", 1.5),
        ("quiz", 0.0),
        ("exam", 3.0),
        ("project", 8.0),
        ("paper", 5.0),
        ("reading", 1.0),
        ("presentation", 3.0),
        ("lab", 2.0),
        ("discussion", 0.0),
        ("participation", 0.0),
        ("attendance", 0.0),
        ("other", 1.0),
    ],
    default_base_hours: 1.0,
    complexity_multipliers: &[
        ("research", 1.8),
        ("analysis", 1.4),
        ("comprehensive", 1.6),
        ("cumulative", 1.5),
        ("final", 2.0),
        ("midterm", 1.5),
        ("thesis", 2.5),
        ("capstone", 2.5),
        ("group", 1.3),
        ("team", 1.3),
        ("major", 1.5),
        ("short", 0.6),
        ("brief", 0.6),
        ("mini", 0.4),
        ("quick", 0.5),
        ("outline", 0.4),
        ("draft", 0.6),
        ("review", 0.8),
        ("weekly", 0.8),
    ],
    length_clamp: (0.25, 40.0),
    length_resolution: 10.0,
    complexity_clamp: (0.5, 40.0),
    complexity_resolution: 2.0,
};

pub static LEGACY_TABLES: EstimatorTables = EstimatorTables {
    name: "legacy",
    base_hours: &[
        ("homework", 2.0),
        ("quiz", 0.0),
        ("exam", 4.0),
        ("midterm", 8.0),
        ("final", 12.0),
        ("project", 10.0),
        ("paper", 8.0),
        ("reading", 1.5),
        ("presentation", 4.0),
        ("lab", 3.0),
        ("discussion", 0.0),
        ("participation", 0.0),
        ("attendance", 0.0),
        ("other", 2.0),
    ],
    default_base_hours: 2.0,
    complexity_multipliers: &[
        ("research", 1.5),
        ("analysis", 1.3),
        ("comprehensive", 1.5),
        ("final", 1.5),
        ("midterm", 1.3),
        ("group", 1.2),
        ("team", 1.2),
        ("major", 1.4),
        ("short", 0.7),
        ("brief", 0.7),
        ("mini", 0.5),
        ("quick", 0.6),
        ("review", 0.8),
        ("draft", 0.6),
    ],
    length_clamp: (0.25, 40.0),
    length_resolution: 100.0,
    complexity_clamp: (0.25, 40.0),
    complexity_resolution: 100.0,
};

/// The rule engine, parameterized by a versioned table set.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicEstimator {
    tables: &'static EstimatorTables,
}

impl HeuristicEstimator {
    pub fn current() -> Self {
        Self {
            tables: &CURRENT_TABLES,
        }
    }

    pub fn legacy() -> Self {
        Self {
            tables: &LEGACY_TABLES,
        }
    }

    /// Looks a policy up by its configured name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "current" => Some(Self::current()),
            "legacy" => Some(Self::legacy()),
            _ => None,
        }
    }

    fn base_hours(&self, assignment_type: &str) -> f64 {
        self.tables
            .base_hours
            .iter()
            .find(|(t, _)| *t == assignment_type)
            .map(|(_, hours)| *hours)
            .unwrap_or(self.tables.default_base_hours)
    }

    /// Single pass over the table with one running value. An amplifier replaces
    /// it when larger, a dampener when smaller, so with mixed directions the
    /// last applied extreme in declaration order wins.
    fn complexity_multiplier(&self, text: &str) -> f64 {
        let mut multiplier = 1.0_f64;
        for &(keyword, factor) in self.tables.complexity_multipliers {
            if !text.contains(keyword) {
                continue;
            }
            if (factor > 1.0 && factor > multiplier) || (factor < 1.0 && factor < multiplier) {
                multiplier = factor;
            }
        }
        multiplier
    }
}

impl EstimationPolicy for HeuristicEstimator {
    fn estimate(
        &self,
        assignment_type: &str,
        title: &str,
        description: Option<&str>,
        model_estimate: Option<f64>,
    ) -> Option<f64> {
        let assignment_type = assignment_type.to_lowercase();
        let combined = format!("{} {}", title, description.unwrap_or("")).to_lowercase();

        if let Some(hours) = model_estimate {
            trace!("Model estimate for {title:?}: {hours}h (diagnostic only)");
        }

        if NO_ESTIMATE_TYPES.contains(&assignment_type.as_str()) {
            return None;
        }

        if NO_ESTIMATE_KEYWORDS.iter().any(|k| combined.contains(k)) {
            return None;
        }

        if let Some(hours) = estimate_from_length(&combined) {
            let (lo, hi) = self.tables.length_clamp;
            return Some(round_to(hours.clamp(lo, hi), self.tables.length_resolution));
        }

        let base = self.base_hours(&assignment_type);
        let multiplier = self.complexity_multiplier(&combined);
        let (lo, hi) = self.tables.complexity_clamp;
        Some(round_to(
            (base * multiplier).clamp(lo, hi),
            self.tables.complexity_resolution,
        ))
    }

    fn name(&self) -> &'static str {
        self.tables.name
    }
}

fn estimate_from_length(text: &str) -> Option<f64> {
    LENGTH_PATTERNS.iter().find_map(|(pattern, rate)| {
        let count: f64 = pattern.captures(text)?.get(1)?.as_str().parse().ok()?;
        Some(rate(count))
    })
}

fn round_to(value: f64, steps_per_hour: f64) -> f64 {
    (value * steps_per_hour).round() / steps_per_hour
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(t: &str, title: &str, description: Option<&str>) -> Option<f64> {
        HeuristicEstimator::current().estimate(t, title, description, None)
    }

    #[test]
    fn test_homework_estimate_is_within_bounds() {
        let hours = current("homework", "Homework 1", None).unwrap();
        assert!((0.5..=40.0).contains(&hours));
        assert_eq!(hours, 1.5);
    }

    #[test]
    fn test_quiz_type_has_no_estimate() {
        assert_eq!(current("quiz", "Quiz 3", None), None);
    }

    #[test]
    fn test_no_estimate_types_are_case_insensitive() {
        assert_eq!(current("Discussion", "Week 3 forum", None), None);
        assert_eq!(current("PARTICIPATION", "Lecture engagement", None), None);
        assert_eq!(current("attendance", "Roll call", None), None);
    }

    #[test]
    fn test_keyword_overrides_declared_type() {
        assert_eq!(current("homework", "Pop quiz on chapter 2", None), None);
        assert_eq!(current("exam", "In-class midterm", None), None);
        assert_eq!(current("project", "Demo", Some("presented in class")), None);
    }

    #[test]
    fn test_no_estimate_is_distinct_from_zero() {
        assert!(current("quiz", "Quiz 1", None).is_none());
        assert_ne!(current("other", "Misc", None), Some(0.0));
    }

    #[test]
    fn test_page_rule_beats_type_rule() {
        assert_eq!(current("paper", "Write a 10 page paper", None), Some(5.0));
    }

    #[test]
    fn test_length_patterns_in_description() {
        assert_eq!(current("homework", "Problem Set 2", Some("Solve 12 problems")), Some(3.0));
        assert_eq!(current("reading", "Reading", Some("Read 3 chapters")), Some(6.0));
        assert_eq!(current("paper", "Essay", Some("2000 words")), Some(4.0));
        assert_eq!(current("homework", "Worksheet", Some("20 questions")), Some(3.0));
        assert_eq!(current("lab", "Lab 4", Some("15 exercises")), Some(3.0));
    }

    #[test]
    fn test_length_counts_are_ascii_digits_only() {
        // Arabic-Indic digits are not a count, so the later ASCII count is used
        assert_eq!(
            current("paper", "Response", Some("\u{0661}\u{0660} pages outline, final 6 pages")),
            Some(3.0)
        );
        assert_eq!(current("paper", "Write a \u{0661}\u{0660} pages paper", None), Some(5.0));
    }

    #[test]
    fn test_first_length_pattern_wins() {
        // pages is tried before problems, even though problems appears first in text
        assert_eq!(current("homework", "8 problems, 4 pages", None), Some(2.0));
    }

    #[test]
    fn test_length_estimate_clamped_and_rounded() {
        assert_eq!(current("paper", "Thesis draft", Some("200 pages")), Some(40.0));
        assert_eq!(current("paper", "Abstract", Some("50 words")), Some(0.3));
        assert_eq!(current("homework", "Warmup", Some("1 question")), Some(0.3));
    }

    #[test]
    fn test_complexity_amplifies_base() {
        assert_eq!(current("project", "Final Project", None), Some(16.0));
        assert_eq!(current("paper", "Research Paper", None), Some(9.0));
        assert_eq!(current("exam", "Midterm Exam", None), Some(4.5));
    }

    #[test]
    fn test_complexity_dampens_base() {
        assert_eq!(current("paper", "Short essay", None), Some(3.0));
        assert_eq!(current("project", "Mini project", None), Some(3.0));
        assert_eq!(current("reading", "Weekly reading", None), Some(1.0));
    }

    #[test]
    fn test_largest_amplifier_wins() {
        // research 1.8 then final 2.0: final is larger
        assert_eq!(current("paper", "Final research paper", None), Some(10.0));
    }

    #[test]
    fn test_mixed_directions_last_applied_wins() {
        // research (1.8) is applied, then short (0.6) replaces it
        assert_eq!(current("paper", "Short research paper", None), Some(3.0));
    }

    #[test]
    fn test_complexity_result_clamped_to_floor() {
        // other 1.0 × mini 0.4 = 0.4 → clamped to 0.5
        assert_eq!(current("other", "Mini reflection", None), Some(0.5));
    }

    #[test]
    fn test_unknown_type_uses_default_base() {
        assert_eq!(current("seminar", "Seminar", None), Some(1.0));
    }

    #[test]
    fn test_model_estimate_never_overrides_rules() {
        let e = HeuristicEstimator::current();
        assert_eq!(e.estimate("homework", "Homework 1", None, Some(12.0)), Some(1.5));
        assert_eq!(e.estimate("quiz", "Quiz 1", None, Some(2.0)), None);
    }

    #[test]
    fn test_estimates_are_deterministic() {
        let e = HeuristicEstimator::current();
        let a = e.estimate("project", "Capstone team project", None, None);
        let b = e.estimate("project", "Capstone team project", None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_legacy_policy_uses_its_own_constants() {
        let e = HeuristicEstimator::legacy();
        assert_eq!(e.estimate("homework", "Homework 1", None, None), Some(2.0));
        assert_eq!(e.estimate("project", "Final Project", None, None), Some(15.0));
        assert_eq!(e.estimate("paper", "Short essay", None, None), Some(5.6));
        assert_eq!(e.estimate("quiz", "Quiz 1", None, None), None);
        assert_eq!(e.name(), "legacy");
    }

    #[test]
    fn test_policy_lookup_by_name() {
        assert_eq!(HeuristicEstimator::by_name("current").unwrap().name(), "current");
        assert_eq!(HeuristicEstimator::by_name(" Legacy ").unwrap().name(), "legacy");
        assert!(HeuristicEstimator::by_name("v3").is_none());
    }
}
