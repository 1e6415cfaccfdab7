//! crates/school_core/src/rules.rs
//!
//! The promotion/exclusion rule engine.
//!
//! A `RuleSet` is an ordered decision table. Evaluation returns the status of the
//! first rule whose category, average range and absence range all contain the
//! student's values. When rules overlap the outcome depends on their order; that
//! order is part of the `RuleSet` value and is never re-sorted here.

use crate::domain::YearId;
use regex::Regex;
use std::sync::LazyLock;

/// Highest note a student can obtain.
pub const MAX_NOTE: f64 = 20.0;

/// Label rendered on a report card when no rule covers the student.
pub const NOT_APPLICABLE_LABEL: &str = "N/A";

// Trailing parenthetical markers such as "(e)" or " (e) ".
static PARENTHETICAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\s*\([^()]*\))+\s*$").expect("static pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: i64,
    pub year_id: YearId,
    pub category: String,
    pub min_average: f64,
    pub max_average: f64,
    pub min_absence: u32,
    pub max_absence: u32,
    pub status: String,
}

/// Content of a rule as submitted by an administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub category: String,
    pub min_average: f64,
    pub max_average: f64,
    pub min_absence: u32,
    pub max_absence: u32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("category must not be empty")]
    EmptyCategory,
    #[error("status must not be empty")]
    EmptyStatus,
    #[error("average bounds must lie within [0, 20]")]
    AverageOutOfBounds,
    #[error("minimum average must be lower than maximum average")]
    AverageRangeInverted,
    #[error("minimum absences must be lower than maximum absences")]
    AbsenceRangeInverted,
}

impl NewRule {
    /// Checks the creation-time invariants. Matching never re-checks them.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.category.trim().is_empty() {
            return Err(RuleValidationError::EmptyCategory);
        }
        if self.status.trim().is_empty() {
            return Err(RuleValidationError::EmptyStatus);
        }
        let in_bounds = |v: f64| v.is_finite() && (0.0..=MAX_NOTE).contains(&v);
        if !in_bounds(self.min_average) || !in_bounds(self.max_average) {
            return Err(RuleValidationError::AverageOutOfBounds);
        }
        if self.min_average >= self.max_average {
            return Err(RuleValidationError::AverageRangeInverted);
        }
        if self.min_absence >= self.max_absence {
            return Err(RuleValidationError::AbsenceRangeInverted);
        }
        Ok(())
    }
}

impl Rule {
    pub fn content(&self) -> NewRule {
        NewRule {
            category: self.category.clone(),
            min_average: self.min_average,
            max_average: self.max_average,
            min_absence: self.min_absence,
            max_absence: self.max_absence,
            status: self.status.clone(),
        }
    }

    /// Both ranges are closed. `category` must already be normalized.
    fn matches(&self, average: f64, absences: u32, category: &str) -> bool {
        normalize_category(&self.category) == category
            && self.min_average <= average
            && average <= self.max_average
            && self.min_absence <= absences
            && absences <= self.max_absence
    }
}

/// Lower-cases, drops trailing gender markers like "(e)" and trims.
///
/// `"Repeating(e)"`, `"repeating"` and `" Repeating (e) "` all yield `"repeating"`.
pub fn normalize_category(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    PARENTHETICAL_SUFFIX
        .replace(&lowered, "")
        .trim()
        .to_string()
}

/// Outcome of evaluating one student against a `RuleSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatus {
    /// The status carried by the first matching rule.
    Decided(String),
    /// No rule covers the student; never replaced by a default status.
    NotApplicable,
}

impl FinalStatus {
    pub fn label(&self) -> &str {
        match self {
            FinalStatus::Decided(status) => status,
            FinalStatus::NotApplicable => NOT_APPLICABLE_LABEL,
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, FinalStatus::Decided(_))
    }
}

/// Rules of one year in evaluation order (ascending insertion position).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Keeps `rules` in the order given.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_inner(self) -> Vec<Rule> {
        self.rules
    }

    /// Returns the status of the first rule matching the inputs.
    ///
    /// A non-finite average yields `NotApplicable` so one bad value cannot
    /// abort a whole class report.
    pub fn evaluate(&self, average: f64, absences: u32, category: &str) -> FinalStatus {
        if !average.is_finite() {
            return FinalStatus::NotApplicable;
        }
        let key = normalize_category(category);
        self.rules
            .iter()
            .find(|rule| rule.matches(average, absences, &key))
            .map(|rule| FinalStatus::Decided(rule.status.clone()))
            .unwrap_or(FinalStatus::NotApplicable)
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
