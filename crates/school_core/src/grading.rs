//! crates/school_core/src/grading.rs
//!
//! Weighted averages and class ranks for one evaluation period.

use crate::domain::{Grade, Subject};
use crate::rules::MAX_NOTE;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradeValidationError {
    #[error("note {0} is outside [0, 20]")]
    NoteOutOfRange(f64),
    #[error("coefficient must be at least 1")]
    ZeroCoefficient,
}

pub fn validate_note(note: f64) -> Result<(), GradeValidationError> {
    if note.is_finite() && (0.0..=MAX_NOTE).contains(&note) {
        Ok(())
    } else {
        Err(GradeValidationError::NoteOutOfRange(note))
    }
}

pub fn validate_coefficient(coefficient: u32) -> Result<(), GradeValidationError> {
    if coefficient >= 1 {
        Ok(())
    } else {
        Err(GradeValidationError::ZeroCoefficient)
    }
}

/// Rounds to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `Σ(note × coefficient) / Σ(coefficient)` over every configured subject.
///
/// A subject without a note contributes 0 points but still counts in the
/// denominator. With no subjects the average is 0.
pub fn weighted_average(subjects: &[Subject], notes: &HashMap<i64, f64>) -> f64 {
    let (points, weight) = subjects.iter().fold((0.0, 0u64), |(points, weight), subject| {
        let note = notes.get(&subject.id).copied().unwrap_or(0.0);
        (
            points + note * f64::from(subject.coefficient),
            weight + u64::from(subject.coefficient),
        )
    });
    if weight == 0 {
        0.0
    } else {
        points / weight as f64
    }
}

/// Groups one period's grades by student, then by subject.
pub fn notes_by_student(grades: &[Grade]) -> HashMap<i64, HashMap<i64, f64>> {
    let mut by_student: HashMap<i64, HashMap<i64, f64>> = HashMap::new();
    for grade in grades {
        by_student
            .entry(grade.student_id)
            .or_default()
            .insert(grade.subject_id, grade.note);
    }
    by_student
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    pub student_id: i64,
    pub average: f64,
    /// 1-based position in the class.
    pub rank: u32,
}

/// Ranks `(student_id, average)` pairs by descending average.
///
/// The sort is stable: tied students keep their input order and receive
/// consecutive ranks. The result is in rank order.
pub fn rank(averages: &[(i64, f64)]) -> Vec<Standing> {
    let mut ordered: Vec<(i64, f64)> = averages.to_vec();
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, (student_id, average))| Standing {
            student_id,
            average,
            rank: index as u32 + 1,
        })
        .collect()
}

/// Averages and ranks every student of `roster` (in roster order) for one period.
pub fn compute_standings(subjects: &[Subject], roster: &[i64], grades: &[Grade]) -> Vec<Standing> {
    let notes = notes_by_student(grades);
    let empty = HashMap::new();
    let averages: Vec<(i64, f64)> = roster
        .iter()
        .map(|id| (*id, weighted_average(subjects, notes.get(id).unwrap_or(&empty))))
        .collect();
    rank(&averages)
}
