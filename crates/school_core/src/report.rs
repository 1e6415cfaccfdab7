//! crates/school_core/src/report.rs
//!
//! Report-card generation for one class and one evaluation period.
//!
//! Loading goes through the `DatabaseService` port with the year passed explicitly;
//! assembly itself is a pure function of the loaded rows. A student whose data
//! cannot be evaluated is reported as a `ReportFailure` and left out of the
//! ranking, while the rest of the class is still produced.

use crate::attendance::{count_unjustified, AbsenceWindow};
use crate::domain::{
    AttendanceRecord, EvaluationPeriod, Grade, SchoolClass, Student, Subject, YearId,
};
use crate::grading::{notes_by_student, rank, round2, validate_note, weighted_average};
use crate::ports::{DatabaseService, PortResult};
use crate::rules::{FinalStatus, RuleSet};
use std::collections::HashMap;

/// One subject row of a report card.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub subject_id: i64,
    pub subject_name: String,
    /// `None` when no grade was recorded; it then counts as 0.
    pub note: Option<f64>,
    pub coefficient: u32,
    pub weighted_points: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    pub student_id: i64,
    pub student_name: String,
    pub category: String,
    /// Rounded to two decimals; the rule engine sees this same value.
    pub average: f64,
    pub rank: u32,
    pub unjustified_absences: u32,
    pub final_status: FinalStatus,
    pub lines: Vec<ReportLine>,
}

/// A student that could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFailure {
    pub student_id: i64,
    pub student_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassReport {
    pub year: YearId,
    pub class: SchoolClass,
    pub period: EvaluationPeriod,
    /// Set when the period has no dates and every absence of the year was counted.
    pub absences_unbounded: bool,
    /// In rank order.
    pub cards: Vec<ReportCard>,
    pub failures: Vec<ReportFailure>,
}

impl ClassReport {
    /// Picks one student's outcome out of the class report.
    pub fn for_student(&self, student_id: i64) -> Option<Result<&ReportCard, &ReportFailure>> {
        if let Some(card) = self.cards.iter().find(|c| c.student_id == student_id) {
            return Some(Ok(card));
        }
        self.failures
            .iter()
            .find(|f| f.student_id == student_id)
            .map(Err)
    }
}

/// Rows a class report is built from, all belonging to the same year.
pub struct ReportInputs<'a> {
    pub period: &'a EvaluationPeriod,
    pub subjects: &'a [Subject],
    /// Roster order; ties in rank keep this order.
    pub students: &'a [Student],
    pub grades: &'a [Grade],
    pub attendance: &'a [AttendanceRecord],
    pub rules: &'a RuleSet,
}

/// Builds the cards (rank order) and the failures (roster order).
pub fn assemble(inputs: &ReportInputs<'_>) -> (Vec<ReportCard>, Vec<ReportFailure>) {
    let notes = notes_by_student(inputs.grades);
    let window = AbsenceWindow::for_period(inputs.period);
    let empty = HashMap::new();

    let mut failures = Vec::new();
    let mut evaluable: Vec<(&Student, &HashMap<i64, f64>)> = Vec::new();
    for student in inputs.students {
        let student_notes = notes.get(&student.id).unwrap_or(&empty);
        match check_notes(inputs.subjects, student_notes) {
            Ok(()) => evaluable.push((student, student_notes)),
            Err(reason) => failures.push(ReportFailure {
                student_id: student.id,
                student_name: student.full_name(),
                reason,
            }),
        }
    }

    let averages: Vec<(i64, f64)> = evaluable
        .iter()
        .map(|(student, student_notes)| (student.id, weighted_average(inputs.subjects, student_notes)))
        .collect();
    let by_id: HashMap<i64, &(&Student, &HashMap<i64, f64>)> =
        evaluable.iter().map(|entry| (entry.0.id, entry)).collect();

    let cards = rank(&averages)
        .into_iter()
        .filter_map(|standing| {
            let (student, student_notes) = by_id.get(&standing.student_id)?;
            let average = round2(standing.average);
            let absences = count_unjustified(inputs.attendance, student.id, window);
            Some(ReportCard {
                student_id: student.id,
                student_name: student.full_name(),
                category: student.category.clone(),
                average,
                rank: standing.rank,
                unjustified_absences: absences,
                final_status: inputs.rules.evaluate(average, absences, &student.category),
                lines: report_lines(inputs.subjects, student_notes),
            })
        })
        .collect();

    (cards, failures)
}

fn check_notes(subjects: &[Subject], notes: &HashMap<i64, f64>) -> Result<(), String> {
    for subject in subjects {
        if let Some(note) = notes.get(&subject.id) {
            validate_note(*note).map_err(|e| format!("{}: {}", subject.name, e))?;
        }
    }
    Ok(())
}

fn report_lines(subjects: &[Subject], notes: &HashMap<i64, f64>) -> Vec<ReportLine> {
    subjects
        .iter()
        .map(|subject| {
            let note = notes.get(&subject.id).copied();
            ReportLine {
                subject_id: subject.id,
                subject_name: subject.name.clone(),
                note,
                coefficient: subject.coefficient,
                weighted_points: round2(note.unwrap_or(0.0) * f64::from(subject.coefficient)),
            }
        })
        .collect()
}

/// Loads every row a class report needs for `year` and assembles it.
pub async fn generate_class_report(
    db: &dyn DatabaseService,
    year: YearId,
    class_id: i64,
    period_id: i64,
) -> PortResult<ClassReport> {
    let class = db.get_class(year, class_id).await?;
    let period = db.get_period(year, period_id).await?;
    let subjects = db.list_subjects(year, class_id).await?;
    let students = db.list_students(year, class_id).await?;
    let grades = db.list_grades(year, class_id, period_id).await?;
    let attendance = db.list_attendance(year).await?;
    let rules = db.list_rules(year).await?;

    let (cards, failures) = assemble(&ReportInputs {
        period: &period,
        subjects: &subjects,
        students: &students,
        grades: &grades,
        attendance: &attendance,
        rules: &rules,
    });

    Ok(ClassReport {
        year,
        absences_unbounded: AbsenceWindow::for_period(&period).is_unbounded(),
        class,
        period,
        cards,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AbsenceReason, YearId};
    use crate::rules::Rule;
    use chrono::NaiveDate;

    fn subject(id: i64, name: &str, coefficient: u32) -> Subject {
        Subject { id, year_id: YearId(1), class_id: 1, name: name.to_string(), coefficient }
    }

    fn student(id: i64, name: &str, category: &str) -> Student {
        Student {
            id,
            year_id: YearId(1),
            class_id: 1,
            first_name: name.to_string(),
            last_name: "Doe".to_string(),
            category: category.to_string(),
        }
    }

    fn period() -> EvaluationPeriod {
        EvaluationPeriod {
            id: 1,
            year_id: YearId(1),
            name: "Evaluation 1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 9, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 11, 30),
        }
    }

    fn grade(student_id: i64, subject_id: i64, note: f64) -> Grade {
        Grade { student_id, subject_id, period_id: 1, note }
    }

    #[test]
    fn bad_note_flags_one_student_only() {
        let subjects = vec![subject(1, "Math", 2), subject(2, "French", 1)];
        let students = vec![student(1, "Ana", "Repeating"), student(2, "Ben", "Repeating")];
        let grades = vec![grade(1, 1, 12.0), grade(1, 2, 6.0), grade(2, 1, 25.0)];
        let rules = RuleSet::default();
        let period = period();

        let (cards, failures) = assemble(&ReportInputs {
            period: &period,
            subjects: &subjects,
            students: &students,
            grades: &grades,
            attendance: &[],
            rules: &rules,
        });

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].student_id, 1);
        assert_eq!(cards[0].rank, 1);
        assert_eq!(cards[0].final_status, FinalStatus::NotApplicable);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].student_id, 2);
        assert!(failures[0].reason.starts_with("Math"));
    }

    #[test]
    fn lines_show_missing_notes_and_points() {
        let subjects = vec![subject(1, "Math", 2), subject(2, "French", 1)];
        let students = vec![student(1, "Ana", "Repeating")];
        let grades = vec![grade(1, 1, 12.5)];
        let rules = RuleSet::default();
        let period = period();

        let (cards, _) = assemble(&ReportInputs {
            period: &period,
            subjects: &subjects,
            students: &students,
            grades: &grades,
            attendance: &[],
            rules: &rules,
        });

        let lines = &cards[0].lines;
        assert_eq!(lines[0].weighted_points, 25.0);
        assert_eq!(lines[1].note, None);
        assert_eq!(lines[1].weighted_points, 0.0);
        assert_eq!(cards[0].average, 8.33);
    }

    #[test]
    fn status_uses_in_period_absences() {
        let subjects = vec![subject(1, "Math", 1)];
        let students = vec![student(1, "Ana", "Non-repeating(e)")];
        let grades = vec![grade(1, 1, 14.0)];
        let attendance: Vec<AttendanceRecord> = [(2024, 10, 2), (2024, 10, 3), (2024, 12, 15)]
            .iter()
            .enumerate()
            .map(|(i, (y, m, d))| AttendanceRecord {
                id: i as i64,
                year_id: YearId(1),
                student_id: 1,
                date: NaiveDate::from_ymd_opt(*y, *m, *d).unwrap(),
                reason: AbsenceReason::Unjustified,
            })
            .collect();
        let rules = RuleSet::new(vec![Rule {
            id: 1,
            year_id: YearId(1),
            category: "non-repeating".to_string(),
            min_average: 10.0,
            max_average: 20.0,
            min_absence: 0,
            max_absence: 2,
            status: "Admitted to next grade".to_string(),
        }]);
        let period = period();

        let (cards, _) = assemble(&ReportInputs {
            period: &period,
            subjects: &subjects,
            students: &students,
            grades: &grades,
            attendance: &attendance,
            rules: &rules,
        });

        assert_eq!(cards[0].unjustified_absences, 2);
        assert_eq!(cards[0].final_status.label(), "Admitted to next grade");
    }
}
