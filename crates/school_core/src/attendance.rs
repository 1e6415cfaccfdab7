//! crates/school_core/src/attendance.rs
//!
//! Counts the unjustified absences that feed the rule engine.

use crate::domain::{AbsenceReason, AttendanceRecord, EvaluationPeriod};
use chrono::NaiveDate;

/// Date window an absence must fall in to be counted. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl AbsenceWindow {
    pub fn for_period(period: &EvaluationPeriod) -> Self {
        Self {
            start: period.start_date,
            end: period.end_date,
        }
    }

    /// True when the period has no dates at all, so every absence of the year counts.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| start <= date) && self.end.map_or(true, |end| date <= end)
    }
}

/// Unjustified absences of `student_id` inside `window`.
pub fn count_unjustified(records: &[AttendanceRecord], student_id: i64, window: AbsenceWindow) -> u32 {
    records
        .iter()
        .filter(|r| r.student_id == student_id)
        .filter(|r| r.reason == AbsenceReason::Unjustified)
        .filter(|r| window.contains(r.date))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YearId;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    fn absence(student_id: i64, date: NaiveDate, reason: AbsenceReason) -> AttendanceRecord {
        AttendanceRecord { id: 0, year_id: YearId(1), student_id, date, reason }
    }

    #[test]
    fn counts_only_unjustified_in_window() {
        let records = vec![
            absence(1, day(1), AbsenceReason::Unjustified),
            absence(1, day(10), AbsenceReason::Unjustified),
            absence(1, day(11), AbsenceReason::Justified),
            absence(1, day(25), AbsenceReason::Unjustified),
            absence(2, day(10), AbsenceReason::Unjustified),
        ];
        let window = AbsenceWindow { start: Some(day(5)), end: Some(day(20)) };
        assert_eq!(count_unjustified(&records, 1, window), 1);
    }

    #[test]
    fn bounds_are_inclusive() {
        let records = vec![
            absence(1, day(5), AbsenceReason::Unjustified),
            absence(1, day(20), AbsenceReason::Unjustified),
        ];
        let window = AbsenceWindow { start: Some(day(5)), end: Some(day(20)) };
        assert_eq!(count_unjustified(&records, 1, window), 2);
    }

    #[test]
    fn undated_period_counts_everything() {
        let records = vec![
            absence(1, day(1), AbsenceReason::Unjustified),
            absence(1, day(30), AbsenceReason::Unjustified),
        ];
        let window = AbsenceWindow { start: None, end: None };
        assert!(window.is_unbounded());
        assert_eq!(count_unjustified(&records, 1, window), 2);
    }

    #[test]
    fn half_open_window() {
        let records = vec![
            absence(1, day(1), AbsenceReason::Unjustified),
            absence(1, day(30), AbsenceReason::Unjustified),
        ];
        let window = AbsenceWindow { start: Some(day(15)), end: None };
        assert!(!window.is_unbounded());
        assert_eq!(count_unjustified(&records, 1, window), 1);
    }
}
