//! crates/school_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database.
//!
//! Every method over a year-scoped table takes the `YearId` explicitly and must
//! only see rows of that year.

use crate::domain::{
    AttendanceRecord, EvaluationPeriod, Expense, Grade, NewAttendance, NewClass, NewExpense,
    NewPayment, NewPeriod, NewStudent, NewSubject, NewTeacher, Payment, Role, SchoolClass,
    SchoolYear, StaffCredentials, StaffUser, Student, Subject, Teacher, YearId,
};
use crate::rules::{NewRule, Rule, RuleSet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying storage.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- School Years ---
    async fn list_school_years(&self) -> PortResult<Vec<SchoolYear>>;

    async fn get_school_year(&self, year: YearId) -> PortResult<SchoolYear>;

    async fn create_school_year(&self, label: &str) -> PortResult<SchoolYear>;

    // --- Classes ---
    async fn list_classes(&self, year: YearId) -> PortResult<Vec<SchoolClass>>;

    async fn get_class(&self, year: YearId, class_id: i64) -> PortResult<SchoolClass>;

    /// First class of `year` with the same label and level, if any.
    async fn find_class(&self, year: YearId, content: &NewClass) -> PortResult<Option<SchoolClass>>;

    async fn create_class(&self, year: YearId, class: &NewClass) -> PortResult<SchoolClass>;

    // --- Subjects ---
    async fn list_subjects(&self, year: YearId, class_id: i64) -> PortResult<Vec<Subject>>;

    async fn get_subject(&self, year: YearId, subject_id: i64) -> PortResult<Subject>;

    async fn create_subject(&self, year: YearId, subject: &NewSubject) -> PortResult<Subject>;

    // --- Students ---
    async fn list_students(&self, year: YearId, class_id: i64) -> PortResult<Vec<Student>>;

    async fn get_student(&self, year: YearId, student_id: i64) -> PortResult<Student>;

    async fn create_student(&self, year: YearId, student: &NewStudent) -> PortResult<Student>;

    /// First student of `class_id` with exactly this first and last name.
    async fn find_student(
        &self,
        year: YearId,
        class_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> PortResult<Option<Student>>;

    // --- Teachers ---
    async fn list_teachers(&self, year: YearId) -> PortResult<Vec<Teacher>>;

    async fn get_teacher(&self, year: YearId, teacher_id: i64) -> PortResult<Teacher>;

    async fn create_teacher(&self, year: YearId, teacher: &NewTeacher) -> PortResult<Teacher>;

    // --- Evaluation Periods ---
    async fn list_periods(&self, year: YearId) -> PortResult<Vec<EvaluationPeriod>>;

    async fn get_period(&self, year: YearId, period_id: i64) -> PortResult<EvaluationPeriod>;

    async fn create_period(&self, year: YearId, period: &NewPeriod) -> PortResult<EvaluationPeriod>;

    // --- Grades ---
    async fn list_grades(&self, year: YearId, class_id: i64, period_id: i64) -> PortResult<Vec<Grade>>;

    /// Inserts or overwrites the grade for `(student, subject, period)`.
    async fn upsert_grade(&self, year: YearId, grade: &Grade) -> PortResult<Grade>;

    // --- Attendance ---
    async fn list_attendance(&self, year: YearId) -> PortResult<Vec<AttendanceRecord>>;

    async fn record_attendance(
        &self,
        year: YearId,
        record: &NewAttendance,
    ) -> PortResult<AttendanceRecord>;

    // --- Payments & Expenses ---
    /// Payments of `year`, optionally restricted to one student, oldest first.
    async fn list_payments(&self, year: YearId, student_id: Option<i64>) -> PortResult<Vec<Payment>>;

    async fn get_payment(&self, year: YearId, payment_id: i64) -> PortResult<Payment>;

    /// Fails with `NotFound` when the student is not part of `year`.
    async fn create_payment(&self, year: YearId, payment: &NewPayment) -> PortResult<Payment>;

    async fn list_expenses(&self, year: YearId) -> PortResult<Vec<Expense>>;

    async fn get_expense(&self, year: YearId, expense_id: i64) -> PortResult<Expense>;

    async fn create_expense(&self, year: YearId, expense: &NewExpense) -> PortResult<Expense>;

    // --- Rules ---
    /// All rules of `year`, in insertion order.
    async fn list_rules(&self, year: YearId) -> PortResult<RuleSet>;

    async fn get_rule(&self, year: YearId, rule_id: i64) -> PortResult<Rule>;

    /// Appends a rule at the end of the year's evaluation order.
    async fn create_rule(&self, year: YearId, rule: &NewRule) -> PortResult<Rule>;

    async fn delete_rule(&self, year: YearId, rule_id: i64) -> PortResult<()>;

    // --- Staff Accounts ---
    async fn create_staff(
        &self,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<StaffUser>;

    async fn get_staff_by_email(&self, email: &str) -> PortResult<StaffCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves an unexpired login session to its account.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<StaffUser>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
