//! crates/school_core/src/domain.rs
//!
//! Defines the pure, core data structures for the school administration backend.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Year Scope
//=========================================================================================

/// Identifies one academic year's data partition.
///
/// Every year-scoped read and write takes one of these explicitly; there is no
/// ambient "current year".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearId(pub i64);

impl fmt::Display for YearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SchoolYear {
    pub id: YearId,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Scoped Entities
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolClass {
    pub id: i64,
    pub year_id: YearId,
    pub label: String,
    pub level: String,
}

/// Content fields of a class, without identity or year scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewClass {
    pub label: String,
    pub level: String,
}

impl SchoolClass {
    pub fn content(&self) -> NewClass {
        NewClass {
            label: self.label.clone(),
            level: self.level.clone(),
        }
    }
}

/// A subject taught to one class, weighted by its coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub id: i64,
    pub year_id: YearId,
    pub class_id: i64,
    pub name: String,
    pub coefficient: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubject {
    pub class_id: i64,
    pub name: String,
    pub coefficient: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: i64,
    pub year_id: YearId,
    pub class_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Matching key into `Rule::category`, e.g. "Non-repeating(e)".
    pub category: String,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub class_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Teacher {
    pub id: i64,
    pub year_id: YearId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTeacher {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// A named grading window. Both bounds are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPeriod {
    pub id: i64,
    pub year_id: YearId,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPeriod {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// One note for one student in one subject for one period.
/// `(student_id, subject_id, period_id)` is unique; saving again overwrites.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub student_id: i64,
    pub subject_id: i64,
    pub period_id: i64,
    pub note: f64,
}

//=========================================================================================
// Payments & Expenses
//=========================================================================================

/// Money a student's family paid to the school. `amount` is in the smallest
/// currency unit and always positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: i64,
    pub year_id: YearId,
    pub student_id: i64,
    pub amount: i64,
    pub date: NaiveDate,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub student_id: i64,
    pub amount: i64,
    pub date: NaiveDate,
    pub label: String,
}

impl Payment {
    pub fn content(&self) -> NewPayment {
        NewPayment {
            student_id: self.student_id,
            amount: self.amount,
            date: self.date,
            label: self.label.clone(),
        }
    }
}

/// Money the school spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    pub id: i64,
    pub year_id: YearId,
    pub label: String,
    pub amount: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub label: String,
    pub amount: i64,
    pub date: NaiveDate,
}

impl Expense {
    pub fn content(&self) -> NewExpense {
        NewExpense {
            label: self.label.clone(),
            amount: self.amount,
            date: self.date,
        }
    }
}

//=========================================================================================
// Attendance
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceReason {
    Justified,
    Unjustified,
}

impl AbsenceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbsenceReason::Justified => "justified absence",
            AbsenceReason::Unjustified => "unjustified absence",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "justified absence" => Some(AbsenceReason::Justified),
            "unjustified absence" => Some(AbsenceReason::Unjustified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub year_id: YearId,
    pub student_id: i64,
    pub date: NaiveDate,
    pub reason: AbsenceReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub student_id: i64,
    pub date: NaiveDate,
    pub reason: AbsenceReason,
}

//=========================================================================================
// Staff Accounts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Administrator,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Staff => "staff",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "administrator" => Some(Role::Administrator),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }
}

// Represents a staff member - used throughout app
#[derive(Debug, Clone)]
pub struct StaffUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct StaffCredentials {
    pub user: StaffUser,
    pub hashed_password: String,
}
