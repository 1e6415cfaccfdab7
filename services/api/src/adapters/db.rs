//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every statement touching a year-scoped table binds the caller's `YearId`;
//! inserts that reference a parent row only succeed when the parent belongs to
//! the same year.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use school_core::domain::{
    AbsenceReason, AttendanceRecord, EvaluationPeriod, Expense, Grade, NewAttendance, NewClass,
    NewExpense, NewPayment, NewPeriod, NewStudent, NewSubject, NewTeacher, Payment, Role,
    SchoolClass, SchoolYear, StaffCredentials, StaffUser, Student, Subject, Teacher, YearId,
};
use school_core::ports::{DatabaseService, PortError, PortResult};
use school_core::rules::{NewRule, Rule, RuleSet};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    match e.as_database_error().and_then(|d| d.code()).as_deref() {
        Some("23505") => PortError::Conflict(e.to_string()),
        Some("23503") | Some("23514") => PortError::Invalid(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn missing(what: &str, id: i64, year: YearId) -> PortError {
    PortError::NotFound(format!("{} {} not found in school year {}", what, id, year))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SchoolYearRecord {
    id: i64,
    label: String,
    created_at: DateTime<Utc>,
}
impl SchoolYearRecord {
    fn to_domain(self) -> SchoolYear {
        SchoolYear {
            id: YearId(self.id),
            label: self.label,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ClassRecord {
    id: i64,
    year_id: i64,
    label: String,
    level: String,
}
impl ClassRecord {
    fn to_domain(self) -> SchoolClass {
        SchoolClass {
            id: self.id,
            year_id: YearId(self.year_id),
            label: self.label,
            level: self.level,
        }
    }
}

#[derive(FromRow)]
struct SubjectRecord {
    id: i64,
    year_id: i64,
    class_id: i64,
    name: String,
    coefficient: i32,
}
impl SubjectRecord {
    fn to_domain(self) -> Subject {
        Subject {
            id: self.id,
            year_id: YearId(self.year_id),
            class_id: self.class_id,
            name: self.name,
            // CHECK (coefficient >= 1)
            coefficient: self.coefficient as u32,
        }
    }
}

#[derive(FromRow)]
struct StudentRecord {
    id: i64,
    year_id: i64,
    class_id: i64,
    first_name: String,
    last_name: String,
    category: String,
}
impl StudentRecord {
    fn to_domain(self) -> Student {
        Student {
            id: self.id,
            year_id: YearId(self.year_id),
            class_id: self.class_id,
            first_name: self.first_name,
            last_name: self.last_name,
            category: self.category,
        }
    }
}

#[derive(FromRow)]
struct TeacherRecord {
    id: i64,
    year_id: i64,
    first_name: String,
    last_name: String,
    phone: Option<String>,
}
impl TeacherRecord {
    fn to_domain(self) -> Teacher {
        Teacher {
            id: self.id,
            year_id: YearId(self.year_id),
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
        }
    }
}

#[derive(FromRow)]
struct PeriodRecord {
    id: i64,
    year_id: i64,
    name: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}
impl PeriodRecord {
    fn to_domain(self) -> EvaluationPeriod {
        EvaluationPeriod {
            id: self.id,
            year_id: YearId(self.year_id),
            name: self.name,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(FromRow)]
struct GradeRecord {
    student_id: i64,
    subject_id: i64,
    period_id: i64,
    note: f64,
}
impl GradeRecord {
    fn to_domain(self) -> Grade {
        Grade {
            student_id: self.student_id,
            subject_id: self.subject_id,
            period_id: self.period_id,
            note: self.note,
        }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: i64,
    year_id: i64,
    student_id: i64,
    date: NaiveDate,
    reason: String,
}
impl AttendanceRow {
    fn to_domain(self) -> PortResult<AttendanceRecord> {
        let reason = AbsenceReason::parse(&self.reason).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown absence reason '{}'", self.reason))
        })?;
        Ok(AttendanceRecord {
            id: self.id,
            year_id: YearId(self.year_id),
            student_id: self.student_id,
            date: self.date,
            reason,
        })
    }
}

#[derive(FromRow)]
struct PaymentRecord {
    id: i64,
    year_id: i64,
    student_id: i64,
    amount: i64,
    date: NaiveDate,
    label: String,
}
impl PaymentRecord {
    fn to_domain(self) -> Payment {
        Payment {
            id: self.id,
            year_id: YearId(self.year_id),
            student_id: self.student_id,
            amount: self.amount,
            date: self.date,
            label: self.label,
        }
    }
}

#[derive(FromRow)]
struct ExpenseRecord {
    id: i64,
    year_id: i64,
    label: String,
    amount: i64,
    date: NaiveDate,
}
impl ExpenseRecord {
    fn to_domain(self) -> Expense {
        Expense {
            id: self.id,
            year_id: YearId(self.year_id),
            label: self.label,
            amount: self.amount,
            date: self.date,
        }
    }
}

#[derive(FromRow)]
struct RuleRecord {
    id: i64,
    year_id: i64,
    category: String,
    min_average: f64,
    max_average: f64,
    min_absence: i32,
    max_absence: i32,
    status: String,
}
impl RuleRecord {
    fn to_domain(self) -> Rule {
        Rule {
            id: self.id,
            year_id: YearId(self.year_id),
            category: self.category,
            min_average: self.min_average,
            max_average: self.max_average,
            // CHECK (0 <= min_absence AND min_absence < max_absence)
            min_absence: self.min_absence as u32,
            max_absence: self.max_absence as u32,
            status: self.status,
        }
    }
}

#[derive(FromRow)]
struct StaffRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
    role: String,
}
impl StaffRecord {
    fn to_domain(self) -> PortResult<StaffCredentials> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown role '{}'", self.role)))?;
        Ok(StaffCredentials {
            user: StaffUser {
                user_id: self.user_id,
                email: self.email,
                role,
            },
            hashed_password: self.hashed_password,
        })
    }
}

const CLASS_COLUMNS: &str = "id, year_id, label, level";
const SUBJECT_COLUMNS: &str = "id, year_id, class_id, name, coefficient";
const STUDENT_COLUMNS: &str = "id, year_id, class_id, first_name, last_name, category";
const TEACHER_COLUMNS: &str = "id, year_id, first_name, last_name, phone";
const PERIOD_COLUMNS: &str = "id, year_id, name, start_date, end_date";
const PAYMENT_COLUMNS: &str = "id, year_id, student_id, amount, date, label";
const EXPENSE_COLUMNS: &str = "id, year_id, label, amount, date";
const RULE_COLUMNS: &str =
    "id, year_id, category, min_average, max_average, min_absence, max_absence, status";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- School Years ---

    async fn list_school_years(&self) -> PortResult<Vec<SchoolYear>> {
        let records = sqlx::query_as::<_, SchoolYearRecord>(
            "SELECT id, label, created_at FROM school_years ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_school_year(&self, year: YearId) -> PortResult<SchoolYear> {
        let record = sqlx::query_as::<_, SchoolYearRecord>(
            "SELECT id, label, created_at FROM school_years WHERE id = $1",
        )
        .bind(year.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("School year {} not found", year)))?;
        Ok(record.to_domain())
    }

    async fn create_school_year(&self, label: &str) -> PortResult<SchoolYear> {
        let record = sqlx::query_as::<_, SchoolYearRecord>(
            "INSERT INTO school_years (label) VALUES ($1) RETURNING id, label, created_at",
        )
        .bind(label)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    // --- Classes ---

    async fn list_classes(&self, year: YearId) -> PortResult<Vec<SchoolClass>> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE year_id = $1 ORDER BY id ASC");
        let records = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(year.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_class(&self, year: YearId, class_id: i64) -> PortResult<SchoolClass> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(class_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Class", class_id, year))?;
        Ok(record.to_domain())
    }

    async fn find_class(&self, year: YearId, content: &NewClass) -> PortResult<Option<SchoolClass>> {
        let sql = format!(
            "SELECT {CLASS_COLUMNS} FROM classes \
             WHERE year_id = $1 AND label = $2 AND level = $3 ORDER BY id ASC LIMIT 1"
        );
        let record = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(year.0)
            .bind(&content.label)
            .bind(&content.level)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn create_class(&self, year: YearId, class: &NewClass) -> PortResult<SchoolClass> {
        let sql = format!(
            "INSERT INTO classes (year_id, label, level) VALUES ($1, $2, $3) RETURNING {CLASS_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(year.0)
            .bind(&class.label)
            .bind(&class.level)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    // --- Subjects ---

    async fn list_subjects(&self, year: YearId, class_id: i64) -> PortResult<Vec<Subject>> {
        let sql = format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE year_id = $1 AND class_id = $2 ORDER BY id ASC"
        );
        let records = sqlx::query_as::<_, SubjectRecord>(&sql)
            .bind(year.0)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_subject(&self, year: YearId, subject_id: i64) -> PortResult<Subject> {
        let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, SubjectRecord>(&sql)
            .bind(subject_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Subject", subject_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_subject(&self, year: YearId, subject: &NewSubject) -> PortResult<Subject> {
        let sql = format!(
            "INSERT INTO subjects (year_id, class_id, name, coefficient) \
             SELECT $1, $2, $3, $4 \
             WHERE EXISTS (SELECT 1 FROM classes WHERE id = $2 AND year_id = $1) \
             RETURNING {SUBJECT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SubjectRecord>(&sql)
            .bind(year.0)
            .bind(subject.class_id)
            .bind(&subject.name)
            .bind(subject.coefficient as i32)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Class", subject.class_id, year))?;
        Ok(record.to_domain())
    }

    // --- Students ---

    async fn list_students(&self, year: YearId, class_id: i64) -> PortResult<Vec<Student>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE year_id = $1 AND class_id = $2 ORDER BY id ASC"
        );
        let records = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(year.0)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_student(&self, year: YearId, student_id: i64) -> PortResult<Student> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(student_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Student", student_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_student(&self, year: YearId, student: &NewStudent) -> PortResult<Student> {
        let sql = format!(
            "INSERT INTO students (year_id, class_id, first_name, last_name, category) \
             SELECT $1, $2, $3, $4, $5 \
             WHERE EXISTS (SELECT 1 FROM classes WHERE id = $2 AND year_id = $1) \
             RETURNING {STUDENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(year.0)
            .bind(student.class_id)
            .bind(&student.first_name)
            .bind(&student.last_name)
            .bind(&student.category)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Class", student.class_id, year))?;
        Ok(record.to_domain())
    }

    async fn find_student(
        &self,
        year: YearId,
        class_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> PortResult<Option<Student>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students \
             WHERE year_id = $1 AND class_id = $2 AND first_name = $3 AND last_name = $4 \
             ORDER BY id ASC LIMIT 1"
        );
        let record = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(year.0)
            .bind(class_id)
            .bind(first_name)
            .bind(last_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    // --- Teachers ---

    async fn list_teachers(&self, year: YearId) -> PortResult<Vec<Teacher>> {
        let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE year_id = $1 ORDER BY id ASC");
        let records = sqlx::query_as::<_, TeacherRecord>(&sql)
            .bind(year.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_teacher(&self, year: YearId, teacher_id: i64) -> PortResult<Teacher> {
        let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, TeacherRecord>(&sql)
            .bind(teacher_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Teacher", teacher_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_teacher(&self, year: YearId, teacher: &NewTeacher) -> PortResult<Teacher> {
        let sql = format!(
            "INSERT INTO teachers (year_id, first_name, last_name, phone) \
             VALUES ($1, $2, $3, $4) RETURNING {TEACHER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, TeacherRecord>(&sql)
            .bind(year.0)
            .bind(&teacher.first_name)
            .bind(&teacher.last_name)
            .bind(&teacher.phone)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    // --- Evaluation Periods ---

    async fn list_periods(&self, year: YearId) -> PortResult<Vec<EvaluationPeriod>> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM evaluation_periods WHERE year_id = $1 ORDER BY id ASC"
        );
        let records = sqlx::query_as::<_, PeriodRecord>(&sql)
            .bind(year.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_period(&self, year: YearId, period_id: i64) -> PortResult<EvaluationPeriod> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM evaluation_periods WHERE id = $1 AND year_id = $2"
        );
        let record = sqlx::query_as::<_, PeriodRecord>(&sql)
            .bind(period_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Evaluation period", period_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_period(&self, year: YearId, period: &NewPeriod) -> PortResult<EvaluationPeriod> {
        let sql = format!(
            "INSERT INTO evaluation_periods (year_id, name, start_date, end_date) \
             VALUES ($1, $2, $3, $4) RETURNING {PERIOD_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PeriodRecord>(&sql)
            .bind(year.0)
            .bind(&period.name)
            .bind(period.start_date)
            .bind(period.end_date)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    // --- Grades ---

    async fn list_grades(&self, year: YearId, class_id: i64, period_id: i64) -> PortResult<Vec<Grade>> {
        let records = sqlx::query_as::<_, GradeRecord>(
            "SELECT g.student_id, g.subject_id, g.period_id, g.note \
             FROM grades g JOIN students s ON s.id = g.student_id \
             WHERE g.year_id = $1 AND s.year_id = $1 AND s.class_id = $2 AND g.period_id = $3 \
             ORDER BY g.student_id ASC, g.subject_id ASC",
        )
        .bind(year.0)
        .bind(class_id)
        .bind(period_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn upsert_grade(&self, year: YearId, grade: &Grade) -> PortResult<Grade> {
        let record = sqlx::query_as::<_, GradeRecord>(
            "INSERT INTO grades (year_id, student_id, subject_id, period_id, note) \
             SELECT $1, $2, $3, $4, $5 \
             WHERE EXISTS (SELECT 1 FROM students WHERE id = $2 AND year_id = $1) \
               AND EXISTS (SELECT 1 FROM subjects WHERE id = $3 AND year_id = $1) \
               AND EXISTS (SELECT 1 FROM evaluation_periods WHERE id = $4 AND year_id = $1) \
             ON CONFLICT (student_id, subject_id, period_id) \
             DO UPDATE SET note = EXCLUDED.note, updated_at = now() \
             RETURNING student_id, subject_id, period_id, note",
        )
        .bind(year.0)
        .bind(grade.student_id)
        .bind(grade.subject_id)
        .bind(grade.period_id)
        .bind(grade.note)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| {
            PortError::NotFound(format!(
                "Student {}, subject {} or period {} not found in school year {}",
                grade.student_id, grade.subject_id, grade.period_id, year
            ))
        })?;
        Ok(record.to_domain())
    }

    // --- Attendance ---

    async fn list_attendance(&self, year: YearId) -> PortResult<Vec<AttendanceRecord>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(
            "SELECT id, year_id, student_id, date, reason FROM attendance \
             WHERE year_id = $1 ORDER BY date ASC, id ASC",
        )
        .bind(year.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        rows.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn record_attendance(
        &self,
        year: YearId,
        record: &NewAttendance,
    ) -> PortResult<AttendanceRecord> {
        let row = sqlx::query_as::<_, AttendanceRow>(
            "INSERT INTO attendance (year_id, student_id, date, reason) \
             SELECT $1, $2, $3, $4 \
             WHERE EXISTS (SELECT 1 FROM students WHERE id = $2 AND year_id = $1) \
             RETURNING id, year_id, student_id, date, reason",
        )
        .bind(year.0)
        .bind(record.student_id)
        .bind(record.date)
        .bind(record.reason.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| missing("Student", record.student_id, year))?;
        row.to_domain()
    }

    // --- Payments & Expenses ---

    async fn list_payments(&self, year: YearId, student_id: Option<i64>) -> PortResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE year_id = $1 AND ($2::BIGINT IS NULL OR student_id = $2) \
             ORDER BY date ASC, id ASC"
        );
        let records = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(year.0)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_payment(&self, year: YearId, payment_id: i64) -> PortResult<Payment> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(payment_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Payment", payment_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_payment(&self, year: YearId, payment: &NewPayment) -> PortResult<Payment> {
        let sql = format!(
            "INSERT INTO payments (year_id, student_id, amount, date, label) \
             SELECT $1, $2, $3, $4, $5 \
             WHERE EXISTS (SELECT 1 FROM students WHERE id = $2 AND year_id = $1) \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(year.0)
            .bind(payment.student_id)
            .bind(payment.amount)
            .bind(payment.date)
            .bind(&payment.label)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Student", payment.student_id, year))?;
        Ok(record.to_domain())
    }

    async fn list_expenses(&self, year: YearId) -> PortResult<Vec<Expense>> {
        let sql = format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE year_id = $1 ORDER BY date ASC, id ASC"
        );
        let records = sqlx::query_as::<_, ExpenseRecord>(&sql)
            .bind(year.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_expense(&self, year: YearId, expense_id: i64) -> PortResult<Expense> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, ExpenseRecord>(&sql)
            .bind(expense_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Expense", expense_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_expense(&self, year: YearId, expense: &NewExpense) -> PortResult<Expense> {
        let sql = format!(
            "INSERT INTO expenses (year_id, label, amount, date) \
             VALUES ($1, $2, $3, $4) RETURNING {EXPENSE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ExpenseRecord>(&sql)
            .bind(year.0)
            .bind(&expense.label)
            .bind(expense.amount)
            .bind(expense.date)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    // --- Rules ---

    async fn list_rules(&self, year: YearId) -> PortResult<RuleSet> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM rules WHERE year_id = $1 ORDER BY position ASC, id ASC"
        );
        let records = sqlx::query_as::<_, RuleRecord>(&sql)
            .bind(year.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_rule(&self, year: YearId, rule_id: i64) -> PortResult<Rule> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM rules WHERE id = $1 AND year_id = $2");
        let record = sqlx::query_as::<_, RuleRecord>(&sql)
            .bind(rule_id)
            .bind(year.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| missing("Rule", rule_id, year))?;
        Ok(record.to_domain())
    }

    async fn create_rule(&self, year: YearId, rule: &NewRule) -> PortResult<Rule> {
        rule.validate()
            .map_err(|e| PortError::Invalid(e.to_string()))?;
        let sql = format!(
            "INSERT INTO rules \
             (year_id, position, category, min_average, max_average, min_absence, max_absence, status) \
             SELECT $1, COALESCE(MAX(position), 0) + 1, $2, $3, $4, $5, $6, $7 \
             FROM rules WHERE year_id = $1 \
             RETURNING {RULE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, RuleRecord>(&sql)
            .bind(year.0)
            .bind(&rule.category)
            .bind(rule.min_average)
            .bind(rule.max_average)
            .bind(rule.min_absence as i32)
            .bind(rule.max_absence as i32)
            .bind(&rule.status)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn delete_rule(&self, year: YearId, rule_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM rules WHERE id = $1 AND year_id = $2")
            .bind(rule_id)
            .bind(year.0)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(missing("Rule", rule_id, year));
        }
        Ok(())
    }

    // --- Staff Accounts ---

    async fn create_staff(
        &self,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<StaffUser> {
        let record = sqlx::query_as::<_, StaffRecord>(
            "INSERT INTO staff_users (user_id, email, hashed_password, role) VALUES ($1, $2, $3, $4) \
             RETURNING user_id, email, hashed_password, role",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain()?.user)
    }

    async fn get_staff_by_email(&self, email: &str) -> PortResult<StaffCredentials> {
        sqlx::query_as::<_, StaffRecord>(
            "SELECT user_id, email, hashed_password, role FROM staff_users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Staff account {} not found", email)))?
        .to_domain()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<StaffUser> {
        let record = sqlx::query_as::<_, StaffRecord>(
            "SELECT u.user_id, u.email, u.hashed_password, u.role \
             FROM auth_sessions s JOIN staff_users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;
        Ok(record.to_domain()?.user)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
