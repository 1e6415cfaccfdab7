#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use school_core::domain::{
    AttendanceRecord, EvaluationPeriod, Expense, Grade, NewAttendance, NewClass, NewExpense,
    NewPayment, NewPeriod, NewStudent, NewSubject, NewTeacher, Payment, Role, SchoolClass,
    SchoolYear, StaffCredentials, StaffUser, Student, Subject, Teacher, YearId,
};
use school_core::ports::{DatabaseService, PortError, PortResult};
use school_core::rules::{NewRule, Rule, RuleSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    next_id: i64,
    years: Vec<SchoolYear>,
    classes: Vec<SchoolClass>,
    subjects: Vec<Subject>,
    students: Vec<Student>,
    teachers: Vec<Teacher>,
    periods: Vec<EvaluationPeriod>,
    grades: Vec<(YearId, Grade)>,
    attendance: Vec<AttendanceRecord>,
    rules: Vec<Rule>,
    payments: Vec<Payment>,
    expenses: Vec<Expense>,
    /// Remaining successful row creations before every create fails.
    write_budget: Option<usize>,
    staff: Vec<StaffCredentials>,
    sessions: Vec<(String, Uuid, DateTime<Utc>)>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn spend_write(&mut self) -> PortResult<()> {
        match self.write_budget.as_mut() {
            Some(0) => Err(PortError::Unexpected("connection reset".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// `DatabaseService` over plain vectors, enforcing the same year filtering as Postgres.
#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

fn not_found(what: &str, id: i64, year: YearId) -> PortError {
    PortError::NotFound(format!("{what} {id} not found in year {year}"))
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn class_count(&self, year: YearId) -> usize {
        self.with(|t| t.classes.iter().filter(|c| c.year_id == year).count())
    }

    pub fn classes_of(&self, year: YearId) -> Vec<SchoolClass> {
        self.with(|t| t.classes.iter().filter(|c| c.year_id == year).cloned().collect())
    }

    pub fn subjects_of(&self, year: YearId) -> Vec<Subject> {
        self.with(|t| t.subjects.iter().filter(|s| s.year_id == year).cloned().collect())
    }

    /// Lets `n` more rows be created, then fails every create with `Unexpected`.
    pub fn fail_creates_after(&self, n: usize) {
        self.with(|t| t.write_budget = Some(n));
    }

    /// Removes a class without touching the rows that reference it.
    pub fn drop_class(&self, class_id: i64) {
        self.with(|t| t.classes.retain(|c| c.id != class_id));
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn list_school_years(&self) -> PortResult<Vec<SchoolYear>> {
        Ok(self.with(|t| t.years.clone()))
    }

    async fn get_school_year(&self, year: YearId) -> PortResult<SchoolYear> {
        self.with(|t| t.years.iter().find(|y| y.id == year).cloned())
            .ok_or_else(|| PortError::NotFound(format!("School year {year} not found")))
    }

    async fn create_school_year(&self, label: &str) -> PortResult<SchoolYear> {
        Ok(self.with(|t| {
            let year = SchoolYear {
                id: YearId(t.id()),
                label: label.to_string(),
                created_at: Utc::now(),
            };
            t.years.push(year.clone());
            year
        }))
    }

    async fn list_classes(&self, year: YearId) -> PortResult<Vec<SchoolClass>> {
        Ok(self.classes_of(year))
    }

    async fn get_class(&self, year: YearId, class_id: i64) -> PortResult<SchoolClass> {
        self.with(|t| t.classes.iter().find(|c| c.id == class_id && c.year_id == year).cloned())
            .ok_or_else(|| not_found("Class", class_id, year))
    }

    async fn find_class(&self, year: YearId, content: &NewClass) -> PortResult<Option<SchoolClass>> {
        Ok(self.with(|t| {
            t.classes
                .iter()
                .find(|c| c.year_id == year && &c.content() == content)
                .cloned()
        }))
    }

    async fn create_class(&self, year: YearId, class: &NewClass) -> PortResult<SchoolClass> {
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = SchoolClass {
                id: t.id(),
                year_id: year,
                label: class.label.clone(),
                level: class.level.clone(),
            };
            t.classes.push(row.clone());
            row
        }))
    }

    async fn list_subjects(&self, year: YearId, class_id: i64) -> PortResult<Vec<Subject>> {
        Ok(self.with(|t| {
            t.subjects
                .iter()
                .filter(|s| s.year_id == year && s.class_id == class_id)
                .cloned()
                .collect()
        }))
    }

    async fn get_subject(&self, year: YearId, subject_id: i64) -> PortResult<Subject> {
        self.with(|t| t.subjects.iter().find(|s| s.id == subject_id && s.year_id == year).cloned())
            .ok_or_else(|| not_found("Subject", subject_id, year))
    }

    async fn create_subject(&self, year: YearId, subject: &NewSubject) -> PortResult<Subject> {
        self.get_class(year, subject.class_id).await?;
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = Subject {
                id: t.id(),
                year_id: year,
                class_id: subject.class_id,
                name: subject.name.clone(),
                coefficient: subject.coefficient,
            };
            t.subjects.push(row.clone());
            row
        }))
    }

    async fn list_students(&self, year: YearId, class_id: i64) -> PortResult<Vec<Student>> {
        Ok(self.with(|t| {
            t.students
                .iter()
                .filter(|s| s.year_id == year && s.class_id == class_id)
                .cloned()
                .collect()
        }))
    }

    async fn get_student(&self, year: YearId, student_id: i64) -> PortResult<Student> {
        self.with(|t| t.students.iter().find(|s| s.id == student_id && s.year_id == year).cloned())
            .ok_or_else(|| not_found("Student", student_id, year))
    }

    async fn create_student(&self, year: YearId, student: &NewStudent) -> PortResult<Student> {
        self.get_class(year, student.class_id).await?;
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = Student {
                id: t.id(),
                year_id: year,
                class_id: student.class_id,
                first_name: student.first_name.clone(),
                last_name: student.last_name.clone(),
                category: student.category.clone(),
            };
            t.students.push(row.clone());
            row
        }))
    }

    async fn find_student(
        &self,
        year: YearId,
        class_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> PortResult<Option<Student>> {
        Ok(self.with(|t| {
            t.students
                .iter()
                .find(|s| {
                    s.year_id == year
                        && s.class_id == class_id
                        && s.first_name == first_name
                        && s.last_name == last_name
                })
                .cloned()
        }))
    }

    async fn list_teachers(&self, year: YearId) -> PortResult<Vec<Teacher>> {
        Ok(self.with(|t| t.teachers.iter().filter(|r| r.year_id == year).cloned().collect()))
    }

    async fn get_teacher(&self, year: YearId, teacher_id: i64) -> PortResult<Teacher> {
        self.with(|t| t.teachers.iter().find(|r| r.id == teacher_id && r.year_id == year).cloned())
            .ok_or_else(|| not_found("Teacher", teacher_id, year))
    }

    async fn create_teacher(&self, year: YearId, teacher: &NewTeacher) -> PortResult<Teacher> {
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = Teacher {
                id: t.id(),
                year_id: year,
                first_name: teacher.first_name.clone(),
                last_name: teacher.last_name.clone(),
                phone: teacher.phone.clone(),
            };
            t.teachers.push(row.clone());
            row
        }))
    }

    async fn list_periods(&self, year: YearId) -> PortResult<Vec<EvaluationPeriod>> {
        Ok(self.with(|t| t.periods.iter().filter(|p| p.year_id == year).cloned().collect()))
    }

    async fn get_period(&self, year: YearId, period_id: i64) -> PortResult<EvaluationPeriod> {
        self.with(|t| t.periods.iter().find(|p| p.id == period_id && p.year_id == year).cloned())
            .ok_or_else(|| not_found("Evaluation period", period_id, year))
    }

    async fn create_period(&self, year: YearId, period: &NewPeriod) -> PortResult<EvaluationPeriod> {
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = EvaluationPeriod {
                id: t.id(),
                year_id: year,
                name: period.name.clone(),
                start_date: period.start_date,
                end_date: period.end_date,
            };
            t.periods.push(row.clone());
            row
        }))
    }

    async fn list_grades(&self, year: YearId, class_id: i64, period_id: i64) -> PortResult<Vec<Grade>> {
        Ok(self.with(|t| {
            let roster: Vec<i64> = t
                .students
                .iter()
                .filter(|s| s.year_id == year && s.class_id == class_id)
                .map(|s| s.id)
                .collect();
            t.grades
                .iter()
                .filter(|(y, g)| *y == year && g.period_id == period_id && roster.contains(&g.student_id))
                .map(|(_, g)| g.clone())
                .collect()
        }))
    }

    async fn upsert_grade(&self, year: YearId, grade: &Grade) -> PortResult<Grade> {
        Ok(self.with(|t| {
            let existing = t.grades.iter_mut().find(|(y, g)| {
                *y == year
                    && g.student_id == grade.student_id
                    && g.subject_id == grade.subject_id
                    && g.period_id == grade.period_id
            });
            match existing {
                Some((_, g)) => g.note = grade.note,
                None => t.grades.push((year, grade.clone())),
            }
            grade.clone()
        }))
    }

    async fn list_attendance(&self, year: YearId) -> PortResult<Vec<AttendanceRecord>> {
        Ok(self.with(|t| t.attendance.iter().filter(|a| a.year_id == year).cloned().collect()))
    }

    async fn record_attendance(
        &self,
        year: YearId,
        record: &NewAttendance,
    ) -> PortResult<AttendanceRecord> {
        Ok(self.with(|t| {
            let row = AttendanceRecord {
                id: t.id(),
                year_id: year,
                student_id: record.student_id,
                date: record.date,
                reason: record.reason,
            };
            t.attendance.push(row.clone());
            row
        }))
    }

    async fn list_payments(&self, year: YearId, student_id: Option<i64>) -> PortResult<Vec<Payment>> {
        Ok(self.with(|t| {
            t.payments
                .iter()
                .filter(|p| p.year_id == year && student_id.map_or(true, |id| p.student_id == id))
                .cloned()
                .collect()
        }))
    }

    async fn get_payment(&self, year: YearId, payment_id: i64) -> PortResult<Payment> {
        self.with(|t| t.payments.iter().find(|p| p.id == payment_id && p.year_id == year).cloned())
            .ok_or_else(|| not_found("Payment", payment_id, year))
    }

    async fn create_payment(&self, year: YearId, payment: &NewPayment) -> PortResult<Payment> {
        self.get_student(year, payment.student_id).await?;
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = Payment {
                id: t.id(),
                year_id: year,
                student_id: payment.student_id,
                amount: payment.amount,
                date: payment.date,
                label: payment.label.clone(),
            };
            t.payments.push(row.clone());
            row
        }))
    }

    async fn list_expenses(&self, year: YearId) -> PortResult<Vec<Expense>> {
        Ok(self.with(|t| t.expenses.iter().filter(|e| e.year_id == year).cloned().collect()))
    }

    async fn get_expense(&self, year: YearId, expense_id: i64) -> PortResult<Expense> {
        self.with(|t| t.expenses.iter().find(|e| e.id == expense_id && e.year_id == year).cloned())
            .ok_or_else(|| not_found("Expense", expense_id, year))
    }

    async fn create_expense(&self, year: YearId, expense: &NewExpense) -> PortResult<Expense> {
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = Expense {
                id: t.id(),
                year_id: year,
                label: expense.label.clone(),
                amount: expense.amount,
                date: expense.date,
            };
            t.expenses.push(row.clone());
            row
        }))
    }

    async fn list_rules(&self, year: YearId) -> PortResult<RuleSet> {
        Ok(self.with(|t| t.rules.iter().filter(|r| r.year_id == year).cloned().collect()))
    }

    async fn get_rule(&self, year: YearId, rule_id: i64) -> PortResult<Rule> {
        self.with(|t| t.rules.iter().find(|r| r.id == rule_id && r.year_id == year).cloned())
            .ok_or_else(|| not_found("Rule", rule_id, year))
    }

    async fn create_rule(&self, year: YearId, rule: &NewRule) -> PortResult<Rule> {
        rule.validate().map_err(|e| PortError::Invalid(e.to_string()))?;
        self.with(|t| t.spend_write())?;
        Ok(self.with(|t| {
            let row = Rule {
                id: t.id(),
                year_id: year,
                category: rule.category.clone(),
                min_average: rule.min_average,
                max_average: rule.max_average,
                min_absence: rule.min_absence,
                max_absence: rule.max_absence,
                status: rule.status.clone(),
            };
            t.rules.push(row.clone());
            row
        }))
    }

    async fn delete_rule(&self, year: YearId, rule_id: i64) -> PortResult<()> {
        self.with(|t| {
            let before = t.rules.len();
            t.rules.retain(|r| !(r.id == rule_id && r.year_id == year));
            if t.rules.len() == before {
                Err(not_found("Rule", rule_id, year))
            } else {
                Ok(())
            }
        })
    }

    async fn create_staff(
        &self,
        email: &str,
        hashed_password: &str,
        role: Role,
    ) -> PortResult<StaffUser> {
        self.with(|t| {
            if t.staff.iter().any(|s| s.user.email == email) {
                return Err(PortError::Conflict(format!("{email} already exists")));
            }
            let user = StaffUser {
                user_id: Uuid::new_v4(),
                email: email.to_string(),
                role,
            };
            t.staff.push(StaffCredentials {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
            });
            Ok(user)
        })
    }

    async fn get_staff_by_email(&self, email: &str) -> PortResult<StaffCredentials> {
        self.with(|t| t.staff.iter().find(|s| s.user.email == email).cloned())
            .ok_or_else(|| PortError::NotFound(format!("Staff {email} not found")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.with(|t| t.sessions.push((session_id.to_string(), user_id, expires_at)));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<StaffUser> {
        self.with(|t| {
            let (_, user_id, _) = t
                .sessions
                .iter()
                .find(|(id, _, expires)| id == session_id && *expires > Utc::now())
                .ok_or(PortError::Unauthorized)?;
            t.staff
                .iter()
                .find(|s| s.user.user_id == *user_id)
                .map(|s| s.user.clone())
                .ok_or(PortError::Unauthorized)
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.with(|t| t.sessions.retain(|(id, _, _)| id != session_id));
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
