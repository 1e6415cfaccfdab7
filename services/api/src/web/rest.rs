//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the school-year and roster endpoints and the
//! master definition for the OpenAPI specification.

use crate::web::{
    auth, finance, grades, port_failure, reports, rules, state::AppState, transfers, HandlerError,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use school_core::domain::{
    EvaluationPeriod, NewClass, NewPeriod, NewStudent, NewSubject, NewTeacher, SchoolClass,
    SchoolYear, Student, Subject, Teacher, YearId,
};
use school_core::grading::validate_coefficient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::create_staff_handler,
        list_school_years_handler,
        create_school_year_handler,
        list_classes_handler,
        create_class_handler,
        list_subjects_handler,
        create_subject_handler,
        list_students_handler,
        create_student_handler,
        list_teachers_handler,
        create_teacher_handler,
        list_periods_handler,
        create_period_handler,
        grades::list_grades_handler,
        grades::upsert_grade_handler,
        grades::list_attendance_handler,
        grades::record_attendance_handler,
        finance::list_payments_handler,
        finance::create_payment_handler,
        finance::list_expenses_handler,
        finance::create_expense_handler,
        finance::balance_handler,
        rules::list_rules_handler,
        rules::create_rule_handler,
        rules::delete_rule_handler,
        reports::class_report_handler,
        reports::student_report_handler,
        transfers::transfer_handler,
    ),
    components(
        schemas(
            auth::LoginRequest, auth::CreateStaffRequest, auth::AccountResponse,
            SchoolYearResponse, CreateSchoolYearRequest,
            ClassResponse, CreateClassRequest,
            SubjectResponse, CreateSubjectRequest,
            StudentResponse, CreateStudentRequest,
            TeacherResponse, CreateTeacherRequest,
            PeriodResponse, CreatePeriodRequest,
            grades::GradeResponse, grades::UpsertGradeRequest,
            grades::AttendanceResponse, grades::RecordAttendanceRequest,
            finance::PaymentResponse, finance::CreatePaymentRequest,
            finance::ExpenseResponse, finance::CreateExpenseRequest, finance::BalanceResponse,
            rules::RuleResponse, rules::CreateRuleRequest,
            reports::ClassReportResponse, reports::ReportCardResponse,
            reports::ReportLineResponse, reports::ReportFailureResponse,
            transfers::TransferKindBody, transfers::TransferRequestBody, transfers::TransferResponse,
        )
    ),
    tags(
        (name = "School Administration API", description = "Year-scoped records, grading rules and report cards.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct SchoolYearResponse {
    pub id: i64,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl From<SchoolYear> for SchoolYearResponse {
    fn from(year: SchoolYear) -> Self {
        Self {
            id: year.id.0,
            label: year.label,
            created_at: year.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSchoolYearRequest {
    /// e.g. "2024-2025"
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct ClassResponse {
    pub id: i64,
    pub year_id: i64,
    pub label: String,
    pub level: String,
}

impl From<SchoolClass> for ClassResponse {
    fn from(class: SchoolClass) -> Self {
        Self {
            id: class.id,
            year_id: class.year_id.0,
            label: class.label,
            level: class.level,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateClassRequest {
    pub label: String,
    pub level: String,
}

#[derive(Serialize, ToSchema)]
pub struct SubjectResponse {
    pub id: i64,
    pub year_id: i64,
    pub class_id: i64,
    pub name: String,
    pub coefficient: u32,
}

impl From<Subject> for SubjectResponse {
    fn from(subject: Subject) -> Self {
        Self {
            id: subject.id,
            year_id: subject.year_id.0,
            class_id: subject.class_id,
            name: subject.name,
            coefficient: subject.coefficient,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSubjectRequest {
    pub name: String,
    /// Weight in the class average, at least 1.
    pub coefficient: u32,
}

#[derive(Serialize, ToSchema)]
pub struct StudentResponse {
    pub id: i64,
    pub year_id: i64,
    pub class_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub category: String,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            year_id: student.year_id.0,
            class_id: student.class_id,
            first_name: student.first_name,
            last_name: student.last_name,
            category: student.category,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateStudentRequest {
    pub first_name: String,
    pub last_name: String,
    /// e.g. "Non-repeating(e)" or "Repeating(e)".
    #[serde(default)]
    pub category: String,
}

#[derive(Serialize, ToSchema)]
pub struct TeacherResponse {
    pub id: i64,
    pub year_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl From<Teacher> for TeacherResponse {
    fn from(teacher: Teacher) -> Self {
        Self {
            id: teacher.id,
            year_id: teacher.year_id.0,
            first_name: teacher.first_name,
            last_name: teacher.last_name,
            phone: teacher.phone,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTeacherRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PeriodResponse {
    pub id: i64,
    pub year_id: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<EvaluationPeriod> for PeriodResponse {
    fn from(period: EvaluationPeriod) -> Self {
        Self {
            id: period.id,
            year_id: period.year_id.0,
            name: period.name,
            start_date: period.start_date,
            end_date: period.end_date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePeriodRequest {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn require_text(field: &str, value: &str) -> Result<(), HandlerError> {
    if value.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, format!("{} must not be empty", field)));
    }
    Ok(())
}

//=========================================================================================
// School Years
//=========================================================================================

/// List every school year.
#[utoipa::path(
    get,
    path = "/school-years",
    responses((status = 200, description = "All school years", body = Vec<SchoolYearResponse>))
)]
pub async fn list_school_years_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let years = state
        .db
        .list_school_years()
        .await
        .map_err(|e| port_failure("Failed to list school years", e))?;
    Ok(Json(
        years.into_iter().map(SchoolYearResponse::from).collect::<Vec<_>>(),
    ))
}

/// Open a new school year (administrators only).
#[utoipa::path(
    post,
    path = "/school-years",
    request_body = CreateSchoolYearRequest,
    responses(
        (status = 201, description = "School year created", body = SchoolYearResponse),
        (status = 400, description = "Empty label"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_school_year_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSchoolYearRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_text("label", &req.label)?;
    let year = state
        .db
        .create_school_year(req.label.trim())
        .await
        .map_err(|e| port_failure("Failed to create school year", e))?;
    Ok((StatusCode::CREATED, Json(SchoolYearResponse::from(year))))
}

//=========================================================================================
// Classes
//=========================================================================================

/// List the classes of the active school year.
#[utoipa::path(
    get,
    path = "/classes",
    responses((status = 200, description = "Classes of the year", body = Vec<ClassResponse>)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn list_classes_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let classes = state
        .db
        .list_classes(year)
        .await
        .map_err(|e| port_failure("Failed to list classes", e))?;
    Ok(Json(classes.into_iter().map(ClassResponse::from).collect::<Vec<_>>()))
}

/// Create a class in the active school year.
#[utoipa::path(
    post,
    path = "/classes",
    request_body = CreateClassRequest,
    responses((status = 201, description = "Class created", body = ClassResponse)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn create_class_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_text("label", &req.label)?;
    let class = state
        .db
        .create_class(
            year,
            &NewClass {
                label: req.label.trim().to_string(),
                level: req.level.trim().to_string(),
            },
        )
        .await
        .map_err(|e| port_failure("Failed to create class", e))?;
    Ok((StatusCode::CREATED, Json(ClassResponse::from(class))))
}

//=========================================================================================
// Subjects
//=========================================================================================

/// List the subjects configured for a class.
#[utoipa::path(
    get,
    path = "/classes/{class_id}/subjects",
    responses((status = 200, description = "Subjects of the class", body = Vec<SubjectResponse>)),
    params(
        ("class_id" = i64, Path, description = "Class id."),
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn list_subjects_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(class_id): Path<i64>,
) -> Result<impl IntoResponse, HandlerError> {
    let subjects = state
        .db
        .list_subjects(year, class_id)
        .await
        .map_err(|e| port_failure("Failed to list subjects", e))?;
    Ok(Json(subjects.into_iter().map(SubjectResponse::from).collect::<Vec<_>>()))
}

/// Add a subject to a class.
#[utoipa::path(
    post,
    path = "/classes/{class_id}/subjects",
    request_body = CreateSubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = SubjectResponse),
        (status = 400, description = "Coefficient below 1"),
        (status = 404, description = "Class not in the active year")
    ),
    params(
        ("class_id" = i64, Path, description = "Class id."),
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn create_subject_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(class_id): Path<i64>,
    Json(req): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_text("name", &req.name)?;
    validate_coefficient(req.coefficient)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let subject = state
        .db
        .create_subject(
            year,
            &NewSubject {
                class_id,
                name: req.name.trim().to_string(),
                coefficient: req.coefficient,
            },
        )
        .await
        .map_err(|e| port_failure("Failed to create subject", e))?;
    Ok((StatusCode::CREATED, Json(SubjectResponse::from(subject))))
}

//=========================================================================================
// Students
//=========================================================================================

/// List the students of a class.
#[utoipa::path(
    get,
    path = "/classes/{class_id}/students",
    responses((status = 200, description = "Students of the class", body = Vec<StudentResponse>)),
    params(
        ("class_id" = i64, Path, description = "Class id."),
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(class_id): Path<i64>,
) -> Result<impl IntoResponse, HandlerError> {
    let students = state
        .db
        .list_students(year, class_id)
        .await
        .map_err(|e| port_failure("Failed to list students", e))?;
    Ok(Json(students.into_iter().map(StudentResponse::from).collect::<Vec<_>>()))
}

/// Enrol a student in a class.
#[utoipa::path(
    post,
    path = "/classes/{class_id}/students",
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Student created", body = StudentResponse),
        (status = 404, description = "Class not in the active year")
    ),
    params(
        ("class_id" = i64, Path, description = "Class id."),
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn create_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(class_id): Path<i64>,
    Json(req): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_text("first_name", &req.first_name)?;
    require_text("last_name", &req.last_name)?;
    let student = state
        .db
        .create_student(
            year,
            &NewStudent {
                class_id,
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                category: req.category.trim().to_string(),
            },
        )
        .await
        .map_err(|e| port_failure("Failed to create student", e))?;
    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

//=========================================================================================
// Teachers
//=========================================================================================

/// List the teachers of the active school year.
#[utoipa::path(
    get,
    path = "/teachers",
    responses((status = 200, description = "Teachers of the year", body = Vec<TeacherResponse>)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn list_teachers_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let teachers = state
        .db
        .list_teachers(year)
        .await
        .map_err(|e| port_failure("Failed to list teachers", e))?;
    Ok(Json(teachers.into_iter().map(TeacherResponse::from).collect::<Vec<_>>()))
}

/// Register a teacher in the active school year.
#[utoipa::path(
    post,
    path = "/teachers",
    request_body = CreateTeacherRequest,
    responses((status = 201, description = "Teacher created", body = TeacherResponse)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn create_teacher_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<CreateTeacherRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_text("last_name", &req.last_name)?;
    let teacher = state
        .db
        .create_teacher(
            year,
            &NewTeacher {
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                phone: req.phone.filter(|p| !p.trim().is_empty()),
            },
        )
        .await
        .map_err(|e| port_failure("Failed to create teacher", e))?;
    Ok((StatusCode::CREATED, Json(TeacherResponse::from(teacher))))
}

//=========================================================================================
// Evaluation Periods
//=========================================================================================

/// List the evaluation periods of the active school year.
#[utoipa::path(
    get,
    path = "/periods",
    responses((status = 200, description = "Evaluation periods", body = Vec<PeriodResponse>)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn list_periods_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let periods = state
        .db
        .list_periods(year)
        .await
        .map_err(|e| port_failure("Failed to list evaluation periods", e))?;
    Ok(Json(periods.into_iter().map(PeriodResponse::from).collect::<Vec<_>>()))
}

/// Create an evaluation period. Both dates are optional.
#[utoipa::path(
    post,
    path = "/periods",
    request_body = CreatePeriodRequest,
    responses(
        (status = 201, description = "Period created", body = PeriodResponse),
        (status = 400, description = "End date before start date")
    ),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn create_period_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<CreatePeriodRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    require_text("name", &req.name)?;
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if end < start {
            return Err((
                StatusCode::BAD_REQUEST,
                "end_date must not be before start_date".to_string(),
            ));
        }
    }
    let period = state
        .db
        .create_period(
            year,
            &NewPeriod {
                name: req.name.trim().to_string(),
                start_date: req.start_date,
                end_date: req.end_date,
            },
        )
        .await
        .map_err(|e| port_failure("Failed to create evaluation period", e))?;
    Ok((StatusCode::CREATED, Json(PeriodResponse::from(period))))
}
