//! services/api/src/web/grades.rs
//!
//! Grade entry and attendance endpoints.

use crate::web::{port_failure, state::AppState, HandlerError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDate;
use school_core::domain::{AbsenceReason, AttendanceRecord, Grade, NewAttendance, YearId};
use school_core::grading::validate_note;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// Evaluation period id.
    pub period_id: i64,
}

#[derive(Serialize, ToSchema)]
pub struct GradeResponse {
    pub student_id: i64,
    pub subject_id: i64,
    pub period_id: i64,
    pub note: f64,
}

impl From<Grade> for GradeResponse {
    fn from(grade: Grade) -> Self {
        Self {
            student_id: grade.student_id,
            subject_id: grade.subject_id,
            period_id: grade.period_id,
            note: grade.note,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpsertGradeRequest {
    pub student_id: i64,
    pub subject_id: i64,
    pub period_id: i64,
    /// Between 0 and 20.
    pub note: f64,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub reason: String,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            id: record.id,
            student_id: record.student_id,
            date: record.date,
            reason: record.reason.as_str().to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RecordAttendanceRequest {
    pub student_id: i64,
    pub date: NaiveDate,
    /// `justified absence` or `unjustified absence`.
    pub reason: String,
}

/// List a class's grades for one evaluation period.
#[utoipa::path(
    get,
    path = "/classes/{class_id}/grades",
    responses((status = 200, description = "Grades of the class", body = Vec<GradeResponse>)),
    params(
        ("class_id" = i64, Path, description = "Class id."),
        PeriodQuery,
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn list_grades_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(class_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let grades = state
        .db
        .list_grades(year, class_id, query.period_id)
        .await
        .map_err(|e| port_failure("Failed to list grades", e))?;
    Ok(Json(grades.into_iter().map(GradeResponse::from).collect::<Vec<_>>()))
}

/// Save a grade. Saving again for the same student, subject and period overwrites it.
#[utoipa::path(
    put,
    path = "/grades",
    request_body = UpsertGradeRequest,
    responses(
        (status = 200, description = "Grade saved", body = GradeResponse),
        (status = 400, description = "Note outside [0, 20]"),
        (status = 404, description = "Student, subject or period not in the active year")
    ),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn upsert_grade_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<UpsertGradeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_note(req.note).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let grade = Grade {
        student_id: req.student_id,
        subject_id: req.subject_id,
        period_id: req.period_id,
        note: req.note,
    };
    let saved = state
        .db
        .upsert_grade(year, &grade)
        .await
        .map_err(|e| port_failure("Failed to save grade", e))?;
    Ok(Json(GradeResponse::from(saved)))
}

/// List every attendance record of the active school year.
#[utoipa::path(
    get,
    path = "/attendance",
    responses((status = 200, description = "Attendance records", body = Vec<AttendanceResponse>)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn list_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let records = state
        .db
        .list_attendance(year)
        .await
        .map_err(|e| port_failure("Failed to list attendance", e))?;
    Ok(Json(records.into_iter().map(AttendanceResponse::from).collect::<Vec<_>>()))
}

/// Record an absence.
#[utoipa::path(
    post,
    path = "/attendance",
    request_body = RecordAttendanceRequest,
    responses(
        (status = 201, description = "Absence recorded", body = AttendanceResponse),
        (status = 400, description = "Unknown reason"),
        (status = 404, description = "Student not in the active year")
    ),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn record_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<RecordAttendanceRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let reason = AbsenceReason::parse(&req.reason).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown absence reason '{}'", req.reason),
        )
    })?;
    let record = state
        .db
        .record_attendance(
            year,
            &NewAttendance {
                student_id: req.student_id,
                date: req.date,
                reason,
            },
        )
        .await
        .map_err(|e| port_failure("Failed to record attendance", e))?;
    Ok((StatusCode::CREATED, Json(AttendanceResponse::from(record))))
}
