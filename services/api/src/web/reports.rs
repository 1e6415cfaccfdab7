//! services/api/src/web/reports.rs
//!
//! Report-card endpoints. A student that cannot be evaluated shows up under
//! `failures`; the rest of the class is still returned.

use crate::web::{grades::PeriodQuery, port_failure, state::AppState, HandlerError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use school_core::domain::YearId;
use school_core::report::{generate_class_report, ClassReport, ReportCard, ReportFailure, ReportLine};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ReportLineResponse {
    pub subject_id: i64,
    pub subject_name: String,
    /// Absent when no grade was recorded; it then counts as 0.
    pub note: Option<f64>,
    pub coefficient: u32,
    pub weighted_points: f64,
}

impl From<&ReportLine> for ReportLineResponse {
    fn from(line: &ReportLine) -> Self {
        Self {
            subject_id: line.subject_id,
            subject_name: line.subject_name.clone(),
            note: line.note,
            coefficient: line.coefficient,
            weighted_points: line.weighted_points,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReportCardResponse {
    pub student_id: i64,
    pub student_name: String,
    pub category: String,
    pub average: f64,
    pub rank: u32,
    pub unjustified_absences: u32,
    /// The matching rule's status, or "N/A" when no rule covers the student.
    pub final_status: String,
    pub status_decided: bool,
    pub lines: Vec<ReportLineResponse>,
}

impl From<&ReportCard> for ReportCardResponse {
    fn from(card: &ReportCard) -> Self {
        Self {
            student_id: card.student_id,
            student_name: card.student_name.clone(),
            category: card.category.clone(),
            average: card.average,
            rank: card.rank,
            unjustified_absences: card.unjustified_absences,
            final_status: card.final_status.label().to_string(),
            status_decided: card.final_status.is_decided(),
            lines: card.lines.iter().map(ReportLineResponse::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReportFailureResponse {
    pub student_id: i64,
    pub student_name: String,
    pub reason: String,
}

impl From<&ReportFailure> for ReportFailureResponse {
    fn from(failure: &ReportFailure) -> Self {
        Self {
            student_id: failure.student_id,
            student_name: failure.student_name.clone(),
            reason: failure.reason.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ClassReportResponse {
    pub year_id: i64,
    pub class_id: i64,
    pub class_label: String,
    pub period_id: i64,
    pub period_name: String,
    /// True when the period has no dates and every unjustified absence of the year was counted.
    pub absences_unbounded: bool,
    pub cards: Vec<ReportCardResponse>,
    pub failures: Vec<ReportFailureResponse>,
}

impl From<&ClassReport> for ClassReportResponse {
    fn from(report: &ClassReport) -> Self {
        Self {
            year_id: report.year.0,
            class_id: report.class.id,
            class_label: report.class.label.clone(),
            period_id: report.period.id,
            period_name: report.period.name.clone(),
            absences_unbounded: report.absences_unbounded,
            cards: report.cards.iter().map(ReportCardResponse::from).collect(),
            failures: report.failures.iter().map(ReportFailureResponse::from).collect(),
        }
    }
}

async fn load_report(
    state: &AppState,
    year: YearId,
    class_id: i64,
    period_id: i64,
) -> Result<ClassReport, HandlerError> {
    let report = generate_class_report(state.db.as_ref(), year, class_id, period_id)
        .await
        .map_err(|e| port_failure("Failed to generate report", e))?;
    if report.absences_unbounded {
        warn!(
            "Period {} of school year {} has no dates; counting every unjustified absence",
            period_id, year
        );
    }
    for failure in &report.failures {
        warn!(
            "Report for student {} skipped: {}",
            failure.student_id, failure.reason
        );
    }
    Ok(report)
}

/// Report cards for every student of a class, in rank order.
#[utoipa::path(
    get,
    path = "/reports/classes/{class_id}",
    responses(
        (status = 200, description = "Class report", body = ClassReportResponse),
        (status = 404, description = "Class or period not in the active year")
    ),
    params(
        ("class_id" = i64, Path, description = "Class id."),
        PeriodQuery,
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn class_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(class_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let report = load_report(&state, year, class_id, query.period_id).await?;
    Ok(Json(ClassReportResponse::from(&report)))
}

/// One student's report card, ranked within their class.
#[utoipa::path(
    get,
    path = "/reports/students/{student_id}",
    responses(
        (status = 200, description = "Report card", body = ReportCardResponse),
        (status = 404, description = "Student or period not in the active year"),
        (status = 422, description = "The student's data cannot be evaluated")
    ),
    params(
        ("student_id" = i64, Path, description = "Student id."),
        PeriodQuery,
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn student_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Path(student_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let student = state
        .db
        .get_student(year, student_id)
        .await
        .map_err(|e| port_failure("Failed to load student", e))?;
    let report = load_report(&state, year, student.class_id, query.period_id).await?;

    match report.for_student(student_id) {
        Some(Ok(card)) => Ok(Json(ReportCardResponse::from(card))),
        Some(Err(failure)) => Err((StatusCode::UNPROCESSABLE_ENTITY, failure.reason.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("Student {} has no report for this period", student_id),
        )),
    }
}
