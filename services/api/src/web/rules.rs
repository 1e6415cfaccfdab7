//! services/api/src/web/rules.rs
//!
//! Promotion/exclusion rule administration. Rules are listed in evaluation
//! order; there is no update, an edit is a delete followed by a create.

use crate::web::{port_failure, state::AppState, HandlerError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use school_core::domain::{StaffUser, YearId};
use school_core::rules::{NewRule, Rule};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct RuleResponse {
    pub id: i64,
    /// 1-based place in the evaluation order.
    pub position: usize,
    pub category: String,
    pub min_average: f64,
    pub max_average: f64,
    pub min_absence: u32,
    pub max_absence: u32,
    pub status: String,
}

impl RuleResponse {
    fn new(position: usize, rule: Rule) -> Self {
        Self {
            id: rule.id,
            position,
            category: rule.category,
            min_average: rule.min_average,
            max_average: rule.max_average,
            min_absence: rule.min_absence,
            max_absence: rule.max_absence,
            status: rule.status,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateRuleRequest {
    /// "Non-repeating" or "Repeating"; gender markers like "(e)" are ignored when matching.
    pub category: String,
    pub min_average: f64,
    pub max_average: f64,
    pub min_absence: u32,
    pub max_absence: u32,
    /// e.g. "Admitted to next grade", "Repeats grade", "Excluded".
    pub status: String,
}

/// List the rules of the active school year in evaluation order.
#[utoipa::path(
    get,
    path = "/rules",
    responses((status = 200, description = "Rules, first match wins", body = Vec<RuleResponse>)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn list_rules_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let rules = state
        .db
        .list_rules(year)
        .await
        .map_err(|e| port_failure("Failed to list rules", e))?;
    let body: Vec<RuleResponse> = rules
        .into_inner()
        .into_iter()
        .enumerate()
        .map(|(index, rule)| RuleResponse::new(index + 1, rule))
        .collect();
    Ok(Json(body))
}

/// Append a rule at the end of the evaluation order (administrators only).
#[utoipa::path(
    post,
    path = "/rules",
    request_body = CreateRuleRequest,
    responses(
        (status = 201, description = "Rule created", body = RuleResponse),
        (status = 400, description = "Invalid ranges"),
        (status = 403, description = "Not an administrator")
    ),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn create_rule_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Extension(staff): Extension<StaffUser>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let new_rule = NewRule {
        category: req.category.trim().to_string(),
        min_average: req.min_average,
        max_average: req.max_average,
        min_absence: req.min_absence,
        max_absence: req.max_absence,
        status: req.status.trim().to_string(),
    };
    new_rule
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let rule = state
        .db
        .create_rule(year, &new_rule)
        .await
        .map_err(|e| port_failure("Failed to create rule", e))?;
    let position = state
        .db
        .list_rules(year)
        .await
        .map_err(|e| port_failure("Failed to list rules", e))?
        .iter()
        .position(|r| r.id == rule.id)
        .map_or(0, |index| index + 1);

    info!("{} added rule {} to school year {}", staff.email, rule.id, year);
    Ok((StatusCode::CREATED, Json(RuleResponse::new(position, rule))))
}

/// Delete a rule (administrators only).
#[utoipa::path(
    delete,
    path = "/rules/{rule_id}",
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not in the active year")
    ),
    params(
        ("rule_id" = i64, Path, description = "Rule id."),
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn delete_rule_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Extension(staff): Extension<StaffUser>,
    Path(rule_id): Path<i64>,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .db
        .delete_rule(year, rule_id)
        .await
        .map_err(|e| port_failure("Failed to delete rule", e))?;
    info!("{} deleted rule {} from school year {}", staff.email, rule_id, year);
    Ok(StatusCode::NO_CONTENT)
}
