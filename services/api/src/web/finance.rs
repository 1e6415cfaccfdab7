//! services/api/src/web/finance.rs
//!
//! Payment and expense endpoints of the active school year.

use crate::web::{port_failure, state::AppState, HandlerError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDate;
use school_core::domain::{Expense, NewExpense, NewPayment, Payment, YearId};
use school_core::finance::{validate_entry, YearBalance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentQuery {
    /// Only this student's payments.
    pub student_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i64,
    pub student_id: i64,
    pub amount: i64,
    pub date: NaiveDate,
    pub label: String,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            student_id: payment.student_id,
            amount: payment.amount,
            date: payment.date,
            label: payment.label,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub student_id: i64,
    /// Smallest currency unit, > 0.
    pub amount: i64,
    pub date: NaiveDate,
    /// e.g. "Tuition, first term".
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct ExpenseResponse {
    pub id: i64,
    pub label: String,
    pub amount: i64,
    pub date: NaiveDate,
}

impl From<Expense> for ExpenseResponse {
    fn from(expense: Expense) -> Self {
        Self {
            id: expense.id,
            label: expense.label,
            amount: expense.amount,
            date: expense.date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateExpenseRequest {
    pub label: String,
    /// Smallest currency unit, > 0.
    pub amount: i64,
    pub date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct BalanceResponse {
    pub year_id: i64,
    pub paid: i64,
    pub spent: i64,
    pub net: i64,
}

/// List payments of the active school year, oldest first.
#[utoipa::path(
    get,
    path = "/payments",
    responses((status = 200, description = "Payments", body = Vec<PaymentResponse>)),
    params(
        PaymentQuery,
        ("x-school-year-id" = i64, Header, description = "Active school year.")
    )
)]
pub async fn list_payments_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Query(query): Query<PaymentQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let payments = state
        .db
        .list_payments(year, query.student_id)
        .await
        .map_err(|e| port_failure("Failed to list payments", e))?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect::<Vec<_>>()))
}

/// Record a payment for a student of the active school year.
#[utoipa::path(
    post,
    path = "/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 400, description = "Non-positive amount or empty label"),
        (status = 404, description = "Student not in the active year")
    ),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn create_payment_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_entry(req.amount, &req.label).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let payment = NewPayment {
        student_id: req.student_id,
        amount: req.amount,
        date: req.date,
        label: req.label.trim().to_string(),
    };
    let saved = state
        .db
        .create_payment(year, &payment)
        .await
        .map_err(|e| port_failure("Failed to record payment", e))?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(saved))))
}

/// List expenses of the active school year, oldest first.
#[utoipa::path(
    get,
    path = "/expenses",
    responses((status = 200, description = "Expenses", body = Vec<ExpenseResponse>)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn list_expenses_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let expenses = state
        .db
        .list_expenses(year)
        .await
        .map_err(|e| port_failure("Failed to list expenses", e))?;
    Ok(Json(expenses.into_iter().map(ExpenseResponse::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense recorded", body = ExpenseResponse),
        (status = 400, description = "Non-positive amount or empty label")
    ),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn create_expense_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_entry(req.amount, &req.label).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let expense = NewExpense {
        label: req.label.trim().to_string(),
        amount: req.amount,
        date: req.date,
    };
    let saved = state
        .db
        .create_expense(year, &expense)
        .await
        .map_err(|e| port_failure("Failed to record expense", e))?;
    Ok((StatusCode::CREATED, Json(ExpenseResponse::from(saved))))
}

/// Totals paid and spent in the active school year.
#[utoipa::path(
    get,
    path = "/finance/balance",
    responses((status = 200, description = "Year balance", body = BalanceResponse)),
    params(("x-school-year-id" = i64, Header, description = "Active school year."))
)]
pub async fn balance_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
) -> Result<impl IntoResponse, HandlerError> {
    let payments = state
        .db
        .list_payments(year, None)
        .await
        .map_err(|e| port_failure("Failed to list payments", e))?;
    let expenses = state
        .db
        .list_expenses(year)
        .await
        .map_err(|e| port_failure("Failed to list expenses", e))?;
    let balance = YearBalance::compute(&payments, &expenses);
    Ok(Json(BalanceResponse {
        year_id: year.0,
        paid: balance.paid,
        spent: balance.spent,
        net: balance.net(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_request_reads_iso_dates() {
        let req: CreatePaymentRequest = serde_json::from_str(
            r#"{"student_id": 12, "amount": 15000, "date": "2024-10-02", "label": "Tuition"}"#,
        )
        .unwrap();
        assert_eq!(req.date, NaiveDate::from_ymd_opt(2024, 10, 2).unwrap());
        assert_eq!(req.amount, 15_000);
    }

    #[test]
    fn expense_response_serializes_date_as_iso_string() {
        let body = serde_json::to_value(ExpenseResponse {
            id: 3,
            label: "Chalk".to_string(),
            amount: 2_500,
            date: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
        })
        .unwrap();
        assert_eq!(body["date"], "2024-09-30");
        assert_eq!(body["amount"], 2_500);
    }
}
