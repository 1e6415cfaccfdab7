//! services/api/src/web/router.rs
//!
//! Assembles the HTTP routes and their guards.

use crate::web::{
    auth::{create_staff_handler, login_handler, logout_handler, me_handler},
    finance::{
        balance_handler, create_expense_handler, create_payment_handler, list_expenses_handler,
        list_payments_handler,
    },
    grades::{list_attendance_handler, list_grades_handler, record_attendance_handler, upsert_grade_handler},
    middleware::{require_admin, require_auth, require_year_scope},
    reports::{class_report_handler, student_report_handler},
    rest::{
        create_class_handler, create_period_handler, create_school_year_handler,
        create_student_handler, create_subject_handler, create_teacher_handler,
        list_classes_handler, list_periods_handler, list_school_years_handler,
        list_students_handler, list_subjects_handler, list_teachers_handler,
    },
    rules::{create_rule_handler, delete_rule_handler, list_rules_handler},
    state::AppState,
    transfers::transfer_handler,
};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Builds the API router.
///
/// Guards run outermost first: login session, then school year, then role.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let auth = axum_middleware::from_fn_with_state(app_state.clone(), require_auth);
    let year_scope = axum_middleware::from_fn_with_state(app_state.clone(), require_year_scope);
    let admin = axum_middleware::from_fn(require_admin);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Logged in, not tied to a school year
    let account_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/school-years", get(list_school_years_handler))
        .layer(auth.clone());

    let admin_account_routes = Router::new()
        .route("/auth/staff", post(create_staff_handler))
        .route("/school-years", post(create_school_year_handler))
        .layer(admin.clone())
        .layer(auth.clone());

    // Logged in, scoped to the x-school-year-id year
    let scoped_routes = Router::new()
        .route("/classes", get(list_classes_handler).post(create_class_handler))
        .route(
            "/classes/{class_id}/subjects",
            get(list_subjects_handler).post(create_subject_handler),
        )
        .route(
            "/classes/{class_id}/students",
            get(list_students_handler).post(create_student_handler),
        )
        .route("/classes/{class_id}/grades", get(list_grades_handler))
        .route("/teachers", get(list_teachers_handler).post(create_teacher_handler))
        .route("/periods", get(list_periods_handler).post(create_period_handler))
        .route("/grades", put(upsert_grade_handler))
        .route(
            "/attendance",
            get(list_attendance_handler).post(record_attendance_handler),
        )
        .route("/payments", get(list_payments_handler).post(create_payment_handler))
        .route("/expenses", get(list_expenses_handler).post(create_expense_handler))
        .route("/finance/balance", get(balance_handler))
        .route("/rules", get(list_rules_handler))
        .route("/reports/classes/{class_id}", get(class_report_handler))
        .route("/reports/students/{student_id}", get(student_report_handler))
        .layer(year_scope.clone())
        .layer(auth.clone());

    let admin_scoped_routes = Router::new()
        .route("/rules", post(create_rule_handler))
        .route("/rules/{rule_id}", delete(delete_rule_handler))
        .route("/transfers", post(transfer_handler))
        .layer(admin)
        .layer(year_scope)
        .layer(auth);

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(admin_account_routes)
        .merge(scoped_routes)
        .merge(admin_scoped_routes)
        .with_state(app_state)
}
