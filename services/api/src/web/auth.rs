//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: login, logout, current account, and staff creation.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use school_core::domain::{Role, StaffUser};
use school_core::ports::{DatabaseService, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::web::{
    middleware::{session_cookie, SESSION_COOKIE},
    port_failure,
    state::AppState,
    HandlerError,
};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateStaffRequest {
    pub email: String,
    pub password: String,
    /// `administrator` or `staff`.
    pub role: String,
}

#[derive(Serialize, ToSchema)]
pub struct AccountResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl From<StaffUser> for AccountResponse {
    fn from(user: StaffUser) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            role: user.role.as_str().to_string(),
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn session_cookie_header(session_id: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, session_id, max_age_seconds
    )
}

/// Creates the configured administrator account unless it already exists.
pub async fn ensure_bootstrap_admin(
    db: &dyn DatabaseService,
    admin: &BootstrapAdmin,
) -> PortResult<()> {
    match db.get_staff_by_email(&admin.email).await {
        Ok(_) => Ok(()),
        Err(PortError::NotFound(_)) => {
            let hashed = hash_password(&admin.password)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            db.create_staff(&admin.email, &hashed, Role::Administrator)
                .await?;
            info!("Created bootstrap administrator {}", admin.email);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Login with an existing staff account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AccountResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        )
    };

    let credentials = state
        .db
        .get_staff_by_email(&req.email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            other => port_failure("Failed to log in", other),
        })?;

    let parsed_hash = PasswordHash::new(&credentials.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let auth_session_id = Uuid::new_v4().to_string();
    let lifetime = Duration::days(state.config.auth_session_days);
    state
        .db
        .create_auth_session(
            &auth_session_id,
            credentials.user.user_id,
            Utc::now() + lifetime,
        )
        .await
        .map_err(|e| port_failure("Failed to create session", e))?;

    info!("{} logged in", credentials.user.email);
    let cookie = session_cookie_header(&auth_session_id, lifetime.num_seconds());
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AccountResponse::from(credentials.user)),
    ))
}

/// POST /auth/logout - Logout and invalidate the login session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| port_failure("Failed to logout", e))?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie_header("", 0))],
    ))
}

/// GET /auth/me - The account behind the current session
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me_handler(Extension(staff): Extension<StaffUser>) -> Json<AccountResponse> {
    Json(AccountResponse::from(staff))
}

/// POST /auth/staff - Create a staff or administrator account (administrators only)
#[utoipa::path(
    post,
    path = "/auth/staff",
    request_body = CreateStaffRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid role or empty password"),
        (status = 403, description = "Not an administrator"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_staff_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStaffRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let role = Role::parse(&req.role).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown role '{}'", req.role),
        )
    })?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Email and password are required".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        error!("Failed to hash password: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to hash password".to_string(),
        )
    })?;

    let user = state
        .db
        .create_staff(req.email.trim(), &password_hash, role)
        .await
        .map_err(|e| port_failure("Failed to create account", e))?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(user))))
}
