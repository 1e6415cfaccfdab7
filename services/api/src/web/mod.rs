pub mod auth;
pub mod finance;
pub mod grades;
pub mod middleware;
pub mod reports;
pub mod rest;
pub mod router;
pub mod rules;
pub mod state;
pub mod transfers;

use axum::http::StatusCode;
use school_core::ports::PortError;
use tracing::error;

pub use middleware::{require_admin, require_auth, require_year_scope};
pub use router::build_router;

/// The error shape every handler returns.
pub type HandlerError = (StatusCode, String);

/// Logs a port failure and maps it to an HTTP status plus a client-safe message.
pub(crate) fn port_failure(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}
