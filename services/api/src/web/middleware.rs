//! services/api/src/web/middleware.rs
//!
//! Request guards: login session, administrator role and active school year.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use school_core::domain::{Role, StaffUser, YearId};
use school_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::{state::AppState, HandlerError};

/// Header carrying the school year a request operates on.
pub const YEAR_HEADER: &str = "x-school-year-id";

/// Name of the login session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Extracts the login session id from the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .filter(|id| !id.is_empty())
}

/// Reads the active school year from `x-school-year-id`.
///
/// A missing or malformed header is rejected; it never falls back to a
/// default year or to "all years".
pub fn year_from_headers(headers: &HeaderMap) -> Result<YearId, HandlerError> {
    let raw = headers
        .get(YEAR_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("{} header is required", YEAR_HEADER),
            )
        })?;
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(YearId)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid {} format", YEAR_HEADER),
            )
        })
}

/// Middleware that validates the login session cookie.
///
/// If valid, inserts the `StaffUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let staff = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            if !matches!(e, PortError::Unauthorized) {
                error!("Failed to validate auth session: {:?}", e);
            }
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(staff);
    Ok(next.run(req).await)
}

/// Middleware that only lets administrators through. Must run after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, StatusCode> {
    let staff = req
        .extensions()
        .get::<StaffUser>()
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if staff.role != Role::Administrator {
        warn!("{} attempted an administrator action", staff.email);
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(next.run(req).await)
}

/// Middleware that resolves `x-school-year-id` to an existing `YearId`.
///
/// Handlers receive the year as `Extension<YearId>` and pass it explicitly to
/// every port call.
pub async fn require_year_scope(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HandlerError> {
    let year = year_from_headers(req.headers())?;
    state.db.get_school_year(year).await.map_err(|e| match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        other => {
            error!("Failed to resolve school year {}: {:?}", year, other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to resolve school year".to_string(),
            )
        }
    })?;
    req.extensions_mut().insert(year);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn year_header_is_required() {
        let (status, _) = year_from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn year_header_must_be_a_positive_id() {
        for bad in ["abc", "0", "-3", ""] {
            let (status, _) = year_from_headers(&headers(&[(YEAR_HEADER, bad)])).unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(year_from_headers(&headers(&[(YEAR_HEADER, " 7 ")])).unwrap(), YearId(7));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let map = headers(&[("cookie", "theme=dark; session=abc-123; lang=fr")]);
        assert_eq!(session_cookie(&map), Some("abc-123"));
        assert_eq!(session_cookie(&headers(&[("cookie", "session=")])), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
