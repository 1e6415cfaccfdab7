//! services/api/src/web/transfers.rs
//!
//! Copies selected rows of the active school year into another year.

use crate::web::{port_failure, state::AppState, HandlerError};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    Extension,
};
use school_core::domain::{StaffUser, YearId};
use school_core::year_scope::{transfer, TransferError, TransferKind, TransferReport, TransferRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

/// What a transfer copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferKindBody {
    Classes,
    Subjects,
    Students,
    Teachers,
    Rules,
    Periods,
    Payments,
    Expenses,
}

impl From<TransferKindBody> for TransferKind {
    fn from(kind: TransferKindBody) -> Self {
        match kind {
            TransferKindBody::Classes => TransferKind::Classes,
            TransferKindBody::Subjects => TransferKind::Subjects,
            TransferKindBody::Students => TransferKind::Students,
            TransferKindBody::Teachers => TransferKind::Teachers,
            TransferKindBody::Rules => TransferKind::Rules,
            TransferKindBody::Periods => TransferKind::Periods,
            TransferKindBody::Payments => TransferKind::Payments,
            TransferKindBody::Expenses => TransferKind::Expenses,
        }
    }
}

impl From<TransferKind> for TransferKindBody {
    fn from(kind: TransferKind) -> Self {
        match kind {
            TransferKind::Classes => TransferKindBody::Classes,
            TransferKind::Subjects => TransferKindBody::Subjects,
            TransferKind::Students => TransferKindBody::Students,
            TransferKind::Teachers => TransferKindBody::Teachers,
            TransferKind::Rules => TransferKindBody::Rules,
            TransferKind::Periods => TransferKindBody::Periods,
            TransferKind::Payments => TransferKindBody::Payments,
            TransferKind::Expenses => TransferKindBody::Expenses,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct TransferRequestBody {
    pub kind: TransferKindBody,
    pub destination_year_id: i64,
    /// Ids in the active (source) year.
    pub ids: Vec<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct TransferResponse {
    pub kind: TransferKindBody,
    pub source_year_id: i64,
    pub destination_year_id: i64,
    pub requested: usize,
    pub transferred: usize,
    pub created_ids: Vec<i64>,
    /// Classes created in the destination year to hold subjects or students.
    pub class_stubs: Vec<i64>,
    /// Requested ids that were not found in the source year.
    pub missing: Vec<i64>,
    /// Requested ids whose class or student has no counterpart.
    pub orphaned: Vec<i64>,
    /// Set when a storage failure stopped the transfer early; the other
    /// fields describe what was copied before it.
    pub aborted: Option<String>,
}

impl TransferResponse {
    fn new(request: &TransferRequest, report: TransferReport, aborted: Option<String>) -> Self {
        Self {
            kind: report.kind.into(),
            source_year_id: request.source.0,
            destination_year_id: request.destination.0,
            requested: report.requested,
            transferred: report.transferred(),
            created_ids: report.created_ids,
            class_stubs: report.class_stubs,
            missing: report.missing,
            orphaned: report.orphaned,
            aborted,
        }
    }
}

/// Duplicate rows into another school year (administrators only).
///
/// Source rows are never changed. Repeating a transfer creates another set of copies.
#[utoipa::path(
    post,
    path = "/transfers",
    request_body = TransferRequestBody,
    responses(
        (status = 200, description = "Transfer outcome", body = TransferResponse),
        (status = 400, description = "Same source and destination"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Destination year not found"),
        (status = 422, description = "Unknown kind"),
        (status = 500, description = "Stopped early; body lists the rows already copied", body = TransferResponse)
    ),
    params(("x-school-year-id" = i64, Header, description = "Source school year."))
)]
pub async fn transfer_handler(
    State(state): State<Arc<AppState>>,
    Extension(year): Extension<YearId>,
    Extension(staff): Extension<StaffUser>,
    Json(body): Json<TransferRequestBody>,
) -> Result<(StatusCode, Json<TransferResponse>), HandlerError> {
    let request = TransferRequest {
        kind: body.kind.into(),
        source: year,
        destination: YearId(body.destination_year_id),
        ids: body.ids,
    };

    match transfer(state.db.as_ref(), &request).await {
        Ok(report) => {
            info!(
                "{} transferred {}/{} {:?} from year {} to year {} ({} class stubs, {} missing, {} orphaned)",
                staff.email,
                report.transferred(),
                report.requested,
                request.kind,
                request.source,
                request.destination,
                report.class_stubs.len(),
                report.missing.len(),
                report.orphaned.len()
            );
            Ok((StatusCode::OK, Json(TransferResponse::new(&request, report, None))))
        }
        Err(TransferError::Aborted { partial, cause }) => {
            error!(
                "Transfer of {:?} from year {} to year {} stopped after {} rows: {}",
                request.kind,
                request.source,
                request.destination,
                partial.transferred(),
                cause
            );
            let reason = format!("Transfer stopped after {} rows", partial.transferred());
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TransferResponse::new(&request, partial, Some(reason))),
            ))
        }
        Err(TransferError::Rejected(e)) => Err(port_failure("Failed to transfer", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_read_in_lowercase() {
        let body: TransferRequestBody = serde_json::from_str(
            r#"{"kind": "payments", "destination_year_id": 2, "ids": [4, 4]}"#,
        )
        .unwrap();
        assert_eq!(body.kind, TransferKindBody::Payments);
        assert_eq!(TransferKind::from(body.kind), TransferKind::Payments);
        assert_eq!(body.ids, vec![4, 4]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let parsed = serde_json::from_str::<TransferRequestBody>(
            r#"{"kind": "grades", "destination_year_id": 2, "ids": []}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn aborted_response_keeps_the_partial_copy() {
        let request = TransferRequest {
            kind: TransferKind::Classes,
            source: YearId(1),
            destination: YearId(2),
            ids: vec![10, 11],
        };
        let partial = TransferReport {
            kind: TransferKind::Classes,
            requested: 2,
            created_ids: vec![31],
            class_stubs: vec![],
            missing: vec![],
            orphaned: vec![],
        };
        let body = serde_json::to_value(TransferResponse::new(
            &request,
            partial,
            Some("Transfer stopped after 1 rows".to_string()),
        ))
        .unwrap();

        assert_eq!(body["kind"], "classes");
        assert_eq!(body["transferred"], 1);
        assert_eq!(body["created_ids"], serde_json::json!([31]));
        assert_eq!(body["aborted"], "Transfer stopped after 1 rows");
    }
}
