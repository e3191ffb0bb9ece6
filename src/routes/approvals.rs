use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::documents::{to_iso, DocumentId};
use crate::auth::AuthenticatedUser;
use crate::domain::Decision;
use crate::error::{AppError, AppResult};
use crate::models::Approval;
use crate::state::AppState;
use crate::workflow::{self, NewDecision};

const INVALID_APPROVAL: &str = "invalid approval data";

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct CreateApprovalRequest {
    pub status: Decision,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CreateApprovalRequest {
    /// Parses the raw body; any schema mismatch is reported as invalid approval data.
    pub fn parse(body: &[u8]) -> AppResult<NewDecision> {
        let request: CreateApprovalRequest = serde_json::from_slice(body).map_err(|err| {
            warn!(error = %err, "approval payload rejected");
            AppError::bad_request(INVALID_APPROVAL)
        })?;

        Ok(NewDecision {
            status: request.status,
            comment: request.comment,
        })
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub approver_id: Uuid,
    pub status: String,
    pub comment: Option<String>,
    pub created_at: String,
}

impl From<Approval> for ApprovalResponse {
    fn from(approval: Approval) -> Self {
        Self {
            id: approval.id,
            document_id: approval.document_id,
            approver_id: approval.approver_id,
            status: approval.status,
            comment: approval.comment,
            created_at: to_iso(approval.created_at),
        }
    }
}

pub async fn list_approvals(
    State(state): State<AppState>,
    DocumentId(document_id): DocumentId,
) -> AppResult<Json<Vec<ApprovalResponse>>> {
    let mut conn = state.db()?;
    let ledger = workflow::list_approvals(&mut conn, document_id)?;
    Ok(Json(ledger.into_iter().map(ApprovalResponse::from).collect()))
}

pub async fn create_approval(
    State(state): State<AppState>,
    DocumentId(document_id): DocumentId,
    user: AuthenticatedUser,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ApprovalResponse>)> {
    let decision = CreateApprovalRequest::parse(&body)?;

    let mut conn = state.db()?;
    let recorded = workflow::record_decision(&mut conn, document_id, user.user_id, decision)
        .map_err(|err| {
            warn!(document_id = %document_id, error = %err, "approval not recorded");
            AppError::from(err)
        })?;

    info!(
        document_id = %recorded.document.id,
        approval_id = %recorded.approval.id,
        approver_id = %user.user_id,
        status = %recorded.document.status,
        "approval decision recorded"
    );

    Ok((StatusCode::CREATED, Json(recorded.approval.into())))
}
