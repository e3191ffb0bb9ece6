//! Approval workflow: a decision is appended to the document's ledger and
//! overwrites the document's status in the same transaction. The latest
//! committed decision wins; the current status is never checked first.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use uuid::Uuid;

use crate::documents::{self, DocumentChanges};
use crate::domain::Decision;
use crate::error::AppError;
use crate::models::{Approval, Document, NewApproval};
use crate::schema::{approvals, documents as documents_table};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("document {0} does not exist")]
    UnknownDocument(Uuid),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Clone)]
pub struct NewDecision {
    pub status: Decision,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedDecision {
    pub approval: Approval,
    pub document: Document,
}

pub fn record_decision(
    conn: &mut PgConnection,
    document_id: Uuid,
    approver_id: Uuid,
    decision: NewDecision,
) -> WorkflowResult<RecordedDecision> {
    let outcome = conn.transaction::<_, WorkflowError, _>(|conn| {
        // Row lock orders concurrent decisions so the ledger tail matches the status.
        documents_table::table
            .find(document_id)
            .select(documents_table::id)
            .for_update()
            .first::<Uuid>(conn)
            .optional()?
            .ok_or(WorkflowError::UnknownDocument(document_id))?;

        let new_approval = NewApproval {
            id: Uuid::new_v4(),
            document_id,
            approver_id,
            status: decision.status.as_str().to_string(),
            comment: decision.comment,
            created_at: Utc::now().naive_utc(),
        };
        let approval: Approval = diesel::insert_into(approvals::table)
            .values(&new_approval)
            .get_result(conn)?;

        let changes = DocumentChanges {
            status: Some(decision.status.into()),
            ..Default::default()
        };
        let document = documents::update(conn, document_id, &changes)?
            .ok_or(WorkflowError::UnknownDocument(document_id))?;

        Ok(RecordedDecision { approval, document })
    });

    match outcome {
        Err(WorkflowError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            _,
        ))) => Err(WorkflowError::UnknownDocument(document_id)),
        other => other,
    }
}

/// The full ledger for a document, oldest decision first.
pub fn list_approvals(conn: &mut PgConnection, document_id: Uuid) -> QueryResult<Vec<Approval>> {
    approvals::table
        .filter(approvals::document_id.eq(document_id))
        .order((approvals::created_at.asc(), approvals::id.asc()))
        .load(conn)
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::UnknownDocument(_) => AppError::bad_request("invalid approval data"),
            WorkflowError::Database(err) => AppError::from(err),
        }
    }
}
