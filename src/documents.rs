//! Document record store. Every function takes the connection it runs on, so
//! callers decide the transaction boundaries.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{DocumentStatus, Section};
use crate::models::{Document, NewDocument};
use crate::schema::{approvals, documents};

#[derive(Debug, Clone)]
pub struct NewDocumentInput {
    pub title: String,
    pub description: Option<String>,
    pub section: Section,
    pub sub_section: String,
    pub file_path: String,
    pub file_type: String,
}

#[derive(Debug, Default, Clone)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub sub_section: Option<String>,
    pub status: Option<DocumentStatus>,
}

#[derive(AsChangeset)]
#[diesel(table_name = documents)]
struct DocumentChangeset<'a> {
    title: Option<&'a str>,
    description: Option<Option<&'a str>>,
    sub_section: Option<&'a str>,
    status: Option<&'static str>,
    updated_at: chrono::NaiveDateTime,
}

pub fn list(conn: &mut PgConnection, section: Option<Section>) -> QueryResult<Vec<Document>> {
    let mut query = documents::table.into_boxed();
    if let Some(section) = section {
        query = query.filter(documents::section.eq(section.as_str()));
    }

    query
        .order((documents::created_at.desc(), documents::id.asc()))
        .load(conn)
}

pub fn get(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<Document>> {
    documents::table.find(id).first(conn).optional()
}

pub fn create(
    conn: &mut PgConnection,
    input: NewDocumentInput,
    creator_id: Uuid,
) -> QueryResult<Document> {
    let now = Utc::now().naive_utc();
    let new_document = NewDocument {
        id: Uuid::new_v4(),
        title: input.title,
        description: input.description,
        section: input.section.as_str().to_string(),
        sub_section: input.sub_section,
        file_path: input.file_path,
        file_type: input.file_type,
        status: DocumentStatus::Pending.as_str().to_string(),
        created_at: now,
        updated_at: now,
        created_by_id: creator_id,
    };

    diesel::insert_into(documents::table)
        .values(&new_document)
        .get_result(conn)
}

/// Applies `changes` and stamps `updated_at`. `None` when the document does not exist.
pub fn update(
    conn: &mut PgConnection,
    id: Uuid,
    changes: &DocumentChanges,
) -> QueryResult<Option<Document>> {
    let changeset = DocumentChangeset {
        title: changes.title.as_deref(),
        description: changes
            .description
            .as_ref()
            .map(|value| value.as_deref()),
        sub_section: changes.sub_section.as_deref(),
        status: changes.status.map(|status| status.as_str()),
        updated_at: Utc::now().naive_utc(),
    };

    diesel::update(documents::table.find(id))
        .set(&changeset)
        .get_result(conn)
        .optional()
}

/// Hard-deletes the document together with its approval ledger. Returns the
/// removed row so the caller can clean up the stored file.
pub fn delete(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<Document>> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let locked = documents::table
            .find(id)
            .select(documents::id)
            .for_update()
            .first::<Uuid>(conn)
            .optional()?;
        if locked.is_none() {
            return Ok(None);
        }

        diesel::delete(approvals::table.filter(approvals::document_id.eq(id))).execute(conn)?;
        diesel::delete(documents::table.find(id))
            .get_result(conn)
            .optional()
    })
}
