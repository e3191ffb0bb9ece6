use std::path::Path as FsPath;

use axum::async_trait;
use axum::extract::{FromRequestParts, Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{request::Parts, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::documents::{self, NewDocumentInput};
use crate::domain::Section;
use crate::error::{AppError, AppResult};
use crate::models::Document;
use crate::state::AppState;
use crate::storage::is_missing_file;

const MAX_TITLE_LENGTH: usize = 255;

/// The `:id` path segment. A segment that is not a UUID names no document
/// and is answered with the JSON 404.
#[derive(Debug, Clone, Copy)]
pub struct DocumentId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for DocumentId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::not_found())?;
        raw.parse::<Uuid>()
            .map(Self)
            .map_err(|_| AppError::not_found())
    }
}

#[derive(Deserialize)]
pub struct DocumentListQuery {
    pub section: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub section: String,
    pub sub_section: String,
    pub file_path: String,
    pub file_type: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_id: Uuid,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            section: doc.section,
            sub_section: doc.sub_section,
            file_path: doc.file_path,
            file_type: doc.file_type,
            status: doc.status,
            created_at: to_iso(doc.created_at),
            updated_at: to_iso(doc.updated_at),
            created_by_id: doc.created_by_id,
        }
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let section = match params.section.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(
            value
                .parse::<Section>()
                .map_err(|_| AppError::bad_request("unknown section"))?,
        ),
    };

    let mut conn = state.db()?;
    let docs = documents::list(&mut conn, section)?;

    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    DocumentId(document_id): DocumentId,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let doc = documents::get(&mut conn, document_id)?.ok_or_else(AppError::not_found)?;
    Ok(Json(doc.into()))
}

pub async fn download_document(
    State(state): State<AppState>,
    DocumentId(document_id): DocumentId,
) -> AppResult<Response> {
    let doc = {
        let mut conn = state.db()?;
        documents::get(&mut conn, document_id)?.ok_or_else(AppError::not_found)?
    };

    let bytes = state
        .storage
        .read_file(&doc.file_path)
        .await
        .map_err(|err| {
            if is_missing_file(&err) {
                warn!(document_id = %doc.id, path = %doc.file_path, "stored file is missing");
                AppError::not_found()
            } else {
                AppError::internal(err)
            }
        })?;

    let content_type = mime_guess::from_path(&doc.file_path)
        .first_or_octet_stream()
        .to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&content_type).map_err(AppError::internal)?,
    );
    if let Some(disposition) = inline_content_disposition(&download_filename(&doc)) {
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition).map_err(AppError::internal)?,
        );
    }

    Ok((headers, bytes).into_response())
}

pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let original_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            form.set_file(original_name, data)?;
        } else {
            let value = field.text().await?;
            form.set_text(&name, value)?;
        }
    }

    let upload = form.validate().inspect_err(|err| {
        warn!(user_id = %user.user_id, reason = %err.message(), "upload rejected");
    })?;

    let stored_name = stored_file_name(&upload.file_type);
    let file_path = state
        .storage
        .put_file(&stored_name, upload.bytes)
        .await
        .map_err(|err| {
            error!(error = %err, name = %stored_name, "failed to store upload");
            AppError::internal(err)
        })?;

    let input = NewDocumentInput {
        title: upload.title,
        description: upload.description,
        section: upload.section,
        sub_section: upload.sub_section,
        file_path: file_path.clone(),
        file_type: upload.file_type,
    };

    let created = match state.db() {
        Ok(mut conn) => documents::create(&mut conn, input, user.user_id).map_err(AppError::from),
        Err(err) => Err(err),
    };

    match created {
        Ok(doc) => {
            info!(
                document_id = %doc.id,
                section = %doc.section,
                created_by = %user.user_id,
                "document upload succeeded"
            );
            Ok((StatusCode::CREATED, Json(doc.into())))
        }
        Err(err) => {
            if let Err(cleanup) = state.storage.delete_file(&file_path).await {
                warn!(error = %cleanup, path = %file_path, "failed to remove orphaned upload");
            }
            Err(err)
        }
    }
}

pub async fn delete_document(
    State(state): State<AppState>,
    DocumentId(document_id): DocumentId,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let removed = {
        let mut conn = state.db()?;
        documents::delete(&mut conn, document_id)?
    };
    let doc = removed.ok_or_else(AppError::not_found)?;

    if let Err(err) = state.storage.delete_file(&doc.file_path).await {
        warn!(document_id = %doc.id, error = %err, "failed to delete stored file");
    }

    info!(document_id = %doc.id, deleted_by = %user.user_id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug)]
pub(crate) struct ValidatedUpload {
    pub title: String,
    pub description: Option<String>,
    pub section: Section,
    pub sub_section: String,
    pub file_type: String,
    pub bytes: Bytes,
}

/// Accumulates the multipart fields of an upload. Only the known fields are
/// accepted and each may appear once.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    section: Option<String>,
    sub_section: Option<String>,
    file: Option<(String, Bytes)>,
}

impl UploadForm {
    pub(crate) fn set_text(&mut self, name: &str, value: String) -> AppResult<()> {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "section" => &mut self.section,
            "subSection" | "sub_section" => &mut self.sub_section,
            other => {
                return Err(AppError::bad_request(format!("unexpected field '{other}'")));
            }
        };

        if slot.is_some() {
            return Err(AppError::bad_request(format!("duplicate field '{name}'")));
        }
        *slot = Some(value);
        Ok(())
    }

    pub(crate) fn set_file(&mut self, original_name: String, bytes: Bytes) -> AppResult<()> {
        if self.file.is_some() {
            return Err(AppError::bad_request("only one file may be uploaded"));
        }
        self.file = Some((original_name, bytes));
        Ok(())
    }

    pub(crate) fn validate(self) -> AppResult<ValidatedUpload> {
        let (original_name, bytes) = self
            .file
            .ok_or_else(|| AppError::bad_request("no file uploaded"))?;
        if bytes.is_empty() {
            return Err(AppError::bad_request("file must not be empty"));
        }

        let title = required_text(self.title, "title")?;
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(AppError::bad_request("title is too long"));
        }

        let section = required_text(self.section, "section")?
            .parse::<Section>()
            .map_err(|_| AppError::bad_request("unknown section"))?;
        let sub_section = required_text(self.sub_section, "subSection")?;

        let description = self
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(ValidatedUpload {
            title,
            description,
            section,
            sub_section,
            file_type: derive_file_type(&original_name),
            bytes,
        })
    }
}

fn required_text(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

/// Extension of the uploaded file name without the leading dot; empty when there is none.
pub(crate) fn derive_file_type(original_name: &str) -> String {
    FsPath::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_string()
}

fn stored_file_name(file_type: &str) -> String {
    let safe_ext = !file_type.is_empty() && file_type.chars().all(|ch| ch.is_ascii_alphanumeric());
    if safe_ext {
        format!("{}.{}", Uuid::new_v4(), file_type.to_ascii_lowercase())
    } else {
        Uuid::new_v4().to_string()
    }
}

fn download_filename(doc: &Document) -> String {
    if doc.file_type.is_empty() {
        doc.title.clone()
    } else {
        format!("{}.{}", doc.title, doc.file_type)
    }
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() || !ch.is_ascii() => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
