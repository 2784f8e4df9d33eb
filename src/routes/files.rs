use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{NewStoredFile, StoredFile};
use crate::state::AppState;
use crate::uploads::storage_name;

#[derive(Serialize, Clone)]
pub struct FileResponse {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FileResponse {
    pub fn new(config: &AppConfig, file: StoredFile) -> Self {
        let url = config.file_url(&file.path);
        Self {
            id: file.id,
            name: file.name,
            path: file.path,
            url,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
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
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

/// Reads one multipart form field by name and returns its filename and
/// bytes. Other fields are drained and ignored.
pub(crate) async fn read_upload_field(
    multipart: &mut Multipart,
    field_name: &str,
) -> AppResult<Option<(String, Vec<u8>)>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        tracing::error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|err| {
            tracing::error!(error = %err, "failed to read upload bytes");
            AppError::bad_request(format!("failed to read upload bytes: {err}"))
        })?;
        upload = Some((file_name, data.to_vec()));
    }

    Ok(upload)
}

/// Stores the uploaded bytes under a generated name and records the file
/// row the rest of the API references.
pub(crate) async fn store_upload(
    state: &AppState,
    original_name: String,
    bytes: Vec<u8>,
) -> AppResult<StoredFile> {
    let path = storage_name(&original_name);
    let name = if original_name.is_empty() {
        path.clone()
    } else {
        original_name
    };

    state.uploads.save(&path, bytes).await?;
    let file = state
        .store
        .create_file(
            NewStoredFile {
                id: Uuid::new_v4(),
                name,
                path,
            },
            state.clock.now(),
        )
        .await?;

    tracing::info!(file_id = %file.id, path = %file.path, "upload stored");
    Ok(file)
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<FileResponse>> {
    let (name, bytes) = read_upload_field(&mut multipart, "file")
        .await?
        .ok_or_else(|| AppError::bad_request("File not sent."))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("File not sent."));
    }

    let file = store_upload(&state, name, bytes).await?;
    Ok(Json(FileResponse::new(&state.config, file)))
}

/// Serves stored bytes by their generated name. Unlike the API proper this
/// route is public; the names are unguessable.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Response> {
    let file = state
        .store
        .find_file_by_path(&path)
        .await?
        .ok_or_else(|| AppError::not_found("File not found."))?;

    let bytes = state
        .uploads
        .load(&file.path)
        .await?
        .ok_or_else(|| AppError::not_found("File not found."))?;

    let mime = mime_guess::from_path(&file.path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref()).map_err(AppError::internal)?,
    );
    if let Some(disposition) = inline_content_disposition(&file.name) {
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok((headers, bytes).into_response())
}
