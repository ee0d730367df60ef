//! REST endpoints for the file exchange.
//!
//! POST /api/upload — store an encrypted blob (base64 JSON body)
//! GET /api/download/{fileId} — metadata + download accounting
//! GET /api/download/{fileId}/content — raw blob bytes
//! GET /api/files — list live files for a capability hash
//! DELETE /api/files/{fileId} — remove a file
//!
//! Every endpoint except upload takes the capability hash from the
//! `X-Access-Key-Hash` header; upload carries it in the body.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::AccessKeyHash;
use crate::db::models::FileRecord;
use crate::error::ApiError;
use crate::exchange::store;
use crate::state::AppState;

// --- Request/Response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    #[serde(default)]
    pub access_key_hash: String,
    /// Base64-encoded opaque ciphertext
    pub encrypted_data: Option<String>,
    /// Optional download cap; absent or -1 means unlimited
    pub max_downloads: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub file_id: String,
    pub size: i64,
    pub mime_type: String,
}

/// Summary entry for listings. Never carries the blob, and never echoes the
/// capability hash back out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub file_id: String,
    pub file_name: String,
    pub size: i64,
    pub mime_type: String,
    pub uploaded_at: String,
    pub expires_at: String,
    pub download_count: i64,
    pub max_downloads: i64,
}

impl From<FileRecord> for FileSummary {
    fn from(r: FileRecord) -> Self {
        FileSummary {
            file_id: r.file_id,
            file_name: r.file_name,
            size: r.size,
            mime_type: r.mime_type,
            uploaded_at: r.uploaded_at,
            expires_at: r.expires_at,
            download_count: r.download_count,
            max_downloads: r.max_downloads,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

// --- Handlers ---

/// POST /api/upload
///
/// Validates the capability hash and file id, decodes the payload, computes
/// `expiresAt` from the server clock plus the retention period, and persists
/// the record. The insert is a single statement, so a client never receives
/// a fileId for a record that did not durably persist.
pub async fn upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    if req.file_id.is_empty() || req.access_key_hash.is_empty() {
        return Err(ApiError::MissingField);
    }

    let blob = match &req.encrypted_data {
        Some(data) => STANDARD.decode(data).map_err(|_| ApiError::InvalidEncoding)?,
        None => Vec::new(),
    };

    let max_bytes = state.max_upload_size_mb as usize * 1024 * 1024;
    if blob.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    let size = blob.len() as i64;
    let now = Utc::now();
    let expires_at = store::timestamp(now + Duration::days(state.retention_days as i64));

    let record = FileRecord {
        file_id: req.file_id.clone(),
        file_name: req.file_name.unwrap_or_else(|| "file".to_string()),
        mime_type: req
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        access_key_hash: req.access_key_hash,
        uploaded_at: store::timestamp(now),
        expires_at: expires_at.clone(),
        size,
        download_count: 0,
        max_downloads: req.max_downloads.unwrap_or(-1),
    };

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || store::insert(&db, &record, &blob)).await??;

    tracing::debug!("Stored file {} ({} bytes)", req.file_id, size);

    Ok(Json(UploadResponse {
        success: true,
        file_id: req.file_id,
        expires_at,
    }))
}

/// GET /api/download/{fileId}
///
/// Returns file metadata and counts the download. An expired record is
/// evicted as a side effect and reported as 410; a record past its download
/// cap is refused without eviction (re-upload extends nothing).
pub async fn download(
    State(state): State<AppState>,
    AccessKeyHash(key_hash): AccessKeyHash,
    Path(file_id): Path<String>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let db = state.db.clone();

    let response = tokio::task::spawn_blocking(move || {
        let record = store::find_by_id_and_key(&db, &file_id, &key_hash)?
            .ok_or(ApiError::NotFound)?;

        if record.expires_at <= store::timestamp(Utc::now()) {
            store::delete(&db, &file_id)?;
            return Err(ApiError::Expired);
        }

        // The cap check and the increment are one atomic statement, so
        // concurrent downloads cannot overshoot max_downloads. A delete
        // racing the increment is fine: whichever write commits first wins
        // and the loser observes "not found".
        match store::increment_download_count(&db, &file_id, &key_hash)? {
            store::DownloadGate::Counted => Ok(DownloadResponse {
                file_id: record.file_id,
                size: record.size,
                mime_type: record.mime_type,
            }),
            store::DownloadGate::LimitReached => Err(ApiError::DownloadLimitReached),
            store::DownloadGate::Missing => Err(ApiError::NotFound),
        }
    })
    .await??;

    Ok(Json(response))
}

/// GET /api/download/{fileId}/content
///
/// Raw blob transport: the stored bytes, verbatim, with the stored mime type
/// as Content-Type. Same capability and expiry checks as the metadata
/// endpoint, but accounting stays with the metadata endpoint alone.
pub async fn download_content(
    State(state): State<AppState>,
    AccessKeyHash(key_hash): AccessKeyHash,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let db = state.db.clone();

    let (mime_type, blob) = tokio::task::spawn_blocking(move || {
        let record = store::find_by_id_and_key(&db, &file_id, &key_hash)?
            .ok_or(ApiError::NotFound)?;

        if record.expires_at <= store::timestamp(Utc::now()) {
            store::delete(&db, &file_id)?;
            return Err(ApiError::Expired);
        }

        let blob = store::fetch_blob(&db, &file_id, &key_hash)?.ok_or(ApiError::NotFound)?;
        Ok((record.mime_type, blob))
    })
    .await??;

    let content_type = HeaderValue::from_str(&mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));

    Ok(([(header::CONTENT_TYPE, content_type)], blob).into_response())
}

/// GET /api/files
///
/// All live (non-expired) files for the presented capability hash, newest
/// first. Expired records are silently omitted; the sweep reclaims them.
pub async fn list_files(
    State(state): State<AppState>,
    AccessKeyHash(key_hash): AccessKeyHash,
) -> Result<Json<ListResponse>, ApiError> {
    let db = state.db.clone();

    let records =
        tokio::task::spawn_blocking(move || store::list_by_key(&db, &key_hash, Utc::now()))
            .await??;

    Ok(Json(ListResponse {
        files: records.into_iter().map(FileSummary::from).collect(),
    }))
}

/// DELETE /api/files/{fileId}
///
/// Removes a file after verifying the capability match. 404 covers both a
/// genuinely absent record and a wrong capability.
pub async fn delete_file(
    State(state): State<AppState>,
    AccessKeyHash(key_hash): AccessKeyHash,
    Path(file_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || {
        store::find_by_id_and_key(&db, &file_id, &key_hash)?.ok_or(ApiError::NotFound)?;
        store::delete(&db, &file_id)?;
        Ok::<(), ApiError>(())
    })
    .await??;

    Ok(Json(DeleteResponse { success: true }))
}
