// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Admin file uploads.

use crate::app::{AdminScope, AppState};
use crate::error::{ApiError, ApiResult};
use crate::models::common::MessageResponse;
use crate::models::upload::UploadResponse;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/uploads", post(upload_handler))
        .route("/admin/uploads/{file}", delete(delete_upload_handler))
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("File exceeds the {max_bytes} byte limit"))
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// POST /api/admin/uploads - Store the `file` field under the current site.
async fn upload_handler(
    State(state): State<AppState>,
    scope: AdminScope,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let max_bytes = state.storage.max_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("The file field has no file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        let stored = state
            .storage
            .store(scope.db.site(), &original_name, &bytes)
            .await?;

        tracing::info!(
            site = scope.db.site(),
            file = %stored.file_name,
            by = %scope.user.username,
            "Upload stored"
        );

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                success: true,
                file_name: stored.file_name,
                url: stored.url,
                size: stored.size,
            }),
        ));
    }

    Err(ApiError::bad_request(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}

/// DELETE /api/admin/uploads/{file}
async fn delete_upload_handler(
    State(state): State<AppState>,
    AdminScope { db, .. }: AdminScope,
    Path(file): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.storage.delete(db.site(), &file).await?;
    Ok(Json(MessageResponse::ok("File deleted")))
}
