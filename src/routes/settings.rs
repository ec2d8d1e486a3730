// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Per-site key/value settings.

use crate::app::{AdminScope, AppState, SiteDb};
use crate::error::{ApiError, ApiResult};
use crate::models::common::MessageResponse;
use crate::models::configurator::ConfiguratorData;
use crate::models::settings::{SetSettingRequest, SettingResponse, CONFIGURATOR_KEY};
use crate::routes::found_or_404;
use crate::services::configurator::validate_data;
use crate::services::validation::validate_setting_key;
use axum::{
    extract::Path,
    routing::{get, put},
    Json, Router,
};
use serde_json::{Map, Value};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(public_settings_handler))
        .route("/admin/settings", get(all_settings_handler))
        .route(
            "/admin/settings/{key}",
            put(set_setting_handler).delete(delete_setting_handler),
        )
}

/// The configurator key only accepts a valid configurator catalog.
fn check_known_shape(key: &str, value: &Value) -> ApiResult<()> {
    if key == CONFIGURATOR_KEY {
        let data: ConfiguratorData = serde_json::from_value(value.clone())
            .map_err(|e| ApiError::bad_request(format!("Invalid configurator data: {e}")))?;
        validate_data(&data)?;
    }
    Ok(())
}

/// GET /api/settings - Public settings only.
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Public settings as one JSON object keyed by name")
    )
)]
pub async fn public_settings_handler(SiteDb(db): SiteDb) -> ApiResult<Json<Map<String, Value>>> {
    Ok(Json(db.settings_map(false).await?))
}

/// GET /api/admin/settings
async fn all_settings_handler(
    AdminScope { db, .. }: AdminScope,
) -> ApiResult<Json<Map<String, Value>>> {
    Ok(Json(db.settings_map(true).await?))
}

/// PUT /api/admin/settings/{key}
async fn set_setting_handler(
    scope: AdminScope,
    Path(key): Path<String>,
    Json(payload): Json<SetSettingRequest>,
) -> ApiResult<Json<SettingResponse>> {
    validate_setting_key(&key)?;
    check_known_shape(&key, &payload.value)?;

    scope.db.set_setting(&key, &payload.value).await?;
    tracing::info!(site = scope.db.site(), key = %key, by = %scope.user.username, "Setting updated");

    Ok(Json(SettingResponse {
        key,
        value: payload.value,
    }))
}

/// DELETE /api/admin/settings/{key}
async fn delete_setting_handler(
    AdminScope { db, .. }: AdminScope,
    Path(key): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    validate_setting_key(&key)?;
    found_or_404(db.delete_setting(&key).await?, "Setting")?;
    Ok(Json(MessageResponse::ok("Setting deleted")))
}
