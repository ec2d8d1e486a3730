// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Site price configurator: catalog, quotes and submissions.

use crate::app::{AdminScope, AppState, ClientIp, SiteDb};
use crate::error::{ApiError, ApiResult};
use crate::models::common::MessageResponse;
use crate::models::configurator::{
    ConfiguratorData, Quote, Selection, SubmitConfigurationRequest, SubmitConfigurationResponse,
};
use crate::models::settings::CONFIGURATOR_KEY;
use crate::routes::{deliver_to_telegram, enforce_rate_limit};
use crate::services::configurator::{quote_selection, validate_data};
use crate::services::db::SqliteClient;
use crate::services::logging::anonymize_phone;
use crate::services::telegram::format_configurator;
use crate::services::validation::{max_chars, normalize_name, normalize_phone, MESSAGE_MAX_CHARS};
use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/configurator", get(get_configurator_handler))
        .route("/configurator/quote", post(quote_handler))
        .route("/configurator/submit", post(submit_handler))
        .route("/admin/configurator", put(update_configurator_handler))
}

async fn load_configurator(db: &SqliteClient) -> ApiResult<ConfiguratorData> {
    db.get_setting_as::<ConfiguratorData>(CONFIGURATOR_KEY)
        .await?
        .ok_or_else(|| ApiError::not_found("Configurator"))
}

/// GET /api/configurator
#[utoipa::path(
    get,
    path = "/api/configurator",
    tag = "configurator",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Configurator catalog", body = ConfiguratorData),
        (status = 404, description = "No configurator for this site", body = MessageResponse)
    )
)]
pub async fn get_configurator_handler(SiteDb(db): SiteDb) -> ApiResult<Json<ConfiguratorData>> {
    load_configurator(&db).await.map(Json)
}

/// POST /api/configurator/quote - Price a selection.
#[utoipa::path(
    post,
    path = "/api/configurator/quote",
    tag = "configurator",
    request_body = Selection,
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Priced selection", body = Quote),
        (status = 400, description = "Unknown site type, module, tier or package", body = MessageResponse),
        (status = 404, description = "No configurator for this site", body = MessageResponse)
    )
)]
pub async fn quote_handler(
    SiteDb(db): SiteDb,
    Json(selection): Json<Selection>,
) -> ApiResult<Json<Quote>> {
    let data = load_configurator(&db).await?;
    Ok(Json(quote_selection(&data, &selection)?))
}

/// POST /api/configurator/submit - Price a selection and forward it with contacts.
#[utoipa::path(
    post,
    path = "/api/configurator/submit",
    tag = "configurator",
    request_body = SubmitConfigurationRequest,
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Submission delivered", body = SubmitConfigurationResponse),
        (status = 400, description = "Invalid contact or selection", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = MessageResponse),
        (status = 502, description = "Telegram rejected the message", body = MessageResponse),
        (status = 503, description = "Telegram is not configured", body = MessageResponse)
    )
)]
pub async fn submit_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SiteDb(db): SiteDb,
    Json(payload): Json<SubmitConfigurationRequest>,
) -> ApiResult<Json<SubmitConfigurationResponse>> {
    enforce_rate_limit(&state.lead_limiter, ip)?;

    let name = normalize_name(&payload.name)?;
    let phone = normalize_phone(&payload.phone)?;
    max_chars("comment", payload.comment.as_deref(), MESSAGE_MAX_CHARS)?;

    let data = load_configurator(&db).await?;
    let quote = quote_selection(&data, &payload.selection)?;

    let text = format_configurator(
        db.site(),
        &name,
        &phone,
        payload.comment.as_deref().map(str::trim),
        &quote,
    );
    deliver_to_telegram(&state, &db, &text).await?;

    tracing::info!(
        site = db.site(),
        total_cents = quote.total_cents,
        phone = %anonymize_phone(&phone),
        "Configurator request delivered"
    );

    Ok(Json(SubmitConfigurationResponse {
        success: true,
        quote,
    }))
}

/// PUT /api/admin/configurator - Replace the site's configurator catalog.
async fn update_configurator_handler(
    scope: AdminScope,
    Json(data): Json<ConfiguratorData>,
) -> ApiResult<Json<ConfiguratorData>> {
    validate_data(&data)?;
    let value = serde_json::to_value(&data)
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("Failed to encode configurator")))?;
    scope.db.set_setting(CONFIGURATOR_KEY, &value).await?;

    tracing::info!(
        site = scope.db.site(),
        site_types = data.site_types.len(),
        modules = data.modules.len(),
        packages = data.packages.len(),
        by = %scope.user.username,
        "Configurator updated"
    );
    Ok(Json(data))
}
