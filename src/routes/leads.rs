// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Contact form leads forwarded to Telegram.

use crate::app::{AppState, ClientIp, SiteDb};
use crate::error::ApiResult;
use crate::models::common::MessageResponse;
use crate::models::lead::{LeadRequest, LeadResponse};
use crate::routes::{deliver_to_telegram, enforce_rate_limit};
use crate::services::logging::anonymize_phone;
use crate::services::telegram::{format_lead, LeadMessage};
use crate::services::validation::{max_chars, normalize_name, normalize_phone, MESSAGE_MAX_CHARS};
use axum::{extract::State, routing::post, Json, Router};

const SOURCE_MAX_CHARS: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/leads", post(create_lead_handler))
}

/// POST /api/leads - Forward a contact form submission to the site's chat.
#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "leads",
    request_body = LeadRequest,
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Lead delivered", body = LeadResponse),
        (status = 400, description = "Invalid name, phone or message", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = MessageResponse),
        (status = 502, description = "Telegram rejected the message", body = MessageResponse),
        (status = 503, description = "Telegram is not configured", body = MessageResponse)
    )
)]
pub async fn create_lead_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SiteDb(db): SiteDb,
    Json(payload): Json<LeadRequest>,
) -> ApiResult<Json<LeadResponse>> {
    enforce_rate_limit(&state.lead_limiter, ip)?;

    let name = normalize_name(&payload.name)?;
    let phone = normalize_phone(&payload.phone)?;
    max_chars("message", payload.message.as_deref(), MESSAGE_MAX_CHARS)?;
    max_chars("source", payload.source.as_deref(), SOURCE_MAX_CHARS)?;

    let text = format_lead(
        db.site(),
        &LeadMessage {
            name: &name,
            phone: &phone,
            message: payload.message.as_deref().map(str::trim),
            source: payload.source.as_deref().map(str::trim),
        },
    );
    deliver_to_telegram(&state, &db, &text).await?;

    tracing::info!(site = db.site(), phone = %anonymize_phone(&phone), "Lead delivered");

    Ok(Json(LeadResponse {
        success: true,
        message: "Thank you! We will contact you soon.".to_string(),
    }))
}
