// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Email subscriptions and newsletter mailings.

use crate::app::{AdminScope, AppState, ClientIp, SiteDb, StaffScope};
use crate::error::{ApiError, ApiResult};
use crate::models::common::{ListResponse, MessageResponse};
use crate::models::newsletter::{
    Newsletter, NewsletterInput, SendNewsletterResponse, SubscribeRequest, SubscribeResponse,
    Subscription, SubscriptionQuery,
};
use crate::routes::{enforce_rate_limit, found_or_404};
use crate::services::auth::AuthService;
use crate::services::db::SqliteClient;
use crate::services::logging::anonymize_email;
use crate::services::newsletter_db::NewsletterClaim;
use crate::services::validation::{max_chars, normalize_email, require_text, NAME_MAX_CHARS};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

const SUBJECT_MAX_CHARS: usize = 200;
const BODY_MAX_CHARS: usize = 100_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", post(subscribe_handler))
        .route("/subscriptions/unsubscribe/{token}", get(unsubscribe_handler))
        .route("/admin/subscriptions", get(list_subscriptions_handler))
        .route("/admin/subscriptions/{id}", delete(delete_subscription_handler))
        .route(
            "/admin/newsletters",
            get(list_newsletters_handler).post(create_newsletter_handler),
        )
        .route(
            "/admin/newsletters/{id}",
            put(update_newsletter_handler).delete(delete_newsletter_handler),
        )
        .route("/admin/newsletters/{id}/send", post(send_newsletter_handler))
}

// ============================================================================
// Subscriptions
// ============================================================================

/// POST /api/subscriptions
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    tag = "subscriptions",
    request_body = SubscribeRequest,
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Subscribed or already subscribed", body = SubscribeResponse),
        (status = 400, description = "Invalid email", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = MessageResponse)
    )
)]
pub async fn subscribe_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SiteDb(db): SiteDb,
    Json(payload): Json<SubscribeRequest>,
) -> ApiResult<Json<SubscribeResponse>> {
    enforce_rate_limit(&state.lead_limiter, ip)?;

    let email = normalize_email(&payload.email)?;
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    max_chars("name", name, NAME_MAX_CHARS)?;

    let (_, created) = db.subscribe(&email, name).await?;
    if created {
        tracing::info!(site = db.site(), email = %anonymize_email(&email), "Subscribed");
    }

    Ok(Json(SubscribeResponse {
        success: true,
        message: if created {
            "Subscribed".to_string()
        } else {
            "Already subscribed".to_string()
        },
        created,
    }))
}

/// GET /api/subscriptions/unsubscribe/{token}
#[utoipa::path(
    get,
    path = "/api/subscriptions/unsubscribe/{token}",
    tag = "subscriptions",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("token" = String, Path, description = "Token from the newsletter link")
    ),
    responses(
        (status = 200, description = "Unsubscribed", body = MessageResponse),
        (status = 404, description = "Subscription not found", body = MessageResponse)
    )
)]
pub async fn unsubscribe_handler(
    SiteDb(db): SiteDb,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let subscription = db
        .unsubscribe(&AuthService::hash_token(&token))
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription"))?;

    tracing::info!(
        site = db.site(),
        email = %anonymize_email(&subscription.email),
        "Unsubscribed"
    );
    Ok(Json(MessageResponse::ok("You have been unsubscribed")))
}

/// GET /api/admin/subscriptions?status=
async fn list_subscriptions_handler(
    StaffScope { db, .. }: StaffScope,
    Query(query): Query<SubscriptionQuery>,
) -> ApiResult<Json<ListResponse<Subscription>>> {
    Ok(Json(db.list_subscriptions(query.status).await?.into()))
}

/// DELETE /api/admin/subscriptions/{id}
async fn delete_subscription_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_subscription(id).await?, "Subscription")?;
    Ok(Json(MessageResponse::ok("Subscription deleted")))
}

// ============================================================================
// Newsletters
// ============================================================================

fn validate_newsletter(input: NewsletterInput) -> ApiResult<NewsletterInput> {
    let subject = require_text("subject", &input.subject)?;
    max_chars("subject", Some(&subject), SUBJECT_MAX_CHARS)?;
    let body = require_text("body", &input.body)?;
    max_chars("body", Some(&body), BODY_MAX_CHARS)?;
    Ok(NewsletterInput { subject, body })
}

/// 404 when the newsletter is missing, 409 when it exists but was already sent.
async fn missing_or_sent(db: &SqliteClient, id: i64) -> ApiError {
    match db.get_newsletter(id).await {
        Ok(Some(_)) => ApiError::conflict("Newsletter has already been sent"),
        Ok(None) => ApiError::not_found("Newsletter"),
        Err(e) => e.into(),
    }
}

/// GET /api/admin/newsletters
async fn list_newsletters_handler(
    AdminScope { db, .. }: AdminScope,
) -> ApiResult<Json<ListResponse<Newsletter>>> {
    Ok(Json(db.list_newsletters().await?.into()))
}

/// POST /api/admin/newsletters
async fn create_newsletter_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<NewsletterInput>,
) -> ApiResult<(StatusCode, Json<Newsletter>)> {
    let input = validate_newsletter(payload)?;
    Ok((StatusCode::CREATED, Json(db.create_newsletter(&input).await?)))
}

/// PUT /api/admin/newsletters/{id} - Drafts only.
async fn update_newsletter_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<NewsletterInput>,
) -> ApiResult<Json<Newsletter>> {
    let input = validate_newsletter(payload)?;
    match db.update_newsletter(id, &input).await? {
        Some(newsletter) => Ok(Json(newsletter)),
        None => Err(missing_or_sent(&db, id).await),
    }
}

/// DELETE /api/admin/newsletters/{id}
async fn delete_newsletter_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_newsletter(id).await?, "Newsletter")?;
    Ok(Json(MessageResponse::ok("Newsletter deleted")))
}

/// POST /api/admin/newsletters/{id}/send - Mail every active subscriber.
///
/// The newsletter is claimed together with its recipient list before the first
/// email goes out, so it is sent at most once. Each copy carries its own
/// unsubscribe token; links from earlier mailings keep working.
async fn send_newsletter_handler(
    State(state): State<AppState>,
    scope: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<SendNewsletterResponse>> {
    let email = state
        .email
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Email is not configured".to_string()))?;
    let db = scope.db;

    let Some(NewsletterClaim {
        newsletter,
        recipients,
    }) = db.claim_newsletter_for_sending(id).await?
    else {
        return Err(missing_or_sent(&db, id).await);
    };

    let mut sent: i64 = 0;
    let mut failed: i64 = 0;

    for recipient in &recipients {
        let token = match db.issue_unsubscribe_token(recipient.id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(subscription_id = recipient.id, error = %e, "Failed to issue unsubscribe token");
                failed += 1;
                continue;
            }
        };

        match email
            .send_newsletter(
                &recipient.email,
                &newsletter.subject,
                &newsletter.body,
                db.site(),
                &token,
            )
            .await
        {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::warn!(
                    email = %anonymize_email(&recipient.email),
                    error = %e,
                    "Newsletter delivery failed"
                );
                failed += 1;
            }
        }
    }

    // The mailing already went out; a failed count update must not hide that
    if let Err(e) = db.set_newsletter_recipients(id, sent).await {
        tracing::error!(newsletter_id = id, sent, error = %e, "Failed to record newsletter recipients");
    }

    tracing::info!(
        site = db.site(),
        newsletter_id = id,
        sent,
        failed,
        by = %scope.user.username,
        "Newsletter sent"
    );

    Ok(Json(SendNewsletterResponse {
        success: failed == 0,
        recipients_count: sent,
        failed_count: failed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newsletter_validation_trims() {
        let input = validate_newsletter(NewsletterInput {
            subject: "  Spring news ".to_string(),
            body: "Hello".to_string(),
        })
        .unwrap();
        assert_eq!(input.subject, "Spring news");

        assert!(validate_newsletter(NewsletterInput {
            subject: " ".to_string(),
            body: "Hello".to_string(),
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_missing_or_sent_distinguishes() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let draft = db
            .create_newsletter(&NewsletterInput {
                subject: "News".to_string(),
                body: "Body".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(missing_or_sent(&db, 999).await, ApiError::NotFound(_)));

        db.claim_newsletter_for_sending(draft.id).await.unwrap();
        assert!(matches!(missing_or_sent(&db, draft.id).await, ApiError::Conflict(_)));
    }
}
