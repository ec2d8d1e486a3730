// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Route handlers for the HTTP API, one module per feature area.
//!
//! Every module exposes `router()`; paths are relative to `/api`.

pub mod auth;
pub mod blog;
pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod configurator;
pub mod content;
pub mod leads;
pub mod newsletters;
pub mod orders;
pub mod settings;
pub mod uploads;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::auth::{CreateUserRequest, LoginRequest, UserResponse, UserRole};
use crate::models::common::MessageResponse;
use crate::models::configurator::{
    AddonModule, ConfiguratorData, Discount, ModuleChoice, ModuleTier, Package, Quote, QuoteLine,
    Selection, SiteType, SubmitConfigurationRequest, SubmitConfigurationResponse,
};
use crate::models::lead::{LeadRequest, LeadResponse};
use crate::models::version::{HealthResponse, VersionResponse};
use crate::services::db::SqliteClient;
use crate::services::rate_limit::{retry_after_secs, RateLimiter};
use crate::services::telegram::TelegramClient;
use axum::Router;
use std::net::IpAddr;
use utoipa::OpenApi;

/// All `/api` routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(catalog::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(bookings::router())
        .merge(blog::router())
        .merge(content::router())
        .merge(newsletters::router())
        .merge(leads::router())
        .merge(configurator::router())
        .merge(settings::router())
        .merge(uploads::router())
}

/// OpenAPI document for every route a site frontend calls without a session,
/// plus the `auth` module. Admin routes serve the bundled panel and are left out.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::app::version_handler,
        crate::app::health_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::create_user_handler,
        catalog::list_categories_handler,
        catalog::get_category_handler,
        catalog::list_products_handler,
        catalog::get_product_handler,
        cart::get_cart_handler,
        cart::add_item_handler,
        cart::set_quantity_handler,
        cart::remove_item_handler,
        cart::clear_cart_handler,
        cart::checkout_handler,
        bookings::create_booking_handler,
        bookings::slots_handler,
        blog::list_posts_handler,
        blog::get_post_by_slug_handler,
        blog::list_tags_handler,
        content::list_portfolio_handler,
        content::get_portfolio_handler,
        content::list_reviews_handler,
        content::create_review_handler,
        content::list_contacts_handler,
        content::list_hexagons_handler,
        newsletters::subscribe_handler,
        newsletters::unsubscribe_handler,
        settings::public_settings_handler,
        leads::create_lead_handler,
        configurator::get_configurator_handler,
        configurator::quote_handler,
        configurator::submit_handler,
    ),
    components(schemas(
        MessageResponse,
        VersionResponse,
        HealthResponse,
        LoginRequest,
        CreateUserRequest,
        UserResponse,
        UserRole,
        LeadRequest,
        LeadResponse,
        ConfiguratorData,
        SiteType,
        AddonModule,
        ModuleTier,
        Package,
        Discount,
        Selection,
        ModuleChoice,
        Quote,
        QuoteLine,
        SubmitConfigurationRequest,
        SubmitConfigurationResponse,
    )),
    tags(
        (name = "service", description = "Version and health"),
        (name = "auth", description = "Staff sign-in and accounts"),
        (name = "catalog", description = "Categories and products"),
        (name = "cart", description = "Carts and checkout"),
        (name = "bookings", description = "Appointment requests"),
        (name = "blog", description = "Published posts and tags"),
        (name = "content", description = "Portfolio, reviews, contacts and hexagons"),
        (name = "subscriptions", description = "Newsletter sign-up"),
        (name = "settings", description = "Public site settings"),
        (name = "leads", description = "Contact form forwarding"),
        (name = "configurator", description = "Site price configurator"),
    )
)]
pub struct ApiDoc;

// ============================================================================
// Shared helpers
// ============================================================================

/// Count a request against `limiter`, failing with 429 once the window is full.
pub(crate) fn enforce_rate_limit(limiter: &RateLimiter, ip: IpAddr) -> ApiResult<()> {
    limiter.check(ip).map_err(|wait| ApiError::TooManyRequests {
        retry_after_secs: retry_after_secs(wait),
    })
}

/// Telegram chat for the site: the `telegram_chat_id` setting, else the bot default.
async fn notification_chat(db: &SqliteClient, client: &TelegramClient) -> Result<String, sqlx::Error> {
    Ok(db
        .telegram_chat_override()
        .await?
        .unwrap_or_else(|| client.default_chat_id().to_string()))
}

/// Deliver a message whose delivery is the point of the request.
///
/// Not configured is 503, a Telegram failure is 502.
pub(crate) async fn deliver_to_telegram(
    state: &AppState,
    db: &SqliteClient,
    text: &str,
) -> ApiResult<()> {
    let client = state
        .telegram
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Telegram is not configured".to_string()))?;

    let chat_id = notification_chat(db, client).await?;
    client.send_message(&chat_id, text).await.map_err(|e| {
        tracing::warn!(site = db.site(), error = %e, "Telegram delivery failed");
        ApiError::BadGateway("Failed to deliver the message".to_string())
    })
}

/// Send a notification in the background; failures are only logged.
pub(crate) fn notify_in_background(
    state: &AppState,
    db: SqliteClient,
    text: String,
    kind: &'static str,
) {
    let Some(client) = state.telegram.clone() else {
        tracing::debug!(kind, "Telegram not configured, skipping notification");
        return;
    };

    tokio::spawn(async move {
        let chat_id = match notification_chat(&db, &client).await {
            Ok(chat_id) => chat_id,
            Err(e) => {
                tracing::warn!(site = db.site(), kind, error = %e, "Failed to read chat setting");
                client.default_chat_id().to_string()
            }
        };
        if let Err(e) = client.send_message(&chat_id, &text).await {
            tracing::warn!(site = db.site(), kind, error = %e, "Telegram notification failed");
        }
    });
}

/// 404 for `false` results of delete operations.
pub(crate) fn found_or_404(found: bool, what: &str) -> ApiResult<()> {
    if found {
        Ok(())
    } else {
        Err(ApiError::not_found(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_covers_public_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/api/categories",
            "/api/products/{id}",
            "/api/cart/{cart_id}/items/{product_id}",
            "/api/cart/{cart_id}/checkout",
            "/api/bookings",
            "/api/bookings/slots",
            "/api/blog/posts/{slug}",
            "/api/reviews",
            "/api/hexagons",
            "/api/subscriptions/unsubscribe/{token}",
            "/api/settings",
            "/api/leads",
            "/api/configurator/submit",
        ] {
            assert!(paths.contains(&expected), "{expected} is not documented");
        }

        let admin: Vec<&str> = paths
            .iter()
            .copied()
            .filter(|p| p.starts_with("/api/admin/") && *p != "/api/admin/users")
            .collect();
        assert!(admin.is_empty(), "unexpected admin paths: {admin:?}");
    }

    #[test]
    fn test_openapi_serializes() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("Not enough stock"));
        assert!(json.contains("Slot already taken"));
    }
}
