// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Portfolio, reviews, contacts and hexagon tiles.

use crate::app::{AdminScope, AppState, ClientIp, SiteDb};
use crate::error::{ApiError, ApiResult};
use crate::models::common::{ListResponse, MessageResponse, ReorderRequest};
use crate::models::content::{
    Contact, ContactInput, ContactPatch, CreateReviewRequest, Hexagon, HexagonInput, HexagonPatch,
    PortfolioInput, PortfolioPatch, PortfolioProject, Review, ReviewQuery, UpdateReviewRequest,
};
use crate::routes::{enforce_rate_limit, found_or_404};
use crate::services::db::SqliteClient;
use crate::services::validation::{
    max_chars, normalize_name, require_text, validate_http_url, validate_media_url,
    MESSAGE_MAX_CHARS,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};

const TITLE_MAX_CHARS: usize = 200;
const CONTACT_VALUE_MAX_CHARS: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        // Portfolio
        .route("/portfolio", get(list_portfolio_handler))
        .route("/portfolio/{id}", get(get_portfolio_handler))
        .route("/admin/portfolio", post(create_portfolio_handler))
        .route("/admin/portfolio/reorder", post(reorder_portfolio_handler))
        .route(
            "/admin/portfolio/{id}",
            put(replace_portfolio_handler)
                .patch(patch_portfolio_handler)
                .delete(delete_portfolio_handler),
        )
        // Reviews
        .route(
            "/reviews",
            get(list_reviews_handler).post(create_review_handler),
        )
        .route("/admin/reviews", get(admin_list_reviews_handler))
        .route(
            "/admin/reviews/{id}",
            patch(update_review_handler).delete(delete_review_handler),
        )
        // Contacts
        .route("/contacts", get(list_contacts_handler))
        .route("/admin/contacts", post(create_contact_handler))
        .route(
            "/admin/contacts/{id}",
            put(replace_contact_handler)
                .patch(patch_contact_handler)
                .delete(delete_contact_handler),
        )
        // Hexagons
        .route("/hexagons", get(list_hexagons_handler))
        .route("/admin/hexagons", post(create_hexagon_handler))
        .route("/admin/hexagons/reorder", post(reorder_hexagons_handler))
        .route(
            "/admin/hexagons/{id}",
            put(replace_hexagon_handler)
                .patch(patch_hexagon_handler)
                .delete(delete_hexagon_handler),
        )
}

// ============================================================================
// Portfolio
// ============================================================================

fn validate_portfolio(mut input: PortfolioInput) -> ApiResult<PortfolioInput> {
    input.title = require_text("title", &input.title)?;
    max_chars("title", Some(&input.title), TITLE_MAX_CHARS)?;
    max_chars("description", input.description.as_deref(), MESSAGE_MAX_CHARS)?;
    if let Some(url) = input.image_url.as_deref() {
        validate_media_url("image_url", url)?;
    }
    if let Some(url) = input.link_url.as_deref() {
        validate_http_url("link_url", url)?;
    }
    Ok(input)
}

/// GET /api/portfolio
#[utoipa::path(
    get,
    path = "/api/portfolio",
    tag = "content",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Portfolio projects", body = ListResponse<PortfolioProject>)
    )
)]
pub async fn list_portfolio_handler(
    SiteDb(db): SiteDb,
) -> ApiResult<Json<ListResponse<PortfolioProject>>> {
    Ok(Json(db.list_portfolio().await?.into()))
}

/// GET /api/portfolio/{id}
#[utoipa::path(
    get,
    path = "/api/portfolio/{id}",
    tag = "content",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("id" = i64, Path, description = "Project id")
    ),
    responses(
        (status = 200, description = "Portfolio project", body = PortfolioProject),
        (status = 404, description = "Project not found", body = MessageResponse)
    )
)]
pub async fn get_portfolio_handler(
    SiteDb(db): SiteDb,
    Path(id): Path<i64>,
) -> ApiResult<Json<PortfolioProject>> {
    db.get_portfolio(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Project"))
}

/// POST /api/admin/portfolio
async fn create_portfolio_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<PortfolioInput>,
) -> ApiResult<(StatusCode, Json<PortfolioProject>)> {
    let input = validate_portfolio(payload)?;
    Ok((StatusCode::CREATED, Json(db.create_portfolio(&input).await?)))
}

async fn save_portfolio(
    db: &SqliteClient,
    id: i64,
    payload: PortfolioInput,
) -> ApiResult<Json<PortfolioProject>> {
    let input = validate_portfolio(payload)?;
    db.update_portfolio(id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Project"))
}

/// PUT /api/admin/portfolio/{id}
async fn replace_portfolio_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<PortfolioInput>,
) -> ApiResult<Json<PortfolioProject>> {
    save_portfolio(&db, id, payload).await
}

/// PATCH /api/admin/portfolio/{id}
async fn patch_portfolio_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(patch): Json<PortfolioPatch>,
) -> ApiResult<Json<PortfolioProject>> {
    let current = db
        .get_portfolio(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    save_portfolio(&db, id, patch.merge_into(current)).await
}

/// DELETE /api/admin/portfolio/{id}
async fn delete_portfolio_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_portfolio(id).await?, "Project")?;
    Ok(Json(MessageResponse::ok("Project deleted")))
}

/// POST /api/admin/portfolio/reorder
async fn reorder_portfolio_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<ReorderRequest>,
) -> ApiResult<Json<ListResponse<PortfolioProject>>> {
    db.reorder_portfolio(&payload.ids).await?;
    Ok(Json(db.list_portfolio().await?.into()))
}

// ============================================================================
// Reviews
// ============================================================================

fn validate_review(payload: &CreateReviewRequest) -> ApiResult<(String, String)> {
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::bad_request("rating must be between 1 and 5"));
    }
    let author = normalize_name(&payload.author)?;
    let text = require_text("text", &payload.text)?;
    max_chars("text", Some(&text), MESSAGE_MAX_CHARS)?;
    Ok((author, text))
}

/// GET /api/reviews - Approved reviews only.
#[utoipa::path(
    get,
    path = "/api/reviews",
    tag = "content",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Approved reviews", body = ListResponse<Review>)
    )
)]
pub async fn list_reviews_handler(SiteDb(db): SiteDb) -> ApiResult<Json<ListResponse<Review>>> {
    Ok(Json(db.list_reviews(Some(true)).await?.into()))
}

/// POST /api/reviews - Stored unapproved until a moderator approves it.
#[utoipa::path(
    post,
    path = "/api/reviews",
    tag = "content",
    request_body = CreateReviewRequest,
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 201, description = "Review stored for moderation", body = Review),
        (status = 400, description = "Invalid name, text or rating", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = MessageResponse)
    )
)]
pub async fn create_review_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SiteDb(db): SiteDb,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    enforce_rate_limit(&state.lead_limiter, ip)?;

    let (author, text) = validate_review(&payload)?;
    let review = db.create_review(&author, payload.rating, &text).await?;
    tracing::info!(site = db.site(), review_id = review.id, rating = review.rating, "Review submitted");
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /api/admin/reviews?approved=
async fn admin_list_reviews_handler(
    AdminScope { db, .. }: AdminScope,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Json<ListResponse<Review>>> {
    Ok(Json(db.list_reviews(query.approved).await?.into()))
}

/// PATCH /api/admin/reviews/{id}
async fn update_review_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReviewRequest>,
) -> ApiResult<Json<Review>> {
    let text = match payload.text.as_deref() {
        Some(t) => {
            let t = require_text("text", t)?;
            max_chars("text", Some(&t), MESSAGE_MAX_CHARS)?;
            Some(t)
        }
        None => None,
    };
    db.update_review(id, payload.approved, text.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Review"))
}

/// DELETE /api/admin/reviews/{id}
async fn delete_review_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_review(id).await?, "Review")?;
    Ok(Json(MessageResponse::ok("Review deleted")))
}

// ============================================================================
// Contacts
// ============================================================================

fn validate_contact(mut input: ContactInput) -> ApiResult<ContactInput> {
    input.kind = require_text("kind", &input.kind)?;
    input.value = require_text("value", &input.value)?;
    max_chars("value", Some(&input.value), CONTACT_VALUE_MAX_CHARS)?;
    max_chars("label", input.label.as_deref(), TITLE_MAX_CHARS)?;
    Ok(input)
}

/// GET /api/contacts
#[utoipa::path(
    get,
    path = "/api/contacts",
    tag = "content",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Contact entries", body = ListResponse<Contact>)
    )
)]
pub async fn list_contacts_handler(SiteDb(db): SiteDb) -> ApiResult<Json<ListResponse<Contact>>> {
    Ok(Json(db.list_contacts().await?.into()))
}

/// POST /api/admin/contacts
async fn create_contact_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<ContactInput>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let input = validate_contact(payload)?;
    Ok((StatusCode::CREATED, Json(db.create_contact(&input).await?)))
}

async fn save_contact(db: &SqliteClient, id: i64, payload: ContactInput) -> ApiResult<Json<Contact>> {
    let input = validate_contact(payload)?;
    db.update_contact(id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Contact"))
}

/// PUT /api/admin/contacts/{id}
async fn replace_contact_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<ContactInput>,
) -> ApiResult<Json<Contact>> {
    save_contact(&db, id, payload).await
}

/// PATCH /api/admin/contacts/{id}
async fn patch_contact_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(patch): Json<ContactPatch>,
) -> ApiResult<Json<Contact>> {
    let current = db
        .get_contact(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    save_contact(&db, id, patch.merge_into(current)).await
}

/// DELETE /api/admin/contacts/{id}
async fn delete_contact_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_contact(id).await?, "Contact")?;
    Ok(Json(MessageResponse::ok("Contact deleted")))
}

// ============================================================================
// Hexagons
// ============================================================================

fn validate_hexagon(mut input: HexagonInput) -> ApiResult<HexagonInput> {
    input.title = require_text("title", &input.title)?;
    max_chars("title", Some(&input.title), TITLE_MAX_CHARS)?;
    max_chars("text", input.text.as_deref(), MESSAGE_MAX_CHARS)?;
    // Links may point inside the site, so only absolute ones are checked
    if let Some(link) = input.link.as_deref() {
        if !link.starts_with('/') {
            validate_http_url("link", link)?;
        }
    }
    Ok(input)
}

/// GET /api/hexagons
#[utoipa::path(
    get,
    path = "/api/hexagons",
    tag = "content",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Hexagon tiles", body = ListResponse<Hexagon>)
    )
)]
pub async fn list_hexagons_handler(SiteDb(db): SiteDb) -> ApiResult<Json<ListResponse<Hexagon>>> {
    Ok(Json(db.list_hexagons().await?.into()))
}

/// POST /api/admin/hexagons
async fn create_hexagon_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<HexagonInput>,
) -> ApiResult<(StatusCode, Json<Hexagon>)> {
    let input = validate_hexagon(payload)?;
    Ok((StatusCode::CREATED, Json(db.create_hexagon(&input).await?)))
}

async fn save_hexagon(db: &SqliteClient, id: i64, payload: HexagonInput) -> ApiResult<Json<Hexagon>> {
    let input = validate_hexagon(payload)?;
    db.update_hexagon(id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Hexagon"))
}

/// PUT /api/admin/hexagons/{id}
async fn replace_hexagon_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<HexagonInput>,
) -> ApiResult<Json<Hexagon>> {
    save_hexagon(&db, id, payload).await
}

/// PATCH /api/admin/hexagons/{id}
async fn patch_hexagon_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(patch): Json<HexagonPatch>,
) -> ApiResult<Json<Hexagon>> {
    let current = db
        .get_hexagon(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Hexagon"))?;
    save_hexagon(&db, id, patch.merge_into(current)).await
}

/// DELETE /api/admin/hexagons/{id}
async fn delete_hexagon_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_hexagon(id).await?, "Hexagon")?;
    Ok(Json(MessageResponse::ok("Hexagon deleted")))
}

/// POST /api/admin/hexagons/reorder
async fn reorder_hexagons_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<ReorderRequest>,
) -> ApiResult<Json<ListResponse<Hexagon>>> {
    db.reorder_hexagons(&payload.ids).await?;
    Ok(Json(db.list_hexagons().await?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i64, text: &str) -> CreateReviewRequest {
        CreateReviewRequest {
            author: "Anna".to_string(),
            rating,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_review_rating_bounds() {
        assert!(validate_review(&review(0, "Great")).is_err());
        assert!(validate_review(&review(6, "Great")).is_err());
        assert!(validate_review(&review(5, "Great")).is_ok());
        assert!(validate_review(&review(3, "   ")).is_err());
    }

    #[test]
    fn test_portfolio_link_must_be_absolute() {
        let mut input = PortfolioInput {
            title: "Bakery site".to_string(),
            description: None,
            image_url: None,
            link_url: Some("/local".to_string()),
            category: None,
            sort_order: 0,
        };
        assert!(validate_portfolio(input.clone()).is_err());

        input.link_url = Some("https://bakery.example.com".to_string());
        assert!(validate_portfolio(input).is_ok());
    }

    #[test]
    fn test_hexagon_allows_site_relative_links() {
        let input = HexagonInput {
            title: "Delivery".to_string(),
            text: None,
            icon: None,
            link: Some("/delivery".to_string()),
            color: None,
            sort_order: 0,
        };
        assert!(validate_hexagon(input.clone()).is_ok());

        let bad = HexagonInput {
            link: Some("javascript:alert(1)".to_string()),
            ..input
        };
        assert!(validate_hexagon(bad).is_err());
    }
}
