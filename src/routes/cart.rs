// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Shopping cart and checkout.

use crate::app::{AppState, ClientIp, SiteDb};
use crate::error::{ApiError, ApiResult};
use crate::models::cart::{
    AddCartItemRequest, CartResponse, CheckoutRequest, OrderWithItems, SetQuantityRequest,
};
use crate::models::common::MessageResponse;
use crate::routes::{enforce_rate_limit, found_or_404, notify_in_background};
use crate::services::cart_db::CheckoutDetails;
use crate::services::db::SqliteClient;
use crate::services::logging::anonymize_phone;
use crate::services::telegram::format_order;
use crate::services::validation::{
    max_chars, normalize_name, normalize_optional_email, normalize_phone, validate_cart_id,
    MESSAGE_MAX_CHARS,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

/// Largest quantity a single cart line may hold.
const MAX_LINE_QUANTITY: i64 = 999;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart/{cart_id}", get(get_cart_handler).delete(clear_cart_handler))
        .route("/cart/{cart_id}/items", post(add_item_handler))
        .route(
            "/cart/{cart_id}/items/{product_id}",
            put(set_quantity_handler).delete(remove_item_handler),
        )
        .route("/cart/{cart_id}/checkout", post(checkout_handler))
}

async fn cart_response(db: &SqliteClient, cart_id: String) -> ApiResult<Json<CartResponse>> {
    let lines = db.get_cart_lines(&cart_id).await?;
    CartResponse::new(cart_id, lines)
        .map(Json)
        .ok_or_else(|| ApiError::bad_request("Cart total is too large"))
}

fn check_quantity(quantity: i64, min: i64) -> ApiResult<()> {
    if !(min..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ApiError::bad_request(format!(
            "quantity must be between {min} and {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// GET /api/cart/{cart_id}
#[utoipa::path(
    get,
    path = "/api/cart/{cart_id}",
    tag = "cart",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("cart_id" = String, Path, description = "Client-generated cart id")
    ),
    responses(
        (status = 200, description = "Cart with line totals", body = CartResponse),
        (status = 400, description = "Invalid cart id", body = MessageResponse)
    )
)]
pub async fn get_cart_handler(
    SiteDb(db): SiteDb,
    Path(cart_id): Path<String>,
) -> ApiResult<Json<CartResponse>> {
    validate_cart_id(&cart_id)?;
    cart_response(&db, cart_id).await
}

/// POST /api/cart/{cart_id}/items - Adds to the quantity already in the cart.
#[utoipa::path(
    post,
    path = "/api/cart/{cart_id}/items",
    tag = "cart",
    request_body = AddCartItemRequest,
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("cart_id" = String, Path, description = "Client-generated cart id")
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Invalid quantity or line over the limit", body = MessageResponse),
        (status = 404, description = "Product not found", body = MessageResponse)
    )
)]
pub async fn add_item_handler(
    SiteDb(db): SiteDb,
    Path(cart_id): Path<String>,
    Json(payload): Json<AddCartItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    validate_cart_id(&cart_id)?;
    check_quantity(payload.quantity, 1)?;

    if db.get_product(payload.product_id, false).await?.is_none() {
        return Err(ApiError::not_found("Product"));
    }

    let added = db
        .add_cart_item(
            &cart_id,
            payload.product_id,
            payload.quantity,
            MAX_LINE_QUANTITY,
        )
        .await?;
    if !added {
        return Err(ApiError::bad_request(format!(
            "A cart line cannot hold more than {MAX_LINE_QUANTITY} items"
        )));
    }
    cart_response(&db, cart_id).await
}

/// PUT /api/cart/{cart_id}/items/{product_id} - Quantity 0 removes the line.
#[utoipa::path(
    put,
    path = "/api/cart/{cart_id}/items/{product_id}",
    tag = "cart",
    request_body = SetQuantityRequest,
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("cart_id" = String, Path, description = "Client-generated cart id"),
        ("product_id" = i64, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 400, description = "Invalid quantity", body = MessageResponse),
        (status = 404, description = "Cart item not found", body = MessageResponse)
    )
)]
pub async fn set_quantity_handler(
    SiteDb(db): SiteDb,
    Path((cart_id, product_id)): Path<(String, i64)>,
    Json(payload): Json<SetQuantityRequest>,
) -> ApiResult<Json<CartResponse>> {
    validate_cart_id(&cart_id)?;
    check_quantity(payload.quantity, 0)?;

    let found = db
        .set_cart_quantity(&cart_id, product_id, payload.quantity)
        .await?;
    found_or_404(found, "Cart item")?;
    cart_response(&db, cart_id).await
}

/// DELETE /api/cart/{cart_id}/items/{product_id}
#[utoipa::path(
    delete,
    path = "/api/cart/{cart_id}/items/{product_id}",
    tag = "cart",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("cart_id" = String, Path, description = "Client-generated cart id"),
        ("product_id" = i64, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "Cart item not found", body = MessageResponse)
    )
)]
pub async fn remove_item_handler(
    SiteDb(db): SiteDb,
    Path((cart_id, product_id)): Path<(String, i64)>,
) -> ApiResult<Json<CartResponse>> {
    validate_cart_id(&cart_id)?;
    found_or_404(db.remove_cart_item(&cart_id, product_id).await?, "Cart item")?;
    cart_response(&db, cart_id).await
}

/// DELETE /api/cart/{cart_id}
#[utoipa::path(
    delete,
    path = "/api/cart/{cart_id}",
    tag = "cart",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("cart_id" = String, Path, description = "Client-generated cart id")
    ),
    responses(
        (status = 200, description = "Empty cart", body = CartResponse)
    )
)]
pub async fn clear_cart_handler(
    SiteDb(db): SiteDb,
    Path(cart_id): Path<String>,
) -> ApiResult<Json<CartResponse>> {
    validate_cart_id(&cart_id)?;
    db.clear_cart(&cart_id).await?;
    cart_response(&db, cart_id).await
}

/// POST /api/cart/{cart_id}/checkout - Turn the cart into an order.
#[utoipa::path(
    post,
    path = "/api/cart/{cart_id}/checkout",
    tag = "cart",
    request_body = CheckoutRequest,
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("cart_id" = String, Path, description = "Client-generated cart id")
    ),
    responses(
        (status = 201, description = "Order placed", body = OrderWithItems),
        (status = 400, description = "Empty cart or invalid contact details", body = MessageResponse),
        (status = 409, description = "Not enough stock", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = MessageResponse)
    )
)]
pub async fn checkout_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SiteDb(db): SiteDb,
    Path(cart_id): Path<String>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<OrderWithItems>)> {
    enforce_rate_limit(&state.lead_limiter, ip)?;
    validate_cart_id(&cart_id)?;

    max_chars("address", payload.address.as_deref(), MESSAGE_MAX_CHARS)?;
    max_chars("comment", payload.comment.as_deref(), MESSAGE_MAX_CHARS)?;
    let details = CheckoutDetails {
        customer_name: normalize_name(&payload.customer_name)?,
        phone: normalize_phone(&payload.phone)?,
        email: normalize_optional_email(payload.email.as_deref())?,
        address: payload.address.filter(|a| !a.trim().is_empty()),
        comment: payload.comment.filter(|c| !c.trim().is_empty()),
    };

    let order = db.checkout(&cart_id, &details).await?;

    tracing::info!(
        site = db.site(),
        order_id = order.order.id,
        total_cents = order.order.total_cents,
        phone = %anonymize_phone(&details.phone),
        "Order placed"
    );

    let text = format_order(db.site(), &order);
    notify_in_background(&state, db, text, "order");

    Ok((StatusCode::CREATED, Json(order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(check_quantity(0, 1).is_err());
        assert!(check_quantity(1, 1).is_ok());
        assert!(check_quantity(0, 0).is_ok());
        assert!(check_quantity(-1, 0).is_err());
        assert!(check_quantity(MAX_LINE_QUANTITY + 1, 1).is_err());
    }
}
