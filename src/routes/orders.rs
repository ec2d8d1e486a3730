// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Order management for staff.

use crate::app::{AdminScope, AppState, StaffScope};
use crate::error::{ApiError, ApiResult};
use crate::models::cart::{Order, OrderQuery, OrderStats, OrderWithItems, UpdateOrderStatusRequest};
use crate::models::common::{ListResponse, MessageResponse};
use crate::routes::found_or_404;
use axum::{
    extract::{Path, Query},
    routing::get,
    Json, Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(list_orders_handler))
        .route("/admin/orders/stats", get(order_stats_handler))
        .route(
            "/admin/orders/{id}",
            get(get_order_handler)
                .patch(update_status_handler)
                .delete(delete_order_handler),
        )
}

/// GET /api/admin/orders?status=
async fn list_orders_handler(
    StaffScope { db, .. }: StaffScope,
    Query(filter): Query<OrderQuery>,
) -> ApiResult<Json<ListResponse<Order>>> {
    Ok(Json(db.list_orders(filter.status).await?.into()))
}

/// GET /api/admin/orders/{id}
async fn get_order_handler(
    StaffScope { db, .. }: StaffScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<OrderWithItems>> {
    db.get_order(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Order"))
}

/// PATCH /api/admin/orders/{id}
async fn update_status_handler(
    scope: StaffScope,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<Json<Order>> {
    let order = scope
        .db
        .update_order_status(id, payload.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Order"))?;

    tracing::info!(
        site = scope.db.site(),
        order_id = id,
        status = payload.status.as_str(),
        by = %scope.user.username,
        "Order status changed"
    );
    Ok(Json(order))
}

/// DELETE /api/admin/orders/{id}
async fn delete_order_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_order(id).await?, "Order")?;
    Ok(Json(MessageResponse::ok("Order deleted")))
}

/// GET /api/admin/orders/stats - Count and sum per status.
async fn order_stats_handler(StaffScope { db, .. }: StaffScope) -> ApiResult<Json<OrderStats>> {
    Ok(Json(db.order_stats().await?))
}
