// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ============================================================================
// Cart
// ============================================================================

/// A cart line joined with the current product data.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CartLine {
    pub product_id: i64,
    pub product_name: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
}

impl CartLine {
    /// `None` when the total does not fit in an `i64`.
    pub fn line_total_cents(&self) -> Option<i64> {
        self.price_cents.checked_mul(self.quantity)
    }
}

/// Sum of all line totals, `None` on overflow.
pub fn cart_total_cents(lines: &[CartLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0i64, |sum, line| sum.checked_add(line.line_total_cents()?))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartLineResponse {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub cart_id: String,
    pub items: Vec<CartLineResponse>,
    pub total_cents: i64,
}

impl CartResponse {
    /// `None` when a line or the cart total overflows.
    pub fn new(cart_id: String, lines: Vec<CartLine>) -> Option<Self> {
        let total_cents = cart_total_cents(&lines)?;
        let items = lines
            .into_iter()
            .map(|line| {
                Some(CartLineResponse {
                    line_total_cents: line.line_total_cents()?,
                    line,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            cart_id,
            items,
            total_cents,
        })
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CheckoutRequest {
    pub customer_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Order {
    pub id: i64,
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub comment: Option<String>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub product_id: Option<i64>,
    pub product_name: String,
    pub price_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderStats {
    pub by_status: BTreeMap<OrderStatus, StatusTotals>,
    /// Revenue over completed orders only
    pub revenue_cents: i64,
}
