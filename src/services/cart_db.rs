// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Cart, checkout and order queries.

use crate::models::cart::{
    cart_total_cents, CartLine, Order, OrderItem, OrderStats, OrderStatus, OrderWithItems, StatusTotals,
};
use crate::services::db::SqliteClient;
use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;

const ORDER_COLUMNS: &str = "id, customer_name, phone, email, address, comment, total_cents, \
     status, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, product_id, product_name, price_cents, quantity";

const CART_LINES_QUERY: &str = "SELECT ci.product_id, p.name AS product_name, p.price_cents, \
     ci.quantity, p.image_url, p.stock
     FROM cart_items ci
     JOIN products p ON p.id = ci.product_id
     WHERE ci.site = ? AND ci.cart_id = ?
     ORDER BY ci.id";

/// Validated customer details for a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("'{0}' is no longer available")]
    Unavailable(String),

    #[error("Not enough stock for '{name}'")]
    InsufficientStock { name: String },

    #[error("Order total is too large")]
    TotalTooLarge,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl SqliteClient {
    // ========== Cart ==========

    pub async fn get_cart_lines(&self, cart_id: &str) -> Result<Vec<CartLine>, sqlx::Error> {
        sqlx::query_as(CART_LINES_QUERY)
            .bind(self.site())
            .bind(cart_id)
            .fetch_all(self.pool())
            .await
    }

    /// Add `quantity` to the cart line, creating it when missing.
    ///
    /// Returns `false`, leaving the line untouched, when the new quantity would
    /// exceed `max_quantity`.
    pub async fn add_cart_item(
        &self,
        cart_id: &str,
        product_id: i64,
        quantity: i64,
        max_quantity: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO cart_items (site, cart_id, product_id, quantity, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (site, cart_id, product_id)
             DO UPDATE SET quantity = quantity + excluded.quantity
             WHERE quantity + excluded.quantity <= ?",
        )
        .bind(self.site())
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .bind(max_quantity)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the quantity of an existing line; zero removes it.
    ///
    /// Returns `false` when the cart has no such line.
    pub async fn set_cart_quantity(
        &self,
        cart_id: &str,
        product_id: i64,
        quantity: i64,
    ) -> Result<bool, sqlx::Error> {
        if quantity == 0 {
            return self.remove_cart_item(cart_id, product_id).await;
        }
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = ?
             WHERE site = ? AND cart_id = ? AND product_id = ?",
        )
        .bind(quantity)
        .bind(self.site())
        .bind(cart_id)
        .bind(product_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_cart_item(&self, cart_id: &str, product_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM cart_items WHERE site = ? AND cart_id = ? AND product_id = ?",
        )
        .bind(self.site())
        .bind(cart_id)
        .bind(product_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_cart(&self, cart_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE site = ? AND cart_id = ?")
            .bind(self.site())
            .bind(cart_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    // ========== Checkout ==========

    /// Turn the cart into an order in a single transaction.
    ///
    /// Lines are priced at the products' current prices. Stock-tracked products
    /// are decremented; if any of them runs short the transaction is rolled back
    /// and nothing changes.
    pub async fn checkout(
        &self,
        cart_id: &str,
        details: &CheckoutDetails,
    ) -> Result<OrderWithItems, CheckoutError> {
        let mut tx = self.pool().begin().await?;

        let lines: Vec<CartLine> = sqlx::query_as(CART_LINES_QUERY)
            .bind(self.site())
            .bind(cart_id)
            .fetch_all(&mut *tx)
            .await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let inactive: Option<String> = sqlx::query_scalar(
            "SELECT p.name FROM cart_items ci
             JOIN products p ON p.id = ci.product_id
             WHERE ci.site = ? AND ci.cart_id = ? AND p.active = 0
             LIMIT 1",
        )
        .bind(self.site())
        .bind(cart_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(name) = inactive {
            return Err(CheckoutError::Unavailable(name));
        }

        for line in lines.iter().filter(|l| l.stock.is_some()) {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - ?, updated_at = ?
                 WHERE id = ? AND site = ? AND stock >= ?",
            )
            .bind(line.quantity)
            .bind(Utc::now())
            .bind(line.product_id)
            .bind(self.site())
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(CheckoutError::InsufficientStock {
                    name: line.product_name.clone(),
                });
            }
        }

        let total_cents = cart_total_cents(&lines).ok_or(CheckoutError::TotalTooLarge)?;
        let now = Utc::now();
        let order: Order = sqlx::query_as(&format!(
            "INSERT INTO orders
             (site, customer_name, phone, email, address, comment, total_cents, status,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(self.site())
        .bind(&details.customer_name)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(&details.address)
        .bind(&details.comment)
        .bind(total_cents)
        .bind(OrderStatus::New)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let insert_item = format!(
            "INSERT INTO order_items (order_id, product_id, product_name, price_cents, quantity)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {ORDER_ITEM_COLUMNS}"
        );
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item: OrderItem = sqlx::query_as(&insert_item)
                .bind(order.id)
                .bind(line.product_id)
                .bind(&line.product_name)
                .bind(line.price_cents)
                .bind(line.quantity)
                .fetch_one(&mut *tx)
                .await?;
            items.push(item);
        }

        sqlx::query("DELETE FROM cart_items WHERE site = ? AND cart_id = ?")
            .bind(self.site())
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(OrderWithItems { order, items })
    }

    // ========== Orders ==========

    pub async fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, sqlx::Error> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE site = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(status)
            .bind(status)
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_order(&self, id: i64) -> Result<Option<OrderWithItems>, sqlx::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ? AND site = ?");
        let order: Option<Order> = sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await?;
        let Some(order) = order else {
            return Ok(None);
        };

        let items_query =
            format!("SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY id");
        let items = sqlx::query_as(&items_query)
            .bind(order.id)
            .fetch_all(self.pool())
            .await?;

        Ok(Some(OrderWithItems { order, items }))
    }

    pub async fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<Option<Order>, sqlx::Error> {
        let query = format!(
            "UPDATE orders SET status = ?, updated_at = ?
             WHERE id = ? AND site = ?
             RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_order(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count and sum of `total_cents` per status; every status is present.
    pub async fn order_stats(&self) -> Result<OrderStats, sqlx::Error> {
        let rows: Vec<(OrderStatus, i64, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*), COALESCE(SUM(total_cents), 0)
             FROM orders WHERE site = ? GROUP BY status",
        )
        .bind(self.site())
        .fetch_all(self.pool())
        .await?;

        let mut by_status: BTreeMap<OrderStatus, StatusTotals> = OrderStatus::ALL
            .into_iter()
            .map(|s| (s, StatusTotals::default()))
            .collect();
        for (status, count, total_cents) in rows {
            let totals = by_status.entry(status).or_default();
            totals.count = count;
            totals.total_cents = total_cents;
        }

        let revenue_cents = by_status
            .get(&OrderStatus::Completed)
            .map_or(0, |t| t.total_cents);

        Ok(OrderStats {
            by_status,
            revenue_cents,
        })
    }
}
