// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::common::Pagination;
use crate::models::double_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Full category body for create and replace.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from `name` when omitted
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i64>,
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub old_price_cents: Option<i64>,
    pub image_url: Option<String>,
    /// `None` means the product is not stock-tracked
    pub stock: Option<i64>,
    pub active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub old_price_cents: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub price_cents: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub old_price_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub stock: Option<Option<i64>>,
    pub active: Option<bool>,
    pub sort_order: Option<i64>,
}

impl ProductPatch {
    /// Apply the patch over an existing product, producing the replacement body.
    pub fn merge_into(self, current: Product) -> ProductInput {
        ProductInput {
            name: self.name.unwrap_or(current.name),
            slug: Some(self.slug.unwrap_or(current.slug)),
            category_id: self.category_id.unwrap_or(current.category_id),
            description: self.description.unwrap_or(current.description),
            price_cents: self.price_cents.unwrap_or(current.price_cents),
            old_price_cents: self.old_price_cents.unwrap_or(current.old_price_cents),
            image_url: self.image_url.unwrap_or(current.image_url),
            stock: self.stock.unwrap_or(current.stock),
            active: self.active.unwrap_or(current.active),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
        }
    }
}

impl CategoryPatch {
    pub fn merge_into(self, current: Category) -> CategoryInput {
        CategoryInput {
            name: self.name.unwrap_or(current.name),
            slug: Some(self.slug.unwrap_or(current.slug)),
            description: self.description.unwrap_or(current.description),
            parent_id: self.parent_id.unwrap_or(current.parent_id),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
        }
    }
}

/// Query parameters for product listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        let now = Utc::now();
        Product {
            id: 1,
            category_id: Some(3),
            name: "Sourdough".to_string(),
            slug: "sourdough".to_string(),
            description: Some("Rye".to_string()),
            price_cents: 450,
            old_price_cents: None,
            image_url: None,
            stock: Some(10),
            active: true,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_product_patch_keeps_untouched_fields() {
        let patch: ProductPatch = serde_json::from_str(r#"{"price_cents": 500}"#).unwrap();
        let merged = patch.merge_into(sample_product());
        assert_eq!(merged.price_cents, 500);
        assert_eq!(merged.name, "Sourdough");
        assert_eq!(merged.category_id, Some(3));
        assert_eq!(merged.stock, Some(10));
    }

    #[test]
    fn test_product_patch_can_clear_nullable_fields() {
        let patch: ProductPatch =
            serde_json::from_str(r#"{"category_id": null, "stock": null}"#).unwrap();
        let merged = patch.merge_into(sample_product());
        assert_eq!(merged.category_id, None);
        assert_eq!(merged.stock, None);
        assert_eq!(merged.description.as_deref(), Some("Rye"));
    }

    #[test]
    fn test_product_input_defaults_to_active() {
        let input: ProductInput =
            serde_json::from_str(r#"{"name": "Bagel", "price_cents": 120}"#).unwrap();
        assert!(input.active);
        assert_eq!(input.sort_order, 0);
    }
}
