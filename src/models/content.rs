// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Portfolio projects, reviews, contact entries and hexagon tiles.

use crate::models::double_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// ============================================================================
// Portfolio
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PortfolioProject {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub category: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortfolioInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PortfolioPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub link_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    pub sort_order: Option<i64>,
}

impl PortfolioPatch {
    pub fn merge_into(self, current: PortfolioProject) -> PortfolioInput {
        PortfolioInput {
            title: self.title.unwrap_or(current.title),
            description: self.description.unwrap_or(current.description),
            image_url: self.image_url.unwrap_or(current.image_url),
            link_url: self.link_url.unwrap_or(current.link_url),
            category: self.category.unwrap_or(current.category),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
        }
    }
}

// ============================================================================
// Reviews
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: i64,
    pub author: String,
    pub rating: i64,
    pub text: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateReviewRequest {
    pub author: String,
    pub rating: i64,
    pub text: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateReviewRequest {
    pub approved: Option<bool>,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub approved: Option<bool>,
}

// ============================================================================
// Contacts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Contact {
    pub id: i64,
    /// Free-form channel name: phone, email, address, telegram, ...
    pub kind: String,
    pub label: Option<String>,
    pub value: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactInput {
    pub kind: String,
    #[serde(default)]
    pub label: Option<String>,
    pub value: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactPatch {
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub label: Option<Option<String>>,
    pub value: Option<String>,
    pub sort_order: Option<i64>,
}

impl ContactPatch {
    pub fn merge_into(self, current: Contact) -> ContactInput {
        ContactInput {
            kind: self.kind.unwrap_or(current.kind),
            label: self.label.unwrap_or(current.label),
            value: self.value.unwrap_or(current.value),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
        }
    }
}

// ============================================================================
// Hexagons
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Hexagon {
    pub id: i64,
    pub title: String,
    pub text: Option<String>,
    pub icon: Option<String>,
    pub link: Option<String>,
    pub color: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HexagonInput {
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct HexagonPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub text: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
    pub sort_order: Option<i64>,
}

impl HexagonPatch {
    pub fn merge_into(self, current: Hexagon) -> HexagonInput {
        HexagonInput {
            title: self.title.unwrap_or(current.title),
            text: self.text.unwrap_or(current.text),
            icon: self.icon.unwrap_or(current.icon),
            link: self.link.unwrap_or(current.link),
            color: self.color.unwrap_or(current.color),
            sort_order: self.sort_order.unwrap_or(current.sort_order),
        }
    }
}
