// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::double_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_url: Option<String>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BlogTag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BlogTagWithCount {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub post_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BlogPostWithTags {
    #[serde(flatten)]
    pub post: BlogPost,
    pub tags: Vec<BlogTag>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlogPostInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    /// Tag names; the post's tag set is replaced with exactly these
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_url: Option<Option<String>>,
    pub published: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl BlogPostPatch {
    pub fn merge_into(self, current: BlogPostWithTags) -> BlogPostInput {
        let BlogPostWithTags { post, tags } = current;
        BlogPostInput {
            title: self.title.unwrap_or(post.title),
            slug: Some(self.slug.unwrap_or(post.slug)),
            excerpt: self.excerpt.unwrap_or(post.excerpt),
            content: self.content.unwrap_or(post.content),
            cover_url: self.cover_url.unwrap_or(post.cover_url),
            published: self.published.unwrap_or(post.published),
            tags: self
                .tags
                .unwrap_or_else(|| tags.into_iter().map(|t| t.name).collect()),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlogQuery {
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
