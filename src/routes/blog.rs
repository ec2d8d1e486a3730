// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Blog posts and tags.

use crate::app::{AdminScope, AppState, SiteDb};
use crate::error::{ApiError, ApiResult};
use crate::models::blog::{BlogPostInput, BlogPostPatch, BlogPostWithTags, BlogQuery, BlogTagWithCount};
use crate::models::common::{ListResponse, MessageResponse, Pagination};
use crate::routes::found_or_404;
use crate::services::db::SqliteClient;
use crate::services::validation::{
    max_chars, require_text, resolve_slug, slugify, validate_media_url, MESSAGE_MAX_CHARS,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

const TITLE_MAX_CHARS: usize = 200;
const CONTENT_MAX_CHARS: usize = 100_000;
const MAX_TAGS: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog/posts", get(list_posts_handler))
        .route("/blog/posts/{slug}", get(get_post_by_slug_handler))
        .route("/blog/tags", get(list_tags_handler))
        .route(
            "/admin/blog/posts",
            get(admin_list_posts_handler).post(create_post_handler),
        )
        .route(
            "/admin/blog/posts/{id}",
            get(admin_get_post_handler)
                .put(replace_post_handler)
                .patch(patch_post_handler)
                .delete(delete_post_handler),
        )
        .route("/admin/blog/tags/{id}", delete(delete_tag_handler))
}

fn validate_post(mut input: BlogPostInput) -> ApiResult<(BlogPostInput, String)> {
    input.title = require_text("title", &input.title)?;
    max_chars("title", Some(&input.title), TITLE_MAX_CHARS)?;
    max_chars("excerpt", input.excerpt.as_deref(), MESSAGE_MAX_CHARS)?;
    max_chars("content", Some(&input.content), CONTENT_MAX_CHARS)?;
    if let Some(url) = input.cover_url.as_deref() {
        validate_media_url("cover_url", url)?;
    }
    if input.tags.len() > MAX_TAGS {
        return Err(ApiError::bad_request(format!(
            "A post can have at most {MAX_TAGS} tags"
        )));
    }
    let slug = resolve_slug(input.slug.as_deref(), &input.title)?;
    Ok((input, slug))
}

fn page(query: &BlogQuery) -> Pagination {
    Pagination {
        limit: query.limit,
        offset: query.offset,
    }
}

/// GET /api/blog/posts?tag=&limit=&offset= - Published posts, newest first.
#[utoipa::path(
    get,
    path = "/api/blog/posts",
    tag = "blog",
    params(("X-Site" = Option<String>, Header, description = "Site key"), BlogQuery),
    responses(
        (status = 200, description = "Published posts, newest first", body = ListResponse<BlogPostWithTags>)
    )
)]
pub async fn list_posts_handler(
    SiteDb(db): SiteDb,
    Query(query): Query<BlogQuery>,
) -> ApiResult<Json<ListResponse<BlogPostWithTags>>> {
    // Accept either the tag name or its slug
    let tag = query.tag.as_deref().map(slugify);
    let posts = db.list_posts(true, tag.as_deref(), page(&query)).await?;
    Ok(Json(posts.into()))
}

/// GET /api/blog/posts/{slug}
#[utoipa::path(
    get,
    path = "/api/blog/posts/{slug}",
    tag = "blog",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("slug" = String, Path, description = "Post slug")
    ),
    responses(
        (status = 200, description = "Published post", body = BlogPostWithTags),
        (status = 404, description = "Post not found", body = MessageResponse)
    )
)]
pub async fn get_post_by_slug_handler(
    SiteDb(db): SiteDb,
    Path(slug): Path<String>,
) -> ApiResult<Json<BlogPostWithTags>> {
    db.get_published_post_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Post"))
}

/// GET /api/blog/tags
#[utoipa::path(
    get,
    path = "/api/blog/tags",
    tag = "blog",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "Tags with published post counts", body = ListResponse<BlogTagWithCount>)
    )
)]
pub async fn list_tags_handler(SiteDb(db): SiteDb) -> ApiResult<Json<ListResponse<BlogTagWithCount>>> {
    Ok(Json(db.list_tags().await?.into()))
}

/// GET /api/admin/blog/posts - Drafts included.
async fn admin_list_posts_handler(
    AdminScope { db, .. }: AdminScope,
    Query(query): Query<BlogQuery>,
) -> ApiResult<Json<ListResponse<BlogPostWithTags>>> {
    let tag = query.tag.as_deref().map(slugify);
    let posts = db.list_posts(false, tag.as_deref(), page(&query)).await?;
    Ok(Json(posts.into()))
}

/// GET /api/admin/blog/posts/{id}
async fn admin_get_post_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<BlogPostWithTags>> {
    db.get_post(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Post"))
}

/// POST /api/admin/blog/posts
async fn create_post_handler(
    scope: AdminScope,
    Json(payload): Json<BlogPostInput>,
) -> ApiResult<(StatusCode, Json<BlogPostWithTags>)> {
    let (input, slug) = validate_post(payload)?;
    let created = scope.db.create_post(&input, &slug).await?;
    tracing::info!(
        site = scope.db.site(),
        id = created.post.id,
        published = created.post.published,
        by = %scope.user.username,
        "Blog post created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn save_post(
    db: &SqliteClient,
    id: i64,
    payload: BlogPostInput,
) -> ApiResult<Json<BlogPostWithTags>> {
    let (input, slug) = validate_post(payload)?;
    db.update_post(id, &input, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Post"))
}

/// PUT /api/admin/blog/posts/{id}
async fn replace_post_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<BlogPostInput>,
) -> ApiResult<Json<BlogPostWithTags>> {
    save_post(&db, id, payload).await
}

/// PATCH /api/admin/blog/posts/{id}
async fn patch_post_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(patch): Json<BlogPostPatch>,
) -> ApiResult<Json<BlogPostWithTags>> {
    let current = db
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    save_post(&db, id, patch.merge_into(current)).await
}

/// DELETE /api/admin/blog/posts/{id}
async fn delete_post_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_post(id).await?, "Post")?;
    Ok(Json(MessageResponse::ok("Post deleted")))
}

/// DELETE /api/admin/blog/tags/{id} - Detaches the tag from every post.
async fn delete_tag_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_tag(id).await?, "Tag")?;
    Ok(Json(MessageResponse::ok("Tag deleted")))
}
