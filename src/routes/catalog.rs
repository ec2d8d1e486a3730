// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Categories and products.

use crate::app::{AdminScope, AppState, SiteDb};
use crate::error::{ApiError, ApiResult};
use crate::models::catalog::{
    Category, CategoryInput, CategoryPatch, Product, ProductInput, ProductPatch, ProductQuery,
};
use crate::models::common::{ListResponse, MessageResponse, ReorderRequest};
use crate::routes::found_or_404;
use crate::services::db::SqliteClient;
use crate::services::validation::{
    max_chars, non_negative, price_cents, require_text, resolve_slug, validate_media_url,
    MESSAGE_MAX_CHARS,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::collections::HashSet;

const DESCRIPTION_MAX_CHARS: usize = 10_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories_handler))
        .route("/categories/{id}", get(get_category_handler))
        .route("/admin/categories", post(create_category_handler))
        .route("/admin/categories/reorder", post(reorder_categories_handler))
        .route(
            "/admin/categories/{id}",
            put(replace_category_handler)
                .patch(patch_category_handler)
                .delete(delete_category_handler),
        )
        .route("/products", get(list_products_handler))
        .route("/products/{id}", get(get_product_handler))
        .route(
            "/admin/products",
            get(admin_list_products_handler).post(create_product_handler),
        )
        .route(
            "/admin/products/{id}",
            put(replace_product_handler)
                .patch(patch_product_handler)
                .delete(delete_product_handler),
        )
}

// ============================================================================
// Validation
// ============================================================================

/// Normalize a category and return it with its slug.
///
/// `id` is the category being updated, if any, so it cannot become its own parent.
async fn validate_category(
    db: &SqliteClient,
    id: Option<i64>,
    mut input: CategoryInput,
) -> ApiResult<(CategoryInput, String)> {
    input.name = require_text("name", &input.name)?;
    max_chars("description", input.description.as_deref(), MESSAGE_MAX_CHARS)?;
    let slug = resolve_slug(input.slug.as_deref(), &input.name)?;

    if let Some(parent_id) = input.parent_id {
        if Some(parent_id) == id {
            return Err(ApiError::bad_request("A category cannot be its own parent"));
        }
        let Some(parent) = db.get_category(parent_id).await? else {
            return Err(ApiError::bad_request("Parent category not found"));
        };
        if let Some(id) = id {
            ensure_not_descendant(db, id, parent).await?;
        }
    }

    Ok((input, slug))
}

/// Walk up from `parent` and fail if the chain reaches `id`.
async fn ensure_not_descendant(db: &SqliteClient, id: i64, parent: Category) -> ApiResult<()> {
    let mut seen = HashSet::from([parent.id]);
    let mut next = parent.parent_id;
    while let Some(ancestor_id) = next {
        if ancestor_id == id {
            return Err(ApiError::bad_request(
                "A category cannot be moved under its own descendant",
            ));
        }
        if !seen.insert(ancestor_id) {
            break;
        }
        next = match db.get_category(ancestor_id).await? {
            Some(ancestor) => ancestor.parent_id,
            None => None,
        };
    }
    Ok(())
}

async fn validate_product(
    db: &SqliteClient,
    mut input: ProductInput,
) -> ApiResult<(ProductInput, String)> {
    input.name = require_text("name", &input.name)?;
    max_chars("description", input.description.as_deref(), DESCRIPTION_MAX_CHARS)?;
    price_cents("price_cents", input.price_cents)?;
    if let Some(old_price) = input.old_price_cents {
        price_cents("old_price_cents", old_price)?;
    }
    if let Some(stock) = input.stock {
        non_negative("stock", stock)?;
    }
    if let Some(url) = input.image_url.as_deref() {
        validate_media_url("image_url", url)?;
    }
    if let Some(category_id) = input.category_id {
        if db.get_category(category_id).await?.is_none() {
            return Err(ApiError::bad_request("Category not found"));
        }
    }
    let slug = resolve_slug(input.slug.as_deref(), &input.name)?;
    Ok((input, slug))
}

// ============================================================================
// Categories
// ============================================================================

/// GET /api/categories
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "catalog",
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 200, description = "All categories in display order", body = ListResponse<Category>)
    )
)]
pub async fn list_categories_handler(SiteDb(db): SiteDb) -> ApiResult<Json<ListResponse<Category>>> {
    Ok(Json(db.list_categories().await?.into()))
}

/// GET /api/categories/{id}
#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "catalog",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("id" = i64, Path, description = "Category id")
    ),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found", body = MessageResponse)
    )
)]
pub async fn get_category_handler(SiteDb(db): SiteDb, Path(id): Path<i64>) -> ApiResult<Json<Category>> {
    db.get_category(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category"))
}

/// POST /api/admin/categories
async fn create_category_handler(
    scope: AdminScope,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let (input, slug) = validate_category(&scope.db, None, payload).await?;
    let category = scope.db.create_category(&input, &slug).await?;
    tracing::info!(site = scope.db.site(), id = category.id, by = %scope.user.username, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

async fn save_category(db: &SqliteClient, id: i64, payload: CategoryInput) -> ApiResult<Json<Category>> {
    let (input, slug) = validate_category(db, Some(id), payload).await?;
    db.update_category(id, &input, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category"))
}

/// PUT /api/admin/categories/{id}
async fn replace_category_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<Json<Category>> {
    save_category(&db, id, payload).await
}

/// PATCH /api/admin/categories/{id}
async fn patch_category_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(patch): Json<CategoryPatch>,
) -> ApiResult<Json<Category>> {
    let current = db
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    save_category(&db, id, patch.merge_into(current)).await
}

/// DELETE /api/admin/categories/{id} - Products and children keep existing, detached.
async fn delete_category_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_category(id).await?, "Category")?;
    Ok(Json(MessageResponse::ok("Category deleted")))
}

/// POST /api/admin/categories/reorder
async fn reorder_categories_handler(
    AdminScope { db, .. }: AdminScope,
    Json(payload): Json<ReorderRequest>,
) -> ApiResult<Json<ListResponse<Category>>> {
    db.reorder_categories(&payload.ids).await?;
    Ok(Json(db.list_categories().await?.into()))
}

// ============================================================================
// Products
// ============================================================================

/// GET /api/products - Active products only.
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "catalog",
    params(("X-Site" = Option<String>, Header, description = "Site key"), ProductQuery),
    responses(
        (status = 200, description = "Active products", body = ListResponse<Product>)
    )
)]
pub async fn list_products_handler(
    SiteDb(db): SiteDb,
    Query(filter): Query<ProductQuery>,
) -> ApiResult<Json<ListResponse<Product>>> {
    Ok(Json(db.list_products(&filter, false).await?.into()))
}

/// GET /api/products/{id}
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "catalog",
    params(
        ("X-Site" = Option<String>, Header, description = "Site key"),
        ("id" = i64, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Active product", body = Product),
        (status = 404, description = "Product not found", body = MessageResponse)
    )
)]
pub async fn get_product_handler(SiteDb(db): SiteDb, Path(id): Path<i64>) -> ApiResult<Json<Product>> {
    db.get_product(id, false)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product"))
}

/// GET /api/admin/products - Includes inactive products.
async fn admin_list_products_handler(
    AdminScope { db, .. }: AdminScope,
    Query(filter): Query<ProductQuery>,
) -> ApiResult<Json<ListResponse<Product>>> {
    Ok(Json(db.list_products(&filter, true).await?.into()))
}

/// POST /api/admin/products
async fn create_product_handler(
    scope: AdminScope,
    Json(payload): Json<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let (input, slug) = validate_product(&scope.db, payload).await?;
    let product = scope.db.create_product(&input, &slug).await?;
    tracing::info!(site = scope.db.site(), id = product.id, by = %scope.user.username, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn save_product(db: &SqliteClient, id: i64, payload: ProductInput) -> ApiResult<Json<Product>> {
    let (input, slug) = validate_product(db, payload).await?;
    db.update_product(id, &input, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product"))
}

/// PUT /api/admin/products/{id}
async fn replace_product_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<ProductInput>,
) -> ApiResult<Json<Product>> {
    save_product(&db, id, payload).await
}

/// PATCH /api/admin/products/{id}
async fn patch_product_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    let current = db
        .get_product(id, true)
        .await?
        .ok_or_else(|| ApiError::not_found("Product"))?;
    save_product(&db, id, patch.merge_into(current)).await
}

/// DELETE /api/admin/products/{id}
async fn delete_product_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_product(id).await?, "Product")?;
    Ok(Json(MessageResponse::ok("Product deleted")))
}
