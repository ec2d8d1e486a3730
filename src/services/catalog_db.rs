// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Category and product queries.

use crate::models::catalog::{Category, CategoryInput, Product, ProductInput, ProductQuery};
use crate::services::db::SqliteClient;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, sort_order, created_at";

const PRODUCT_COLUMNS: &str = "id, category_id, name, slug, description, price_cents, \
     old_price_cents, image_url, stock, active, sort_order, created_at, updated_at";

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl SqliteClient {
    // ========== Categories ==========

    pub async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE site = ? ORDER BY sort_order, id"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ? AND site = ?");
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn create_category(
        &self,
        input: &CategoryInput,
        slug: &str,
    ) -> Result<Category, sqlx::Error> {
        let query = format!(
            "INSERT INTO categories (site, name, slug, description, parent_id, sort_order, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(&input.name)
            .bind(slug)
            .bind(&input.description)
            .bind(input.parent_id)
            .bind(input.sort_order)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
    }

    pub async fn update_category(
        &self,
        id: i64,
        input: &CategoryInput,
        slug: &str,
    ) -> Result<Option<Category>, sqlx::Error> {
        let query = format!(
            "UPDATE categories
             SET name = ?, slug = ?, description = ?, parent_id = ?, sort_order = ?
             WHERE id = ? AND site = ?
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(&input.name)
            .bind(slug)
            .bind(&input.description)
            .bind(input.parent_id)
            .bind(input.sort_order)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    /// Products and child categories of a deleted category lose the reference.
    pub async fn delete_category(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn reorder_categories(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        self.reorder("categories", ids).await
    }

    // ========== Products ==========

    pub async fn list_products(
        &self,
        filter: &ProductQuery,
        include_inactive: bool,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE site = "
        ));
        qb.push_bind(self.site());

        if !include_inactive {
            qb.push(" AND active = 1");
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND name LIKE ")
                .push_bind(like_pattern(search))
                .push(" ESCAPE '\\'");
        }

        let page = filter.pagination();
        qb.push(" ORDER BY sort_order, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        qb.build_query_as().fetch_all(self.pool()).await
    }

    pub async fn get_product(
        &self,
        id: i64,
        include_inactive: bool,
    ) -> Result<Option<Product>, sqlx::Error> {
        let active_clause = if include_inactive { "" } else { " AND active = 1" };
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND site = ?{active_clause}"
        );
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn create_product(
        &self,
        input: &ProductInput,
        slug: &str,
    ) -> Result<Product, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO products
             (site, category_id, name, slug, description, price_cents, old_price_cents,
              image_url, stock, active, sort_order, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(input.category_id)
            .bind(&input.name)
            .bind(slug)
            .bind(&input.description)
            .bind(input.price_cents)
            .bind(input.old_price_cents)
            .bind(&input.image_url)
            .bind(input.stock)
            .bind(input.active)
            .bind(input.sort_order)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool())
            .await
    }

    pub async fn update_product(
        &self,
        id: i64,
        input: &ProductInput,
        slug: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let query = format!(
            "UPDATE products
             SET category_id = ?, name = ?, slug = ?, description = ?, price_cents = ?,
                 old_price_cents = ?, image_url = ?, stock = ?, active = ?, sort_order = ?,
                 updated_at = ?
             WHERE id = ? AND site = ?
             RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(input.category_id)
            .bind(&input.name)
            .bind(slug)
            .bind(&input.description)
            .bind(input.price_cents)
            .bind(input.old_price_cents)
            .bind(&input.image_url)
            .bind(input.stock)
            .bind(input.active)
            .bind(input.sort_order)
            .bind(Utc::now())
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_product(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price_cents: i64) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            slug: None,
            category_id: None,
            description: None,
            price_cents,
            old_price_cents: None,
            image_url: None,
            stock: None,
            active: true,
            sort_order: 0,
        }
    }

    fn category(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            slug: None,
            description: None,
            parent_id: None,
            sort_order: 0,
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rye"), "%rye%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_categories_are_site_scoped() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let bakery = db.with_site("bakery");

        let bread = bakery.create_category(&category("Bread"), "bread").await.unwrap();
        assert_eq!(bakery.list_categories().await.unwrap().len(), 1);
        assert!(db.list_categories().await.unwrap().is_empty());
        assert!(db.get_category(bread.id).await.unwrap().is_none());
        assert!(!db.delete_category(bread.id).await.unwrap());

        // Same slug on another site is fine
        db.create_category(&category("Bread"), "bread").await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_unique_violation() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        db.create_product(&product("Rye", 100), "rye").await.unwrap();
        let err = db
            .create_product(&product("Rye 2", 100), "rye")
            .await
            .unwrap_err();
        assert!(err
            .as_database_error()
            .is_some_and(|e| e.is_unique_violation()));
    }

    #[tokio::test]
    async fn test_list_products_filters() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let cakes = db.create_category(&category("Cakes"), "cakes").await.unwrap();

        let mut napoleon = product("Napoleon cake", 900);
        napoleon.category_id = Some(cakes.id);
        db.create_product(&napoleon, "napoleon").await.unwrap();

        let mut hidden = product("Hidden cake", 500);
        hidden.active = false;
        db.create_product(&hidden, "hidden").await.unwrap();

        db.create_product(&product("Rye bread", 300), "rye").await.unwrap();

        let public = db
            .list_products(&ProductQuery::default(), false)
            .await
            .unwrap();
        assert_eq!(public.len(), 2);

        let all = db
            .list_products(&ProductQuery::default(), true)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let search = ProductQuery {
            search: Some("cake".to_string()),
            ..Default::default()
        };
        let found = db.list_products(&search, false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Napoleon cake");

        let by_category = ProductQuery {
            category_id: Some(cakes.id),
            ..Default::default()
        };
        assert_eq!(db.list_products(&by_category, true).await.unwrap().len(), 1);

        let paged = ProductQuery {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        };
        let page = db.list_products(&paged, true).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Hidden cake");
    }

    #[tokio::test]
    async fn test_inactive_product_hidden_from_public_get() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let mut input = product("Secret", 100);
        input.active = false;
        let created = db.create_product(&input, "secret").await.unwrap();

        assert!(db.get_product(created.id, false).await.unwrap().is_none());
        assert!(db.get_product(created.id, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deleting_category_unlinks_products() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let cakes = db.create_category(&category("Cakes"), "cakes").await.unwrap();
        let mut input = product("Napoleon", 900);
        input.category_id = Some(cakes.id);
        let created = db.create_product(&input, "napoleon").await.unwrap();

        assert!(db.delete_category(cakes.id).await.unwrap());
        let product = db.get_product(created.id, true).await.unwrap().unwrap();
        assert_eq!(product.category_id, None);
    }

    #[tokio::test]
    async fn test_update_and_reorder() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let a = db.create_category(&category("A"), "a").await.unwrap();
        let b = db.create_category(&category("B"), "b").await.unwrap();

        db.reorder_categories(&[b.id, a.id]).await.unwrap();
        let names: Vec<String> = db
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);

        let mut renamed = category("A prime");
        renamed.parent_id = Some(b.id);
        let updated = db
            .update_category(a.id, &renamed, "a-prime")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.slug, "a-prime");
        assert_eq!(updated.parent_id, Some(b.id));

        assert!(db
            .update_category(9999, &renamed, "x")
            .await
            .unwrap()
            .is_none());
    }
}
