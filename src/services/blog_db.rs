// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Blog posts and tags.

use crate::models::blog::{BlogPost, BlogPostInput, BlogPostWithTags, BlogTag, BlogTagWithCount};
use crate::models::common::Pagination;
use crate::services::db::SqliteClient;
use crate::services::validation::slugify;
use chrono::Utc;
use sqlx::sqlite::SqliteExecutor;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

const POST_COLUMNS: &str = "id, title, slug, excerpt, content, cover_url, published, \
     published_at, created_at, updated_at";

async fn tags_for_post<'e>(
    executor: impl SqliteExecutor<'e>,
    post_id: i64,
) -> Result<Vec<BlogTag>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.id, t.name, t.slug
         FROM blog_tags t
         JOIN blog_post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?
         ORDER BY t.name",
    )
    .bind(post_id)
    .fetch_all(executor)
    .await
}

impl SqliteClient {
    async fn with_tags(&self, post: BlogPost) -> Result<BlogPostWithTags, sqlx::Error> {
        let tags = tags_for_post(self.pool(), post.id).await?;
        Ok(BlogPostWithTags { post, tags })
    }

    /// Replace the post's tags with `names`, creating missing tags on the fly.
    async fn replace_post_tags(
        &self,
        conn: &mut SqliteConnection,
        post_id: i64,
        names: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM blog_post_tags WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *conn)
            .await?;

        for name in names {
            let name = name.trim();
            let slug = slugify(name);
            if slug.is_empty() {
                continue;
            }

            sqlx::query(
                "INSERT INTO blog_tags (site, name, slug) VALUES (?, ?, ?)
                 ON CONFLICT (site, slug) DO NOTHING",
            )
            .bind(self.site())
            .bind(name)
            .bind(&slug)
            .execute(&mut *conn)
            .await?;

            let tag_id: i64 = sqlx::query_scalar("SELECT id FROM blog_tags WHERE site = ? AND slug = ?")
                .bind(self.site())
                .bind(&slug)
                .fetch_one(&mut *conn)
                .await?;

            sqlx::query("INSERT OR IGNORE INTO blog_post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Posts newest first. Public listings see published posts only, ordered by
    /// publication time; `tag` filters by tag slug.
    pub async fn list_posts(
        &self,
        published_only: bool,
        tag: Option<&str>,
        page: Pagination,
    ) -> Result<Vec<BlogPostWithTags>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE site = "));
        qb.push_bind(self.site());

        if published_only {
            qb.push(" AND published = 1");
        }
        if let Some(tag) = tag {
            qb.push(
                " AND EXISTS (SELECT 1 FROM blog_post_tags pt
                   JOIN blog_tags t ON t.id = pt.tag_id
                   WHERE pt.post_id = blog_posts.id AND t.slug = ",
            )
            .push_bind(tag.to_string())
            .push(")");
        }
        if published_only {
            qb.push(" ORDER BY published_at DESC, id DESC");
        } else {
            qb.push(" ORDER BY created_at DESC, id DESC");
        }
        qb.push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let posts: Vec<BlogPost> = qb.build_query_as().fetch_all(self.pool()).await?;
        let mut result = Vec::with_capacity(posts.len());
        for post in posts {
            result.push(self.with_tags(post).await?);
        }
        Ok(result)
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<BlogPostWithTags>, sqlx::Error> {
        let query = format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE id = ? AND site = ?");
        let post: Option<BlogPost> = sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await?;
        match post {
            Some(post) => self.with_tags(post).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn get_published_post_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<BlogPostWithTags>, sqlx::Error> {
        let query = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts WHERE slug = ? AND site = ? AND published = 1"
        );
        let post: Option<BlogPost> = sqlx::query_as(&query)
            .bind(slug)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await?;
        match post {
            Some(post) => self.with_tags(post).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn create_post(
        &self,
        input: &BlogPostInput,
        slug: &str,
    ) -> Result<BlogPostWithTags, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        let query = format!(
            "INSERT INTO blog_posts
             (site, title, slug, excerpt, content, cover_url, published, published_at,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {POST_COLUMNS}"
        );
        let post: BlogPost = sqlx::query_as(&query)
            .bind(self.site())
            .bind(&input.title)
            .bind(slug)
            .bind(&input.excerpt)
            .bind(&input.content)
            .bind(&input.cover_url)
            .bind(input.published)
            .bind(input.published.then_some(now))
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        self.replace_post_tags(&mut tx, post.id, &input.tags).await?;
        let tags = tags_for_post(&mut *tx, post.id).await?;
        tx.commit().await?;

        Ok(BlogPostWithTags { post, tags })
    }

    /// Replace a post. `published_at` is stamped the first time it is published
    /// and kept from then on.
    pub async fn update_post(
        &self,
        id: i64,
        input: &BlogPostInput,
        slug: &str,
    ) -> Result<Option<BlogPostWithTags>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        let query = format!(
            "UPDATE blog_posts
             SET title = ?, slug = ?, excerpt = ?, content = ?, cover_url = ?, published = ?,
                 published_at = CASE WHEN ? AND published_at IS NULL THEN ? ELSE published_at END,
                 updated_at = ?
             WHERE id = ? AND site = ?
             RETURNING {POST_COLUMNS}"
        );
        let post: Option<BlogPost> = sqlx::query_as(&query)
            .bind(&input.title)
            .bind(slug)
            .bind(&input.excerpt)
            .bind(&input.content)
            .bind(&input.cover_url)
            .bind(input.published)
            .bind(input.published)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(self.site())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(post) = post else {
            return Ok(None);
        };

        self.replace_post_tags(&mut tx, post.id, &input.tags).await?;
        let tags = tags_for_post(&mut *tx, post.id).await?;
        tx.commit().await?;

        Ok(Some(BlogPostWithTags { post, tags }))
    }

    pub async fn delete_post(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tags with the number of published posts carrying them.
    pub async fn list_tags(&self) -> Result<Vec<BlogTagWithCount>, sqlx::Error> {
        sqlx::query_as(
            "SELECT t.id, t.name, t.slug, COUNT(p.id) AS post_count
             FROM blog_tags t
             LEFT JOIN blog_post_tags pt ON pt.tag_id = t.id
             LEFT JOIN blog_posts p ON p.id = pt.post_id AND p.published = 1
             WHERE t.site = ?
             GROUP BY t.id, t.name, t.slug
             ORDER BY t.name",
        )
        .bind(self.site())
        .fetch_all(self.pool())
        .await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blog_tags WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
