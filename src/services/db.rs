// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

/// SQLite client scoped to one site.
///
/// All site-partitioned queries (`*_db.rs` modules) bind `self.site`, so a client
/// obtained through [`SqliteClient::with_site`] can never read or modify another
/// site's rows. Cloning is cheap: the pool is reference-counted.
#[derive(Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
    site: String,
}

impl SqliteClient {
    /// Open (creating if needed) the database at `database_url` and run migrations.
    pub async fn connect(database_url: &str, default_site: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid DATABASE_URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");

        let pool = if in_memory {
            // Every connection to :memory: is a separate database; keep exactly one
            // alive for the lifetime of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
            }
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal),
                )
                .await
        }
        .context("Failed to open SQLite database")?;

        let client = Self {
            pool,
            site: default_site.to_string(),
        };
        client.migrate().await?;
        Ok(client)
    }

    /// Fresh private in-memory database, used by tests.
    pub async fn in_memory(default_site: &str) -> Result<Self> {
        Self::connect("sqlite::memory:", default_site).await
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")
    }

    /// Return a client sharing this pool but scoped to `site`.
    pub fn with_site(&self, site: &str) -> Self {
        Self {
            pool: self.pool.clone(),
            site: site.to_string(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Rewrite `sort_order` of the given rows to their position in `ids`.
    ///
    /// `table` must be one of the crate's own table names, never user input.
    /// Ids belonging to other sites are silently skipped.
    pub(crate) async fn reorder(&self, table: &'static str, ids: &[i64]) -> Result<(), sqlx::Error> {
        let query = format!("UPDATE {table} SET sort_order = ? WHERE id = ? AND site = ?");
        let mut tx = self.pool.begin().await?;
        for (position, id) in ids.iter().enumerate() {
            sqlx::query(&query)
                .bind(position as i64)
                .bind(id)
                .bind(&self.site)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }
}
