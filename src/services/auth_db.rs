// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Database operations for authentication.
//!
//! Staff accounts and sessions are global: none of these queries are site-scoped.

use crate::models::auth::{Session, User, UserRole};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

/// Parameters for creating a session.
pub struct CreateSessionParams<'a> {
    pub session_id_hash: &'a str,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

/// Parameters for creating a user.
pub struct CreateUserParams<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
    pub site: Option<&'a str>,
}

const USER_COLUMNS: &str =
    "id, username, password_hash, role, site, created_at, updated_at, last_login_at";

/// Authentication database client.
#[derive(Clone)]
pub struct AuthDbClient {
    pool: SqlitePool,
}

impl AuthDbClient {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========== User Operations ==========

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(parse_user_row)
            .transpose()
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(parse_user_row)
            .transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        sqlx::query(&query)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(parse_user_row)
            .collect()
    }

    pub async fn count_users(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn create_user(&self, params: &CreateUserParams<'_>) -> Result<Uuid, sqlx::Error> {
        let user_id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role, site, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(params.username)
        .bind(params.password_hash)
        .bind(params.role)
        .bind(params.site)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(user_id)
    }

    pub async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_user_site(
        &self,
        user_id: Uuid,
        site: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET site = ?, updated_at = ? WHERE id = ?")
            .bind(site)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_user_last_login(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a user; their sessions go with them (ON DELETE CASCADE).
    pub async fn delete_user(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========== Session Operations ==========

    pub async fn create_session(&self, params: &CreateSessionParams<'_>) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO sessions
             (session_id, user_id, created_at, expires_at, last_active_at, user_agent, ip_address)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.session_id_hash)
        .bind(params.user_id)
        .bind(now)
        .bind(params.expires_at)
        .bind(now)
        .bind(params.user_agent)
        .bind(params.ip_address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_session(&self, session_id_hash: &str) -> Result<Option<Session>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT session_id, user_id, created_at, expires_at, last_active_at, user_agent, ip_address
             FROM sessions WHERE session_id = ?",
        )
        .bind(session_id_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Session {
            session_id: row.try_get("session_id")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            last_active_at: row.try_get("last_active_at")?,
            user_agent: row.try_get("user_agent")?,
            ip_address: row.try_get("ip_address")?,
        }))
    }

    pub async fn delete_session(&self, session_id_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn touch_session(&self, session_id_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET last_active_at = ? WHERE session_id = ?")
            .bind(Utc::now())
            .bind(session_id_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_user_row(row: SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
        site: row.try_get("site")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_login_at: row.try_get("last_login_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::db::SqliteClient;

    async fn client() -> AuthDbClient {
        let db = SqliteClient::in_memory("default").await.unwrap();
        AuthDbClient::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let db = client().await;
        let id = db
            .create_user(&CreateUserParams {
                username: "anna",
                password_hash: "hash",
                role: UserRole::Accountant,
                site: Some("bakery"),
            })
            .await
            .unwrap();

        let user = db.get_user_by_username("anna").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Accountant);
        assert_eq!(user.site.as_deref(), Some("bakery"));
        assert!(user.last_login_at.is_none());

        assert!(db.get_user_by_id(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = client().await;
        let params = CreateUserParams {
            username: "anna",
            password_hash: "hash",
            role: UserRole::Admin,
            site: None,
        };
        db.create_user(&params).await.unwrap();
        let err = db.create_user(&params).await.unwrap_err();
        assert!(err
            .as_database_error()
            .is_some_and(|e| e.is_unique_violation()));
    }

    #[tokio::test]
    async fn test_deleting_user_removes_sessions() {
        let db = client().await;
        let user_id = db
            .create_user(&CreateUserParams {
                username: "anna",
                password_hash: "hash",
                role: UserRole::Admin,
                site: None,
            })
            .await
            .unwrap();

        db.create_session(&CreateSessionParams {
            session_id_hash: "abc",
            user_id,
            expires_at: Utc::now() + chrono::Duration::days(1),
            user_agent: Some("test"),
            ip_address: None,
        })
        .await
        .unwrap();
        assert!(db.get_session("abc").await.unwrap().is_some());

        assert!(db.delete_user(user_id).await.unwrap());
        assert!(db.get_session("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let db = client().await;
        let user_id = db
            .create_user(&CreateUserParams {
                username: "anna",
                password_hash: "hash",
                role: UserRole::Admin,
                site: None,
            })
            .await
            .unwrap();

        for (hash, offset) in [("old", -1), ("new", 1)] {
            db.create_session(&CreateSessionParams {
                session_id_hash: hash,
                user_id,
                expires_at: Utc::now() + chrono::Duration::hours(offset),
                user_agent: None,
                ip_address: None,
            })
            .await
            .unwrap();
        }

        assert_eq!(db.delete_expired_sessions().await.unwrap(), 1);
        assert!(db.get_session("new").await.unwrap().is_some());
    }
}
