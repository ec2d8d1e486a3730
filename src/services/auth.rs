// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Authentication service: password login and session management.

use crate::config::{env_opt, env_or};
use crate::models::auth::{AuthUser, User, UserRole};
use crate::services::auth_db::{AuthDbClient, CreateSessionParams, CreateUserParams};
use anyhow::{anyhow, Context, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tracing::{info, warn};
use uuid::Uuid;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 32;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Configuration for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session lifetime in days
    pub session_max_age_days: u64,
    /// Mark the session cookie `Secure` (disable only for plain-http development)
    pub cookie_secure: bool,
    /// Admin created at startup when the users table is empty
    pub bootstrap_admin: Option<(String, String)>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_max_age_days: 30,
            cookie_secure: true,
            bootstrap_admin: None,
        }
    }
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bootstrap_admin = match (env_opt("ADMIN_USERNAME"), env_opt("ADMIN_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        Ok(Self {
            session_max_age_days: env_or("SESSION_MAX_AGE_DAYS", 30)?,
            cookie_secure: env_or("COOKIE_SECURE", true)?,
            bootstrap_admin,
        })
    }
}

/// Authentication service.
pub struct AuthService {
    db: AuthDbClient,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: AuthDbClient, config: AuthConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn db(&self) -> &AuthDbClient {
        &self.db
    }

    // ========== Token Generation ==========

    /// Generate a secure random token.
    /// Returns (raw_token, hash) - raw_token is sent to the client, hash is stored in DB.
    pub fn generate_token() -> (String, String) {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw_token = hex::encode(bytes);
        let hash = Self::hash_token(&raw_token);
        (raw_token, hash)
    }

    /// Hash a token for storage.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    // ========== Passwords ==========

    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Failed to hash password: {e}"))
    }

    pub fn verify_password(password: &str, password_hash: &str) -> bool {
        PasswordHash::new(password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Argon2 is deliberately slow; keep it off the async workers.
    pub async fn hash_password_blocking(password: String) -> Result<String> {
        tokio::task::spawn_blocking(move || Self::hash_password(&password))
            .await
            .context("Password hashing task failed")?
    }

    /// Without a stored hash the password is checked against a throwaway one,
    /// built on the blocking pool on first use.
    async fn verify_password_blocking(
        password: String,
        password_hash: Option<String>,
    ) -> Result<bool> {
        tokio::task::spawn_blocking(move || {
            let password_hash = password_hash.as_deref().unwrap_or_else(|| dummy_hash());
            Self::verify_password(&password, password_hash)
        })
        .await
        .context("Password verification task failed")
    }

    // ========== Login Flow ==========

    /// Check credentials and open a session.
    ///
    /// Returns `None` for an unknown user or a wrong password alike.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<Option<(String, User)>> {
        let user = self
            .db
            .get_user_by_username(username)
            .await
            .context("Failed to get user")?;

        // Unknown users still pay for one verification
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let valid = Self::verify_password_blocking(password.to_string(), stored_hash).await?;

        let Some(user) = user.filter(|_| valid) else {
            warn!(
                username,
                ip = ip_address.unwrap_or("unknown"),
                "Failed login attempt"
            );
            return Ok(None);
        };

        self.db
            .update_user_last_login(user.id)
            .await
            .context("Failed to update last login")?;

        let session_token = self
            .create_user_session(user.id, user_agent, ip_address)
            .await?;

        info!(
            user_id = %user.id,
            username = %user.username,
            role = user.role.as_str(),
            ip = ip_address.unwrap_or("unknown"),
            "User signed in"
        );

        Ok(Some((session_token, user)))
    }

    async fn create_user_session(
        &self,
        user_id: Uuid,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<String> {
        let (session_token, session_hash) = Self::generate_token();
        let expires_at =
            chrono::Utc::now() + chrono::Duration::days(self.config.session_max_age_days as i64);

        self.db
            .create_session(&CreateSessionParams {
                session_id_hash: &session_hash,
                user_id,
                expires_at,
                user_agent,
                ip_address,
            })
            .await
            .context("Failed to create session")?;

        Ok(session_token)
    }

    // ========== Session Management ==========

    /// Validate a session and return the authenticated user context.
    pub async fn validate_session(&self, session_token: &str) -> Result<Option<AuthUser>> {
        let session_hash = Self::hash_token(session_token);

        let Some(session) = self
            .db
            .get_session(&session_hash)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.db
                .delete_session(&session_hash)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let Some(user) = self
            .db
            .get_user_by_id(session.user_id)
            .await
            .context("Failed to get user")?
        else {
            return Ok(None);
        };

        // Fire and forget: activity tracking must not fail the request
        if let Err(e) = self.db.touch_session(&session_hash).await {
            warn!(error = %e, "Failed to touch session");
        }

        Ok(Some(AuthUser {
            user_id: user.id,
            username: user.username,
            role: user.role,
            site: user.site,
        }))
    }

    /// Sign out - invalidate session.
    pub async fn sign_out(&self, session_token: &str) -> Result<()> {
        let session_hash = Self::hash_token(session_token);
        self.db
            .delete_session(&session_hash)
            .await
            .context("Failed to delete session")
    }

    /// Sign out all sessions for a user.
    pub async fn sign_out_all(&self, user_id: Uuid) -> Result<u64> {
        self.db
            .delete_user_sessions(user_id)
            .await
            .context("Failed to delete all sessions")
    }

    // ========== Accounts ==========

    /// Create a staff account with a freshly hashed password.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
        site: Option<&str>,
    ) -> Result<Uuid> {
        let password_hash = Self::hash_password_blocking(password.to_string()).await?;
        let user_id = self
            .db
            .create_user(&CreateUserParams {
                username,
                password_hash: &password_hash,
                role,
                site,
            })
            .await
            .context("Failed to create user")?;

        info!(%user_id, username, role = role.as_str(), "User created");
        Ok(user_id)
    }

    /// Create the configured admin when no account exists yet.
    pub async fn bootstrap_admin(&self) -> Result<()> {
        let Some((username, password)) = &self.config.bootstrap_admin else {
            return Ok(());
        };

        if self.db.count_users().await.context("Failed to count users")? > 0 {
            return Ok(());
        }

        validate_username(username).map_err(|e| anyhow!("ADMIN_USERNAME: {e}"))?;
        validate_password(password).map_err(|e| anyhow!("ADMIN_PASSWORD: {e}"))?;

        self.create_user(username, password, UserRole::Admin, None)
            .await?;
        info!(username = %username, "Bootstrap admin account created");
        Ok(())
    }
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Blocking on first call; only reach it from `spawn_blocking`.
fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| {
        AuthService::hash_password("not-a-real-password").unwrap_or_default()
    })
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(format!(
            "Username must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err("Username cannot contain whitespace".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(format!(
            "Password must be at least {PASSWORD_MIN_CHARS} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::db::SqliteClient;

    async fn service() -> AuthService {
        let db = SqliteClient::in_memory("default").await.unwrap();
        AuthService::new(AuthDbClient::new(db.pool().clone()), AuthConfig::default())
    }

    #[test]
    fn test_generate_token_produces_matching_hash() {
        let (raw, hash) = AuthService::generate_token();
        assert_eq!(raw.len(), 64);
        assert_eq!(AuthService::hash_token(&raw), hash);
        assert_ne!(raw, hash);
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = AuthService::hash_password("correct horse").unwrap();
        assert!(AuthService::verify_password("correct horse", &hash));
        assert!(!AuthService::verify_password("wrong horse", &hash));
        assert!(!AuthService::verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_username_and_password_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("anna").is_ok());
        assert!(validate_username("an na").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let auth = service().await;
        auth.create_user("anna", "password123", UserRole::Admin, None)
            .await
            .unwrap();

        let (token, user) = auth
            .login("anna", "password123", Some("test"), Some("127.0.0.1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.username, "anna");

        let auth_user = auth.validate_session(&token).await.unwrap().unwrap();
        assert_eq!(auth_user.role, UserRole::Admin);

        auth.sign_out(&token).await.unwrap();
        assert!(auth.validate_session(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_hash_verifies_against_throwaway_hash() {
        let valid = AuthService::verify_password_blocking("not-a-real-password".to_string(), None)
            .await
            .unwrap();
        // Login still fails: there is no user to hand back
        assert!(valid);
        assert!(DUMMY_HASH.get().is_some());

        let valid = AuthService::verify_password_blocking("anything".to_string(), None)
            .await
            .unwrap();
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let auth = service().await;
        auth.create_user("anna", "password123", UserRole::Admin, None)
            .await
            .unwrap();

        assert!(auth
            .login("anna", "wrong-password", None, None)
            .await
            .unwrap()
            .is_none());
        assert!(auth
            .login("nobody", "password123", None, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sign_out_all_revokes_every_session() {
        let auth = service().await;
        let user_id = auth
            .create_user("anna", "password123", UserRole::Accountant, None)
            .await
            .unwrap();

        let (first, _) = auth.login("anna", "password123", None, None).await.unwrap().unwrap();
        let (second, _) = auth.login("anna", "password123", None, None).await.unwrap().unwrap();

        assert_eq!(auth.sign_out_all(user_id).await.unwrap(), 2);
        assert!(auth.validate_session(&first).await.unwrap().is_none());
        assert!(auth.validate_session(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_when_empty() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let config = AuthConfig {
            bootstrap_admin: Some(("root".to_string(), "password123".to_string())),
            ..AuthConfig::default()
        };
        let auth = AuthService::new(AuthDbClient::new(db.pool().clone()), config);

        auth.bootstrap_admin().await.unwrap();
        auth.bootstrap_admin().await.unwrap();

        assert_eq!(auth.db().count_users().await.unwrap(), 1);
        let root = auth.db().get_user_by_username("root").await.unwrap().unwrap();
        assert_eq!(root.role, UserRole::Admin);
    }
}
