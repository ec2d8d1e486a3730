// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// User Role
// ============================================================================

/// Role of a staff account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access to content, catalog, users and settings
    Admin,
    /// Read access to orders, bookings and subscribers; can move order status
    Accountant,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Accountant => "accountant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "accountant" => Some(UserRole::Accountant),
            _ => None,
        }
    }

    /// Check if this role can edit site content and configuration
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Check if this role can see orders, bookings and subscribers
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Accountant)
    }
}

// ============================================================================
// Database Models
// ============================================================================

/// User record from the database.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    /// Site the account is bound to; `None` grants every site.
    pub site: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Session record from the database.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String, // SHA-256 hash
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Authenticated request context, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub site: Option<String>,
}

impl AuthUser {
    /// Unbound accounts may work on any site.
    pub fn can_access_site(&self, site: &str) -> bool {
        self.site.as_deref().is_none_or(|bound| bound == site)
    }
}

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    #[serde(default)]
    pub site: Option<String>,
}

/// Partial update of a staff account.
///
/// `site` uses a nested option: absent leaves the binding alone, `null` unbinds.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    pub site: Option<Option<String>>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub site: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            role: user.role,
            site: user.site,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [UserRole::Admin, UserRole::Accountant] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("owner"), None);
    }

    #[test]
    fn test_role_permissions() {
        assert!(UserRole::Admin.is_admin());
        assert!(UserRole::Admin.is_staff());
        assert!(!UserRole::Accountant.is_admin());
        assert!(UserRole::Accountant.is_staff());
    }

    #[test]
    fn test_site_binding() {
        let mut user = AuthUser {
            user_id: Uuid::now_v7(),
            username: "anna".to_string(),
            role: UserRole::Admin,
            site: None,
        };
        assert!(user.can_access_site("bakery"));

        user.site = Some("bakery".to_string());
        assert!(user.can_access_site("bakery"));
        assert!(!user.can_access_site("florist"));
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            session_id: "hash".to_string(),
            user_id: Uuid::now_v7(),
            created_at: now,
            expires_at: now - chrono::Duration::seconds(1),
            last_active_at: now,
            user_agent: None,
            ip_address: None,
        };
        assert!(session.is_expired());
    }

    #[test]
    fn test_update_user_request_site_states() {
        let absent: UpdateUserRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.site, None);

        let unbind: UpdateUserRequest = serde_json::from_str(r#"{"site":null}"#).unwrap();
        assert_eq!(unbind.site, Some(None));

        let bind: UpdateUserRequest = serde_json::from_str(r#"{"site":"bakery"}"#).unwrap();
        assert_eq!(bind.site, Some(Some("bakery".to_string())));
    }
}
