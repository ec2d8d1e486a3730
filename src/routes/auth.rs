// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Authentication and staff account route handlers.

use crate::app::{AppState, ClientIp, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::models::auth::{
    AuthUser, CreateUserRequest, LoginRequest, UpdateUserRequest, UserResponse,
};
use crate::models::common::{ListResponse, MessageResponse};
use crate::routes::{enforce_rate_limit, found_or_404};
use crate::services::auth::{validate_password, validate_username, AuthService};
use crate::services::auth_middleware::{
    clear_session_cookie, create_session_cookie, extract_session_token,
};
use crate::services::validation::is_valid_site_key;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use tower_cookies::Cookies;
use uuid::Uuid;

/// Create auth router with all authentication routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Public routes (no auth required)
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        // Protected routes (auth required)
        .route("/auth/me", get(me_handler))
        .route(
            "/admin/users",
            get(list_users_handler).post(create_user_handler),
        )
        .route(
            "/admin/users/{id}",
            patch(update_user_handler).delete(delete_user_handler),
        )
}

/// Accounts are global, so only admins not bound to a site may manage them.
fn require_global_admin(user: &AuthUser) -> ApiResult<()> {
    if user.role.is_admin() && user.site.is_none() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only admins without a site binding can manage users",
        ))
    }
}

fn validate_site_binding(site: Option<&str>) -> ApiResult<()> {
    match site {
        Some(s) if !is_valid_site_key(s) => {
            Err(ApiError::bad_request(format!("Invalid site key '{s}'")))
        }
        _ => Ok(()),
    }
}

async fn load_user(state: &AppState, user_id: Uuid) -> ApiResult<UserResponse> {
    state
        .auth
        .db()
        .get_user_by_id(user_id)
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| ApiError::not_found("User"))
}

// ============================================================================
// Session Route Handlers
// ============================================================================

/// POST /api/auth/login - Check credentials and set the session cookie.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse),
        (status = 429, description = "Too many attempts", body = MessageResponse)
    )
)]
pub async fn login_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    cookies: Cookies,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<UserResponse>> {
    enforce_rate_limit(&state.login_limiter, ip)?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let ip_address = ip.to_string();

    let (session_token, user) = state
        .auth
        .login(
            payload.username.trim(),
            &payload.password,
            user_agent,
            Some(&ip_address),
        )
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let config = state.auth.config();
    cookies.add(create_session_cookie(
        &session_token,
        config.session_max_age_days,
        config.cookie_secure,
    ));

    Ok(Json(user.into()))
}

/// POST /api/auth/logout - Sign out and clear session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Signed out", body = MessageResponse))
)]
pub async fn logout_handler(State(state): State<AppState>, cookies: Cookies) -> Json<MessageResponse> {
    if let Some(session_token) = extract_session_token(&cookies) {
        if let Err(e) = state.auth.sign_out(&session_token).await {
            tracing::warn!(error = ?e, "Failed to delete session on logout");
        }
    }

    // Clear the cookie regardless
    cookies.remove(clear_session_cookie());

    Json(MessageResponse::ok("Signed out successfully"))
}

/// GET /api/auth/me - Get current authenticated user info.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "No valid session", body = MessageResponse)
    )
)]
pub async fn me_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<UserResponse>> {
    // A session whose user vanished mid-request is as good as none
    load_user(&state, user.user_id)
        .await
        .map(Json)
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::Unauthorized,
            other => other,
        })
}

// ============================================================================
// Account Route Handlers (global admin only)
// ============================================================================

/// GET /api/admin/users - List staff accounts.
async fn list_users_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ListResponse<UserResponse>>> {
    require_global_admin(&user)?;
    let users = state.auth.db().list_users().await?;
    Ok(Json(
        users
            .into_iter()
            .map(UserResponse::from)
            .collect::<Vec<_>>()
            .into(),
    ))
}

/// POST /api/admin/users - Create a staff account.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "auth",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 409, description = "Username taken", body = MessageResponse)
    )
)]
pub async fn create_user_handler(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    require_global_admin(&admin)?;

    let username = payload.username.trim();
    validate_username(username).map_err(ApiError::BadRequest)?;
    validate_password(&payload.password).map_err(ApiError::BadRequest)?;
    validate_site_binding(payload.site.as_deref())?;

    if state.auth.db().get_user_by_username(username).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "Username '{username}' is already taken"
        )));
    }

    let user_id = state
        .auth
        .create_user(
            username,
            &payload.password,
            payload.role,
            payload.site.as_deref(),
        )
        .await?;

    tracing::info!(created_by = %admin.username, %user_id, "Staff account created");
    Ok((StatusCode::CREATED, Json(load_user(&state, user_id).await?)))
}

/// PATCH /api/admin/users/{id} - Change role, password or site binding.
async fn update_user_handler(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    require_global_admin(&admin)?;

    let db = state.auth.db();
    if db.get_user_by_id(user_id).await?.is_none() {
        return Err(ApiError::not_found("User"));
    }

    if let Some(password) = &payload.password {
        validate_password(password).map_err(ApiError::BadRequest)?;
    }
    if let Some(site) = &payload.site {
        validate_site_binding(site.as_deref())?;
    }

    if let Some(role) = payload.role {
        db.update_user_role(user_id, role).await?;
    }
    if let Some(site) = &payload.site {
        db.update_user_site(user_id, site.as_deref()).await?;
    }
    if let Some(password) = payload.password {
        let password_hash = AuthService::hash_password_blocking(password).await?;
        db.update_user_password(user_id, &password_hash).await?;
        let revoked = state.auth.sign_out_all(user_id).await?;
        tracing::info!(%user_id, revoked, "Password changed, sessions revoked");
    }

    Ok(Json(load_user(&state, user_id).await?))
}

/// DELETE /api/admin/users/{id} - Delete an account and its sessions.
async fn delete_user_handler(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    require_global_admin(&admin)?;

    if user_id == admin.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    found_or_404(state.auth.db().delete_user(user_id).await?, "User")?;
    tracing::info!(deleted_by = %admin.username, %user_id, "Staff account deleted");
    Ok(Json(MessageResponse::ok("User deleted")))
}
