// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, per-request site and session resolution, and router
//! construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::auth::AuthUser;
use crate::models::version::{HealthResponse, VersionResponse};
use crate::routes::{self, ApiDoc};
use crate::services::auth::{AuthConfig, AuthService};
use crate::services::auth_db::AuthDbClient;
use crate::services::auth_middleware::extract_session_token;
use crate::services::db::SqliteClient;
use crate::services::email::NewsletterSender;
use crate::services::rate_limit::{RateLimitConfig, RateLimiter};
use crate::services::storage::{StorageClient, PUBLIC_PREFIX};
use crate::services::telegram::TelegramClient;
use crate::services::validation::is_valid_site_key;
use anyhow::anyhow;
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::{CookieManagerLayer, Cookies};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `SITE_ADMIN_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("SITE_ADMIN_VERSION");

/// Header selecting the site a request works on.
pub const SITE_HEADER: &str = "x-site";

/// Room for multipart boundaries and headers on top of the upload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared application state injected into every route handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Client scoped to the default site; handlers get a per-request copy via
    /// [`SiteDb`], [`AdminScope`] or [`StaffScope`].
    pub db: SqliteClient,
    pub auth: Arc<AuthService>,
    /// `None` when no bot token is configured
    pub telegram: Option<Arc<TelegramClient>>,
    /// `None` when SMTP is not configured
    pub email: Option<Arc<dyn NewsletterSender>>,
    pub storage: Arc<StorageClient>,
    /// Shared by every public form: leads, reviews, subscriptions, bookings,
    /// checkouts and configurator submissions
    pub lead_limiter: Arc<RateLimiter>,
    pub login_limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        db: SqliteClient,
        config: AppConfig,
        auth_config: AuthConfig,
        rate_limits: &RateLimitConfig,
        storage: StorageClient,
    ) -> Self {
        let auth = AuthService::new(AuthDbClient::new(db.pool().clone()), auth_config);
        Self {
            db,
            auth: Arc::new(auth),
            telegram: None,
            email: None,
            storage: Arc::new(storage),
            lead_limiter: Arc::new(RateLimiter::new(
                "leads",
                rate_limits.max_requests,
                rate_limits.window,
            )),
            login_limiter: Arc::new(RateLimiter::new(
                "login",
                rate_limits.login_max_attempts,
                rate_limits.window,
            )),
            config: Arc::new(config),
        }
    }

    pub fn with_telegram(mut self, client: TelegramClient) -> Self {
        self.telegram = Some(Arc::new(client));
        self
    }

    pub fn with_email(mut self, sender: impl NewsletterSender + 'static) -> Self {
        self.email = Some(Arc::new(sender));
        self
    }
}

// ---------------------------------------------------------------------------
// Per-request extractors
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SiteParam {
    site: Option<String>,
}

/// Site of the request: `X-Site` header, then `?site=`, then the default site.
pub fn resolve_site(parts: &Parts, default_site: &str) -> ApiResult<String> {
    let header_site = match parts.headers.get(SITE_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid X-Site header"))?
                .trim()
                .to_string(),
        ),
        None => None,
    };

    let site = header_site
        .filter(|s| !s.is_empty())
        .or_else(|| {
            Query::<SiteParam>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(param)| param.site)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| default_site.to_string());

    if !is_valid_site_key(&site) {
        return Err(ApiError::bad_request(format!("Invalid site key '{site}'")));
    }
    Ok(site)
}

/// Database client scoped to the request's site, for public endpoints.
pub struct SiteDb(pub SqliteClient);

impl FromRequestParts<AppState> for SiteDb {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let site = resolve_site(parts, &state.config.default_site)?;
        Ok(SiteDb(state.db.with_site(&site)))
    }
}

/// The signed-in user, regardless of role or site.
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_user(parts, state).await.map(CurrentUser)
    }
}

async fn session_user(parts: &mut Parts, state: &AppState) -> ApiResult<AuthUser> {
    let cookies = Cookies::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| ApiError::Internal(anyhow!("Failed to read request cookies: {msg}")))?;

    let session_token = extract_session_token(&cookies).ok_or(ApiError::Unauthorized)?;

    state
        .auth
        .validate_session(&session_token)
        .await?
        .ok_or(ApiError::Unauthorized)
}

/// Resolve the user and site for an authenticated request.
///
/// Missing session is 401; a role outside `allowed` or a site the user is not
/// bound to is 403.
async fn scoped_db(
    parts: &mut Parts,
    state: &AppState,
    admin_only: bool,
) -> ApiResult<(SqliteClient, AuthUser)> {
    let user = session_user(parts, state).await?;

    let role_ok = if admin_only {
        user.role.is_admin()
    } else {
        user.role.is_staff()
    };
    if !role_ok {
        return Err(ApiError::forbidden("Your role does not allow this operation"));
    }

    let site = resolve_site(parts, &state.config.default_site)?;
    if !user.can_access_site(&site) {
        tracing::warn!(username = %user.username, site, "Site access denied");
        return Err(ApiError::forbidden(format!("No access to site '{site}'")));
    }

    Ok((state.db.with_site(&site), user))
}

/// Admin on the request's site.
pub struct AdminScope {
    pub db: SqliteClient,
    pub user: AuthUser,
}

impl FromRequestParts<AppState> for AdminScope {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (db, user) = scoped_db(parts, state, true).await?;
        Ok(AdminScope { db, user })
    }
}

/// Admin or accountant on the request's site.
pub struct StaffScope {
    pub db: SqliteClient,
    pub user: AuthUser,
}

impl FromRequestParts<AppState> for StaffScope {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (db, user) = scoped_db(parts, state, false).await?;
        Ok(StaffScope { db, user })
    }
}

/// Client address used for rate limiting.
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.config.trust_proxy {
            if let Some(ip) = forwarded_ip(&parts.headers) {
                return Ok(ClientIp(ip));
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Ok(ClientIp(ip))
    }
}

/// First address of `X-Forwarded-For`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

// ---------------------------------------------------------------------------
// Service handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/version",
    tag = "service",
    responses((status = 200, description = "Service version", body = VersionResponse))
)]
pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "site-admin".to_string(),
        version: VERSION.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: true,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    database: false,
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SITE_HEADER)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Build the Axum application router.
pub fn create_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.storage.root());
    let body_limit = state.storage.max_bytes() + MULTIPART_OVERHEAD;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/version", get(version_handler))
        .route("/health", get(health_handler))
        .nest("/api", routes::api_router())
        .with_state(state)
        .nest_service(PUBLIC_PREFIX, uploads)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
