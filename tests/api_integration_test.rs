// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use site_admin::app::{create_router, AppState};
use site_admin::config::AppConfig;
use site_admin::models::auth::UserRole;
use site_admin::models::catalog::ProductInput;
use site_admin::services::auth::AuthConfig;
use site_admin::services::db::SqliteClient;
use site_admin::services::email::NewsletterSender;
use site_admin::services::rate_limit::RateLimitConfig;
use site_admin::services::storage::{StorageClient, StorageConfig};
use site_admin::services::telegram::{TelegramClient, TelegramConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    router: Router,
    state: AppState,
    _uploads: TempDir,
}

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        default_site: "default".to_string(),
        cors_origins: vec![],
        trust_proxy: false,
    }
}

async fn test_state(uploads: &TempDir) -> AppState {
    let db = SqliteClient::in_memory("default").await.unwrap();
    let auth_config = AuthConfig {
        cookie_secure: false,
        ..AuthConfig::default()
    };
    let storage = StorageClient::new(StorageConfig {
        upload_dir: uploads.path().to_path_buf(),
        max_bytes: 1024,
    });
    AppState::new(
        db,
        test_config(),
        auth_config,
        &RateLimitConfig::default(),
        storage,
    )
}

impl TestApp {
    async fn new() -> Self {
        let uploads = TempDir::new().unwrap();
        let state = test_state(&uploads).await;
        Self::from_state(state, uploads)
    }

    fn from_state(state: AppState, uploads: TempDir) -> Self {
        Self {
            router: create_router(state.clone()),
            state,
            _uploads: uploads,
        }
    }

    /// Create a user and return its session cookie (`name=value`).
    async fn login_as(&self, username: &str, role: UserRole, site: Option<&str>) -> String {
        self.state
            .auth
            .create_user(username, PASSWORD, role, site)
            .await
            .unwrap();

        let response = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({"username": username, "password": PASSWORD}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login sets a cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn product(name: &str, price_cents: i64, stock: Option<i64>) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        slug: None,
        category_id: None,
        description: None,
        price_cents,
        old_price_cents: None,
        image_url: None,
        stock,
        active: true,
        sort_order: 0,
    }
}

fn lead_body() -> Value {
    json!({"name": "Anna", "phone": "+7 (912) 345-67-89", "message": "Call me"})
}

// ============================================================================
// Service endpoints
// ============================================================================

#[tokio::test]
async fn test_version_and_health() {
    let app = TestApp::new().await;

    let (status, body) = app.send_json(get("/version", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "site-admin");
    assert_eq!(body["version"].as_str().unwrap().split('.').count(), 3);

    let (status, body) = app.send_json(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new().await;
    let response = app.send(get("/api/nope", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Authentication and role gates
// ============================================================================

#[tokio::test]
async fn test_login_me_logout_flow() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (status, me) = app.send_json(get("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "admin");

    let response = app
        .send(json_request("POST", "/api/auth/logout", Some(&cookie), json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app.send_json(get("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new().await;
    app.state
        .auth
        .create_user("anna", PASSWORD, UserRole::Admin, None)
        .await
        .unwrap();

    let (s1, b1) = app
        .send_json(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "anna", "password": "wrong-password"}),
        ))
        .await;
    let (s2, b2) = app
        .send_json(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "nobody", "password": "wrong-password"}),
        ))
        .await;

    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(b1["message"], b2["message"]);
    assert_eq!(b1["success"], false);
}

#[tokio::test]
async fn test_admin_routes_require_session_and_role() {
    let app = TestApp::new().await;
    let body = json!({"name": "Bread", "price_cents": 250});

    let (status, _) = app
        .send_json(json_request("POST", "/api/admin/products", None, body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let accountant = app.login_as("acc", UserRole::Accountant, None).await;
    let (status, _) = app
        .send_json(json_request("POST", "/api/admin/products", Some(&accountant), body))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Accountants may still read orders
    let (status, _) = app
        .send_json(get("/api/admin/orders", Some(&accountant)))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_site_bound_user_cannot_touch_other_sites() {
    let app = TestApp::new().await;
    let cookie = app.login_as("baker", UserRole::Admin, Some("bakery")).await;

    let (status, _) = app
        .send_json(get("/api/admin/products?site=bakery", Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send_json(get("/api/admin/products?site=florist", Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Site-bound admins cannot manage the global account list
    let (status, _) = app.send_json(get("/api/admin/users", Some(&cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new().await;
    let cookie = app.login_as("root", UserRole::Admin, None).await;

    let (status, created) = app
        .send_json(json_request(
            "POST",
            "/api/admin/users",
            Some(&cookie),
            json!({"username": "clerk", "password": "long-password", "role": "accountant"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "accountant");

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/admin/users",
            Some(&cookie),
            json!({"username": "clerk", "password": "long-password", "role": "admin"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/admin/users",
            Some(&cookie),
            json!({"username": "shorty", "password": "short", "role": "admin"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, me) = app.send_json(get("/api/auth/me", Some(&cookie))).await;
    let my_id = me["id"].as_str().unwrap().to_string();
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/users/{my_id}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_product_crud_and_site_isolation() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (status, created) = app
        .send_json(json_request(
            "POST",
            "/api/admin/products?site=bakery",
            Some(&cookie),
            json!({"name": "Rye Bread", "price_cents": 250, "stock": 3}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["slug"], "rye-bread");
    let id = created["id"].as_i64().unwrap();

    // Same slug on the same site conflicts
    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/admin/products?site=bakery",
            Some(&cookie),
            json!({"name": "Rye bread", "price_cents": 300}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send_json(get(&format!("/api/products/{id}?site=bakery"), None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send_json(get(&format!("/api/products/{id}?site=florist"), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, patched) = app
        .send_json(json_request(
            "PATCH",
            &format!("/api/admin/products/{id}?site=bakery"),
            Some(&cookie),
            json!({"active": false}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Rye Bread");
    assert_eq!(patched["active"], false);

    // Inactive products disappear from the public catalog
    let (_, list) = app.send_json(get("/api/products?site=bakery", None)).await;
    assert_eq!(list["count"], 0);

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/admin/products",
            Some(&cookie),
            json!({"name": "Bad", "price_cents": -1}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_cannot_be_its_own_parent() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (_, category) = app
        .send_json(json_request(
            "POST",
            "/api/admin/categories",
            Some(&cookie),
            json!({"name": "Bread"}),
        ))
        .await;
    let id = category["id"].as_i64().unwrap();

    let (status, _) = app
        .send_json(json_request(
            "PATCH",
            &format!("/api/admin/categories/{id}"),
            Some(&cookie),
            json!({"parent_id": id}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_cannot_move_under_its_descendant() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (_, root) = app
        .send_json(json_request(
            "POST",
            "/api/admin/categories",
            Some(&cookie),
            json!({"name": "Bakery"}),
        ))
        .await;
    let root_id = root["id"].as_i64().unwrap();
    let (_, child) = app
        .send_json(json_request(
            "POST",
            "/api/admin/categories",
            Some(&cookie),
            json!({"name": "Bread", "parent_id": root_id}),
        ))
        .await;
    let child_id = child["id"].as_i64().unwrap();
    let (_, grandchild) = app
        .send_json(json_request(
            "POST",
            "/api/admin/categories",
            Some(&cookie),
            json!({"name": "Rye", "parent_id": child_id}),
        ))
        .await;
    let grandchild_id = grandchild["id"].as_i64().unwrap();

    for parent_id in [child_id, grandchild_id] {
        let (status, _) = app
            .send_json(json_request(
                "PATCH",
                &format!("/api/admin/categories/{root_id}"),
                Some(&cookie),
                json!({"parent_id": parent_id}),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // Moving a leaf under a sibling branch is fine
    let (status, moved) = app
        .send_json(json_request(
            "PATCH",
            &format!("/api/admin/categories/{grandchild_id}"),
            Some(&cookie),
            json!({"parent_id": root_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["parent_id"], root_id);
}

#[tokio::test]
async fn test_product_prices_are_bounded() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let mut huge = product("Gold bar", 100_000_000_000_000_000, None);
    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/admin/products",
            Some(&cookie),
            serde_json::to_value(&huge).unwrap(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    huge.price_cents = 100;
    huge.old_price_cents = Some(i64::MAX);
    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/admin/products",
            Some(&cookie),
            serde_json::to_value(&huge).unwrap(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Cart and checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_creates_order_and_decrements_stock() {
    let app = TestApp::new().await;
    let db = app.state.db.with_site("default");
    let bread = db.create_product(&product("Bread", 250, Some(2)), "bread").await.unwrap();

    let (status, cart) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c1/items",
            None,
            json!({"product_id": bread.id, "quantity": 2}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 500);

    let (status, order) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c1/checkout",
            None,
            json!({"customer_name": "Anna", "phone": "+7 912 345 67 89"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "new");
    assert_eq!(order["total_cents"], 500);
    assert_eq!(order["phone"], "+79123456789");

    let stock = db.get_product(bread.id, true).await.unwrap().unwrap().stock;
    assert_eq!(stock, Some(0));

    let (_, cart) = app.send_json(get("/api/cart/c1", None)).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    // Empty cart cannot be checked out
    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c1/checkout",
            None,
            json!({"customer_name": "Anna", "phone": "+7 912 345 67 89"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_insufficient_stock_changes_nothing() {
    let app = TestApp::new().await;
    let db = app.state.db.with_site("default");
    let cake = db.create_product(&product("Cake", 1000, Some(1)), "cake").await.unwrap();

    app.send_json(json_request(
        "POST",
        "/api/cart/c2/items",
        None,
        json!({"product_id": cake.id, "quantity": 2}),
    ))
    .await;

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c2/checkout",
            None,
            json!({"customer_name": "Anna", "phone": "89123456789"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stock = db.get_product(cake.id, true).await.unwrap().unwrap().stock;
    assert_eq!(stock, Some(1));
    let (_, cart) = app.send_json(get("/api/cart/c2", None)).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cart_rejects_missing_product_and_zero_quantity() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c3/items",
            None,
            json!({"product_id": 999, "quantity": 1}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c3/items",
            None,
            json!({"product_id": 999, "quantity": 0}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cart_line_quantity_is_capped() {
    let app = TestApp::new().await;
    let db = app.state.db.with_site("default");
    let bread = db.create_product(&product("Bread", 250, None), "bread").await.unwrap();

    let (status, cart) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c1/items",
            None,
            json!({"product_id": bread.id, "quantity": 999}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["quantity"], 999);

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/cart/c1/items",
            None,
            json!({"product_id": bread.id, "quantity": 1}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, cart) = app.send_json(get("/api/cart/c1", None)).await;
    assert_eq!(cart["items"][0]["quantity"], 999);
}

// ============================================================================
// Bookings
// ============================================================================

#[tokio::test]
async fn test_booking_slot_conflict() {
    let app = TestApp::new().await;
    let date = (chrono::Utc::now().date_naive() + chrono::Duration::days(7))
        .format("%Y-%m-%d")
        .to_string();
    let body = json!({
        "name": "Anna",
        "phone": "+7 912 345 67 89",
        "service": "Haircut",
        "date": date,
        "time": "10:00"
    });

    let (status, booking) = app
        .send_json(json_request("POST", "/api/bookings", None, body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");

    let (status, _) = app
        .send_json(json_request("POST", "/api/bookings", None, body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, slots) = app
        .send_json(get(&format!("/api/bookings/slots?date={date}"), None))
        .await;
    assert_eq!(slots["taken"], json!(["10:00"]));

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/bookings",
            None,
            json!({
                "name": "Anna",
                "phone": "+7 912 345 67 89",
                "service": "Haircut",
                "date": "2000-01-01",
                "time": "10:00"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn booking_body(date: &str, time: &str) -> Value {
    json!({
        "name": "Anna",
        "phone": "+7 912 345 67 89",
        "service": "Haircut",
        "date": date,
        "time": time
    })
}

fn next_week() -> String {
    (chrono::Utc::now().date_naive() + chrono::Duration::days(7))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn test_reconfirming_cancelled_booking_cannot_double_book() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;
    let date = next_week();

    let (_, first) = app
        .send_json(json_request("POST", "/api/bookings", None, booking_body(&date, "11:00")))
        .await;
    let first_id = first["id"].as_i64().unwrap();

    let (status, _) = app
        .send_json(json_request(
            "PATCH",
            &format!("/api/admin/bookings/{first_id}"),
            Some(&cookie),
            json!({"status": "cancelled"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send_json(json_request("POST", "/api/bookings", None, booking_body(&date, "11:00")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send_json(json_request(
            "PATCH",
            &format!("/api/admin/bookings/{first_id}"),
            Some(&cookie),
            json!({"status": "confirmed"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, first) = app
        .send_json(get(&format!("/api/admin/bookings/{first_id}"), Some(&cookie)))
        .await;
    assert_eq!(first["status"], "cancelled");
}

#[tokio::test]
async fn test_booking_submissions_are_rate_limited() {
    let app = TestApp::new().await;
    let date = next_week();

    for hour in 0..RateLimitConfig::default().max_requests {
        let (status, _) = app
            .send_json(json_request(
                "POST",
                "/api/bookings",
                None,
                booking_body(&date, &format!("{:02}:00", 9 + hour)),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let response = app
        .send(json_request("POST", "/api/bookings", None, booking_body(&date, "18:00")))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

// ============================================================================
// Leads and Telegram
// ============================================================================

async fn app_with_telegram(server: &MockServer) -> TestApp {
    let uploads = TempDir::new().unwrap();
    let client = TelegramClient::new(TelegramConfig {
        bot_token: "TOKEN".to_string(),
        default_chat_id: "42".to_string(),
        api_base: server.uri(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let state = test_state(&uploads).await.with_telegram(client);
    TestApp::from_state(state, uploads)
}

#[tokio::test]
async fn test_lead_is_forwarded_to_site_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .and(body_partial_json(json!({"chat_id": "-100500"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with_telegram(&server).await;
    app.state
        .db
        .with_site("bakery")
        .set_setting("telegram_chat_id", &json!(-100500))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/leads")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-site", "bakery")
        .body(Body::from(lead_body().to_string()))
        .unwrap();
    let (status, body) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_lead_telegram_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"ok": false})))
        .mount(&server)
        .await;

    let app = app_with_telegram(&server).await;
    let (status, _) = app
        .send_json(json_request("POST", "/api/leads", None, lead_body()))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_lead_validation_and_rate_limit() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/leads",
            None,
            json!({"name": "A", "phone": "+7 912 345 67 89"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Telegram is not configured in this app; the remaining budget still counts
    for _ in 1..RateLimitConfig::default().max_requests {
        let (status, _) = app
            .send_json(json_request("POST", "/api/leads", None, lead_body()))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    let response = app
        .send(json_request("POST", "/api/leads", None, lead_body()))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
}

// ============================================================================
// Configurator and settings
// ============================================================================

fn configurator_data() -> Value {
    json!({
        "site_types": [{"id": "shop", "name": "Shop", "base_price_cents": 100000}],
        "modules": [
            {"id": "blog", "name": "Blog", "price_cents": 20000, "tiers": []},
            {"id": "cart", "name": "Cart", "price_cents": 30000,
             "tiers": [{"id": "pro", "name": "Pro", "price_cents": 50000}]}
        ],
        "packages": [
            {"id": "start", "name": "Start", "module_ids": ["blog", "cart"],
             "discount": {"percent": 10}}
        ]
    })
}

#[tokio::test]
async fn test_configurator_quote() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (status, _) = app.send_json(get("/api/configurator", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send_json(json_request(
            "PUT",
            "/api/admin/configurator",
            Some(&cookie),
            configurator_data(),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, quote) = app
        .send_json(json_request(
            "POST",
            "/api/configurator/quote",
            None,
            json!({"site_type": "shop", "package": "start",
                   "modules": [{"id": "cart", "tier": "pro"}]}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    // 1000.00 + (200.00 + 500.00) - 10%
    assert_eq!(quote["modules_cents"], 70000);
    assert_eq!(quote["discount_cents"], 7000);
    assert_eq!(quote["total_cents"], 163000);

    let (status, _) = app
        .send_json(json_request(
            "POST",
            "/api/configurator/quote",
            None,
            json!({"site_type": "castle"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn put_configurator(app: &TestApp) {
    let cookie = app.login_as("admin", UserRole::Admin, None).await;
    let (status, _) = app
        .send_json(json_request(
            "PUT",
            "/api/admin/configurator",
            Some(&cookie),
            configurator_data(),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

fn submit_body() -> Value {
    json!({
        "selection": {"site_type": "shop", "package": "start",
                      "modules": [{"id": "cart", "tier": "pro"}]},
        "name": "Anna",
        "phone": "+7 912 345 67 89",
        "comment": "Before summer"
    })
}

#[tokio::test]
async fn test_configurator_submit_is_forwarded_with_quote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .and(body_string_contains("1630.00"))
        .and(body_string_contains("Before summer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with_telegram(&server).await;
    put_configurator(&app).await;

    let (status, body) = app
        .send_json(json_request("POST", "/api/configurator/submit", None, submit_body()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["quote"]["total_cents"], 163000);
}

#[tokio::test]
async fn test_configurator_submit_without_telegram_is_unavailable() {
    let app = TestApp::new().await;
    put_configurator(&app).await;

    let (status, body) = app
        .send_json(json_request("POST", "/api/configurator/submit", None, submit_body()))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_configurator_submit_telegram_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = app_with_telegram(&server).await;
    put_configurator(&app).await;

    let (status, _) = app
        .send_json(json_request("POST", "/api/configurator/submit", None, submit_body()))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // Invalid selections never reach Telegram
    let mut bad = submit_body();
    bad["selection"]["site_type"] = json!("castle");
    let (status, _) = app
        .send_json(json_request("POST", "/api/configurator/submit", None, bad))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_private_settings_hidden_from_public() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    for (key, value) in [("theme", json!({"color": "red"})), ("telegram_chat_id", json!("-1"))] {
        let (status, _) = app
            .send_json(json_request(
                "PUT",
                &format!("/api/admin/settings/{key}"),
                Some(&cookie),
                json!({ "value": value }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, public) = app.send_json(get("/api/settings", None)).await;
    assert_eq!(public["theme"]["color"], "red");
    assert!(public.get("telegram_chat_id").is_none());

    let (_, all) = app.send_json(get("/api/admin/settings", Some(&cookie))).await;
    assert_eq!(all["telegram_chat_id"], "-1");
}

// ============================================================================
// Subscriptions and newsletters
// ============================================================================

#[tokio::test]
async fn test_subscribe_and_newsletter_without_smtp() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (status, first) = app
        .send_json(json_request(
            "POST",
            "/api/subscriptions",
            None,
            json!({"email": "Anna@Example.com"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);

    let (_, again) = app
        .send_json(json_request(
            "POST",
            "/api/subscriptions",
            None,
            json!({"email": "anna@example.com"}),
        ))
        .await;
    assert_eq!(again["created"], false);

    let (status, _) = app
        .send_json(get("/api/subscriptions/unsubscribe/not-a-token", None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, newsletter) = app
        .send_json(json_request(
            "POST",
            "/api/admin/newsletters",
            Some(&cookie),
            json!({"subject": "News", "body": "Hello"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = newsletter["id"].as_i64().unwrap();

    let (status, _) = app
        .send_json(json_request(
            "POST",
            &format!("/api/admin/newsletters/{id}/send"),
            Some(&cookie),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

/// Records every copy; addresses starting with `bounce` fail.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NewsletterSender for RecordingSender {
    async fn send_newsletter(
        &self,
        to_email: &str,
        _subject: &str,
        _body: &str,
        _site: &str,
        unsubscribe_token: &str,
    ) -> anyhow::Result<()> {
        if to_email.starts_with("bounce") {
            anyhow::bail!("mailbox unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to_email.to_string(), unsubscribe_token.to_string()));
        Ok(())
    }
}

impl RecordingSender {
    fn tokens_for(&self, email: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
            .collect()
    }
}

async fn send_newsletter(app: &TestApp, cookie: &str, subject: &str) -> (StatusCode, Value) {
    let (_, newsletter) = app
        .send_json(json_request(
            "POST",
            "/api/admin/newsletters",
            Some(cookie),
            json!({"subject": subject, "body": "Hello"}),
        ))
        .await;
    let id = newsletter["id"].as_i64().unwrap();
    app.send_json(json_request(
        "POST",
        &format!("/api/admin/newsletters/{id}/send"),
        Some(cookie),
        json!({}),
    ))
    .await
}

#[tokio::test]
async fn test_newsletter_delivery_and_unsubscribe_links() {
    let uploads = TempDir::new().unwrap();
    let sender = Arc::new(RecordingSender::default());
    let state = test_state(&uploads).await.with_email(SharedSender(sender.clone()));
    let app = TestApp::from_state(state, uploads);
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let db = app.state.db.with_site("default");
    for email in ["anna@example.com", "boris@example.com", "bounce@example.com"] {
        db.subscribe(email, None).await.unwrap();
    }

    let (status, report) = send_newsletter(&app, &cookie, "First").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["success"], false);
    assert_eq!(report["recipients_count"], 2);
    assert_eq!(report["failed_count"], 1);

    let (_, list) = app
        .send_json(get("/api/admin/newsletters", Some(&cookie)))
        .await;
    assert_eq!(list["items"][0]["recipients_count"], 2);
    assert!(!list["items"][0]["sent_at"].is_null());

    let (status, _) = send_newsletter(&app, &cookie, "Second").await;
    assert_eq!(status, StatusCode::OK);

    // Each mailing carries a new token, and the first link still works
    let tokens = sender.tokens_for("anna@example.com");
    assert_eq!(tokens.len(), 2);
    assert_ne!(tokens[0], tokens[1]);
    let (status, _) = app
        .send_json(get(
            &format!("/api/subscriptions/unsubscribe/{}", tokens[0]),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = send_newsletter(&app, &cookie, "Third").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["recipients_count"], 1);
    assert_eq!(sender.tokens_for("anna@example.com").len(), 2);
}

/// Lets a test keep a handle on the sender it hands to the app.
struct SharedSender(Arc<RecordingSender>);

#[async_trait]
impl NewsletterSender for SharedSender {
    async fn send_newsletter(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
        site: &str,
        unsubscribe_token: &str,
    ) -> anyhow::Result<()> {
        self.0
            .send_newsletter(to_email, subject, body, site, unsubscribe_token)
            .await
    }
}

// ============================================================================
// Uploads
// ============================================================================

fn multipart_request(uri: &str, cookie: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let boundary = "XBOUNDARYX";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_and_delete() {
    let app = TestApp::new().await;
    let cookie = app.login_as("admin", UserRole::Admin, None).await;

    let (status, uploaded) = app
        .send_json(multipart_request(
            "/api/admin/uploads?site=bakery",
            &cookie,
            "photo.PNG",
            b"\x89PNG data",
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let url = uploaded["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/bakery/"));
    assert!(url.ends_with(".png"));

    let response = app.send(get(&url, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app
        .send_json(multipart_request("/api/admin/uploads", &cookie, "run.sh", b"#!/bin/sh"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_json(multipart_request(
            "/api/admin/uploads",
            &cookie,
            "big.png",
            &[0u8; 2048],
        ))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let file_name = uploaded["file_name"].as_str().unwrap();
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/uploads/{file_name}?site=bakery"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send_json(request).await;
    assert_eq!(status, StatusCode::OK);
}
