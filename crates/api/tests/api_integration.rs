//! Integration tests for the HTTP gateway.

use std::sync::{Arc, OnceLock};

use argon2::{Algorithm, Argon2, Params, Version};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use identity::{DEFAULT_TOKEN_LIFETIME, TokenService};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::Timeouts;
use serde_json::{Value, json};
use tower::ServiceExt;

use api::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let tokens = Arc::new(TokenService::new("api-test-secret", DEFAULT_TOKEN_LIFETIME).unwrap());
    let mut state = AppState::in_memory(tokens, Timeouts::default());
    let params = Params::new(1024, 1, 1, None).unwrap();
    state.identity = state
        .identity
        .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params));
    api::create_app(Arc::new(state), get_metrics_handle())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Registers an account and returns `(user_id, token)`.
async fn register(app: &Router, email: &str) -> (String, String) {
    let (status, json) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": "hunter2!!", "name": "Test User" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
    (
        json["user_id"].as_str().unwrap().to_string(),
        json["token"].as_str().unwrap().to_string(),
    )
}

async fn create_ad(app: &Router, token: &str, body: Value) -> Value {
    let (status, json) = send(app, "POST", "/api/ads", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = setup();
    let (user_id, token) = register(&app, "alice@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter2!!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let login_token = json["token"].as_str().unwrap().to_string();

    for token in [token, login_token] {
        let (status, json) = send(&app, "GET", "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user_id"], user_id.as_str());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["name"], "Test User");
    }
}

#[tokio::test]
async fn test_register_rejections() {
    let app = setup();
    register(&app, "bob@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "bob@example.com", "password": "hunter2!!", "name": "Bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "carol@example.com", "password": "short", "name": "Carol" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": "not-an-email", "password": "hunter2!!", "name": "Dan" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = setup();
    register(&app, "erin@example.com").await;

    let (wrong_password, body_a) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "erin@example.com", "password": "wrong-pass!" })),
    )
    .await;
    let (unknown_email, body_b) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "hunter2!!" })),
    )
    .await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
}

#[tokio::test]
async fn test_profile_requires_valid_credential() {
    let app = setup();
    let (status, _) = send(&app, "GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/users/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_ad_with_images_and_get() {
    let app = setup();
    let (user_id, token) = register(&app, "seller@example.com").await;

    let created = create_ad(
        &app,
        &token,
        json!({
            "title": "Road bike",
            "description": "Barely used",
            "price": 45000,
            "category": "sports",
            "condition": "used",
            "images": ["eA==", "", "data:image/png;base64,eQ=="]
        }),
    )
    .await;

    assert_eq!(created["owner"], user_id.as_str());
    assert_eq!(created["status"], "active");
    assert_eq!(created["condition"], "used");
    let images = created["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["position"], 1);
    assert_eq!(images[0]["is_primary"], true);
    assert_eq!(images[1]["position"], 2);
    assert!(images[1]["url"].as_str().unwrap().ends_with("image-2.png"));

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/api/ads/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Road bike");
    assert_eq!(fetched["images"], created["images"]);
}

#[tokio::test]
async fn test_create_ad_rejections() {
    let app = setup();
    let (_, token) = register(&app, "seller@example.com").await;
    let body = json!({ "title": "Lamp", "price": 1200 });

    let (status, _) = send(&app, "POST", "/api/ads", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/ads",
        Some(&token),
        Some(json!({ "title": "", "price": 1200 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/ads",
        Some(&token),
        Some(json!({ "title": "Lamp", "price": 1200, "condition": "mint" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/ads",
        Some(&token),
        Some(json!({ "title": "Lamp", "price": 1200, "images": ["%%%"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = send(&app, "GET", "/api/ads", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_update_fields_and_images() {
    let app = setup();
    let (_, token) = register(&app, "seller@example.com").await;
    let created = create_ad(
        &app,
        &token,
        json!({ "title": "Desk", "price": 9000, "images": ["eA=="] }),
    )
    .await;
    let uri = format!("/api/ads/{}", created["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&token),
        Some(json!({ "title": "Standing desk", "price": 12000 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "images": ["eQ==", "eg=="] })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, fetched) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(fetched["title"], "Standing desk");
    assert_eq!(fetched["price"], 12000);
    assert_eq!(fetched["description"], "");
    let images = fetched["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_ne!(images[0]["url"], created["images"][0]["url"]);

    let (status, _) = send(&app, "PATCH", &uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "title": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mutations_by_non_owner_are_not_found() {
    let app = setup();
    let (_, owner) = register(&app, "owner@example.com").await;
    let (_, intruder) = register(&app, "intruder@example.com").await;
    let created = create_ad(
        &app,
        &owner,
        json!({ "title": "Camera", "price": 30000, "images": ["eA=="] }),
    )
    .await;
    let id = created["id"].as_str().unwrap();
    let uri = format!("/api/ads/{id}");

    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&intruder),
        Some(json!({ "title": "Mine now" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("{uri}/images"),
        Some(&intruder),
        Some(json!({ "images": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, fetched) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(fetched["title"], "Camera");
    assert_eq!(fetched["images"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_ad() {
    let app = setup();
    let (_, token) = register(&app, "seller@example.com").await;
    let created = create_ad(&app, &token, json!({ "title": "Chair", "price": 2500 })).await;
    let uri = format!("/api/ads/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_attach_detach_and_replace_media() {
    let app = setup();
    let (_, token) = register(&app, "seller@example.com").await;
    let created = create_ad(&app, &token, json!({ "title": "Guitar", "price": 60000 })).await;
    let uri = format!("/api/ads/{}", created["id"].as_str().unwrap());

    let (status, image) = send(
        &app,
        "POST",
        &format!("{uri}/media"),
        Some(&token),
        Some(json!({ "reference": "https://cdn.example.com/guitar.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(image["position"], 1);
    assert_eq!(image["is_primary"], true);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("{uri}/media?reference=https%3A%2F%2Fcdn.example.com%2Fguitar.jpg"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("{uri}/media?reference=missing.jpg"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("{uri}/images"),
        Some(&token),
        Some(json!({ "images": ["eA==", "eQ==", "eg=="] })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, fetched) = send(&app, "GET", &uri, None, None).await;
    let positions: Vec<i64> = fetched["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_search_filters_and_draft_visibility() {
    let app = setup();
    let (_, token) = register(&app, "seller@example.com").await;
    create_ad(
        &app,
        &token,
        json!({ "title": "Blue sofa", "price": 20000, "category": "furniture" }),
    )
    .await;
    create_ad(
        &app,
        &token,
        json!({ "title": "Red kettle", "price": 1500, "category": "kitchen" }),
    )
    .await;
    create_ad(
        &app,
        &token,
        json!({ "title": "Green sofa", "price": 18000, "category": "furniture", "status": "draft" }),
    )
    .await;

    let (status, page) = send(&app, "GET", "/api/ads?query=SOFA", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Blue sofa");

    let (_, page) = send(&app, "GET", "/api/ads?query=sofa", Some(&token), None).await;
    assert_eq!(page["total"], 2);

    let (_, page) = send(&app, "GET", "/api/ads?max_price=5000", None, None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Red kettle");

    let (_, page) = send(&app, "GET", "/api/ads?limit=1", None, None).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "GET",
        "/api/ads?min_price=100&max_price=10",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_draft_hidden_from_other_viewers() {
    let app = setup();
    let (_, owner) = register(&app, "owner@example.com").await;
    let (_, other) = register(&app, "other@example.com").await;
    let created = create_ad(
        &app,
        &owner,
        json!({ "title": "Unreleased", "price": 100, "status": "draft" }),
    )
    .await;
    let uri = format!("/api/ads/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_listing_id_format() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/api/ads/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid listing id"));
}
