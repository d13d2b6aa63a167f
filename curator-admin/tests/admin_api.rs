//! Integration tests for the admin HTTP surface.
//!
//! Uses `tower::ServiceExt::oneshot` to call the router without binding a
//! real TCP port; every test gets a fresh in-memory database.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use curator_admin::server::AdminServer;
use curator_admin::stats_source::NoStats;
use curator_core::config::{AdminConfig, SecurityConfig};
use curator_store::vault::Vault;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const USERNAME: &str = "admin";
const PASSWORD: &str = "hunter2";

fn admin_config() -> AdminConfig {
    AdminConfig {
        username: USERNAME.to_string(),
        password: Some(PASSWORD.to_string()),
        jwt_ttl_s: 3600,
    }
}

fn security_config() -> SecurityConfig {
    SecurityConfig {
        secret_key: Some(SECRET.to_string()),
        field_encryption_key: None,
        field_encryption_key_file: None,
    }
}

async fn make_router() -> axum::Router {
    let pool = curator_store::connect("sqlite::memory:", 30_000, 1).await.unwrap();
    let vault = Arc::new(Vault::new(&[7u8; 32]).unwrap());
    let server = AdminServer::new(
        "127.0.0.1:0".parse().unwrap(),
        pool,
        vault,
        admin_config(),
        security_config(),
        Arc::new(NoStats),
    );
    server.into_router()
}

fn json_req(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login_token(router: &axum::Router) -> String {
    let req = json_req(
        Method::POST,
        "/login",
        serde_json::json!({"username": USERNAME, "password": PASSWORD}),
    );
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_with_bad_password_is_rejected() {
    let router = make_router().await;
    let req = json_req(
        Method::POST,
        "/login",
        serde_json::json!({"username": USERNAME, "password": "wrong"}),
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let router = make_router().await;
    let req = Request::builder()
        .method(Method::GET)
        .uri("/settings")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_then_put_and_list_settings() {
    let router = make_router().await;
    let token = login_token(&router).await;

    let put_req = Request::builder()
        .method(Method::PUT)
        .uri("/settings/random.strategy")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from("\"quality\""))
        .unwrap();
    let resp = router.clone().oneshot(put_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let get_req = Request::builder()
        .method(Method::GET)
        .uri("/settings")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(get_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["settings"]["random.strategy"], "quality");
}

#[tokio::test]
async fn proxies_import_requires_auth_then_succeeds() {
    let router = make_router().await;
    let token = login_token(&router).await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/proxies/import")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            serde_json::json!({"uris": ["http://1.2.3.4:8080"], "conflict_policy": "skip"}).to_string(),
        ))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["summary"]["created"], 1);
}

#[tokio::test]
async fn health_reports_db_ok_with_no_heartbeat_yet() {
    let router = make_router().await;
    let token = login_token(&router).await;
    let req = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["db_ok"], true);
    assert_eq!(body["worker_ok"], false);
}
