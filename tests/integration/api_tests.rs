//! Live API tests against a running server
//!
//! Start the server with `RUN_MODE=development cargo run`, then run
//! `cargo test -- --ignored`. Tokens are minted with `JWT_SECRET` (or the
//! default development secret).

use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use libris_server::models::user::UserClaims;

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Helper to mint a token the server accepts
fn auth_token(permissions: &[&str]) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    UserClaims::new(Uuid::new_v4(), permissions, chrono::Duration::minutes(5))
        .create_token(&secret)
        .expect("Failed to create token")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_reserve_without_token() {
    let client = Client::new();

    let response = client
        .post(format!("{}/books/{}/reserve", BASE_URL, Uuid::new_v4()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_reserve_unknown_book() {
    let client = Client::new();

    let response = client
        .post(format!("{}/books/{}/reserve", BASE_URL, Uuid::new_v4()))
        .bearer_auth(auth_token(&[]))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_reserve_malformed_id() {
    let client = Client::new();

    let response = client
        .post(format!("{}/books/not-a-uuid/reserve", BASE_URL))
        .bearer_auth(auth_token(&[]))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "Invalid book ID format");
}

#[tokio::test]
#[ignore]
async fn test_book_lifecycle() {
    let client = Client::new();
    let token = auth_token(&["create_books", "disable_books"]);
    let title = format!("Live test {}", Uuid::new_v4());

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": title,
            "author": "Integration Suite",
            "genre": "test"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    let id = body["id"].as_str().expect("No id in response").to_string();

    let response = client
        .get(format!("{}/books/{}/history", BASE_URL, id))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["pagination"]["total"], 0);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_openapi_spec() {
    let client = Client::new();

    let response = client
        .get("http://localhost:8080/api-docs/openapi.json")
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["openapi"].is_string());
    assert!(body["paths"].is_object());
}
