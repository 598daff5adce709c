//! In-process API tests against the in-memory store

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use libris_server::{
    api,
    config::AppConfig,
    models::{
        book::CreateBook,
        user::UserClaims,
        Book, Permission, User,
    },
    repository::{MemoryStore, Repository},
    AppState,
};

struct TestApp {
    router: Router,
    store: MemoryStore,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let secret = config.auth.jwt_secret.clone();
        let (repository, store) = Repository::in_memory();
        let router = api::create_router(AppState::new(config, repository));
        Self { router, store, secret }
    }

    async fn user(&self, name: &str, permissions: &[Permission]) -> (User, String) {
        let user = User::new(&format!("{}@example.org", name.to_lowercase()), name, permissions);
        self.store.put_user(user.clone()).await;

        let names: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
        let token = UserClaims::new(user.id, &names, chrono::Duration::hours(1))
            .create_token(&self.secret)
            .unwrap();
        (user, token)
    }

    async fn book(&self, title: &str) -> Book {
        let book = Book::new(
            CreateBook {
                title: title.into(),
                author: "Jorge Luis Borges".into(),
                genre: "fiction".into(),
                publisher: None,
                publication_date: NaiveDate::from_ymd_opt(1944, 1, 1),
            },
            chrono::Utc::now(),
        );
        self.store.put_book(book.clone()).await;
        book
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

#[tokio::test]
async fn health_and_readiness() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn reserve_requires_a_valid_token() {
    let app = TestApp::new();
    let book = app.book("Ficciones").await;
    let uri = format!("/api/v1/books/{}/reserve", book.id);

    let (status, body) = app.call(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");

    let (status, _) = app.call(Method::POST, &uri, Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn checkout_and_return_flow() {
    let app = TestApp::new();
    let book = app.book("The Aleph").await;
    let (alice, alice_token) = app.user("Alice", &[]).await;
    let (_, bob_token) = app.user("Bob", &[]).await;
    let reserve = format!("/api/v1/books/{}/reserve", book.id);

    let (status, body) = app.call(Method::POST, &reserve, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Book reserved successfully");
    assert_eq!(body["reservation"]["book_id"], book.id.to_string());
    assert_eq!(body["reservation"]["user_id"], alice.id.to_string());
    let reservation_id = body["reservation"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.call(Method::POST, &reserve, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Book is not available for reservation");

    let give_back = format!("/api/v1/reservations/{}/return", reservation_id);
    let (status, _) = app.call(Method::PUT, &give_back, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::PUT, &give_back, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["is_active"], false);
    assert!(body["reservation"]["return_date"].is_string());
    assert_eq!(body["reservation"]["book"]["is_available"], true);

    let (status, body) = app.call(Method::PUT, &give_back, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Book already returned");

    let (status, _) = app.call(Method::POST, &reserve, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let app = TestApp::new();
    let (_, token) = app.user("Alice", &[]).await;

    let (status, body) = app
        .call(Method::POST, "/api/v1/books/42/reserve", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid book ID format");

    let (status, _) = app
        .call(Method::PUT, "/api/v1/reservations/nope/return", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn book_history_is_public_and_paginated() {
    let app = TestApp::new();
    let book = app.book("Labyrinths").await;
    let (_, token) = app.user("Alice", &[]).await;

    for _ in 0..3 {
        let (status, body) = app
            .call(Method::POST, &format!("/api/v1/books/{}/reserve", book.id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["reservation"]["id"].as_str().unwrap().to_string();
        let (status, _) = app
            .call(Method::PUT, &format!("/api/v1/reservations/{}/return", id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/books/{}/history?page=2&limit=2", book.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["title"], "Labyrinths");
    assert_eq!(body["reservations"].as_array().unwrap().len(), 1);
    assert_eq!(body["reservations"][0]["user_name"], "Alice");
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/books/{}/history?limit=500", book.id), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/books/{}/history?page=0", book.id), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::GET, &format!("/api/v1/books/{}/history", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_reservations_are_private() {
    let app = TestApp::new();
    let book = app.book("Dreamtigers").await;
    let (alice, alice_token) = app.user("Alice", &[]).await;
    let (_, bob_token) = app.user("Bob", &[]).await;
    let (_, admin_token) = app.user("Admin", &[Permission::ModifyUsers]).await;

    app.call(Method::POST, &format!("/api/v1/books/{}/reserve", book.id), Some(&alice_token), None)
        .await;

    let uri = format!("/api/v1/users/{}/reservations?status=active", alice.id);
    let (status, body) = app.call(Method::GET, &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["reservations"][0]["book_title"], "Dreamtigers");

    let (status, _) = app.call(Method::GET, &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/users/{}/reservations?status=overdue", alice.id),
            Some(&alice_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/users/{}/reservations", Uuid::new_v4()),
            Some(&bob_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_management() {
    let app = TestApp::new();
    let (_, reader) = app.user("Reader", &[]).await;
    let (_, curator) = app
        .user(
            "Curator",
            &[Permission::CreateBooks, Permission::ModifyBooks, Permission::DisableBooks],
        )
        .await;
    let new_book = json!({
        "title": "Otras inquisiciones",
        "author": "Jorge Luis Borges",
        "genre": "essay",
        "publication_date": "1952-01-01"
    });

    let (status, _) = app
        .call(Method::POST, "/api/v1/books", Some(&reader), Some(new_book.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::POST, "/api/v1/books", Some(&curator), Some(new_book.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_available"], true);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(Method::POST, "/api/v1/books", Some(&curator), Some(new_book))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/api/v1/books/{}", id);
    let (status, body) = app
        .call(Method::PUT, &uri, Some(&curator), Some(json!({ "genre": "essays" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["genre"], "essays");

    let (status, _) = app.call(Method::PUT, &uri, Some(&curator), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::DELETE, &uri, Some(&curator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book deleted successfully");

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::POST, &format!("{}/reserve", uri), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_profiles() {
    let app = TestApp::new();
    let (alice, alice_token) = app.user("Alice", &[]).await;
    let (bob, bob_token) = app.user("Bob", &[]).await;
    let alice_uri = format!("/api/v1/users/{}", alice.id);

    let (status, body) = app.call(Method::GET, &alice_uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice");

    let (status, _) = app
        .call(Method::PUT, &alice_uri, Some(&bob_token), Some(json!({ "name": "Mallory" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::PUT, &alice_uri, Some(&alice_token), Some(json!({ "name": "Alice B." })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice B.");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/users/{}", bob.id), Some(&alice_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::DELETE, &alice_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::GET, &alice_uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/books/{id}/reserve"].is_object());
}
