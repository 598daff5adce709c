//! API handlers for Libris REST endpoints

pub mod books;
pub mod health;
pub mod openapi;
pub mod reservations;
pub mod users;

use axum::{
    async_trait,
    extract::{rejection::QueryRejection, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{user::UserClaims, Identity},
    AppState,
};

/// Extractor for the verified caller, from a bearer JWT
pub struct AuthenticatedUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims.identity()))
    }
}

/// Generic acknowledgement body
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Parse a path identifier, naming the entity in the error
pub(crate) fn parse_id(raw: &str, entity: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidInput(format!("Invalid {} ID format", entity)))
}

/// Unwrap a query string, reporting malformed ones as invalid input
pub(crate) fn query<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(inner)| inner)
        .map_err(|e| AppError::InvalidInput(e.body_text()))
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        // Reservations
        .route("/books/:id/reserve", post(reservations::checkout))
        .route("/books/:id/history", get(reservations::book_history))
        .route("/reservations/:id/return", put(reservations::return_reservation))
        // Users
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/reservations", get(reservations::user_reservations))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
