//! Book catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{parse_id, AuthenticatedUser, MessageResponse};
use crate::{
    error::AppResult,
    models::{
        book::{CreateBook, UpdateBook},
        Book,
    },
    AppState,
};

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 400, description = "Invalid book ID", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id, "book")?;
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing create_books permission", body = crate::error::ErrorResponse),
        (status = 409, description = "Same title and author already catalogued", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state.services.catalog.create_book(book, &identity).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing modify_books permission", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Same title and author already catalogued", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let id = parse_id(&id, "book")?;
    let book = state.services.catalog.update_book(id, update, &identity).await?;
    Ok(Json(book))
}

/// Soft delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 403, description = "Missing disable_books permission", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "book")?;
    state.services.catalog.delete_book(id, &identity).await?;
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}
