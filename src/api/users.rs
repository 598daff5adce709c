//! User profile endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use super::{parse_id, AuthenticatedUser, MessageResponse};
use crate::{
    error::AppResult,
    models::{user::UpdateUser, User},
    AppState,
};

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(_identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    let id = parse_id(&id, "user")?;
    let user = state.services.users.get_user(id).await?;
    Ok(Json(user))
}

/// Update a user's name or email
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not allowed to modify this user", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    Json(update): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    let id = parse_id(&id, "user")?;
    let user = state.services.users.update_user(id, update, &identity).await?;
    Ok(Json(user))
}

/// Disable a user account
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User disabled", body = MessageResponse),
        (status = 403, description = "Not allowed to disable this user", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "user")?;
    state.services.users.delete_user(id, &identity).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
