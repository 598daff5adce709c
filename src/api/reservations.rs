//! Reservation endpoints: checkout, return and history

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{parse_id, query, AuthenticatedUser};
use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{BookHistory, ReservationReceipt, UserReservations},
        PageQuery, PageRequest, ReservationDetails, ReservationStatus,
    },
    AppState,
};

/// Checkout response
#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub message: String,
    pub reservation: ReservationReceipt,
}

/// Return response with the closed reservation
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub message: String,
    pub reservation: ReservationDetails,
}

/// Query parameters for a user's reservations
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserReservationsQuery {
    /// active, returned or all (default: all)
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl UserReservationsQuery {
    fn status(&self) -> AppResult<ReservationStatus> {
        match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("all") => Ok(ReservationStatus::All),
            Some("active") => Ok(ReservationStatus::Active),
            Some("returned") => Ok(ReservationStatus::Returned),
            Some(_) => Err(AppError::InvalidInput(
                "Invalid status. Must be one of: active, returned, all".to_string(),
            )),
        }
    }

    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Check out a book
#[utoipa::path(
    post,
    path = "/books/{id}/reserve",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Book reserved", body = CheckoutResponse),
        (status = 400, description = "Invalid book ID", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(book_id): Path<String>,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    let book_id = parse_id(&book_id, "book")?;
    let reservation = state.services.reservations.checkout(book_id, &identity).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Book reserved successfully".to_string(),
            reservation,
        }),
    ))
}

/// Return a reserved book
#[utoipa::path(
    put,
    path = "/reservations/{id}/return",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 403, description = "Not the owner of the reservation", body = crate::error::ErrorResponse),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(reservation_id): Path<String>,
) -> AppResult<Json<ReturnResponse>> {
    let reservation_id = parse_id(&reservation_id, "reservation")?;
    let reservation = state
        .services
        .reservations
        .return_reservation(reservation_id, &identity)
        .await?;

    Ok(Json(ReturnResponse {
        message: "Book returned successfully".to_string(),
        reservation,
    }))
}

/// Reservation history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/history",
    tag = "reservations",
    params(
        ("id" = String, Path, description = "Book ID"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Reservation history, most recent first", body = BookHistory),
        (status = 400, description = "Invalid book ID or pagination", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_history(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    page: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Json<BookHistory>> {
    let book_id = parse_id(&book_id, "book")?;
    let page = PageRequest::from_query(query(page)?, &state.config.reservations)?;

    let history = state.services.history.book_history(book_id, page).await?;
    Ok(Json(history))
}

/// Reservations of a user
#[utoipa::path(
    get,
    path = "/users/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "User ID"),
        UserReservationsQuery
    ),
    responses(
        (status = 200, description = "User reservations, most recent first", body = UserReservations),
        (status = 400, description = "Invalid user ID, status or pagination", body = crate::error::ErrorResponse),
        (status = 403, description = "Not allowed to view these reservations", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn user_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(user_id): Path<String>,
    params: Result<Query<UserReservationsQuery>, QueryRejection>,
) -> AppResult<Json<UserReservations>> {
    let user_id = parse_id(&user_id, "user")?;
    let params = query(params)?;
    let status = params.status()?;
    let page = PageRequest::from_query(params.page(), &state.config.reservations)?;

    let reservations = state
        .services
        .history
        .user_reservations(user_id, status, page, &identity)
        .await?;
    Ok(Json(reservations))
}
