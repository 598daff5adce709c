//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, reservations, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.4.0",
        description = "Library reservation REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Reservations
        reservations::checkout,
        reservations::return_reservation,
        reservations::book_history,
        reservations::user_reservations,
        // Users
        users::get_user,
        users::update_user,
        users::delete_user,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Reservations
            reservations::CheckoutResponse,
            reservations::ReturnResponse,
            reservations::UserReservationsQuery,
            crate::models::reservation::Reservation,
            crate::models::reservation::ReservationReceipt,
            crate::models::reservation::ReservationDetails,
            crate::models::reservation::ReservationStatus,
            crate::models::reservation::BookHistory,
            crate::models::reservation::BookHistoryEntry,
            crate::models::reservation::UserReservations,
            crate::models::reservation::UserReservationEntry,
            crate::models::pagination::PageQuery,
            crate::models::pagination::Pagination,
            // Users
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::UpdateUser,
            // Common
            health::HealthResponse,
            crate::api::MessageResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "reservations", description = "Checkout, return and reservation history"),
        (name = "users", description = "User profiles")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
