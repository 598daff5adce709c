//! Reservation (checkout) model and read models built on the ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{book::BookSummary, pagination::Pagination, user::UserSummary};
use crate::error::{AppError, AppResult};

/// Reservation as stored. Never deleted; immutable once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Open a reservation for a checkout happening at `now`
    pub fn open(book_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            user_id,
            reservation_date: now,
            return_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.return_date.is_some()
    }

    /// ACTIVE -> CLOSED. A closed reservation never transitions again.
    pub fn close(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.is_closed() {
            return Err(already_returned());
        }
        self.return_date = Some(now);
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn receipt(&self) -> ReservationReceipt {
        ReservationReceipt {
            id: self.id,
            book_id: self.book_id,
            user_id: self.user_id,
            reservation_date: self.reservation_date,
        }
    }
}

pub(crate) fn already_returned() -> AppError {
    AppError::Conflict("Book already returned".to_string())
}

/// Payload of a successful checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReservationReceipt {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub reservation_date: DateTime<Utc>,
}

/// Reservation with its book and user references resolved
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationDetails {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub book: Option<BookSummary>,
    pub user: Option<UserSummary>,
    pub reservation_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl ReservationDetails {
    pub fn new(
        reservation: Reservation,
        book: Option<BookSummary>,
        user: Option<UserSummary>,
    ) -> Self {
        Self {
            id: reservation.id,
            book_id: reservation.book_id,
            user_id: reservation.user_id,
            book,
            user,
            reservation_date: reservation.reservation_date,
            return_date: reservation.return_date,
            is_active: reservation.is_active,
        }
    }
}

/// Status filter for a user's reservations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Returned,
    #[default]
    All,
}

impl ReservationStatus {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        match self {
            ReservationStatus::Active => reservation.is_active,
            ReservationStatus::Returned => !reservation.is_active && reservation.is_closed(),
            ReservationStatus::All => true,
        }
    }
}

/// Ledger query criteria
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub book_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: ReservationStatus,
}

impl ReservationFilter {
    pub fn for_book(book_id: Uuid) -> Self {
        Self {
            book_id: Some(book_id),
            ..Default::default()
        }
    }

    pub fn for_user(user_id: Uuid, status: ReservationStatus) -> Self {
        Self {
            user_id: Some(user_id),
            status,
            ..Default::default()
        }
    }

    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.book_id.map_or(true, |id| reservation.book_id == id)
            && self.user_id.map_or(true, |id| reservation.user_id == id)
            && self.status.matches(reservation)
    }
}

/// Entry of a book's reservation history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub reservation_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Entry of a user's reservation list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserReservationEntry {
    pub id: Uuid,
    pub book_id: Uuid,
    pub book_title: Option<String>,
    pub reservation_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookHistory {
    pub book: BookSummary,
    pub reservations: Vec<BookHistoryEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserReservations {
    pub user: UserSummary,
    pub reservations: Vec<UserReservationEntry>,
    pub pagination: Pagination,
}
