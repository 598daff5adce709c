//! Reservation engine: checkout and return.
//!
//! Both operations write a reservation and the book's availability flag in a
//! single transactional scope, so a book is reserved if and only if it has
//! exactly one active reservation.

use chrono::Utc;
use uuid::Uuid;

use super::{
    access::{self, Action},
    availability::{book_not_found, not_available, AvailabilityLedger},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{already_returned, ReservationReceipt},
        Identity, Reservation, ReservationDetails,
    },
    repository::{Repository, Scope},
};

fn reservation_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Reservation with id {} not found", id))
}

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
}

impl ReservationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Check out a book for the requester
    #[tracing::instrument(skip(self, requester), fields(user_id = %requester.user_id))]
    pub async fn checkout(
        &self,
        book_id: Uuid,
        requester: &Identity,
    ) -> AppResult<ReservationReceipt> {
        access::require(Action::Checkout, requester)?;
        let user_id = requester.user_id;

        let reservation = self
            .repository
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let book = tx
                        .find_book(book_id, Scope::Live)
                        .await?
                        .ok_or_else(|| book_not_found(book_id))?;
                    if !book.is_available {
                        return Err(not_available());
                    }

                    let now = Utc::now();
                    let reservation = Reservation::open(book_id, user_id, now);
                    tx.insert_reservation(&reservation).await?;
                    AvailabilityLedger::mark_reserved(tx, book_id, now).await?;
                    Ok(reservation)
                })
            })
            .await?;

        tracing::info!(reservation_id = %reservation.id, "Book checked out");
        Ok(reservation.receipt())
    }

    /// Close a reservation and make its book available again
    #[tracing::instrument(skip(self, requester), fields(user_id = %requester.user_id))]
    pub async fn return_reservation(
        &self,
        reservation_id: Uuid,
        requester: &Identity,
    ) -> AppResult<ReservationDetails> {
        // Cheap rejection before taking any lock
        let existing = self
            .repository
            .store
            .find_reservation(reservation_id)
            .await?
            .ok_or_else(|| reservation_not_found(reservation_id))?;
        if existing.is_closed() {
            return Err(already_returned());
        }
        access::require(Action::Return { owner: existing.user_id }, requester)?;

        let requester = requester.clone();
        let (closed, book, user) = self
            .repository
            .with_transaction(move |tx| {
                let requester = requester.clone();
                Box::pin(async move {
                    // State may have moved since the pre-check
                    let mut reservation = tx
                        .find_reservation(reservation_id)
                        .await?
                        .ok_or_else(|| reservation_not_found(reservation_id))?;
                    if reservation.is_closed() {
                        return Err(already_returned());
                    }
                    access::require(Action::Return { owner: reservation.user_id }, &requester)?;

                    let now = Utc::now();
                    if !tx.close_reservation(reservation_id, now).await? {
                        return Err(already_returned());
                    }
                    reservation.close(now)?;
                    AvailabilityLedger::mark_available(tx, reservation.book_id, now).await?;

                    // Summaries come from the same scope so nothing can fail after commit
                    let book = tx.find_book(reservation.book_id, Scope::All).await?;
                    let user = tx.find_user(reservation.user_id, Scope::All).await?;
                    Ok((reservation, book, user))
                })
            })
            .await?;

        tracing::info!(book_id = %closed.book_id, "Reservation returned");

        Ok(ReservationDetails::new(
            closed,
            book.map(|b| b.summary()),
            user.map(|u| u.summary()),
        ))
    }
}
