//! Availability ledger.
//!
//! Sole owner of the `Book.is_available` transitions. Both operations run on
//! the caller's transaction so they commit or abort together with the
//! reservation write.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    repository::{Scope, StoreTx},
};

pub(crate) fn book_not_found(book_id: Uuid) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", book_id))
}

pub(crate) fn not_available() -> AppError {
    AppError::Conflict("Book is not available for reservation".to_string())
}

pub struct AvailabilityLedger;

impl AvailabilityLedger {
    /// Flip a live, available book to reserved.
    ///
    /// Fails with `NotFound` for an absent or deleted book (whatever its
    /// stored flag says) and with `Conflict` when it is already reserved.
    pub async fn mark_reserved(
        tx: &mut dyn StoreTx,
        book_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if tx.claim_book(book_id, at).await? {
            return Ok(());
        }
        match tx.find_book(book_id, Scope::Live).await? {
            None => Err(book_not_found(book_id)),
            Some(_) => Err(not_available()),
        }
    }

    /// Flip a book back to available.
    ///
    /// The prior flag is not checked: the closed reservation is the authority.
    /// Deleted books still exist here.
    pub async fn mark_available(
        tx: &mut dyn StoreTx,
        book_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if tx.release_book(book_id, at).await? {
            Ok(())
        } else {
            Err(book_not_found(book_id))
        }
    }
}
