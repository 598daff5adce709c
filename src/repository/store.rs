//! Entity store contract.
//!
//! Point reads and paginated ledger reads go through [`EntityStore`] directly.
//! Every mutation happens on a [`StoreTx`] obtained from [`EntityStore::begin`]
//! and is normally driven by [`super::Repository::with_transaction`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        reservation::ReservationFilter, Book, Page, PageRequest, Reservation, User,
    },
};

/// Soft-delete visibility applied by every Book/User read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only entities with `is_deleted = false`
    Live,
    /// Deleted entities included (resolving references of the ledger)
    All,
}

impl Scope {
    pub fn admits<T: SoftDeletable>(self, entity: &T) -> bool {
        match self {
            Scope::Live => !entity.is_deleted(),
            Scope::All => true,
        }
    }
}

pub trait SoftDeletable {
    fn is_deleted(&self) -> bool;
}

impl SoftDeletable for Book {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

impl SoftDeletable for User {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Open a transactional scope
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> AppResult<()>;

    async fn find_book(&self, id: Uuid, scope: Scope) -> AppResult<Option<Book>>;

    async fn find_user(&self, id: Uuid, scope: Scope) -> AppResult<Option<User>>;

    async fn find_reservation(&self, id: Uuid) -> AppResult<Option<Reservation>>;

    /// Reservations matching `filter`, most recent `reservation_date` first
    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
        page: PageRequest,
    ) -> AppResult<Page<Reservation>>;

    /// Titles of the given books, deleted ones included
    async fn book_titles(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>>;

    /// Names of the given users, deleted ones included
    async fn user_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>>;
}

/// A transactional view of the store.
///
/// Reads observe the transaction's own writes. Nothing is visible to other
/// scopes before [`StoreTx::commit`]; dropping an unfinished transaction rolls
/// it back.
#[async_trait]
pub trait StoreTx: Send {
    /// Load a book, locking it against concurrent writers until the scope ends
    async fn find_book(&mut self, id: Uuid, scope: Scope) -> AppResult<Option<Book>>;

    /// Live book with exactly this title and author, other than `exclude`
    async fn find_live_duplicate(
        &mut self,
        title: &str,
        author: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Book>>;

    async fn insert_book(&mut self, book: &Book) -> AppResult<()>;

    /// Persist the catalog fields of `book`. Availability and deletion flags
    /// are left untouched.
    async fn update_book_details(&mut self, book: &Book) -> AppResult<()>;

    /// `is_available: true -> false` on a live book. Returns false when no
    /// row matched (absent, deleted or already reserved).
    async fn claim_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    /// `is_available := true` on an existing book. Returns false when absent.
    async fn release_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    async fn soft_delete_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    async fn find_user(&mut self, id: Uuid, scope: Scope) -> AppResult<Option<User>>;

    async fn update_user_profile(&mut self, user: &User) -> AppResult<()>;

    async fn soft_delete_user(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    /// Load a reservation, locking it until the scope ends
    async fn find_reservation(&mut self, id: Uuid) -> AppResult<Option<Reservation>>;

    async fn insert_reservation(&mut self, reservation: &Reservation) -> AppResult<()>;

    /// ACTIVE -> CLOSED. Returns false when the reservation is absent or
    /// already closed.
    async fn close_reservation(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    async fn commit(&mut self) -> AppResult<()>;

    async fn rollback(&mut self) -> AppResult<()>;
}
