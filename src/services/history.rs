//! Read models over the reservation ledger

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use super::{
    access::{self, Action},
    availability::book_not_found,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{
            BookHistory, BookHistoryEntry, ReservationFilter, UserReservationEntry,
            UserReservations,
        },
        Identity, PageRequest, Pagination, ReservationStatus,
    },
    repository::{Repository, Scope},
};

#[derive(Clone)]
pub struct HistoryService {
    repository: Repository,
}

impl HistoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Reservations of a live book, most recent first. Public.
    pub async fn book_history(&self, book_id: Uuid, page: PageRequest) -> AppResult<BookHistory> {
        let store = &self.repository.store;
        let book = store
            .find_book(book_id, Scope::Live)
            .await?
            .ok_or_else(|| book_not_found(book_id))?;

        let result = store
            .list_reservations(&ReservationFilter::for_book(book_id), page)
            .await?;
        let user_ids = distinct(result.items.iter().map(|r| r.user_id));
        let names: HashMap<Uuid, String> = store.user_names(&user_ids).await?;

        let reservations = result
            .items
            .into_iter()
            .map(|r| BookHistoryEntry {
                id: r.id,
                user_id: r.user_id,
                user_name: names.get(&r.user_id).cloned(),
                reservation_date: r.reservation_date,
                return_date: r.return_date,
                is_active: r.is_active,
            })
            .collect();

        Ok(BookHistory {
            book: book.summary(),
            reservations,
            pagination: Pagination::new(page, result.total),
        })
    }

    /// Reservations of a live user, filtered by status, most recent first
    pub async fn user_reservations(
        &self,
        user_id: Uuid,
        status: ReservationStatus,
        page: PageRequest,
        requester: &Identity,
    ) -> AppResult<UserReservations> {
        let store = &self.repository.store;
        let user = store
            .find_user(user_id, Scope::Live)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;
        access::require(Action::ViewUserReservations { target: user_id }, requester)?;

        let result = store
            .list_reservations(&ReservationFilter::for_user(user_id, status), page)
            .await?;
        let book_ids = distinct(result.items.iter().map(|r| r.book_id));
        let titles = store.book_titles(&book_ids).await?;

        let reservations = result
            .items
            .into_iter()
            .map(|r| UserReservationEntry {
                id: r.id,
                book_id: r.book_id,
                book_title: titles.get(&r.book_id).cloned(),
                reservation_date: r.reservation_date,
                return_date: r.return_date,
                is_active: r.is_active,
            })
            .collect();

        Ok(UserReservations {
            user: user.summary(),
            reservations,
            pagination: Pagination::new(page, result.total),
        })
    }
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}
