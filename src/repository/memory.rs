//! In-memory entity store.
//!
//! Optimistic concurrency: every row carries a version, a transaction records
//! the version of each row it reads and buffers its writes. Commit fails with
//! [`AppError::TransactionConflict`] if any row read by the transaction was
//! changed by another commit in between, so transactions touching different
//! books never conflict. Unique constraints (live `title + author`, one active
//! reservation per book) are enforced at commit like database indexes.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{EntityStore, Scope, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::ReservationFilter, Book, Page, PageRequest, Reservation, User,
    },
};

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

#[derive(Debug, Default)]
struct Tables {
    books: HashMap<Uuid, Versioned<Book>>,
    users: HashMap<Uuid, Versioned<User>>,
    reservations: HashMap<Uuid, Versioned<Reservation>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Book(Uuid),
    User(Uuid),
    Reservation(Uuid),
}

impl Tables {
    fn version_of(&self, key: RowKey) -> u64 {
        match key {
            RowKey::Book(id) => self.books.get(&id).map_or(0, |row| row.version),
            RowKey::User(id) => self.users.get(&id).map_or(0, |row| row.version),
            RowKey::Reservation(id) => self.reservations.get(&id).map_or(0, |row| row.version),
        }
    }
}

fn upsert<T>(table: &mut HashMap<Uuid, Versioned<T>>, id: Uuid, value: T) {
    let version = table.get(&id).map_or(0, |row| row.version) + 1;
    table.insert(id, Versioned { version, value });
}

/// Shared in-memory store; clones share the same tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a user record as provisioned by the identity provider
    pub async fn put_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        upsert(&mut tables.users, user.id, user);
    }

    /// Store a book record verbatim, bypassing catalog rules
    pub async fn put_book(&self, book: Book) {
        let mut tables = self.tables.write().await;
        upsert(&mut tables.books, book.id, book);
    }

    /// Every reservation ever recorded for `book_id`
    pub async fn reservations_of(&self, book_id: Uuid) -> Vec<Reservation> {
        let tables = self.tables.read().await;
        tables
            .reservations
            .values()
            .filter(|row| row.value.book_id == book_id)
            .map(|row| row.value.clone())
            .collect()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            tables: self.tables.clone(),
            reads: HashMap::new(),
            books: HashMap::new(),
            users: HashMap::new(),
            reservations: HashMap::new(),
            finished: false,
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn find_book(&self, id: Uuid, scope: Scope) -> AppResult<Option<Book>> {
        let tables = self.tables.read().await;
        Ok(tables
            .books
            .get(&id)
            .map(|row| row.value.clone())
            .filter(|book| scope.admits(book)))
    }

    async fn find_user(&self, id: Uuid, scope: Scope) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&id)
            .map(|row| row.value.clone())
            .filter(|user| scope.admits(user)))
    }

    async fn find_reservation(&self, id: Uuid) -> AppResult<Option<Reservation>> {
        let tables = self.tables.read().await;
        Ok(tables.reservations.get(&id).map(|row| row.value.clone()))
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
        page: PageRequest,
    ) -> AppResult<Page<Reservation>> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Reservation> = tables
            .reservations
            .values()
            .map(|row| &row.value)
            .filter(|r| filter.matches(r))
            .collect();
        matching.sort_by(|a, b| {
            b.reservation_date
                .cmp(&a.reservation_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    async fn book_titles(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.books.get(id).map(|row| (*id, row.value.title.clone())))
            .collect())
    }

    async fn user_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).map(|row| (*id, row.value.name.clone())))
            .collect())
    }
}

/// Buffered transaction over [`MemoryStore`]
pub struct MemoryTx {
    tables: Arc<RwLock<Tables>>,
    /// Row versions observed by this transaction (0 = row absent)
    reads: HashMap<RowKey, u64>,
    books: HashMap<Uuid, Book>,
    users: HashMap<Uuid, User>,
    reservations: HashMap<Uuid, Reservation>,
    finished: bool,
}

impl MemoryTx {
    fn ensure_open(&self) -> AppResult<()> {
        if self.finished {
            return Err(AppError::Internal("Transaction already finished".to_string()));
        }
        Ok(())
    }

    /// Read a row through the write buffer, recording the version seen
    async fn read_row<T: Clone>(
        &mut self,
        key: RowKey,
        pending: impl Fn(&Self) -> Option<T>,
        committed: impl Fn(&Tables) -> Option<T>,
    ) -> AppResult<Option<T>> {
        self.ensure_open()?;
        if let Some(value) = pending(&*self) {
            return Ok(Some(value));
        }
        let tables = self.tables.read().await;
        self.reads.entry(key).or_insert_with(|| tables.version_of(key));
        Ok(committed(&*tables))
    }

    async fn load_book(&mut self, id: Uuid) -> AppResult<Option<Book>> {
        self.read_row(
            RowKey::Book(id),
            |tx| tx.books.get(&id).cloned(),
            |tables| tables.books.get(&id).map(|row| row.value.clone()),
        )
        .await
    }

    async fn load_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        self.read_row(
            RowKey::User(id),
            |tx| tx.users.get(&id).cloned(),
            |tables| tables.users.get(&id).map(|row| row.value.clone()),
        )
        .await
    }

    async fn load_reservation(&mut self, id: Uuid) -> AppResult<Option<Reservation>> {
        self.read_row(
            RowKey::Reservation(id),
            |tx| tx.reservations.get(&id).cloned(),
            |tables| tables.reservations.get(&id).map(|row| row.value.clone()),
        )
        .await
    }

    fn check_constraints(&self, tables: &Tables) -> AppResult<()> {
        for book in self.books.values().filter(|b| !b.is_deleted) {
            let committed = tables.books.values().map(|row| &row.value);
            let duplicate = committed
                .filter(|other| !self.books.contains_key(&other.id))
                .chain(self.books.values())
                .any(|other| {
                    other.id != book.id
                        && !other.is_deleted
                        && other.title == book.title
                        && other.author == book.author
                });
            if duplicate {
                return Err(duplicate_book());
            }
        }

        for reservation in self.reservations.values().filter(|r| r.is_active) {
            let committed = tables.reservations.values().map(|row| &row.value);
            let double_booked = committed
                .filter(|other| !self.reservations.contains_key(&other.id))
                .chain(self.reservations.values())
                .any(|other| {
                    other.id != reservation.id
                        && other.is_active
                        && other.book_id == reservation.book_id
                });
            if double_booked {
                return Err(AppError::Conflict(
                    "Book is not available for reservation".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn duplicate_book() -> AppError {
    AppError::Conflict("Book with this title and author already exists".to_string())
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_book(&mut self, id: Uuid, scope: Scope) -> AppResult<Option<Book>> {
        Ok(self.load_book(id).await?.filter(|book| scope.admits(book)))
    }

    async fn find_live_duplicate(
        &mut self,
        title: &str,
        author: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Book>> {
        self.ensure_open()?;
        let is_duplicate = |book: &Book| {
            Some(book.id) != exclude
                && !book.is_deleted
                && book.title == title
                && book.author == author
        };
        if let Some(book) = self.books.values().find(|b| is_duplicate(*b)) {
            return Ok(Some(book.clone()));
        }
        let tables = self.tables.read().await;
        Ok(tables
            .books
            .values()
            .map(|row| &row.value)
            .find(|b| !self.books.contains_key(&b.id) && is_duplicate(*b))
            .cloned())
    }

    async fn insert_book(&mut self, book: &Book) -> AppResult<()> {
        self.ensure_open()?;
        if self.load_book(book.id).await?.is_some() {
            return Err(AppError::Conflict(format!("Book {} already exists", book.id)));
        }
        self.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn update_book_details(&mut self, book: &Book) -> AppResult<()> {
        let mut current = self
            .load_book(book.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book.id)))?;
        current.title = book.title.clone();
        current.author = book.author.clone();
        current.genre = book.genre.clone();
        current.publisher = book.publisher.clone();
        current.publication_date = book.publication_date;
        current.updated_at = book.updated_at;
        self.books.insert(current.id, current);
        Ok(())
    }

    async fn claim_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        match self.load_book(id).await? {
            Some(mut book) if !book.is_deleted && book.is_available => {
                book.is_available = false;
                book.updated_at = at;
                self.books.insert(id, book);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        match self.load_book(id).await? {
            Some(mut book) => {
                book.is_available = true;
                book.updated_at = at;
                self.books.insert(id, book);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        match self.load_book(id).await? {
            Some(mut book) if !book.is_deleted => {
                book.is_deleted = true;
                book.updated_at = at;
                self.books.insert(id, book);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_user(&mut self, id: Uuid, scope: Scope) -> AppResult<Option<User>> {
        Ok(self.load_user(id).await?.filter(|user| scope.admits(user)))
    }

    async fn update_user_profile(&mut self, user: &User) -> AppResult<()> {
        let mut current = self
            .load_user(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user.id)))?;
        current.name = user.name.clone();
        current.email = user.email.clone();
        current.updated_at = user.updated_at;
        self.users.insert(current.id, current);
        Ok(())
    }

    async fn soft_delete_user(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        match self.load_user(id).await? {
            Some(mut user) if !user.is_deleted => {
                user.is_deleted = true;
                user.updated_at = at;
                self.users.insert(id, user);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_reservation(&mut self, id: Uuid) -> AppResult<Option<Reservation>> {
        self.load_reservation(id).await
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        if self.load_reservation(reservation.id).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Reservation {} already exists",
                reservation.id
            )));
        }
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn close_reservation(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        match self.load_reservation(id).await? {
            Some(mut reservation) if reservation.is_active => {
                reservation.close(at)?;
                self.reservations.insert(id, reservation);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.ensure_open()?;
        self.finished = true;

        let mut tables = self.tables.write().await;
        if let Some((key, _)) = self
            .reads
            .iter()
            .find(|(key, seen)| tables.version_of(**key) != **seen)
        {
            return Err(AppError::TransactionConflict(format!(
                "{:?} was modified concurrently",
                key
            )));
        }
        self.check_constraints(&tables)?;

        for (id, book) in self.books.drain() {
            upsert(&mut tables.books, id, book);
        }
        for (id, user) in self.users.drain() {
            upsert(&mut tables.users, id, user);
        }
        for (id, reservation) in self.reservations.drain() {
            upsert(&mut tables.reservations, id, reservation);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        self.finished = true;
        self.books.clear();
        self.users.clear();
        self.reservations.clear();
        Ok(())
    }
}
