//! PostgreSQL entity store.
//!
//! Same-book exclusion relies on row locks: transactional reads use
//! `SELECT ... FOR UPDATE`, so a second checkout blocks until the first one
//! commits and then sees `is_available = false`. The partial unique index on
//! active reservations backs this up.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Transaction};
use uuid::Uuid;

use super::store::{EntityStore, Scope, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{ReservationFilter, ReservationStatus},
        Book, Page, PageRequest, Reservation, User,
    },
};

const BOOK_COLUMNS: &str = "id, title, author, genre, publisher, publication_date, \
                            is_available, is_deleted, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, permissions, is_deleted, created_at, updated_at";
const RESERVATION_COLUMNS: &str = "id, book_id, user_id, reservation_date, return_date, \
                                   is_active, created_at, updated_at";

/// Soft-delete predicate appended to every Book/User read
fn scope_clause(scope: Scope) -> &'static str {
    match scope {
        Scope::Live => " AND is_deleted = FALSE",
        Scope::All => "",
    }
}

fn status_clause(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Active => " AND is_active = TRUE",
        ReservationStatus::Returned => " AND is_active = FALSE AND return_date IS NOT NULL",
        ReservationStatus::All => "",
    }
}

/// Translate constraint violations into domain errors
fn map_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        match (db.code().as_deref(), db.constraint()) {
            (Some("23505"), Some("uq_books_title_author_live")) => {
                return AppError::Conflict(
                    "Book with this title and author already exists".to_string(),
                )
            }
            (Some("23505"), Some("uq_reservations_active_book")) => {
                return AppError::Conflict("Book is not available for reservation".to_string())
            }
            (Some("23503"), Some(constraint)) if constraint.contains("user_id") => {
                return AppError::NotFound("User not found".to_string())
            }
            (Some("23503"), Some(constraint)) if constraint.contains("book_id") => {
                return AppError::NotFound("Book not found".to_string())
            }
            _ => {}
        }
    }
    AppError::Database(e)
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_book(&self, id: Uuid, scope: Scope) -> AppResult<Option<Book>> {
        let query = format!(
            "SELECT {} FROM books WHERE id = $1{}",
            BOOK_COLUMNS,
            scope_clause(scope)
        );
        let book = sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_user(&self, id: Uuid, scope: Scope) -> AppResult<Option<User>> {
        let query = format!(
            "SELECT {} FROM users WHERE id = $1{}",
            USER_COLUMNS,
            scope_clause(scope)
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_reservation(&self, id: Uuid) -> AppResult<Option<Reservation>> {
        let query = format!("SELECT {} FROM reservations WHERE id = $1", RESERVATION_COLUMNS);
        let reservation = sqlx::query_as::<_, Reservation>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reservation)
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
        page: PageRequest,
    ) -> AppResult<Page<Reservation>> {
        let where_clause = format!(
            "WHERE ($1::uuid IS NULL OR book_id = $1) AND ($2::uuid IS NULL OR user_id = $2){}",
            status_clause(filter.status)
        );

        let count_query = format!("SELECT COUNT(*) FROM reservations {}", where_clause);
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(filter.book_id)
            .bind(filter.user_id)
            .fetch_one(&self.pool)
            .await?;

        let select_query = format!(
            r#"
            SELECT {} FROM reservations
            {}
            ORDER BY reservation_date DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            RESERVATION_COLUMNS, where_clause
        );
        let items = sqlx::query_as::<_, Reservation>(&select_query)
            .bind(filter.book_id)
            .bind(filter.user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page { items, total })
    }

    async fn book_titles(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, title FROM books WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn user_names(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, name FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

/// Transaction over a pooled connection. Dropping it unfinished rolls back.
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_book(&mut self, id: Uuid, scope: Scope) -> AppResult<Option<Book>> {
        let query = format!(
            "SELECT {} FROM books WHERE id = $1{} FOR UPDATE",
            BOOK_COLUMNS,
            scope_clause(scope)
        );
        let book = sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(book)
    }

    async fn find_live_duplicate(
        &mut self,
        title: &str,
        author: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Book>> {
        let query = format!(
            "SELECT {} FROM books WHERE title = $1 AND author = $2 \
             AND ($3::uuid IS NULL OR id <> $3){}",
            BOOK_COLUMNS,
            scope_clause(Scope::Live)
        );
        let book = sqlx::query_as::<_, Book>(&query)
            .bind(title)
            .bind(author)
            .bind(exclude)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(book)
    }

    async fn insert_book(&mut self, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, genre, publisher, publication_date,
                               is_available, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.publisher)
        .bind(book.publication_date)
        .bind(book.is_available)
        .bind(book.is_deleted)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn update_book_details(&mut self, book: &Book) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $2, author = $3, genre = $4, publisher = $5,
                publication_date = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.publisher)
        .bind(book.publication_date)
        .bind(book.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", book.id)));
        }
        Ok(())
    }

    async fn claim_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET is_available = FALSE, updated_at = $2
            WHERE id = $1 AND is_deleted = FALSE AND is_available = TRUE
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE books SET is_available = TRUE, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete_book(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE books SET is_deleted = TRUE, updated_at = $2 WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(at)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_user(&mut self, id: Uuid, scope: Scope) -> AppResult<Option<User>> {
        let query = format!(
            "SELECT {} FROM users WHERE id = $1{} FOR UPDATE",
            USER_COLUMNS,
            scope_clause(scope)
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(user)
    }

    async fn update_user_profile(&mut self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, email = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.updated_at)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", user.id)));
        }
        Ok(())
    }

    async fn soft_delete_user(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_deleted = TRUE, updated_at = $2 WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(at)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_reservation(&mut self, id: Uuid) -> AppResult<Option<Reservation>> {
        let query = format!(
            "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        );
        let reservation = sqlx::query_as::<_, Reservation>(&query)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(reservation)
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, book_id, user_id, reservation_date, return_date,
                                      is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.book_id)
        .bind(reservation.user_id)
        .bind(reservation.reservation_date)
        .bind(reservation.return_date)
        .bind(reservation.is_active)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn close_reservation(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET return_date = $2, is_active = FALSE, updated_at = $2
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(&mut self) -> AppResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::Internal("Transaction already finished".to_string())),
        }
    }

    async fn rollback(&mut self) -> AppResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
