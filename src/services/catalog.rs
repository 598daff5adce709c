//! Catalog service: book records

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{
    access::{self, Action},
    availability::book_not_found,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{CreateBook, UpdateBook},
        Book, Identity,
    },
    repository::{Repository, Scope},
};

fn duplicate_book() -> AppError {
    AppError::Conflict("Book with this title and author already exists".to_string())
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get a live book by ID
    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository
            .store
            .find_book(id, Scope::Live)
            .await?
            .ok_or_else(|| book_not_found(id))
    }

    /// Create a new book, available for checkout
    #[tracing::instrument(skip(self, input, requester), fields(user_id = %requester.user_id))]
    pub async fn create_book(&self, input: CreateBook, requester: &Identity) -> AppResult<Book> {
        access::require(Action::CreateBook, requester)?;
        input.validate()?;

        let book = Book::new(input, Utc::now());
        let created = self
            .repository
            .with_transaction(move |tx| {
                let book = book.clone();
                Box::pin(async move {
                    if tx
                        .find_live_duplicate(&book.title, &book.author, None)
                        .await?
                        .is_some()
                    {
                        return Err(duplicate_book());
                    }
                    tx.insert_book(&book).await?;
                    Ok(book)
                })
            })
            .await?;

        tracing::info!(book_id = %created.id, "Book created");
        Ok(created)
    }

    /// Update the catalog fields of a live book
    #[tracing::instrument(skip(self, update, requester), fields(user_id = %requester.user_id))]
    pub async fn update_book(
        &self,
        id: Uuid,
        update: UpdateBook,
        requester: &Identity,
    ) -> AppResult<Book> {
        self.get_book(id).await?;
        access::require(Action::ModifyBook, requester)?;
        if update.is_empty() {
            return Err(AppError::InvalidInput("No valid fields to update".to_string()));
        }
        update.validate()?;

        self.repository
            .with_transaction(move |tx| {
                let update = update.clone();
                Box::pin(async move {
                    let mut book = tx
                        .find_book(id, Scope::Live)
                        .await?
                        .ok_or_else(|| book_not_found(id))?;
                    let check_duplicate = update.changes_identity();
                    book.apply(update, Utc::now());

                    if check_duplicate
                        && tx
                            .find_live_duplicate(&book.title, &book.author, Some(id))
                            .await?
                            .is_some()
                    {
                        return Err(duplicate_book());
                    }
                    tx.update_book_details(&book).await?;
                    Ok(book)
                })
            })
            .await
    }

    /// Soft delete a live book. Its reservation history is kept.
    #[tracing::instrument(skip(self, requester), fields(user_id = %requester.user_id))]
    pub async fn delete_book(&self, id: Uuid, requester: &Identity) -> AppResult<()> {
        self.get_book(id).await?;
        access::require(Action::DisableBook, requester)?;

        self.repository
            .with_transaction(move |tx| {
                Box::pin(async move {
                    if tx.soft_delete_book(id, Utc::now()).await? {
                        Ok(())
                    } else {
                        Err(book_not_found(id))
                    }
                })
            })
            .await?;

        tracing::info!(book_id = %id, "Book deleted");
        Ok(())
    }
}
