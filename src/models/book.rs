//! Book (catalog entry) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Book as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub publisher: String,
    pub publication_date: Option<NaiveDate>,
    /// True iff no active reservation references this book
    pub is_available: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(input: CreateBook, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            author: input.author.trim().to_string(),
            genre: input.genre.trim().to_string(),
            publisher: input
                .publisher
                .map(|p| p.trim().to_string())
                .unwrap_or_default(),
            publication_date: input.publication_date,
            is_available: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the editable catalog fields of an update
    pub fn apply(&mut self, update: UpdateBook, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title.trim().to_string();
        }
        if let Some(author) = update.author {
            self.author = author.trim().to_string();
        }
        if let Some(genre) = update.genre {
            self.genre = genre.trim().to_string();
        }
        if let Some(publisher) = update.publisher {
            self.publisher = publisher.trim().to_string();
        }
        if let Some(date) = update.publication_date {
            self.publication_date = Some(date);
        }
        self.updated_at = now;
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            is_available: self.is_available,
        }
    }
}

/// Short book representation embedded in reservation read models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub is_available: bool,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, max = 100, message = "Genre is required"))]
    pub genre: String,
    #[validate(length(max = 255))]
    pub publisher: Option<String>,
    pub publication_date: Option<NaiveDate>,
}

/// Update book request.
///
/// Availability and deletion are deliberately absent: the former belongs to
/// the reservation ledger, the latter to `DELETE /books/{id}`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub genre: Option<String>,
    #[validate(length(max = 255))]
    pub publisher: Option<String>,
    pub publication_date: Option<NaiveDate>,
}

impl UpdateBook {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.genre.is_none()
            && self.publisher.is_none()
            && self.publication_date.is_none()
    }

    /// Whether the update touches the `title + author` uniqueness key
    pub fn changes_identity(&self) -> bool {
        self.title.is_some() || self.author.is_some()
    }
}
