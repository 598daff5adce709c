//! Reservation engine tests against a real PostgreSQL database
//!
//! Point `DATABASE_URL` at a scratch database, then run
//! `cargo test -- --ignored`. Migrations are applied on connect and every
//! test works on freshly generated ids, so runs do not interfere.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use libris_server::{
    error::AppError,
    models::{book::CreateBook, Book, Identity, Permission, User},
    repository::{EntityStore, PgStore, Repository, RetryPolicy, Scope},
    services::Services,
};

struct TestDb {
    pool: PgPool,
    services: Services,
}

impl TestDb {
    async fn connect() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .expect("Failed to connect to database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let repository = Repository::new(Arc::new(PgStore::new(pool.clone())), RetryPolicy::default());
        Self {
            pool,
            services: Services::new(repository),
        }
    }

    fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// Users come from the identity provider, so they are inserted directly
    async fn user(&self, name: &str, permissions: &[Permission]) -> Identity {
        let user = User::new(&format!("{}-{}@example.org", name, Uuid::new_v4()), name, permissions);
        let names: Vec<String> = permissions.iter().map(|p| p.as_str().to_string()).collect();
        sqlx::query("INSERT INTO users (id, email, name, permissions) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&names)
            .execute(&self.pool)
            .await
            .expect("Failed to insert user");
        Identity::new(user.id, permissions)
    }

    async fn book(&self, title: &str) -> Book {
        let librarian = self.user("Librarian", &[Permission::CreateBooks]).await;
        self.services
            .catalog
            .create_book(new_book(title), &librarian)
            .await
            .expect("Failed to create book")
    }

    async fn book_state(&self, id: Uuid) -> Book {
        self.store()
            .find_book(id, Scope::All)
            .await
            .expect("Failed to load book")
            .expect("Book vanished")
    }

    async fn active_reservations(&self, book_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE book_id = $1 AND is_active")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count reservations")
    }
}

fn new_book(title: &str) -> CreateBook {
    CreateBook {
        title: format!("{} {}", title, Uuid::new_v4()),
        author: "Primo Levi".into(),
        genre: "memoir".into(),
        publisher: Some("Einaudi".into()),
        publication_date: NaiveDate::from_ymd_opt(1975, 1, 1),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_concurrent_checkouts_single_winner() {
    let db = Arc::new(TestDb::connect().await);
    let book = db.book("The Periodic Table").await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let reader = db.user(&format!("Reader{i}"), &[]).await;
        let db = db.clone();
        let book_id = book.id;
        handles.push(tokio::spawn(async move {
            db.services.reservations.checkout(book_id, &reader).await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => winners += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(conflicts, 5);
    assert!(!db.book_state(book.id).await.is_available);
    assert_eq!(db.active_reservations(book.id).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_double_return_conflicts() {
    let db = TestDb::connect().await;
    let book = db.book("If This Is a Man").await;
    let reader = db.user("Reader", &[]).await;

    let receipt = db.services.reservations.checkout(book.id, &reader).await.unwrap();
    let details = db
        .services
        .reservations
        .return_reservation(receipt.id, &reader)
        .await
        .unwrap();
    assert!(!details.is_active);
    assert_eq!(details.book.as_ref().map(|b| b.is_available), Some(true));

    let err = db
        .services
        .reservations
        .return_reservation(receipt.id, &reader)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(msg) if msg == "Book already returned"));
    assert!(db.book_state(book.id).await.is_available);
    assert_eq!(db.active_reservations(book.id).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_title_and_author_conflicts() {
    let db = TestDb::connect().await;
    let librarian = db.user("Librarian", &[Permission::CreateBooks]).await;
    let input = new_book("The Truce");

    db.services
        .catalog
        .create_book(input.clone(), &librarian)
        .await
        .unwrap();
    let err = db
        .services
        .catalog
        .create_book(input, &librarian)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(msg) if msg == "Book with this title and author already exists"));
}

#[tokio::test]
#[ignore]
async fn test_checkout_by_unknown_user_is_not_found() {
    let db = TestDb::connect().await;
    let book = db.book("The Drowned and the Saved").await;
    let ghost = Identity::new(Uuid::new_v4(), &[]);

    let err = db
        .services
        .reservations
        .checkout(book.id, &ghost)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(msg) if msg == "User not found"));

    // The claim on the book rolled back with the failed insert
    assert!(db.book_state(book.id).await.is_available);
    assert_eq!(db.active_reservations(book.id).await, 0);
}
