//! Libris Library Reservation Server
//!
//! REST JSON API for checking out and returning books, with permission-scoped
//! access control, soft deletion and a reservation history per book and user.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository) -> Self {
        Self {
            config: Arc::new(config),
            services: Arc::new(services::Services::new(repository)),
        }
    }
}
