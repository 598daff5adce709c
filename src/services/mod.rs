//! Business logic services

pub mod access;
pub mod availability;
pub mod catalog;
pub mod history;
pub mod reservations;
pub mod users;

use crate::{error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub reservations: reservations::ReservationsService,
    pub history: history::HistoryService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(repository.clone()),
            reservations: reservations::ReservationsService::new(repository.clone()),
            history: history::HistoryService::new(repository.clone()),
            repository,
        }
    }

    /// Store connectivity, for readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.store.ping().await
    }
}
