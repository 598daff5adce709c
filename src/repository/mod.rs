//! Repository layer: entity store backends and the transactional scope

pub mod memory;
pub mod postgres;
pub mod store;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;

use crate::{
    config::ReservationsConfig,
    error::{AppError, AppResult},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{EntityStore, Scope, StoreTx};

/// Bounded retry of transactional scopes on transient write conflicts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ReservationsConfig::default())
    }
}

impl From<&ReservationsConfig> for RetryPolicy {
    fn from(config: &ReservationsConfig) -> Self {
        Self {
            max_attempts: config.max_transaction_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Main repository handle shared by services
#[derive(Clone)]
pub struct Repository {
    pub store: Arc<dyn EntityStore>,
    retry: RetryPolicy,
}

impl Repository {
    pub fn new(store: Arc<dyn EntityStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// In-memory repository with default retry policy
    pub fn in_memory() -> (Self, MemoryStore) {
        let store = MemoryStore::new();
        (Self::new(Arc::new(store.clone()), RetryPolicy::default()), store)
    }

    /// Run `f` inside a transactional scope.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise and re-raises the
    /// error unchanged. Transient write conflicts restart the whole scope up to
    /// the configured number of attempts, after which they surface as
    /// [`AppError::Conflict`].
    pub async fn with_transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut (dyn StoreTx + 'static)) -> BoxFuture<'t, AppResult<T>>
            + Send
            + Sync,
    {
        let mut attempt = 1;
        loop {
            match self.run_once(&f).await {
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(attempt, error = %e, "Giving up on conflicting transaction");
                        return Err(AppError::Conflict(
                            "Concurrent update, please retry".to_string(),
                        ));
                    }
                    tracing::warn!(attempt, error = %e, "Transaction conflict, retrying");
                    tokio::time::sleep(self.retry.backoff * attempt).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn run_once<T, F>(&self, f: &F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut (dyn StoreTx + 'static)) -> BoxFuture<'t, AppResult<T>>
            + Send
            + Sync,
    {
        let mut tx = self.store.begin().await?;
        match f(tx.as_mut()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}
