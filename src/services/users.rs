//! User profile service.
//!
//! Accounts are provisioned by the identity provider; this service only reads,
//! edits and disables them.

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::access::{self, Action};
use crate::{
    error::{AppError, AppResult},
    models::{user::UpdateUser, Identity, User},
    repository::{Repository, Scope},
};

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get a live user by ID
    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.repository
            .store
            .find_user(id, Scope::Live)
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    /// Update name and email of a live user
    #[tracing::instrument(skip(self, update, requester), fields(requester_id = %requester.user_id))]
    pub async fn update_user(
        &self,
        id: Uuid,
        update: UpdateUser,
        requester: &Identity,
    ) -> AppResult<User> {
        self.get_user(id).await?;
        access::require(Action::ModifyUser { target: id }, requester)?;
        if update.is_empty() {
            return Err(AppError::InvalidInput("No valid fields to update".to_string()));
        }
        update.validate()?;

        self.repository
            .with_transaction(move |tx| {
                let update = update.clone();
                Box::pin(async move {
                    let mut user = tx
                        .find_user(id, Scope::Live)
                        .await?
                        .ok_or_else(|| user_not_found(id))?;
                    user.apply(update, Utc::now());
                    tx.update_user_profile(&user).await?;
                    Ok(user)
                })
            })
            .await
    }

    /// Soft delete a live user. Reservations keep referencing it.
    #[tracing::instrument(skip(self, requester), fields(requester_id = %requester.user_id))]
    pub async fn delete_user(&self, id: Uuid, requester: &Identity) -> AppResult<()> {
        self.get_user(id).await?;
        access::require(Action::DisableUser { target: id }, requester)?;

        self.repository
            .with_transaction(move |tx| {
                Box::pin(async move {
                    if tx.soft_delete_user(id, Utc::now()).await? {
                        Ok(())
                    } else {
                        Err(user_not_found(id))
                    }
                })
            })
            .await?;

        tracing::info!(user_id = %id, "User disabled");
        Ok(())
    }
}
