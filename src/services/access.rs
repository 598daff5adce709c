//! Access control decisions.
//!
//! Pure functions over the request identity; no storage access. Existence
//! checks happen in the services before these are consulted.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Identity, Permission},
};

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Check out a book for oneself
    Checkout,
    /// Close a reservation owned by `owner`
    Return { owner: Uuid },
    ViewUserReservations { target: Uuid },
    ViewBookHistory,
    CreateBook,
    ModifyBook,
    DisableBook,
    ModifyUser { target: Uuid },
    DisableUser { target: Uuid },
}

impl Action {
    fn denial(&self) -> &'static str {
        match self {
            Action::Checkout | Action::ViewBookHistory => "Not allowed",
            Action::Return { .. } => "You can only return your own reservations",
            Action::ViewUserReservations { .. } => "You can only view your own reservations",
            Action::CreateBook => "Missing permission: create_books",
            Action::ModifyBook => "Missing permission: modify_books",
            Action::DisableBook => "Missing permission: disable_books",
            Action::ModifyUser { .. } => "You can only modify your own profile",
            Action::DisableUser { .. } => "You can only disable your own account",
        }
    }
}

pub fn can_perform(action: Action, requester: &Identity) -> bool {
    let is_self = |id: Uuid| requester.user_id == id;

    match action {
        Action::Checkout | Action::ViewBookHistory => true,
        Action::Return { owner } => is_self(owner) || requester.has(Permission::ModifyUsers),
        Action::ViewUserReservations { target } => {
            is_self(target) || requester.has(Permission::ModifyUsers)
        }
        Action::CreateBook => requester.has(Permission::CreateBooks),
        Action::ModifyBook => requester.has(Permission::ModifyBooks),
        Action::DisableBook => requester.has(Permission::DisableBooks),
        Action::ModifyUser { target } => is_self(target) || requester.has(Permission::ModifyUsers),
        Action::DisableUser { target } => {
            is_self(target) || requester.has(Permission::DisableUsers)
        }
    }
}

/// [`can_perform`] as a guard
pub fn require(action: Action, requester: &Identity) -> AppResult<()> {
    if can_perform(action, requester) {
        Ok(())
    } else {
        tracing::debug!(?action, user_id = %requester.user_id, "Access denied");
        Err(AppError::Forbidden(action.denial().to_string()))
    }
}
