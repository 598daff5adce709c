//! User model, permissions and the verified request identity

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User as stored. Password material lives with the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, name: &str, permissions: &[Permission]) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            name: name.trim().to_string(),
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: UpdateUser, now: DateTime<Utc>) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            self.email = email.trim().to_lowercase();
        }
        self.updated_at = now;
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Short user representation for read models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}

/// Update user request. Permissions and deletion are not editable here.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Capabilities known to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ModifyUsers,
    DisableUsers,
    CreateBooks,
    ModifyBooks,
    DisableBooks,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ModifyUsers => "modify_users",
            Permission::DisableUsers => "disable_users",
            Permission::CreateBooks => "create_books",
            Permission::ModifyBooks => "modify_books",
            Permission::DisableBooks => "disable_books",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flat set of capability strings. Unknown strings are kept, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(permission.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&[Permission]> for PermissionSet {
    fn from(permissions: &[Permission]) -> Self {
        permissions.iter().map(Permission::as_str).collect()
    }
}

/// Verified caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub permissions: PermissionSet,
}

impl Identity {
    pub fn new(user_id: Uuid, permissions: &[Permission]) -> Self {
        Self {
            user_id,
            permissions: permissions.into(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user_id: Uuid, permissions: &[&str], ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            user_id,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Encode as an HS256 token (identity provider side; used by tests and tooling)
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            permissions: self.permissions.iter().cloned().collect(),
        }
    }
}
