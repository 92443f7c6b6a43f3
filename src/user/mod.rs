#[cfg(test)]
pub mod memory;
mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};

use crate::crypto::Credential;

/// Identity assigned by the directory at insert time. Opaque and immutable.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User as exposed to callers. Carries no secret material.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub bio: String,
    pub image: String,
}

/// Data required to create an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub credential: Credential,
}

/// Security view of a user, fetched by email during login.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserSecurity {
    pub id: UserId,
    pub username: String,
    pub salt: Vec<u8>,
    pub derived_key: Vec<u8>,
    pub bio: String,
    pub image: String,
}

/// Partial update of a user record. `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub credential: Option<Credential>,
    pub bio: Option<String>,
    pub image: Option<String>,
}
