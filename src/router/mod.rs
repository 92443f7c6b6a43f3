//! HTTP surface: thin request/response glue over the account core.

pub mod create;
pub mod login;
pub mod profiles;
pub mod users;

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ServerError;
use crate::user::User;

/// `{"user": ...}` envelope returned by every account route.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: AuthenticatedUser,
}

/// User payload carrying the token it can authenticate with.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub email: String,
    pub token: String,
    pub username: String,
    pub bio: String,
    pub image: String,
}

impl UserEnvelope {
    pub fn new(user: User, token: String) -> Self {
        Self {
            user: AuthenticatedUser {
                email: user.email,
                token,
                username: user.username,
                bio: user.bio,
                image: user.image,
            },
        }
    }
}

/// JSON extractor running `validator` rules before the handler body.
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;

        Ok(Self(value))
    }
}
