//! Account core: registration, login, token authentication and profile
//! updates, wired over an injected [`UserDirectory`].

use std::sync::Arc;

use crate::crypto::CredentialCodec;
use crate::error::{Result, ServerError};
use crate::token::{TokenError, TokenManager};
use crate::user::{NewUser, User, UserChanges, UserDirectory, UserId};

/// Partial profile update. `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl ProfileUpdate {
    fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.bio.is_none()
            && self.image.is_none()
    }
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserDirectory>,
    codec: Arc<CredentialCodec>,
    token: TokenManager,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        users: Arc<dyn UserDirectory>,
        codec: Arc<CredentialCodec>,
        token: TokenManager,
    ) -> Self {
        Self {
            users,
            codec,
            token,
        }
    }

    /// Create an account and sign its first token.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, String)> {
        let credential = self.codec.issue(password.as_bytes());
        let id = self
            .users
            .insert(NewUser {
                username: username.to_owned(),
                email: email.to_owned(),
                credential,
            })
            .await?;
        let token = self.token.create(id)?;

        tracing::info!(user_id = %id, "account created");

        Ok((
            User {
                id,
                email: email.to_owned(),
                username: username.to_owned(),
                bio: String::default(),
                image: String::default(),
            },
            token,
        ))
    }

    /// Exchange email and password for a fresh token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let security = match self.users.select_security_by_email(email).await {
            Ok(security) => security,
            // An unknown email and a wrong password must stay
            // indistinguishable to the caller.
            Err(ServerError::NotFound { .. }) => return Err(ServerError::PasswordMismatch),
            Err(err) => return Err(err),
        };

        if !self
            .codec
            .verify(password.as_bytes(), &security.salt, &security.derived_key)
        {
            return Err(ServerError::PasswordMismatch);
        }

        let token = self.token.create(security.id)?;

        Ok((
            User {
                id: security.id,
                email: email.to_owned(),
                username: security.username,
                bio: security.bio,
                image: security.image,
            },
            token,
        ))
    }

    /// Resolve a bearer token to a live identity.
    ///
    /// A signed token whose subject has since disappeared is refused.
    pub async fn authenticate(&self, token: &str) -> Result<UserId> {
        let claims = self.token.decode(token)?;
        let id = claims.subject()?;

        match self.users.select_by_id(id).await {
            Ok(_) => Ok(id),
            Err(ServerError::NotFound { .. }) => Err(TokenError::UnknownSubject.into()),
            Err(err) => Err(err),
        }
    }

    /// Fetch the record behind an authenticated identity.
    pub async fn current(&self, id: UserId) -> Result<User> {
        self.users.select_by_id(id).await
    }

    /// Apply a partial profile update.
    ///
    /// A password change re-derives the secret under a freshly generated
    /// salt; the old salt is discarded with the old key.
    pub async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(ServerError::EmptyUpdate);
        }

        let credential = update
            .password
            .map(|password| self.codec.issue(password.as_bytes()));

        self.users
            .update(
                id,
                UserChanges {
                    email: update.email,
                    username: update.username,
                    credential,
                    bio: update.bio,
                    image: update.image,
                },
            )
            .await
    }
}
