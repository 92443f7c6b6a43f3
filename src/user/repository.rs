//! User directory contract and its PostgreSQL implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgDatabaseError;

use crate::error::{Result, ServerError};
use crate::user::{NewUser, User, UserChanges, UserId, UserSecurity};

/// Persistence contract consumed by the account core.
///
/// Uniqueness of `email` and `username` is enforced by the implementation
/// at write time; `update` merges the supplied fields into the stored
/// record atomically per identity.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create a record and return its assigned identity.
    async fn insert(&self, user: NewUser) -> Result<UserId>;

    /// Fetch the credential material and profile for a login attempt.
    async fn select_security_by_email(&self, email: &str) -> Result<UserSecurity>;

    /// Fetch a user by its identity.
    async fn select_by_id(&self, id: UserId) -> Result<User>;

    /// Fetch a user by its username.
    async fn select_by_username(&self, username: &str) -> Result<User>;

    /// Merge non-`None` fields into the record and return the new state.
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<User>;
}

/// Follow relation between two identities.
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Record that `follower` follows `followed`. Idempotent.
    async fn follow(&self, follower: UserId, followed: UserId) -> Result<()>;

    /// Remove the relation. Idempotent.
    async fn unfollow(&self, follower: UserId, followed: UserId) -> Result<()>;

    /// Whether `follower` currently follows `followed`.
    async fn is_following(&self, follower: UserId, followed: UserId) -> Result<bool>;
}

/// [`UserDirectory`] and [`FollowStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new [`PgUserDirectory`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn insert(&self, user: NewUser) -> Result<UserId> {
        let (id,): (UserId,) = sqlx::query_as(
            r#"INSERT INTO users (email, username, salt, derived_key)
                VALUES ($1, $2, $3, $4)
                RETURNING id"#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.credential.salt)
        .bind(&user.credential.derived_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| uniqueness_violation(err, &user.email, &user.username))?;

        Ok(id)
    }

    async fn select_security_by_email(&self, email: &str) -> Result<UserSecurity> {
        sqlx::query_as::<_, UserSecurity>(
            r#"SELECT id, username, salt, derived_key, bio, image
                FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound {
            entity: "user",
            key: format!("email={email}"),
        })
    }

    async fn select_by_id(&self, id: UserId) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, bio, image FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound {
            entity: "user",
            key: format!("id={id}"),
        })
    }

    async fn select_by_username(&self, username: &str) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, email, username, bio, image FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound {
            entity: "user",
            key: format!("username={username}"),
        })
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<User> {
        // Read-modify-write under one transaction; the row lock keeps
        // concurrent updates of the same identity from interleaving.
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, UserSecurity>(
            r#"SELECT id, username, salt, derived_key, bio, image
                FROM users WHERE id = $1
                FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServerError::NotFound {
            entity: "user",
            key: format!("id={id}"),
        })?;

        let username = changes.username.unwrap_or(current.username);
        let bio = changes.bio.unwrap_or(current.bio);
        let image = changes.image.unwrap_or(current.image);
        let (salt, derived_key) = match changes.credential {
            Some(credential) => (credential.salt, credential.derived_key),
            None => (current.salt, current.derived_key),
        };

        let user = match changes.email {
            Some(email) => {
                sqlx::query_as::<_, User>(
                    r#"UPDATE users
                        SET email = $2, username = $3, salt = $4,
                            derived_key = $5, bio = $6, image = $7
                        WHERE id = $1
                        RETURNING id, email, username, bio, image"#,
                )
                .bind(id)
                .bind(&email)
                .bind(&username)
                .bind(&salt)
                .bind(&derived_key)
                .bind(&bio)
                .bind(&image)
                .fetch_one(&mut *tx)
                .await
                .map_err(|err| uniqueness_violation(err, &email, &username))?
            },
            None => {
                sqlx::query_as::<_, User>(
                    r#"UPDATE users
                        SET username = $2, salt = $3, derived_key = $4,
                            bio = $5, image = $6
                        WHERE id = $1
                        RETURNING id, email, username, bio, image"#,
                )
                .bind(id)
                .bind(&username)
                .bind(&salt)
                .bind(&derived_key)
                .bind(&bio)
                .bind(&image)
                .fetch_one(&mut *tx)
                .await
                .map_err(|err| uniqueness_violation(err, "", &username))?
            },
        };

        tx.commit().await?;

        Ok(user)
    }
}

#[async_trait]
impl FollowStore for PgUserDirectory {
    async fn follow(&self, follower: UserId, followed: UserId) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO follows (follower_id, followed_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING"#,
        )
        .bind(follower)
        .bind(followed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unfollow(&self, follower: UserId, followed: UserId) -> Result<()> {
        sqlx::query(r#"DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2"#)
            .bind(follower)
            .bind(followed)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn is_following(&self, follower: UserId, followed: UserId) -> Result<bool> {
        let (following,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (
                SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2
            )"#,
        )
        .bind(follower)
        .bind(followed)
        .fetch_one(&self.pool)
        .await?;

        Ok(following)
    }
}

/// Translate a PostgreSQL unique-constraint failure into the typed
/// domain error, pointing at the offending field.
fn uniqueness_violation(err: sqlx::Error, email: &str, username: &str) -> ServerError {
    let constraint = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.try_downcast_ref::<PgDatabaseError>())
        .and_then(|db| db.constraint())
        .map(str::to_owned);

    match constraint.as_deref() {
        Some("users_email_key") => ServerError::UniquenessViolation {
            field: "email",
            value: email.to_owned(),
        },
        Some(_) => ServerError::UniquenessViolation {
            field: "username",
            value: username.to_owned(),
        },
        None => err.into(),
    }
}
