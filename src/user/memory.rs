//! In-memory directory, injected in place of PostgreSQL by the test-suite.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::crypto::Credential;
use crate::error::{Result, ServerError};
use crate::user::{
    FollowStore, NewUser, User, UserChanges, UserDirectory, UserId, UserSecurity,
};

#[derive(Default)]
struct Stored {
    email: String,
    username: String,
    credential: Credential,
    bio: String,
    image: String,
}

/// Single-process [`UserDirectory`] with the same uniqueness and
/// atomicity guarantees as the real store: every operation runs under
/// one lock, so concurrent inserts of the same username cannot both win.
#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: HashMap<i64, Stored>,
    follows: HashSet<(i64, i64)>,
}

impl Stored {
    fn to_user(&self, id: UserId) -> User {
        User {
            id,
            email: self.email.clone(),
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn insert(&self, user: NewUser) -> Result<UserId> {
        let mut inner = self.inner.lock().unwrap();

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(ServerError::UniquenessViolation {
                field: "username",
                value: user.username,
            });
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(ServerError::UniquenessViolation {
                field: "email",
                value: user.email,
            });
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.users.insert(
            id,
            Stored {
                email: user.email,
                username: user.username,
                credential: user.credential,
                bio: String::default(),
                image: String::default(),
            },
        );

        Ok(UserId(id))
    }

    async fn select_security_by_email(&self, email: &str) -> Result<UserSecurity> {
        let inner = self.inner.lock().unwrap();

        inner
            .users
            .iter()
            .find(|(_, u)| u.email == email)
            .map(|(id, u)| UserSecurity {
                id: UserId(*id),
                username: u.username.clone(),
                salt: u.credential.salt.clone(),
                derived_key: u.credential.derived_key.clone(),
                bio: u.bio.clone(),
                image: u.image.clone(),
            })
            .ok_or_else(|| ServerError::NotFound {
                entity: "user",
                key: format!("email={email}"),
            })
    }

    async fn select_by_id(&self, id: UserId) -> Result<User> {
        let inner = self.inner.lock().unwrap();

        inner
            .users
            .get(&id.0)
            .map(|u| u.to_user(id))
            .ok_or_else(|| ServerError::NotFound {
                entity: "user",
                key: format!("id={id}"),
            })
    }

    async fn select_by_username(&self, username: &str) -> Result<User> {
        let inner = self.inner.lock().unwrap();

        inner
            .users
            .iter()
            .find(|(_, u)| u.username == username)
            .map(|(id, u)| u.to_user(UserId(*id)))
            .ok_or_else(|| ServerError::NotFound {
                entity: "user",
                key: format!("username={username}"),
            })
    }

    async fn update(&self, id: UserId, changes: UserChanges) -> Result<User> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(username) = &changes.username {
            if inner
                .users
                .iter()
                .any(|(other, u)| *other != id.0 && u.username == *username)
            {
                return Err(ServerError::UniquenessViolation {
                    field: "username",
                    value: username.clone(),
                });
            }
        }
        if let Some(email) = &changes.email {
            if inner
                .users
                .iter()
                .any(|(other, u)| *other != id.0 && u.email == *email)
            {
                return Err(ServerError::UniquenessViolation {
                    field: "email",
                    value: email.clone(),
                });
            }
        }

        let stored = inner.users.get_mut(&id.0).ok_or_else(|| ServerError::NotFound {
            entity: "user",
            key: format!("id={id}"),
        })?;

        if let Some(email) = changes.email {
            stored.email = email;
        }
        if let Some(username) = changes.username {
            stored.username = username;
        }
        if let Some(credential) = changes.credential {
            stored.credential = credential;
        }
        if let Some(bio) = changes.bio {
            stored.bio = bio;
        }
        if let Some(image) = changes.image {
            stored.image = image;
        }

        Ok(stored.to_user(id))
    }
}

#[async_trait]
impl FollowStore for MemoryDirectory {
    async fn follow(&self, follower: UserId, followed: UserId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.follows.insert((follower.0, followed.0));
        Ok(())
    }

    async fn unfollow(&self, follower: UserId, followed: UserId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.follows.remove(&(follower.0, followed.0));
        Ok(())
    }

    async fn is_following(&self, follower: UserId, followed: UserId) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.follows.contains(&(follower.0, followed.0)))
    }
}

/// Expose the stored credential, so tests can assert on salt rotation.
impl MemoryDirectory {
    pub fn credential_of(&self, id: UserId) -> Option<Credential> {
        let inner = self.inner.lock().unwrap();
        inner.users.get(&id.0).map(|u| u.credential.clone())
    }
}
