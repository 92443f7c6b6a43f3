//! Public profiles and the follow relation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::user::{FollowStore, UserDirectory, UserId};

/// Profile of a user as seen by another (possibly anonymous) user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub bio: String,
    pub image: String,
    pub following: bool,
}

/// Profile manager.
#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UserDirectory>,
    follows: Arc<dyn FollowStore>,
}

impl ProfileService {
    /// Create a new [`ProfileService`].
    pub fn new(users: Arc<dyn UserDirectory>, follows: Arc<dyn FollowStore>) -> Self {
        Self { users, follows }
    }

    /// Profile of `username`, with the follow flag resolved for `viewer`.
    pub async fn profile(&self, username: &str, viewer: Option<UserId>) -> Result<Profile> {
        let user = self.users.select_by_username(username).await?;

        let following = match viewer {
            Some(viewer) => self.follows.is_following(viewer, user.id).await?,
            None => false,
        };

        Ok(Profile {
            username: user.username,
            bio: user.bio,
            image: user.image,
            following,
        })
    }

    /// Make `viewer` follow `username` and return the updated view.
    pub async fn follow(&self, viewer: UserId, username: &str) -> Result<Profile> {
        let user = self.users.select_by_username(username).await?;
        self.follows.follow(viewer, user.id).await?;

        Ok(Profile {
            username: user.username,
            bio: user.bio,
            image: user.image,
            following: true,
        })
    }

    /// Make `viewer` unfollow `username` and return the updated view.
    pub async fn unfollow(&self, viewer: UserId, username: &str) -> Result<Profile> {
        let user = self.users.select_by_username(username).await?;
        self.follows.unfollow(viewer, user.id).await?;

        Ok(Profile {
            username: user.username,
            bio: user.bio,
            image: user.image,
            following: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::user::NewUser;
    use crate::user::memory::MemoryDirectory;

    async fn seed(directory: &MemoryDirectory, username: &str, email: &str) -> UserId {
        directory
            .insert(NewUser {
                username: username.to_owned(),
                email: email.to_owned(),
                credential: Default::default(),
            })
            .await
            .unwrap()
    }

    fn service_on(directory: Arc<MemoryDirectory>) -> ProfileService {
        let users: Arc<dyn UserDirectory> = directory.clone();
        let follows: Arc<dyn FollowStore> = directory;

        ProfileService::new(users, follows)
    }

    #[tokio::test]
    async fn test_anonymous_profile_is_not_following() {
        let directory = Arc::new(MemoryDirectory::default());
        seed(&directory, "alice", "alice@x.com").await;
        let service = service_on(directory);

        let profile = service.profile("alice", None).await.unwrap();

        assert_eq!(profile.username, "alice");
        assert_eq!(profile.bio, "");
        assert_eq!(profile.image, "");
        assert!(!profile.following);
    }

    #[tokio::test]
    async fn test_follow_then_unfollow() {
        let directory = Arc::new(MemoryDirectory::default());
        let alice = seed(&directory, "alice", "alice@x.com").await;
        seed(&directory, "bob", "bob@x.com").await;
        let service = service_on(directory);

        let followed = service.follow(alice, "bob").await.unwrap();
        assert!(followed.following);
        assert!(
            service
                .profile("bob", Some(alice))
                .await
                .unwrap()
                .following
        );

        let unfollowed = service.unfollow(alice, "bob").await.unwrap();
        assert!(!unfollowed.following);
        assert!(
            !service
                .profile("bob", Some(alice))
                .await
                .unwrap()
                .following
        );
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let directory = Arc::new(MemoryDirectory::default());
        let alice = seed(&directory, "alice", "alice@x.com").await;
        seed(&directory, "bob", "bob@x.com").await;
        let service = service_on(directory);

        service.follow(alice, "bob").await.unwrap();
        service.follow(alice, "bob").await.unwrap();

        assert!(
            service
                .profile("bob", Some(alice))
                .await
                .unwrap()
                .following
        );
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let directory = Arc::new(MemoryDirectory::default());
        let service = service_on(directory);

        let err = service.profile("nobody", None).await.unwrap_err();
        assert!(matches!(err, ServerError::NotFound { .. }));
    }
}
