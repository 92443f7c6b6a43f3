//! Update the authenticated user's profile.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::users::Auth;
use crate::router::{UserEnvelope, Valid};
use crate::user::ProfileUpdate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(nested)]
    user: Changes,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Changes {
    #[validate(
        email(message = "Email must be formatted."),
        length(max = 350, message = "Email must be at most 350 characters long.")
    )]
    email: Option<String>,
    #[validate(length(
        min = 1,
        max = 25,
        message = "Username must be 1 to 25 characters long."
    ))]
    username: Option<String>,
    #[validate(length(
        min = 8,
        max = 100,
        message = "Password must contain 8 to 100 characters."
    ))]
    password: Option<String>,
    bio: Option<String>,
    image: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(auth): Extension<Auth>,
    Valid(body): Valid<Body>,
) -> Result<Json<UserEnvelope>> {
    let Changes {
        email,
        username,
        password,
        bio,
        image,
    } = body.user;

    let user = state
        .users
        .update_profile(
            auth.id,
            ProfileUpdate {
                email,
                username,
                password,
                bio,
                image,
            },
        )
        .await?;

    Ok(Json(UserEnvelope::new(user, auth.token)))
}
