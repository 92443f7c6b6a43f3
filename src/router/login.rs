use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{UserEnvelope, Valid};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(nested)]
    pub user: Login,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Login {
    #[validate(
        email(message = "Email must be formatted."),
        length(max = 350, message = "Email must be at most 350 characters long.")
    )]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 100,
        message = "Password must contain 8 to 100 characters."
    ))]
    pub password: String,
}

/// Handler to log a user in.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<UserEnvelope>> {
    let (user, token) = state.users.login(&body.user.email, &body.user.password).await?;

    Ok(Json(UserEnvelope::new(user, token)))
}
