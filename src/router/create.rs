use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{UserEnvelope, Valid};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(nested)]
    pub user: Registration,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(
        min = 1,
        max = 25,
        message = "Username must be 1 to 25 characters long."
    ))]
    pub username: String,
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

/// Handler to create user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<UserEnvelope>)> {
    let Registration {
        username,
        email,
        password,
    } = body.user;

    let (user, token) = state.users.register(&username, &email, &password).await?;

    Ok((StatusCode::CREATED, Json(UserEnvelope::new(user, token))))
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::{app, make_request, test_state};

    #[tokio::test]
    async fn test_create_handler() {
        let state = test_state();
        let app = app(state.clone());

        let req_body = json!({
            "user": {
                "username": "alice",
                "email": "alice@x.com",
                "password": "password123",
            }
        });
        let response =
            make_request(app, Method::POST, "/api/users", None, req_body.to_string()).await;

        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: UserEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.user.username, "alice");
        assert_eq!(body.user.email, "alice@x.com");
        assert_eq!(body.user.bio, "");
        assert_eq!(body.user.image, "");
        assert!(body.user.token.is_ascii());

        let id = state.users.authenticate(&body.user.token).await.unwrap();
        assert_eq!(state.users.current(id).await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_create_with_short_password() {
        let app = app(test_state());

        let req_body = json!({
            "user": {
                "username": "alice",
                "email": "alice@x.com",
                "password": "short",
            }
        });
        let response =
            make_request(app, Method::POST, "/api/users", None, req_body.to_string()).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_with_invalid_email() {
        let app = app(test_state());

        let req_body = json!({
            "user": {
                "username": "alice",
                "email": "AAAA",
                "password": "password123",
            }
        });
        let response =
            make_request(app, Method::POST, "/api/users", None, req_body.to_string()).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let app = app(test_state());

        let req_body = json!({
            "user": {
                "username": "alice",
                "email": "alice@x.com",
                "password": "password123",
            }
        });
        let response = make_request(
            app.clone(),
            Method::POST,
            "/api/users",
            None,
            req_body.to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        // Same username, different email.
        let req_body = json!({
            "user": {
                "username": "alice",
                "email": "alice@other.com",
                "password": "password123",
            }
        });
        let response =
            make_request(app, Method::POST, "/api/users", None, req_body.to_string()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
