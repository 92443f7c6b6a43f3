//! Get the authenticated user.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::Result;
use crate::router::UserEnvelope;
use crate::router::users::Auth;

pub async fn handler(
    State(state): State<AppState>,
    Extension(auth): Extension<Auth>,
) -> Result<Json<UserEnvelope>> {
    let user = state.users.current(auth.id).await?;

    // The presented token is still valid, echo it back.
    Ok(Json(UserEnvelope::new(user, auth.token)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::{app, make_request, test_state};

    #[tokio::test]
    async fn test_get_current_user() {
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
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let registered: UserEnvelope = serde_json::from_slice(&body).unwrap();

        let response = make_request(
            app,
            Method::GET,
            "/api/user",
            Some(&registered.user.token),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: UserEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.user.username, "alice");
        assert_eq!(body.user.email, "alice@x.com");
        assert_eq!(body.user.token, registered.user.token);
    }

    #[tokio::test]
    async fn test_get_current_user_requires_token() {
        let app = app(test_state());

        let response =
            make_request(app, Method::GET, "/api/user", None, String::default()).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_current_user_rejects_garbage_token() {
        let app = app(test_state());

        let response = make_request(
            app,
            Method::GET,
            "/api/user",
            Some("not-a-token"),
            String::default(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
