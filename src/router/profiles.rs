//! Public profiles HTTP API.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::profile::Profile;
use crate::router::users::{Auth, auth};
use crate::user::UserId;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileEnvelope {
    pub profile: Profile,
}

/// Resolve the viewer behind an optional `Authorization` header.
///
/// Profiles are public; a missing or stale token only downgrades the
/// view to anonymous.
async fn viewer(state: &AppState, headers: &HeaderMap) -> Option<UserId> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))?;

    state.users.authenticate(token).await.ok()
}

/// `GET /profiles/{username}` with an optional viewer.
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ProfileEnvelope>> {
    let viewer = viewer(&state, &headers).await;
    let profile = state.profiles.profile(&username, viewer).await?;

    Ok(Json(ProfileEnvelope { profile }))
}

/// `POST /profiles/{username}/follow`. Authorization required.
pub async fn follow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(auth): Extension<Auth>,
) -> Result<Json<ProfileEnvelope>> {
    let profile = state.profiles.follow(auth.id, &username).await?;

    Ok(Json(ProfileEnvelope { profile }))
}

/// `DELETE /profiles/{username}/follow`. Authorization required.
pub async fn unfollow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(auth): Extension<Auth>,
) -> Result<Json<ProfileEnvelope>> {
    let profile = state.profiles.unfollow(auth.id, &username).await?;

    Ok(Json(ProfileEnvelope { profile }))
}

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/{username}/follow", post(follow).delete(unfollow))
        .route_layer(middleware::from_fn_with_state(state, auth));

    Router::new()
        .route("/{username}", get(profile))
        .merge(protected)
}
