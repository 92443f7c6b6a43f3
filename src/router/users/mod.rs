//! Current-user HTTP API. Every route requires a bearer token.

mod get;
mod update;

use axum::extract::{Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::get;
use axum::{Router, middleware};

use crate::user::UserId;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

/// Identity resolved by the [`auth`] middleware, along with the token it
/// was presented with.
#[derive(Clone, Debug)]
pub struct Auth {
    pub id: UserId,
    pub token: String,
}

/// Custom middleware for authentification.
pub(super) async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix(BEARER))
        .ok_or(ServerError::Unauthorized)?
        .to_owned();

    let id = state.users.authenticate(&token).await?;
    req.extensions_mut().insert(Auth { id, token });

    Ok(next.run(req).await)
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET /user` returns the authenticated user.
        // `PUT /user` applies a partial profile update.
        .route("/", get(get::handler).put(update::handler))
        .route_layer(middleware::from_fn_with_state(state, auth))
}
