//! Conduit is a lightweight backend API for a blogging platform.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod crypto;
mod database;
pub mod error;
mod profile;
mod router;
pub mod telemetry;
mod token;
mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, header};
use axum::routing::post;
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::crypto::CredentialCodec;
use crate::profile::ProfileService;
use crate::token::{DEFAULT_TTL, TokenManager};
use crate::user::{FollowStore, PgUserDirectory, UserDirectory, UserService};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State backed by the in-memory directory, so no test needs PostgreSQL.
#[cfg(test)]
pub fn test_state() -> AppState {
    let directory = Arc::new(user::memory::MemoryDirectory::default());
    let codec = Arc::new(CredentialCodec::new(Some(config::Kdf {
        iterations: 2,
        key_length: 32,
    })));
    let token = TokenManager::new(
        b"an-unguessable-test-secret",
        "https://conduit.example.com/",
        DEFAULT_TTL,
    );

    let users: Arc<dyn UserDirectory> = directory.clone();
    let follows: Arc<dyn FollowStore> = directory;

    AppState {
        config: Arc::new(config::Configuration::default()),
        users: UserService::new(Arc::clone(&users), codec, token),
        profiles: ProfileService::new(users, follows),
    }
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: UserService,
    pub profiles: ProfileService,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `POST /api/users` goes to `create`.
        .route("/api/users", post(router::create::handler))
        // `POST /api/users/login` goes to `login`.
        .route("/api/users/login", post(router::login::handler))
        .nest("/api/user", router::users::router(state.clone()))
        .nest("/api/profiles", router::profiles::router(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let codec = Arc::new(CredentialCodec::new(config.kdf.clone()));

    // handle jwt. the signing key never goes through the config file.
    let secret = std::env::var("SECRET")
        .map_err(|_| "missing `SECRET` environment variable")?;
    let issuer = config
        .token
        .as_ref()
        .and_then(|token| token.issuer.clone())
        .unwrap_or(config.url.clone());
    let ttl = config
        .token
        .as_ref()
        .and_then(|token| token.ttl)
        .unwrap_or(DEFAULT_TTL);
    let token = TokenManager::new(secret, issuer, ttl);

    let directory = Arc::new(PgUserDirectory::new(db.postgres.clone()));
    let users: Arc<dyn UserDirectory> = directory.clone();
    let follows: Arc<dyn FollowStore> = directory;

    Ok(AppState {
        config,
        users: UserService::new(Arc::clone(&users), codec, token),
        profiles: ProfileService::new(users, follows),
    })
}
