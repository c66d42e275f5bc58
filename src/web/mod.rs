// Web server — Axum-based JSON API for the blog front end.
//
// Readers hit the public routes anonymously (identified by the
// x-session-token header) or after logging in to a reader account; the
// admin logs in with a password. Logins get a signed cookie. All routes
// serve JSON.
//
// Auth: stateless HMAC-SHA256 session cookies. No session table in the DB.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::blog::PostAdmin;
use crate::config::Config;
use crate::db::ContentStore;
use crate::engagement::Engagement;
use crate::error::BlogError;
use crate::storage::MemoryStorage;

pub mod auth;
pub mod handlers;

/// How often the server sweeps stale view markers.
const GC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub config: Arc<Config>,
    pub engagement: Arc<Engagement>,
    pub posts: Arc<PostAdmin>,
}

impl AppState {
    /// Build the state. View markers for anonymous readers live in
    /// process-local memory.
    pub fn new(config: Config, store: Arc<dyn ContentStore>) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self {
            engagement: Arc::new(Engagement::new(store.clone(), storage)),
            posts: Arc::new(PostAdmin::new(store.clone())),
            store,
            config: Arc::new(config),
        }
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(
    config: Config,
    store: Arc<dyn ContentStore>,
    port: u16,
    bind: &str,
) -> Result<()> {
    let state = AppState::new(config, store);

    // Markers are per-day, so sweep periodically rather than only at start.
    let engagement = state.engagement.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(GC_INTERVAL);
        loop {
            interval.tick().await;
            let removed = engagement.gc.cleanup(Utc::now());
            debug!(removed, "Periodic view marker sweep");
        }
    });

    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("quantblog API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Admin API routes (require valid session cookie)
    let admin_api = Router::new()
        .route("/api/admin/posts", post(handlers::admin::create_post))
        .route(
            "/api/admin/posts/{id}",
            put(handlers::admin::update_post).delete(handlers::admin::delete_post),
        )
        .route(
            "/api/admin/posts/{id}/hidden",
            post(handlers::admin::set_hidden),
        )
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route(
            "/api/admin/posts/{id}/reconcile",
            post(handlers::admin::reconcile),
        )
        .layer(axum::middleware::from_fn(auth::require_admin));

    // Reader routes (anonymous, logged-in reader, or admin)
    let public_api = Router::new()
        .route("/health", get(health))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/me", get(handlers::auth::me))
        .route("/api/posts", get(handlers::posts::list_posts))
        .route("/api/posts/{id}", get(handlers::posts::get_post))
        .route("/api/posts/{id}/view", post(handlers::engagement::record_view))
        .route(
            "/api/posts/{id}/like",
            post(handlers::engagement::toggle_like).get(handlers::engagement::like_status),
        )
        .route("/api/posts/{id}/share", post(handlers::engagement::record_share))
        .route(
            "/api/posts/{id}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::add_comment),
        )
        .route("/api/comments/{id}", delete(handlers::comments::delete_comment))
        .route(
            "/api/settings",
            get(handlers::settings::get_settings).merge(
                put(handlers::settings::update_settings)
                    .route_layer(axum::middleware::from_fn(auth::require_admin)),
            ),
        );

    Router::new()
        .merge(admin_api)
        .merge(public_api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::identify,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    HeaderName::from_static(auth::SESSION_TOKEN_HEADER),
                ])
                .expose_headers([HeaderName::from_static(auth::SESSION_TOKEN_HEADER)]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check — always returns 200 OK.
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        match &self {
            BlogError::Validation(msg) => api_error(StatusCode::BAD_REQUEST, msg),
            BlogError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
            BlogError::Forbidden(msg) => api_error(StatusCode::FORBIDDEN, msg),
            BlogError::Store(e) => {
                error!(error = %e, "Content store error");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
