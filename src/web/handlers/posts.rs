// Post read handlers.
//
// GET /api/posts      — visible posts, newest first (hidden ones too for the admin)
// GET /api/posts/{id} — a single post with its counters

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde_json::Value;

use crate::error::BlogError;
use crate::web::auth::Caller;
use crate::web::AppState;

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
) -> Result<Json<Value>, BlogError> {
    let posts = state.posts.list(&actor).await?;
    Ok(Json(serde_json::json!({
        "total": posts.len(),
        "posts": posts,
    })))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    let post = state.posts.get_visible(&id, &actor).await?;
    Ok(Json(serde_json::json!({ "post": post })))
}
