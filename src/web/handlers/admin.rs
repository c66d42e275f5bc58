// Admin handlers — post management and engagement stats.
//
// POST   /api/admin/posts                — create
// PUT    /api/admin/posts/{id}           — partial update
// DELETE /api/admin/posts/{id}           — hard delete (cascades)
// POST   /api/admin/posts/{id}/hidden    — { "hidden": bool }
// POST   /api/admin/posts/{id}/reconcile — recompute counters
// GET    /api/admin/stats                — totals and most read posts
//
// The session cookie is checked by middleware; the services check the
// admin role again.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::analytics;
use crate::db::models::{NewPost, PostPatch};
use crate::error::BlogError;
use crate::web::auth::Caller;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct HiddenRequest {
    pub hidden: bool,
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Json(post): Json<NewPost>,
) -> Result<(StatusCode, Json<Value>), BlogError> {
    let post = state.posts.create(&actor, post).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "post": post }))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Value>, BlogError> {
    let post = state.posts.update(&actor, &id, patch).await?;
    Ok(Json(serde_json::json!({ "post": post })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    state.posts.delete(&actor, &id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn set_hidden(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
    Json(body): Json<HiddenRequest>,
) -> Result<Json<Value>, BlogError> {
    state.posts.set_hidden(&actor, &id, body.hidden).await?;
    Ok(Json(serde_json::json!({ "id": id, "hidden": body.hidden })))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    let (before, after) = analytics::reconcile_counters(&state.store, &id)
        .await?
        .ok_or_else(|| BlogError::not_found(format!("post {id}")))?;
    Ok(Json(serde_json::json!({
        "before": before,
        "after": after,
    })))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<analytics::BlogStats>, BlogError> {
    Ok(Json(analytics::blog_stats(&state.store).await?))
}
