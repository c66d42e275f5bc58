// Comment handlers.
//
// GET    /api/posts/{id}/comments — threads (top-level + replies)
// POST   /api/posts/{id}/comments — add a comment or reply
// DELETE /api/comments/{id}       — delete (author or admin)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::BlogError;
use crate::web::auth::Caller;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct NewCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(post_id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    state.posts.get_visible(&post_id, &actor).await?;
    let threads = state.engagement.comments.threads(&post_id).await;
    let total: usize = threads.iter().map(|t| 1 + t.replies.len()).sum();
    Ok(Json(serde_json::json!({
        "total": total,
        "threads": threads,
    })))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(post_id): Path<String>,
    Json(body): Json<NewCommentRequest>,
) -> Result<(StatusCode, Json<Value>), BlogError> {
    state.posts.get_visible(&post_id, &actor).await?;
    let comment = state
        .engagement
        .comments
        .add(&post_id, &actor, &body.content, body.parent_id.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "comment": comment })),
    ))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(comment_id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    if !state.engagement.comments.try_remove(&comment_id, &actor).await? {
        return Err(BlogError::not_found(format!("comment {comment_id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
