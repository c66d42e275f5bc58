// View, like, and share handlers.
//
// POST /api/posts/{id}/view  — count a view (once per reader per day)
// POST /api/posts/{id}/like  — toggle the caller's like
// GET  /api/posts/{id}/like  — whether the caller currently likes the post
// POST /api/posts/{id}/share — log a share
//
// The underlying operations never fail; each response carries the post's
// current counters so the client can reconcile optimistic updates. A post
// that doesn't exist (or is hidden from the caller) is a 404.

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use serde_json::Value;

use crate::db::models::EngagementCounts;
use crate::engagement::{Actor, ViewOutcome};
use crate::error::BlogError;
use crate::web::auth::Caller;
use crate::web::AppState;

pub async fn record_view(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    state.posts.get_visible(&id, &actor).await?;
    let outcome = state.engagement.views.record_view(&id, &actor.identity).await;
    let counts = counts(&state, &id).await?;

    let outcome = match outcome {
        ViewOutcome::Counted { .. } => "counted",
        ViewOutcome::AlreadyCounted => "already_counted",
        ViewOutcome::Skipped => "skipped",
    };
    Ok(Json(serde_json::json!({
        "outcome": outcome,
        "counts": counts,
    })))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    state.posts.get_visible(&id, &actor).await?;
    let liked = state.engagement.likes.toggle_like(&id, &actor.identity).await;
    like_response(&state, &actor, &id, Some(liked)).await
}

pub async fn like_status(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    state.posts.get_visible(&id, &actor).await?;
    like_response(&state, &actor, &id, None).await
}

pub async fn record_share(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, BlogError> {
    state.posts.get_visible(&id, &actor).await?;
    let recorded = state.engagement.likes.record_share(&id, &actor.identity).await;
    let counts = counts(&state, &id).await?;
    Ok(Json(serde_json::json!({
        "recorded": recorded,
        "counts": counts,
    })))
}

/// `toggled` is the toggle's answer; a failed toggle reports false, so the
/// actual state is read back in that case.
async fn like_response(
    state: &AppState,
    actor: &Actor,
    id: &str,
    toggled: Option<bool>,
) -> Result<Json<Value>, BlogError> {
    let liked = match toggled {
        Some(true) => true,
        _ => {
            state
                .engagement
                .likes
                .check_like_status(id, &actor.identity)
                .await
        }
    };
    let counts = counts(state, id).await?;
    Ok(Json(serde_json::json!({
        "liked": liked,
        "counts": counts,
    })))
}

async fn counts(state: &AppState, id: &str) -> Result<EngagementCounts, BlogError> {
    state
        .engagement
        .likes
        .engagement(id)
        .await
        .ok_or_else(|| BlogError::not_found(format!("post {id}")))
}
