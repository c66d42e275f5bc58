// Blog settings handlers.
//
// GET /api/settings — current settings (defaults when none are stored)
// PUT /api/settings — replace them (admin)

use axum::extract::State;
use axum::Extension;
use axum::Json;

use crate::blog;
use crate::db::models::BlogSettings;
use crate::error::BlogError;
use crate::web::auth::Caller;
use crate::web::AppState;

pub async fn get_settings(State(state): State<AppState>) -> Json<BlogSettings> {
    Json(blog::load_settings(&state.store).await)
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(Caller(actor)): Extension<Caller>,
    Json(settings): Json<BlogSettings>,
) -> Result<Json<BlogSettings>, BlogError> {
    let saved = blog::save_settings(&state.store, &actor, settings).await?;
    Ok(Json(saved))
}
