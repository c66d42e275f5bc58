// Auth handlers — login, sign-up, logout, and "who am I".
//
// Login without an email checks QUANTBLOG_WEB_PASSWORD and signs the caller
// in as QUANTBLOG_ADMIN_ID. Login with an email checks a reader account.
// Either way the result is a signed HMAC session cookie.
//
// Logout: clears the session cookie.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::accounts;
use crate::error::BlogError;
use crate::web::auth::{
    clear_cookie_header, constant_time_eq, create_token, set_cookie_header, Caller,
};
use crate::web::{api_error, AppState};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    display_name: String,
}

/// POST /api/login — authenticate as the admin or as a reader.
///
/// On success: returns 200 with a signed session cookie.
/// On failure: returns 401.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, BlogError> {
    let user_id = match body.email.as_deref().filter(|e| !e.trim().is_empty()) {
        Some(email) => {
            match accounts::authenticate(state.store.as_ref(), email, &body.password).await? {
                Some(profile) => profile.id,
                None => {
                    warn!("Rejected reader login attempt");
                    return Ok(api_error(
                        StatusCode::UNAUTHORIZED,
                        "Sai email hoặc mật khẩu",
                    ));
                }
            }
        }
        None => {
            let expected = &state.config.web_password;
            if expected.is_empty() || !constant_time_eq(expected, &body.password) {
                warn!("Rejected admin login attempt");
                return Ok(api_error(StatusCode::UNAUTHORIZED, "Sai mật khẩu"));
            }
            state.config.admin_id.clone()
        }
    };

    info!(user_id = %user_id, "Logged in");
    Ok(session_response(&state, &user_id, StatusCode::OK))
}

/// POST /api/register — create a reader account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, BlogError> {
    let profile = accounts::register(
        state.store.as_ref(),
        &body.email,
        &body.password,
        &body.display_name,
    )
    .await?;
    Ok(session_response(&state, &profile.id, StatusCode::CREATED))
}

/// POST /api/logout — clear the session cookie.
pub async fn logout() -> Response {
    let cookie = clear_cookie_header();
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
        .into_response()
}

/// GET /api/me — the resolved caller.
pub async fn me(Extension(Caller(actor)): Extension<Caller>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "identity": actor.identity.to_string(),
        "authenticated": actor.identity.is_authenticated(),
        "display_name": actor.display_name,
        "role": actor.role,
        "is_admin": actor.is_admin(),
    }))
}

fn session_response(state: &AppState, user_id: &str, status: StatusCode) -> Response {
    let token = create_token(&state.config.session_secret, user_id);
    // TLS terminates at the reverse proxy, so the server can't tell whether
    // the client connection is HTTPS.
    let cookie = set_cookie_header(&token, false);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "message": "Authenticated",
            "user_id": user_id,
        })),
    )
        .into_response()
}
