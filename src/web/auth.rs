// Auth middleware — stateless HMAC-SHA256 session cookies, plus the
// per-request caller identity.
//
// Session token format: {user_id_hex}.{timestamp_secs}.{nonce_hex}.{hmac_hex}
//
// The HMAC covers everything before the last dot, signed with
// QUANTBLOG_SESSION_SECRET. The user id is hex-encoded so it can't contain
// the separator. Tokens are valid for SESSION_TTL_SECS (24 hours).
//
// Login flow:
//   POST /api/login { password }        → QUANTBLOG_WEB_PASSWORD, session for QUANTBLOG_ADMIN_ID
//   POST /api/login { email, password } → reader account, session for that profile
//     success: set quantblog_session cookie with new HMAC token
//     failure: 401
//
// Every request (identify middleware):
//   valid quantblog_session cookie → user:<id>, role from the profile
//     (QUANTBLOG_ADMIN_ID is always an admin)
//   otherwise → anon:<x-session-token>, minting a token when the header is
//   missing or malformed and echoing it back in the response

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use super::AppState;
use crate::db::models::Role;
use crate::engagement::identity::{generate_session_token, is_valid_session_token};
use crate::engagement::{Actor, Identity};

type HmacSha256 = Hmac<Sha256>;

/// Session cookie name.
pub const COOKIE_NAME: &str = "quantblog_session";

/// Header carrying the anonymous session token in both directions.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Session lifetime: 24 hours.
pub const SESSION_TTL_SECS: u64 = 86_400;

/// The resolved caller, inserted into request extensions by `identify`.
#[derive(Clone)]
pub struct Caller(pub Actor);

/// Build a new session token for `user_id`, signed with `secret`.
///
/// Returns the raw cookie value (the token string, not the full Set-Cookie header).
pub fn create_token(secret: &str, user_id: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let mut nonce_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);

    let payload = format!("{}.{timestamp}.{nonce}", hex::encode(user_id));
    let sig = hmac_sign(secret, &payload).unwrap_or_default();

    format!("{payload}.{sig}")
}

/// Verify a session token. Returns the user id if the HMAC is valid and the
/// token is not older than `SESSION_TTL_SECS`.
pub fn verify_token(secret: &str, token: &str) -> Option<String> {
    let (payload, provided_sig) = token.rsplit_once('.')?;
    let parts: Vec<&str> = payload.split('.').collect();
    let [user_hex, timestamp_str, _nonce] = parts.as_slice() else {
        return None;
    };

    let expected_sig = hmac_sign(secret, payload)?;
    if !constant_time_eq(provided_sig, &expected_sig) {
        return None;
    }

    let timestamp = timestamp_str.parse::<u64>().ok()?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if now.saturating_sub(timestamp) >= SESSION_TTL_SECS {
        return None;
    }

    let user_id = String::from_utf8(hex::decode(user_hex).ok()?).ok()?;
    (!user_id.is_empty()).then_some(user_id)
}

/// Axum middleware: resolve who is calling and attach it as `Caller`.
///
/// Anonymous callers get their session token echoed back (freshly minted if
/// they didn't send a usable one) so the client can persist it.
pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (actor, echo_token) = match session_user(request.headers(), &state.config.session_secret)
    {
        Some(user_id) => {
            let is_configured_admin = user_id == state.config.admin_id;
            let resolved = Actor::resolve(state.store.as_ref(), Identity::User(user_id)).await;
            // The admin password login makes this caller an admin, whatever
            // the stored profile says.
            let actor = if is_configured_admin {
                Actor {
                    role: Role::Admin,
                    ..resolved
                }
            } else {
                resolved
            };
            (actor, None)
        }
        None => {
            let token = request
                .headers()
                .get(SESSION_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|t| is_valid_session_token(t))
                .map(str::to_string)
                .unwrap_or_else(generate_session_token);
            let actor =
                Actor::resolve(state.store.as_ref(), Identity::Anonymous(token.clone())).await;
            (actor, Some(token))
        }
    };

    request.extensions_mut().insert(Caller(actor));
    let mut response = next.run(request).await;

    if let Some(token) = echo_token {
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(SESSION_TOKEN_HEADER, value);
        }
    }
    response
}

/// Axum middleware: 401 without a login, 403 for a logged-in non-admin.
///
/// Must run inside `identify`.
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<Caller>() {
        Some(Caller(actor)) if actor.is_admin() => next.run(request).await,
        Some(Caller(actor)) if actor.identity.is_authenticated() => {
            super::api_error(StatusCode::FORBIDDEN, "Admin access required")
        }
        _ => super::api_error(StatusCode::UNAUTHORIZED, "Authentication required"),
    }
}

/// Build the `Set-Cookie` header value for a new session.
pub fn set_cookie_header(token: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{COOKIE_NAME}={token}; HttpOnly{secure_flag}; SameSite=Strict; Path=/; Max-Age={SESSION_TTL_SECS}"
    )
}

/// Build the `Set-Cookie` header value that clears the session cookie.
pub fn clear_cookie_header() -> String {
    format!("{COOKIE_NAME}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

/// Constant-time string comparison to prevent timing attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

// --- Private helpers ---

fn hmac_sign(secret: &str, payload: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Extract and validate the session cookie, returning its user id.
fn session_user(headers: &HeaderMap, session_secret: &str) -> Option<String> {
    if session_secret.is_empty() {
        return None;
    }
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    // Parse individual cookie pairs
    for pair in cookie_header.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name.trim() == COOKIE_NAME {
                return verify_token(session_secret, value.trim());
            }
        }
    }
    None
}
