//! HTTP API tests — drive the axum router in-process with `oneshot`.
//!
//! Run with: cargo test --features web

#![cfg(feature = "web")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use quantblog::accounts;
use quantblog::config::Config;
use quantblog::db::models::{NewPost, Profile, Role};
use quantblog::db::sqlite::SqliteStore;
use quantblog::db::ContentStore;
use quantblog::web::auth::SESSION_TOKEN_HEADER;
use quantblog::web::{build_router, AppState};

use common::UnavailableStore;

const PASSWORD: &str = "mat-khau-thu-nghiem";
const SECRET: &str = "0123456789abcdef0123456789abcdef";

fn test_config() -> Config {
    Config {
        db_path: ":memory:".to_string(),
        database_url: None,
        storage_path: std::env::temp_dir().join("quantblog-web-test.json"),
        admin_id: "admin".to_string(),
        web_password: PASSWORD.to_string(),
        session_secret: SECRET.to_string(),
    }
}

async fn app_with_post() -> (Router, Arc<dyn ContentStore>, String) {
    let store: Arc<dyn ContentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let post = store
        .create_post(&NewPost {
            title: "Backtest không thiên lệch".to_string(),
            content: "Tránh look-ahead bias".to_string(),
            author: "Tác giả".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = build_router(AppState::new(test_config(), store.clone()));
    (app, store, post.id)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let token = response
        .headers()
        .get(SESSION_TOKEN_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, token, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_as(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(SESSION_TOKEN_HEADER, token)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn session_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn login_with(app: &Router, body: Value) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/login", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

async fn login(app: &Router) -> String {
    login_with(app, serde_json::json!({ "password": PASSWORD })).await
}

async fn seed_reader(store: &Arc<dyn ContentStore>, id: &str, password: &str) {
    store
        .upsert_profile(&Profile {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            display_name: format!("Độc giả {id}"),
            role: Role::Reader,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    accounts::set_password(store.as_ref(), id, password)
        .await
        .unwrap();
}

fn delete_as(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _, _) = app_with_post().await;
    let (status, _, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn anonymous_reader_gets_a_session_token() {
    let (app, _, _) = app_with_post().await;

    let (status, token, body) = send(&app, get("/api/posts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let token = token.expect("token minted");

    // A valid token is echoed back unchanged
    let request = Request::builder()
        .uri("/api/posts")
        .header(SESSION_TOKEN_HEADER, &token)
        .body(Body::empty())
        .unwrap();
    let (_, echoed, _) = send(&app, request).await;
    assert_eq!(echoed.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn view_counts_once_per_token_per_day() {
    let (app, _, post_id) = app_with_post().await;
    let uri = format!("/api/posts/{post_id}/view");

    let (status, _, first) = send(&app, post_as(&uri, "tok-a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "counted");
    assert_eq!(first["counts"]["views"], 1);

    let (_, _, second) = send(&app, post_as(&uri, "tok-a")).await;
    assert_eq!(second["outcome"], "already_counted");
    assert_eq!(second["counts"]["views"], 1);

    let (_, _, other) = send(&app, post_as(&uri, "tok-b")).await;
    assert_eq!(other["counts"]["views"], 2);
}

#[tokio::test]
async fn like_toggles_and_reports_counts() {
    let (app, _, post_id) = app_with_post().await;
    let uri = format!("/api/posts/{post_id}/like");

    let (_, _, liked) = send(&app, post_as(&uri, "tok-a")).await;
    assert_eq!(liked["liked"], true);
    assert_eq!(liked["counts"]["likes"], 1);

    let status_request = Request::builder()
        .uri(&uri)
        .header(SESSION_TOKEN_HEADER, "tok-a")
        .body(Body::empty())
        .unwrap();
    let (_, _, status) = send(&app, status_request).await;
    assert_eq!(status["liked"], true);

    let (_, _, unliked) = send(&app, post_as(&uri, "tok-a")).await;
    assert_eq!(unliked["liked"], false);
    assert_eq!(unliked["counts"]["likes"], 0);
}

#[tokio::test]
async fn engagement_on_missing_post_is_404() {
    let (app, _, _) = app_with_post().await;
    let (status, _, body) = send(&app, post_as("/api/posts/missing/like", "tok-a")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn anonymous_comment_is_rejected() {
    let (app, store, post_id) = app_with_post().await;
    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/posts/{post_id}/comments"),
            None,
            serde_json::json!({ "content": "Hay quá" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.list_comments(&post_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn admin_login_unlocks_post_management() {
    let (app, _, post_id) = app_with_post().await;

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/api/login",
            None,
            serde_json::json!({ "password": "sai" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let new_post = serde_json::json!({
        "title": "Quản trị rủi ro",
        "content": "Kelly criterion",
        "author": "",
    });
    let (status, _, _) = send(
        &app,
        json_request("POST", "/api/admin/posts", None, new_post.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app).await;
    let (status, _, created) = send(
        &app,
        json_request("POST", "/api/admin/posts", Some(&cookie), new_post),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["post"]["author"], "admin");

    // Hide the original post: readers get 404, the admin still sees it
    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/admin/posts/{post_id}/hidden"),
            Some(&cookie),
            serde_json::json!({ "hidden": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, get(&format!("/api/posts/{post_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let admin_get = Request::builder()
        .uri(format!("/api/posts/{post_id}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, admin_get).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn settings_update_requires_admin() {
    let (app, _, _) = app_with_post().await;

    let (status, _, defaults) = send(&app, get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["title"], "Blog Giao Dịch Định Lượng");

    let mut changed = defaults.clone();
    changed["title"] = Value::String("Quant Việt".to_string());

    let (status, _, _) = send(
        &app,
        json_request("PUT", "/api/settings", None, changed.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app).await;
    let (status, _, saved) = send(
        &app,
        json_request("PUT", "/api/settings", Some(&cookie), changed),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["title"], "Quant Việt");
}

#[tokio::test]
async fn reader_comments_and_deletes_only_their_own() {
    let (app, store, post_id) = app_with_post().await;
    seed_reader(&store, "u1", "mat-khau-u1").await;

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/api/login",
            None,
            serde_json::json!({ "email": "u1@example.com", "password": "sai-mat-khau" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let u1 = login_with(
        &app,
        serde_json::json!({ "email": "U1@example.com", "password": "mat-khau-u1" }),
    )
    .await;

    let me = Request::builder()
        .uri("/api/me")
        .header(header::COOKIE, &u1)
        .body(Body::empty())
        .unwrap();
    let (_, token, who) = send(&app, me).await;
    assert_eq!(who["identity"], "user:u1");
    assert_eq!(who["is_admin"], false);
    assert!(token.is_none());

    let (status, _, created) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/posts/{post_id}/comments"),
            Some(&u1),
            serde_json::json!({ "content": "  Phân tích rất hay  " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["comment"]["content"], "Phân tích rất hay");
    assert_eq!(created["comment"]["author_name"], "Độc giả u1");
    let comment_uri = format!(
        "/api/comments/{}",
        created["comment"]["id"].as_str().unwrap()
    );

    // A second reader signs up and cannot delete u1's comment
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/register",
            None,
            serde_json::json!({
                "email": "u2@example.com",
                "password": "mat-khau-u2",
                "display_name": "Độc giả u2",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let u2 = session_cookie(&response);

    let (status, _, _) = send(&app, delete_as(&comment_uri, &u2)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(&app, delete_as(&comment_uri, &u1)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, delete_as(&comment_uri, &u1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readers_are_forbidden_from_admin_routes() {
    let (app, store, post_id) = app_with_post().await;
    seed_reader(&store, "u1", "mat-khau-u1").await;
    let u1 = login_with(
        &app,
        serde_json::json!({ "email": "u1@example.com", "password": "mat-khau-u1" }),
    )
    .await;

    let (status, _, _) = send(&app, delete_as(&format!("/api/admin/posts/{post_id}"), &u1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(store.get_post(&post_id).await.unwrap().is_some());
}

#[tokio::test]
async fn comment_delete_during_outage_is_a_server_error() {
    let store: Arc<dyn ContentStore> = Arc::new(UnavailableStore);
    let app = build_router(AppState::new(test_config(), store));

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/comments/c1")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
