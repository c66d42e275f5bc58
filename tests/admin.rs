// Post administration, settings, and identity resolution against an
// in-memory SQLite store.

use std::sync::Arc;

use chrono::Utc;

use quantblog::analytics;
use quantblog::blog::{self, PostAdmin};
use quantblog::db::models::{BlogSettings, NewPost, PostPatch, Profile, Role};
use quantblog::db::sqlite::SqliteStore;
use quantblog::db::ContentStore;
use quantblog::engagement::identity::SESSION_TOKEN_KEY;
use quantblog::engagement::{Actor, Identity, SessionIdentity, StaticAuth};
use quantblog::error::BlogError;
use quantblog::storage::{FileStorage, KeyValueStore};

fn store() -> Arc<dyn ContentStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

fn admin() -> Actor {
    Actor::new(Identity::User("root".to_string()), Role::Admin, "Quản trị")
}

fn reader() -> Actor {
    Actor::new(Identity::User("u1".to_string()), Role::Reader, "u1")
}

fn draft(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: "Chiến lược momentum trên thị trường phái sinh. ".repeat(60),
        tags: vec!["momentum".to_string(), " Momentum ".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn admin_creates_post_with_derived_fields() {
    let posts = PostAdmin::new(store());

    let post = posts.create(&admin(), draft("Momentum")).await.unwrap();
    assert_eq!(post.author, "Quản trị");
    assert_eq!(post.tags, vec!["momentum"]);
    // 60 repetitions of 8 words = 480 words
    assert_eq!(post.read_time, 3);
    assert!(post.excerpt.starts_with("Chiến lược momentum"));
    assert!(post.excerpt.ends_with("..."));
    assert_eq!((post.views, post.likes, post.shares), (0, 0, 0));
}

#[tokio::test]
async fn readers_cannot_manage_posts() {
    let posts = PostAdmin::new(store());
    let post = posts.create(&admin(), draft("Momentum")).await.unwrap();

    assert!(matches!(
        posts.create(&reader(), draft("x")).await,
        Err(BlogError::Forbidden(_))
    ));
    assert!(matches!(
        posts.delete(&reader(), &post.id).await,
        Err(BlogError::Forbidden(_))
    ));
    assert!(matches!(
        posts.set_hidden(&reader(), &post.id, true).await,
        Err(BlogError::Forbidden(_))
    ));
    let patch = PostPatch {
        title: Some("Đổi tên".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        posts.update(&reader(), &post.id, patch).await,
        Err(BlogError::Forbidden(_))
    ));
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let posts = PostAdmin::new(store());
    let result = posts.create(&admin(), draft("   ")).await;
    assert!(matches!(result, Err(BlogError::Validation(_))));
}

#[tokio::test]
async fn hidden_posts_are_invisible_to_readers() {
    let posts = PostAdmin::new(store());
    let visible = posts.create(&admin(), draft("Công khai")).await.unwrap();
    let hidden = posts.create(&admin(), draft("Nháp")).await.unwrap();
    posts.set_hidden(&admin(), &hidden.id, true).await.unwrap();

    let listed: Vec<String> = posts
        .list(&reader())
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![visible.id.clone()]);
    assert!(matches!(
        posts.get_visible(&hidden.id, &reader()).await,
        Err(BlogError::NotFound(_))
    ));

    assert_eq!(posts.list(&admin()).await.unwrap().len(), 2);
    assert!(posts.get_visible(&hidden.id, &admin()).await.is_ok());

    posts.set_hidden(&admin(), &hidden.id, false).await.unwrap();
    assert_eq!(posts.list(&reader()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_re_estimates_read_time() {
    let posts = PostAdmin::new(store());
    let post = posts.create(&admin(), draft("Momentum")).await.unwrap();

    let patch = PostPatch {
        content: Some("Ngắn gọn".to_string()),
        ..Default::default()
    };
    let updated = posts.update(&admin(), &post.id, patch).await.unwrap();
    assert_eq!(updated.read_time, 1);
    assert_eq!(updated.title, "Momentum");
    assert!(updated.updated_at >= post.updated_at);

    let missing = posts
        .update(
            &admin(),
            "missing",
            PostPatch {
                title: Some("x".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(missing, Err(BlogError::NotFound(_))));

    let empty = posts.update(&admin(), &post.id, PostPatch::default()).await;
    assert!(matches!(empty, Err(BlogError::Validation(_))));
}

#[tokio::test]
async fn delete_missing_post_is_not_found() {
    let posts = PostAdmin::new(store());
    assert!(matches!(
        posts.delete(&admin(), "missing").await,
        Err(BlogError::NotFound(_))
    ));
}

#[tokio::test]
async fn settings_default_then_last_write_wins() {
    let store = store();

    let defaults = blog::load_settings(&store).await;
    assert_eq!(defaults, BlogSettings::default());
    assert!(defaults.updated_at.is_none());

    let forbidden = blog::save_settings(&store, &reader(), defaults.clone()).await;
    assert!(matches!(forbidden, Err(BlogError::Forbidden(_))));

    let first = BlogSettings {
        title: "  Quant Việt  ".to_string(),
        github_url: Some("".to_string()),
        ..defaults.clone()
    };
    let saved = blog::save_settings(&store, &admin(), first).await.unwrap();
    assert_eq!(saved.title, "Quant Việt");
    assert_eq!(saved.github_url, None);
    assert!(saved.updated_at.is_some());

    let second = BlogSettings {
        title: "Quant Việt 2".to_string(),
        ..saved
    };
    blog::save_settings(&store, &admin(), second).await.unwrap();
    assert_eq!(blog::load_settings(&store).await.title, "Quant Việt 2");

    let blank = BlogSettings {
        title: " ".to_string(),
        ..defaults
    };
    assert!(matches!(
        blog::save_settings(&store, &admin(), blank).await,
        Err(BlogError::Validation(_))
    ));
}

#[tokio::test]
async fn actor_resolution_uses_profiles() {
    let store = store();
    store
        .upsert_profile(&Profile {
            id: "root".to_string(),
            email: Some("root@example.com".to_string()),
            display_name: "Người quản trị".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let root = Actor::resolve(store.as_ref(), Identity::User("root".to_string())).await;
    assert!(root.is_admin());
    assert_eq!(root.display_name, "Người quản trị");

    let stranger = Actor::resolve(store.as_ref(), Identity::User("u9".to_string())).await;
    assert_eq!(stranger.role, Role::Reader);
    assert_eq!(stranger.display_name, "u9");

    let guest = Actor::resolve(store.as_ref(), Identity::Anonymous("tok".to_string())).await;
    assert!(!guest.is_admin());
}

#[tokio::test]
async fn anonymous_token_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");

    let first = {
        let storage = Arc::new(FileStorage::open(&path).unwrap());
        SessionIdentity::new(storage)
            .resolve(&StaticAuth::anonymous())
            .await
    };
    let storage = Arc::new(FileStorage::open(&path).unwrap());
    let second = SessionIdentity::new(storage.clone())
        .resolve(&StaticAuth::anonymous())
        .await;

    assert_eq!(first, second);
    assert_eq!(
        Some(second.session_token().unwrap().to_string()),
        storage.get(SESSION_TOKEN_KEY).unwrap()
    );
}

#[tokio::test]
async fn stats_rank_posts_by_views() {
    let store = store();
    let posts = PostAdmin::new(store.clone());
    let quiet = posts.create(&admin(), draft("Ít đọc")).await.unwrap();
    let popular = posts.create(&admin(), draft("Nhiều đọc")).await.unwrap();
    posts.set_hidden(&admin(), &quiet.id, true).await.unwrap();

    store
        .adjust_counter(&popular.id, quantblog::db::models::Counter::Views, 7)
        .await
        .unwrap();
    store
        .adjust_counter(&quiet.id, quantblog::db::models::Counter::Likes, 2)
        .await
        .unwrap();

    let stats = analytics::blog_stats(&store).await.unwrap();
    assert_eq!(stats.total_posts, 2);
    assert_eq!(stats.hidden_posts, 1);
    assert_eq!(stats.total_views, 7);
    assert_eq!(stats.total_likes, 2);
    assert_eq!(stats.top_posts[0].id, popular.id);
}
