// SqliteStore — rusqlite backend implementing the ContentStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points — Rust enforces this because
// MutexGuard is !Send.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{
    BlogSettings, Comment, Counter, EngagementCounts, Interaction, InteractionKind, NewComment,
    NewPost, Post, PostPatch, Profile, TimeWindow,
};
use super::queries;
use super::traits::ContentStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory store with the schema applied. Used by tests and by
    /// throwaway CLI runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let conn = self.conn.lock().await;
        queries::create_post(&conn, post)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        queries::get_post(&conn, id)
    }

    async fn list_posts(&self, include_hidden: bool) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::list_posts(&conn, include_hidden)
    }

    async fn update_post(&self, id: &str, patch: &PostPatch) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        queries::update_post(&conn, id, patch)
    }

    async fn set_post_hidden(&self, id: &str, hidden: bool) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::set_post_hidden(&conn, id, hidden)
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::delete_post(&conn, id)
    }

    async fn adjust_counter(
        &self,
        post_id: &str,
        counter: Counter,
        delta: i64,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        queries::adjust_counter(&conn, post_id, counter, delta)
    }

    async fn set_counters(&self, post_id: &str, counts: &EngagementCounts) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::set_counters(&conn, post_id, counts)
    }

    async fn find_interaction(
        &self,
        post_id: &str,
        identity: &str,
        kind: InteractionKind,
        window: Option<TimeWindow>,
    ) -> Result<Option<Interaction>> {
        let conn = self.conn.lock().await;
        queries::find_interaction(&conn, post_id, identity, kind, window)
    }

    async fn insert_interaction(
        &self,
        post_id: &str,
        identity: &str,
        kind: InteractionKind,
        created_at: DateTime<Utc>,
    ) -> Result<Interaction> {
        let conn = self.conn.lock().await;
        queries::insert_interaction(&conn, post_id, identity, kind, created_at)
    }

    async fn delete_interaction(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::delete_interaction(&conn, id)
    }

    async fn count_interactions(&self, post_id: &str, kind: InteractionKind) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_interactions(&conn, post_id, kind)
    }

    async fn list_interactions(&self, post_id: &str) -> Result<Vec<Interaction>> {
        let conn = self.conn.lock().await;
        queries::list_interactions(&conn, post_id)
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let conn = self.conn.lock().await;
        queries::list_comments(&conn, post_id)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let conn = self.conn.lock().await;
        queries::get_comment(&conn, id)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let conn = self.conn.lock().await;
        queries::insert_comment(&conn, comment)
    }

    async fn delete_comment(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::delete_comment(&conn, id)
    }

    async fn get_settings(&self) -> Result<Option<BlogSettings>> {
        let conn = self.conn.lock().await;
        queries::get_settings(&conn)
    }

    async fn save_settings(&self, settings: &BlogSettings) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::save_settings(&conn, settings)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock().await;
        queries::get_profile(&conn, id)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_profile(&conn, profile)
    }

    async fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock().await;
        queries::get_profile_by_email(&conn, email)
    }

    async fn get_password_hash(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_password_hash(&conn, user_id)
    }

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::set_password_hash(&conn, user_id, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use chrono::{Duration, TimeZone};

    fn test_db() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn sample_post() -> NewPost {
        NewPost {
            title: "Chiến lược mean reversion".to_string(),
            content: "Nội dung bài viết".to_string(),
            author: "Admin".to_string(),
            tags: vec!["backtest".to_string(), "python".to_string()],
            read_time: Some(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_trait_post_roundtrip() {
        let db = test_db();
        let created = db.create_post(&sample_post()).await.unwrap();
        assert_eq!(created.views, 0);
        assert_eq!(created.likes, 0);
        assert_eq!(created.shares, 0);
        assert_eq!(created.read_time, 5);

        let loaded = db.get_post(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Chiến lược mean reversion");
        assert_eq!(loaded.tags, vec!["backtest", "python"]);
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trait_list_posts_hides_hidden() {
        let db = test_db();
        let visible = db.create_post(&sample_post()).await.unwrap();
        let hidden = db.create_post(&sample_post()).await.unwrap();
        assert!(db.set_post_hidden(&hidden.id, true).await.unwrap());

        let public = db.list_posts(false).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, visible.id);

        let all = db.list_posts(true).await.unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].id, hidden.id);
    }

    #[tokio::test]
    async fn test_trait_update_post_patch() {
        let db = test_db();
        let post = db.create_post(&sample_post()).await.unwrap();
        let patch = PostPatch {
            title: Some("Tiêu đề mới".to_string()),
            image_url: Some(Some("https://img.example/cover.png".to_string())),
            ..Default::default()
        };
        let updated = db.update_post(&post.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.title, "Tiêu đề mới");
        assert_eq!(updated.content, post.content);
        assert_eq!(
            updated.image_url.as_deref(),
            Some("https://img.example/cover.png")
        );
        assert!(db.update_post("missing", &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trait_adjust_counter_clamps_at_zero() {
        let db = test_db();
        let post = db.create_post(&sample_post()).await.unwrap();
        assert_eq!(
            db.adjust_counter(&post.id, Counter::Likes, 1).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            db.adjust_counter(&post.id, Counter::Likes, -1).await.unwrap(),
            Some(0)
        );
        assert_eq!(
            db.adjust_counter(&post.id, Counter::Likes, -1).await.unwrap(),
            Some(0)
        );
        assert_eq!(
            db.adjust_counter("missing", Counter::Views, 1).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_trait_find_interaction_respects_window() {
        let db = test_db();
        let post = db.create_post(&sample_post()).await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        db.insert_interaction(&post.id, "user:u1", InteractionKind::View, at)
            .await
            .unwrap();

        let same_day = TimeWindow {
            start: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap(),
        };
        let next_day = TimeWindow {
            start: same_day.end,
            end: same_day.end + Duration::days(1),
        };

        let found = db
            .find_interaction(&post.id, "user:u1", InteractionKind::View, Some(same_day))
            .await
            .unwrap();
        assert!(found.is_some());
        let missing = db
            .find_interaction(&post.id, "user:u1", InteractionKind::View, Some(next_day))
            .await
            .unwrap();
        assert!(missing.is_none());
        // Kind matters
        let like = db
            .find_interaction(&post.id, "user:u1", InteractionKind::Like, None)
            .await
            .unwrap();
        assert!(like.is_none());
    }

    #[tokio::test]
    async fn test_trait_delete_post_cascades() {
        let db = test_db();
        let post = db.create_post(&sample_post()).await.unwrap();
        db.insert_interaction(&post.id, "user:u1", InteractionKind::Like, Utc::now())
            .await
            .unwrap();
        let parent = db
            .insert_comment(&NewComment {
                post_id: post.id.clone(),
                author_identity: "user:u1".to_string(),
                author_name: "U1".to_string(),
                content: "Hay quá".to_string(),
                parent_id: None,
            })
            .await
            .unwrap();
        db.insert_comment(&NewComment {
            post_id: post.id.clone(),
            author_identity: "user:u2".to_string(),
            author_name: "U2".to_string(),
            content: "Đồng ý".to_string(),
            parent_id: Some(parent.id.clone()),
        })
        .await
        .unwrap();

        assert!(db.delete_post(&post.id).await.unwrap());
        assert!(db.list_comments(&post.id).await.unwrap().is_empty());
        assert!(db.list_interactions(&post.id).await.unwrap().is_empty());
        assert!(!db.delete_post(&post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_trait_delete_comment_cascades_to_replies() {
        let db = test_db();
        let post = db.create_post(&sample_post()).await.unwrap();
        let parent = db
            .insert_comment(&NewComment {
                post_id: post.id.clone(),
                author_identity: "user:u1".to_string(),
                author_name: "U1".to_string(),
                content: "Câu hỏi".to_string(),
                parent_id: None,
            })
            .await
            .unwrap();
        db.insert_comment(&NewComment {
            post_id: post.id.clone(),
            author_identity: "user:u2".to_string(),
            author_name: "U2".to_string(),
            content: "Trả lời".to_string(),
            parent_id: Some(parent.id.clone()),
        })
        .await
        .unwrap();

        assert!(db.delete_comment(&parent.id).await.unwrap());
        assert!(db.list_comments(&post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trait_settings_roundtrip() {
        let db = test_db();
        assert!(db.get_settings().await.unwrap().is_none());
        let settings = BlogSettings {
            title: "Quant VN".to_string(),
            topics: vec!["Alpha".to_string()],
            ..Default::default()
        };
        db.save_settings(&settings).await.unwrap();
        let loaded = db.get_settings().await.unwrap().unwrap();
        assert_eq!(loaded.title, "Quant VN");
        assert_eq!(loaded.topics, vec!["Alpha"]);
        assert!(loaded.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_trait_profile_upsert() {
        let db = test_db();
        let mut profile = Profile {
            id: "u1".to_string(),
            email: Some("u1@example.com".to_string()),
            display_name: "Người dùng 1".to_string(),
            role: Role::Reader,
            created_at: Utc::now(),
        };
        db.upsert_profile(&profile).await.unwrap();
        profile.role = Role::Admin;
        db.upsert_profile(&profile).await.unwrap();

        let loaded = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(loaded.role, Role::Admin);
        assert_eq!(loaded.display_name, "Người dùng 1");
    }

    #[tokio::test]
    async fn test_trait_profile_credentials() {
        let db = test_db();
        db.upsert_profile(&Profile {
            id: "u1".to_string(),
            email: Some("U1@Example.com".to_string()),
            display_name: "u1".to_string(),
            role: Role::Reader,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let found = db.get_profile_by_email(" u1@example.COM ").await.unwrap();
        assert_eq!(found.map(|p| p.id).as_deref(), Some("u1"));
        assert!(db.get_profile_by_email("u2@example.com").await.unwrap().is_none());

        assert!(db.get_password_hash("u1").await.unwrap().is_none());
        assert!(db.set_password_hash("u1", "hash").await.unwrap());
        assert!(!db.set_password_hash("missing", "hash").await.unwrap());
        assert_eq!(db.get_password_hash("u1").await.unwrap().as_deref(), Some("hash"));

        // Profile upserts leave the password alone
        db.upsert_profile(&Profile {
            id: "u1".to_string(),
            email: None,
            display_name: "renamed".to_string(),
            role: Role::Reader,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        assert_eq!(db.get_password_hash("u1").await.unwrap().as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = test_db();
        assert_eq!(db.table_count().await.unwrap(), 6);
    }
}
