// Shared test doubles for the integration tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quantblog::db::models::{
    BlogSettings, Comment, Counter, EngagementCounts, Interaction, InteractionKind, NewComment,
    NewPost, Post, PostPatch, Profile, TimeWindow,
};
use quantblog::db::ContentStore;

/// A content store whose backend is down: every call fails.
pub struct UnavailableStore;

#[async_trait]
impl ContentStore for UnavailableStore {
    async fn table_count(&self) -> Result<i64> {
        bail!("connection refused")
    }

    async fn create_post(&self, _post: &NewPost) -> Result<Post> {
        bail!("connection refused")
    }

    async fn get_post(&self, _id: &str) -> Result<Option<Post>> {
        bail!("connection refused")
    }

    async fn list_posts(&self, _include_hidden: bool) -> Result<Vec<Post>> {
        bail!("connection refused")
    }

    async fn update_post(&self, _id: &str, _patch: &PostPatch) -> Result<Option<Post>> {
        bail!("connection refused")
    }

    async fn set_post_hidden(&self, _id: &str, _hidden: bool) -> Result<bool> {
        bail!("connection refused")
    }

    async fn delete_post(&self, _id: &str) -> Result<bool> {
        bail!("connection refused")
    }

    async fn adjust_counter(
        &self,
        _post_id: &str,
        _counter: Counter,
        _delta: i64,
    ) -> Result<Option<i64>> {
        bail!("connection refused")
    }

    async fn set_counters(&self, _post_id: &str, _counts: &EngagementCounts) -> Result<bool> {
        bail!("connection refused")
    }

    async fn find_interaction(
        &self,
        _post_id: &str,
        _identity: &str,
        _kind: InteractionKind,
        _window: Option<TimeWindow>,
    ) -> Result<Option<Interaction>> {
        bail!("connection refused")
    }

    async fn insert_interaction(
        &self,
        _post_id: &str,
        _identity: &str,
        _kind: InteractionKind,
        _created_at: DateTime<Utc>,
    ) -> Result<Interaction> {
        bail!("connection refused")
    }

    async fn delete_interaction(&self, _id: i64) -> Result<bool> {
        bail!("connection refused")
    }

    async fn count_interactions(&self, _post_id: &str, _kind: InteractionKind) -> Result<i64> {
        bail!("connection refused")
    }

    async fn list_interactions(&self, _post_id: &str) -> Result<Vec<Interaction>> {
        bail!("connection refused")
    }

    async fn list_comments(&self, _post_id: &str) -> Result<Vec<Comment>> {
        bail!("connection refused")
    }

    async fn get_comment(&self, _id: &str) -> Result<Option<Comment>> {
        bail!("connection refused")
    }

    async fn insert_comment(&self, _comment: &NewComment) -> Result<Comment> {
        bail!("connection refused")
    }

    async fn delete_comment(&self, _id: &str) -> Result<bool> {
        bail!("connection refused")
    }

    async fn get_settings(&self) -> Result<Option<BlogSettings>> {
        bail!("connection refused")
    }

    async fn save_settings(&self, _settings: &BlogSettings) -> Result<()> {
        bail!("connection refused")
    }

    async fn get_profile(&self, _id: &str) -> Result<Option<Profile>> {
        bail!("connection refused")
    }

    async fn upsert_profile(&self, _profile: &Profile) -> Result<()> {
        bail!("connection refused")
    }

    async fn get_profile_by_email(&self, _email: &str) -> Result<Option<Profile>> {
        bail!("connection refused")
    }

    async fn get_password_hash(&self, _user_id: &str) -> Result<Option<String>> {
        bail!("connection refused")
    }

    async fn set_password_hash(&self, _user_id: &str, _hash: &str) -> Result<bool> {
        bail!("connection refused")
    }
}
