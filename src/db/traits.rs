// ContentStore trait — backend-agnostic async interface for the blog's rows.
//
// Implementors: SqliteStore (wraps rusqlite), PgStore (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.
//
// The engagement services only ever see `Arc<dyn ContentStore>`; nothing
// above this layer knows which backend is in use.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    BlogSettings, Comment, Counter, EngagementCounts, Interaction, InteractionKind, NewComment,
    NewPost, Post, PostPatch, Profile, TimeWindow,
};

#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Posts ---

    /// Insert a new post. The store assigns the id and timestamps.
    async fn create_post(&self, post: &NewPost) -> Result<Post>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>>;

    /// List posts newest first. Hidden posts are only included on request.
    async fn list_posts(&self, include_hidden: bool) -> Result<Vec<Post>>;

    /// Apply a partial update and bump `updated_at`.
    /// Returns the updated post, or None if it doesn't exist.
    async fn update_post(&self, id: &str, patch: &PostPatch) -> Result<Option<Post>>;

    /// Soft-delete (or restore) a post. Returns false if it doesn't exist.
    async fn set_post_hidden(&self, id: &str, hidden: bool) -> Result<bool>;

    /// Hard-delete a post along with its interactions and comments.
    async fn delete_post(&self, id: &str) -> Result<bool>;

    /// Add `delta` to one counter in a single statement, clamping at zero.
    /// Returns the new value, or None if the post doesn't exist.
    async fn adjust_counter(&self, post_id: &str, counter: Counter, delta: i64)
        -> Result<Option<i64>>;

    /// Overwrite all three counters (used by reconciliation).
    async fn set_counters(&self, post_id: &str, counts: &EngagementCounts) -> Result<bool>;

    // --- Interactions ---

    /// Find one interaction for (post, identity, kind), optionally restricted
    /// to rows created inside `window`.
    async fn find_interaction(
        &self,
        post_id: &str,
        identity: &str,
        kind: InteractionKind,
        window: Option<TimeWindow>,
    ) -> Result<Option<Interaction>>;

    /// Record an interaction and return the stored row.
    async fn insert_interaction(
        &self,
        post_id: &str,
        identity: &str,
        kind: InteractionKind,
        created_at: DateTime<Utc>,
    ) -> Result<Interaction>;

    async fn delete_interaction(&self, id: i64) -> Result<bool>;

    async fn count_interactions(&self, post_id: &str, kind: InteractionKind) -> Result<i64>;

    /// All interactions for a post, oldest first.
    async fn list_interactions(&self, post_id: &str) -> Result<Vec<Interaction>>;

    // --- Comments ---

    /// All comments for a post (top-level and replies), newest first.
    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>>;

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>>;

    /// Insert a comment. The store assigns the id and creation timestamp.
    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment>;

    /// Delete a comment and any replies to it.
    async fn delete_comment(&self, id: &str) -> Result<bool>;

    // --- Settings ---

    async fn get_settings(&self) -> Result<Option<BlogSettings>>;

    /// Store the settings singleton (last write wins).
    async fn save_settings(&self, settings: &BlogSettings) -> Result<()>;

    // --- Profiles ---

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<()>;

    /// Case-insensitive lookup by email.
    async fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>>;

    /// The stored password hash, or None if the profile has no login.
    async fn get_password_hash(&self, user_id: &str) -> Result<Option<String>>;

    /// Returns false if the profile doesn't exist.
    async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<bool>;
}
