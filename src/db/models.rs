// Data models — Rust structs that map to content store rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite or sqlx directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog post as stored in the `posts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub author: String,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Estimated reading time in minutes (always >= 1)
    pub read_time: u32,
    pub image_url: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub is_hidden: bool,
}

/// Fields supplied when creating a post. Counters always start at zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub read_time: Option<u32>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
}

/// Partial update for a post. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub read_time: Option<u32>,
    /// `Some(None)` clears the image.
    pub image_url: Option<Option<String>>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.excerpt.is_none()
            && self.author.is_none()
            && self.tags.is_none()
            && self.read_time.is_none()
            && self.image_url.is_none()
    }
}

/// The denormalized engagement counters kept on each post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Counter {
    Views,
    Likes,
    Shares,
}

impl Counter {
    /// Column name in the `posts` table.
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Likes => "likes",
            Counter::Shares => "shares",
        }
    }
}

/// Snapshot of a post's counters, returned to clients for reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
}

impl From<&Post> for EngagementCounts {
    fn from(post: &Post) -> Self {
        Self {
            views: post.views,
            likes: post.likes,
            shares: post.shares,
        }
    }
}

/// What kind of engagement an interaction row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Share,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Share => "share",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(InteractionKind::View),
            "like" => Some(InteractionKind::Like),
            "share" => Some(InteractionKind::Share),
            _ => None,
        }
    }

    /// The post counter this kind of interaction feeds.
    pub fn counter(&self) -> Counter {
        match self {
            InteractionKind::View => Counter::Views,
            InteractionKind::Like => Counter::Likes,
            InteractionKind::Share => Counter::Shares,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row in `post_interactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub post_id: String,
    /// String form of the acting identity (`user:<id>` or `anon:<token>`)
    pub identity: String,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
}

/// Half-open time window `[start, end)` used for per-day lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A comment on a post. `parent_id` is set for replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_identity: String,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Fields supplied when inserting a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: String,
    pub author_identity: String,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<String>,
}

/// Blog-wide editorial metadata (singleton row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogSettings {
    pub title: String,
    pub description: String,
    pub author_bio: String,
    pub contact_email: Option<String>,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for BlogSettings {
    fn default() -> Self {
        Self {
            title: "Blog Giao Dịch Định Lượng".to_string(),
            description: "Chia sẻ kiến thức về giao dịch định lượng, backtest và quản trị rủi ro"
                .to_string(),
            author_bio: String::new(),
            contact_email: None,
            github_url: None,
            linkedin_url: None,
            facebook_url: None,
            topics: vec![
                "Giao dịch định lượng".to_string(),
                "Backtest".to_string(),
                "Quản trị rủi ro".to_string(),
            ],
            updated_at: None,
        }
    }
}

/// Authorization role stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Reader,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Admin => "admin",
        }
    }

    /// Unknown role strings fall back to the least-privileged role.
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Reader,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered user's profile (`profiles` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
