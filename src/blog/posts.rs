// Post administration — create, edit, hide, and delete posts.
//
// Readers only ever see visible posts. Every mutating operation takes the
// acting `Actor` and refuses anyone but an admin.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::db::models::{NewPost, Post, PostPatch};
use crate::db::ContentStore;
use crate::engagement::identity::Actor;
use crate::error::{BlogError, Result};
use crate::output::truncate_chars;

/// Reading speed used for the read-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

/// Length of an automatically derived excerpt, in characters.
pub const EXCERPT_CHARS: usize = 160;

/// Minutes to read `content`, rounded up, never less than one.
pub fn estimate_read_time(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// First `EXCERPT_CHARS` characters of the body, whitespace collapsed.
pub fn make_excerpt(content: &str) -> String {
    let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&flattened, EXCERPT_CHARS)
}

/// Trim tags, drop empty ones, and remove duplicates (first occurrence wins).
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

pub struct PostAdmin {
    store: Arc<dyn ContentStore>,
}

impl PostAdmin {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Posts newest first. Hidden posts are listed only for admins.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Post>> {
        Ok(self.store.list_posts(actor.is_admin()).await?)
    }

    /// A single post, as long as the actor may see it.
    pub async fn get_visible(&self, id: &str, actor: &Actor) -> Result<Post> {
        match self.store.get_post(id).await? {
            Some(post) if !post.is_hidden || actor.is_admin() => Ok(post),
            _ => Err(BlogError::not_found(format!("post {id}"))),
        }
    }

    /// Publish a new post. Missing excerpt and read time are derived from
    /// the body.
    pub async fn create(&self, actor: &Actor, post: NewPost) -> Result<Post> {
        require_admin(actor, "create posts")?;

        let title = post.title.trim().to_string();
        if title.is_empty() {
            return Err(BlogError::validation("Tiêu đề bài viết không được để trống"));
        }
        if post.content.trim().is_empty() {
            return Err(BlogError::validation("Nội dung bài viết không được để trống"));
        }

        let author = if post.author.trim().is_empty() {
            actor.display_name.clone()
        } else {
            post.author.trim().to_string()
        };
        let excerpt = post
            .excerpt
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| make_excerpt(&post.content));
        let read_time = post
            .read_time
            .filter(|m| *m >= 1)
            .unwrap_or_else(|| estimate_read_time(&post.content));

        let created = self
            .store
            .create_post(&NewPost {
                title,
                excerpt: Some(excerpt),
                author,
                tags: normalize_tags(&post.tags),
                read_time: Some(read_time),
                image_url: post.image_url.filter(|u| !u.trim().is_empty()),
                ..post
            })
            .await?;

        info!(post_id = %created.id, hidden = created.is_hidden, "Post created");
        Ok(created)
    }

    /// Apply a partial edit. Changing the body without an explicit read
    /// time re-estimates it.
    pub async fn update(&self, actor: &Actor, id: &str, mut patch: PostPatch) -> Result<Post> {
        require_admin(actor, "edit posts")?;

        if patch.is_empty() {
            return Err(BlogError::validation("nothing to update"));
        }
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(BlogError::validation("Tiêu đề bài viết không được để trống"));
            }
            patch.title = Some(title.trim().to_string());
        }
        if let Some(content) = &patch.content {
            if content.trim().is_empty() {
                return Err(BlogError::validation("Nội dung bài viết không được để trống"));
            }
            if patch.read_time.is_none() {
                patch.read_time = Some(estimate_read_time(content));
            }
        }
        if let Some(tags) = &patch.tags {
            patch.tags = Some(normalize_tags(tags));
        }

        let updated = self
            .store
            .update_post(id, &patch)
            .await?
            .ok_or_else(|| BlogError::not_found(format!("post {id}")))?;

        info!(post_id = id, "Post updated");
        Ok(updated)
    }

    /// Soft-delete (hidden = true) or restore a post.
    pub async fn set_hidden(&self, actor: &Actor, id: &str, hidden: bool) -> Result<()> {
        require_admin(actor, "hide posts")?;

        if !self.store.set_post_hidden(id, hidden).await? {
            return Err(BlogError::not_found(format!("post {id}")));
        }
        info!(post_id = id, hidden, "Post visibility changed");
        Ok(())
    }

    /// Hard-delete a post with its comments and interactions.
    pub async fn delete(&self, actor: &Actor, id: &str) -> Result<()> {
        require_admin(actor, "delete posts")?;

        if !self.store.delete_post(id).await? {
            return Err(BlogError::not_found(format!("post {id}")));
        }
        info!(post_id = id, "Post deleted");
        Ok(())
    }
}

pub(crate) fn require_admin(actor: &Actor, what: &str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BlogError::forbidden(format!("only admins can {what}")))
    }
}
