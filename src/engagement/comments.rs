// Comment threads — top-level comments with one level of replies.
//
// Adding a comment is a deliberate user action, so its failures are
// surfaced. Listing degrades to an empty thread on store errors. Removal
// enforces author-or-admin here rather than trusting callers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::identity::Actor;
use crate::db::models::{Comment, NewComment};
use crate::db::ContentStore;
use crate::error::{BlogError, Result};

/// Upper bound on comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 5000;

/// A top-level comment and its direct replies (oldest reply first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadEntry {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

pub struct CommentThread {
    store: Arc<dyn ContentStore>,
}

impl CommentThread {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Every comment on the post, newest first. Empty on store failure.
    pub async fn list(&self, post_id: &str) -> Vec<Comment> {
        match self.store.list_comments(post_id).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(error = %e, post_id, "Failed to load comments");
                Vec::new()
            }
        }
    }

    /// Comments grouped for display.
    pub async fn threads(&self, post_id: &str) -> Vec<ThreadEntry> {
        group_threads(&self.list(post_id).await)
    }

    /// Post a comment or a reply.
    ///
    /// Blank content and anonymous actors are rejected before the store is
    /// touched. A reply's parent must be a top-level comment on the same post.
    pub async fn add(
        &self,
        post_id: &str,
        actor: &Actor,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BlogError::validation("Nội dung bình luận không được để trống"));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(BlogError::validation(format!(
                "Bình luận dài quá {MAX_COMMENT_CHARS} ký tự"
            )));
        }
        if !actor.identity.is_authenticated() {
            return Err(BlogError::validation("Bạn cần đăng nhập để bình luận"));
        }

        // Hidden posts are invisible to everyone but admins
        match self.store.get_post(post_id).await? {
            Some(post) if !post.is_hidden || actor.is_admin() => {}
            _ => return Err(BlogError::not_found(format!("post {post_id}"))),
        }

        if let Some(parent_id) = parent_id {
            let parent = self
                .store
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| BlogError::validation(format!("parent comment {parent_id} does not exist")))?;
            if parent.post_id != post_id {
                return Err(BlogError::validation(
                    "parent comment belongs to a different post",
                ));
            }
            if parent.is_reply() {
                return Err(BlogError::validation("replies cannot be nested"));
            }
        }

        let comment = self
            .store
            .insert_comment(&NewComment {
                post_id: post_id.to_string(),
                author_identity: actor.identity.to_string(),
                author_name: actor.display_name.clone(),
                content: content.to_string(),
                parent_id: parent_id.map(str::to_string),
            })
            .await?;

        info!(post_id, comment_id = %comment.id, reply = comment.is_reply(), "Comment added");
        Ok(comment)
    }

    /// Delete a comment (and its replies). Only the author or an admin may.
    ///
    /// Returns Ok(false) if the comment doesn't exist or the store fails;
    /// Err only for authorization.
    pub async fn remove(&self, comment_id: &str, actor: &Actor) -> Result<bool> {
        match self.try_remove(comment_id, actor).await {
            Err(BlogError::Store(e)) => {
                warn!(error = %e, comment_id, "Failed to delete comment");
                Ok(false)
            }
            other => other,
        }
    }

    /// Like `remove`, but store failures come back as `BlogError::Store`
    /// instead of Ok(false), so a missing comment and an outage differ.
    pub async fn try_remove(&self, comment_id: &str, actor: &Actor) -> Result<bool> {
        let Some(comment) = self.store.get_comment(comment_id).await? else {
            return Ok(false);
        };

        let is_author = comment.author_identity == actor.identity.to_string()
            && actor.identity.is_authenticated();
        if !is_author && !actor.is_admin() {
            return Err(BlogError::forbidden(
                "only the author or an admin can delete this comment",
            ));
        }

        let deleted = self.store.delete_comment(comment_id).await?;
        if deleted {
            info!(comment_id, by = %actor.identity, "Comment deleted");
        }
        Ok(deleted)
    }
}

/// Group comments into (top-level, replies) pairs in a single pass.
///
/// Top-level comments keep their input order. Replies are sorted oldest
/// first. A reply whose parent isn't a top-level comment in `comments` is
/// dropped.
pub fn group_threads(comments: &[Comment]) -> Vec<ThreadEntry> {
    let mut entries: Vec<ThreadEntry> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for comment in comments.iter().filter(|c| !c.is_reply()) {
        index.insert(comment.id.as_str(), entries.len());
        entries.push(ThreadEntry {
            comment: comment.clone(),
            replies: Vec::new(),
        });
    }

    for reply in comments.iter().filter(|c| c.is_reply()) {
        let parent = reply.parent_id.as_deref().and_then(|id| index.get(id));
        if let Some(&slot) = parent {
            entries[slot].replies.push(reply.clone());
        }
    }

    for entry in &mut entries {
        entry.replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    entries
}
