// Likes and shares — keeps the counters on `posts` in step with the
// interaction rows.
//
// A like row's presence means "currently liked", so liking is a toggle.
// Shares are a log: every call adds a row and bumps the counter.
//
// None of these surface errors. A failed toggle returns false and the
// client is expected to re-check with `check_like_status`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::identity::Identity;
use crate::db::models::{Counter, EngagementCounts, InteractionKind};
use crate::db::ContentStore;
use crate::error::BlogError;

pub struct InteractionToggle {
    store: Arc<dyn ContentStore>,
}

impl InteractionToggle {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Flip the like state for (post, identity). Returns the new state;
    /// false on any failure.
    pub async fn toggle_like(&self, post_id: &str, identity: &Identity) -> bool {
        match self.try_toggle_like(post_id, identity).await {
            Ok(liked) => liked,
            Err(e) => {
                warn!(error = %e, post_id, identity = %identity, "Like toggle failed");
                false
            }
        }
    }

    async fn try_toggle_like(&self, post_id: &str, identity: &Identity) -> Result<bool, BlogError> {
        let who = identity.to_string();
        let existing = self
            .store
            .find_interaction(post_id, &who, InteractionKind::Like, None)
            .await?;

        match existing {
            Some(like) => {
                self.store.delete_interaction(like.id).await?;
                let likes = self
                    .store
                    .adjust_counter(post_id, Counter::Likes, -1)
                    .await?
                    .ok_or_else(|| BlogError::not_found(format!("post {post_id}")))?;
                debug!(post_id, likes, "Post unliked");
                Ok(false)
            }
            None => {
                self.require_open(post_id).await?;
                self.store
                    .insert_interaction(post_id, &who, InteractionKind::Like, Utc::now())
                    .await?;
                let likes = self
                    .store
                    .adjust_counter(post_id, Counter::Likes, 1)
                    .await?
                    .ok_or_else(|| BlogError::not_found(format!("post {post_id}")))?;
                debug!(post_id, likes, "Post liked");
                Ok(true)
            }
        }
    }

    /// Whether (post, identity) currently has a like. Read-only.
    pub async fn check_like_status(&self, post_id: &str, identity: &Identity) -> bool {
        match self
            .store
            .find_interaction(post_id, &identity.to_string(), InteractionKind::Like, None)
            .await
        {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(error = %e, post_id, "Like status check failed");
                false
            }
        }
    }

    /// Log a share and bump the share counter. No dedup: every call counts.
    /// Returns whether both writes went through.
    pub async fn record_share(&self, post_id: &str, identity: &Identity) -> bool {
        match self.try_record_share(post_id, identity).await {
            Ok(shares) => {
                debug!(post_id, shares, "Share recorded");
                true
            }
            Err(e) => {
                warn!(error = %e, post_id, identity = %identity, "Failed to record share");
                false
            }
        }
    }

    async fn try_record_share(&self, post_id: &str, identity: &Identity) -> Result<i64, BlogError> {
        self.require_open(post_id).await?;
        self.store
            .insert_interaction(
                post_id,
                &identity.to_string(),
                InteractionKind::Share,
                Utc::now(),
            )
            .await?;
        self.store
            .adjust_counter(post_id, Counter::Shares, 1)
            .await?
            .ok_or_else(|| BlogError::not_found(format!("post {post_id}")))
    }

    /// The post must exist and not be hidden. Unliking stays possible after
    /// a post is hidden so the counter can still go down.
    async fn require_open(&self, post_id: &str) -> Result<(), BlogError> {
        match self.store.get_post(post_id).await? {
            Some(post) if !post.is_hidden => Ok(()),
            _ => Err(BlogError::not_found(format!("post {post_id}"))),
        }
    }

    /// Current counters for a post, for reconciling optimistic client state.
    pub async fn engagement(&self, post_id: &str) -> Option<EngagementCounts> {
        match self.store.get_post(post_id).await {
            Ok(post) => post.as_ref().map(EngagementCounts::from),
            Err(e) => {
                warn!(error = %e, post_id, "Failed to read engagement counters");
                None
            }
        }
    }
}
