// Blog analytics — aggregate engagement and counter reconciliation.
//
// Counters on `posts` are maintained incrementally by the engagement layer.
// A failed write between the interaction insert and the counter bump (or a
// concurrent unlike) can leave them off by a few; `reconcile_counters`
// recomputes them from the interaction rows, which are the source of truth.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::db::models::{EngagementCounts, InteractionKind, Post};
use crate::db::ContentStore;

/// Number of posts shown in the "most read" list.
pub const TOP_POSTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            views: post.views,
            likes: post.likes,
            shares: post.shares,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogStats {
    pub total_posts: usize,
    pub hidden_posts: usize,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_shares: i64,
    /// Most viewed posts, most views first.
    pub top_posts: Vec<PostSummary>,
}

/// Summarize engagement across every post, hidden ones included.
pub async fn blog_stats(store: &Arc<dyn ContentStore>) -> Result<BlogStats> {
    let posts = store
        .list_posts(true)
        .await
        .context("Failed to list posts for stats")?;

    let mut ranked: Vec<&Post> = posts.iter().collect();
    ranked.sort_by(|a, b| {
        b.views
            .cmp(&a.views)
            .then_with(|| b.likes.cmp(&a.likes))
            .then_with(|| b.published_at.cmp(&a.published_at))
    });

    Ok(BlogStats {
        total_posts: posts.len(),
        hidden_posts: posts.iter().filter(|p| p.is_hidden).count(),
        total_views: posts.iter().map(|p| p.views).sum(),
        total_likes: posts.iter().map(|p| p.likes).sum(),
        total_shares: posts.iter().map(|p| p.shares).sum(),
        top_posts: ranked
            .into_iter()
            .take(TOP_POSTS)
            .map(PostSummary::from)
            .collect(),
    })
}

/// Recompute a post's counters from its interaction rows and store them.
///
/// Returns the counters before and after, or None if the post doesn't exist.
pub async fn reconcile_counters(
    store: &Arc<dyn ContentStore>,
    post_id: &str,
) -> Result<Option<(EngagementCounts, EngagementCounts)>> {
    let Some(post) = store.get_post(post_id).await? else {
        return Ok(None);
    };
    let before = EngagementCounts::from(&post);

    let after = EngagementCounts {
        views: store
            .count_interactions(post_id, InteractionKind::View)
            .await?,
        likes: store
            .count_interactions(post_id, InteractionKind::Like)
            .await?,
        shares: store
            .count_interactions(post_id, InteractionKind::Share)
            .await?,
    };

    if before != after {
        store
            .set_counters(post_id, &after)
            .await
            .with_context(|| format!("Failed to store reconciled counters for {post_id}"))?;
        info!(
            post_id,
            views = after.views,
            likes = after.likes,
            shares = after.shares,
            "Counters reconciled"
        );
    }

    Ok(Some((before, after)))
}

/// Reconcile every post. Returns how many posts had drifted.
pub async fn reconcile_all(store: &Arc<dyn ContentStore>) -> Result<usize> {
    let mut drifted = 0;
    for post in store.list_posts(true).await? {
        if let Some((before, after)) = reconcile_counters(store, &post.id).await? {
            if before != after {
                drifted += 1;
            }
        }
    }
    Ok(drifted)
}
