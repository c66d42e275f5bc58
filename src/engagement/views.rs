// View recording — at most one counted view per post, per identity, per day.
//
// Days are UTC calendar days. Authenticated users are deduplicated against
// the interaction rows in the content store; anonymous sessions against a
// local marker key, which keeps anonymous traffic off the per-row lookup.
//
// Recording is fire-and-forget: failures are logged and reported as
// `ViewOutcome::Skipped`, never as an error. An uncounted view is an
// accepted loss for an analytics counter.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{debug, warn};

use super::identity::Identity;
use crate::db::models::{Counter, InteractionKind, TimeWindow};
use crate::db::ContentStore;
use crate::error::BlogError;
use crate::storage::KeyValueStore;

/// Prefix shared by all local view markers.
pub const VIEW_MARKER_PREFIX: &str = "view_";

/// What happened to a view request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    /// A new view was stored; carries the post's updated view count.
    Counted { views: i64 },
    /// This identity already viewed the post today.
    AlreadyCounted,
    /// Nothing was written (missing or hidden post, or store failure).
    Skipped,
}

/// `YYYY-MM-DD` for the UTC day containing `now`.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// `[00:00, next 00:00)` of the UTC day containing `now`.
pub fn day_window(now: DateTime<Utc>) -> TimeWindow {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    TimeWindow {
        start,
        end: start + Duration::days(1),
    }
}

/// `view_<postId>_<sessionToken>_<dayKey>`
pub fn view_marker_key(post_id: &str, session_token: &str, day: &str) -> String {
    format!("{VIEW_MARKER_PREFIX}{post_id}_{session_token}_{day}")
}

pub struct ViewRecorder {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn KeyValueStore>,
}

impl ViewRecorder {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { store, storage }
    }

    pub async fn record_view(&self, post_id: &str, identity: &Identity) -> ViewOutcome {
        self.record_view_at(post_id, identity, Utc::now()).await
    }

    /// Record a view as of `now`. Never fails; see `ViewOutcome`.
    pub async fn record_view_at(
        &self,
        post_id: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> ViewOutcome {
        match self.try_record(post_id, identity, now).await {
            Ok(outcome) => outcome,
            Err(BlogError::NotFound(_)) => {
                debug!(post_id, "View for missing post skipped");
                ViewOutcome::Skipped
            }
            Err(e) => {
                warn!(error = %e, post_id, identity = %identity, "Failed to record view");
                ViewOutcome::Skipped
            }
        }
    }

    async fn try_record(
        &self,
        post_id: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<ViewOutcome, BlogError> {
        let day = day_key(now);
        let who = identity.to_string();

        // Dedup check: remote rows for users, local marker for anonymous
        let marker = match identity {
            Identity::User(_) => {
                let existing = self
                    .store
                    .find_interaction(post_id, &who, InteractionKind::View, Some(day_window(now)))
                    .await?;
                if existing.is_some() {
                    return Ok(ViewOutcome::AlreadyCounted);
                }
                None
            }
            Identity::Anonymous(token) => {
                let key = view_marker_key(post_id, token, &day);
                if self.storage.get(&key)?.is_some() {
                    return Ok(ViewOutcome::AlreadyCounted);
                }
                Some(key)
            }
        };

        // Hidden posts take no new engagement
        if !self
            .store
            .get_post(post_id)
            .await?
            .is_some_and(|post| !post.is_hidden)
        {
            return Err(BlogError::not_found(format!("post {post_id}")));
        }

        self.store
            .insert_interaction(post_id, &who, InteractionKind::View, now)
            .await?;

        if let Some(key) = marker {
            // The row is already written; a lost marker only risks one
            // extra view later today.
            if let Err(e) = self.storage.set(&key, &now.timestamp_millis().to_string()) {
                warn!(error = %e, post_id, "Failed to store view marker");
            }
        }

        match self
            .store
            .adjust_counter(post_id, Counter::Views, 1)
            .await?
        {
            Some(views) => {
                debug!(post_id, views, "View counted");
                Ok(ViewOutcome::Counted { views })
            }
            None => Err(BlogError::not_found(format!("post {post_id}"))),
        }
    }
}
