// Engagement — views, likes, shares, and comments on posts.
//
// Every service here sits on `Arc<dyn ContentStore>` plus (where local state
// is involved) `Arc<dyn KeyValueStore>`. `Engagement` bundles them for the
// CLI and the web server.

pub mod comments;
pub mod gc;
pub mod identity;
pub mod likes;
pub mod views;

use std::sync::Arc;

use crate::db::ContentStore;
use crate::storage::KeyValueStore;

pub use comments::{group_threads, CommentThread, ThreadEntry};
pub use gc::ViewGc;
pub use identity::{Actor, AuthProvider, Identity, SessionIdentity, StaticAuth};
pub use likes::InteractionToggle;
pub use views::{ViewOutcome, ViewRecorder};

pub struct Engagement {
    pub session: SessionIdentity,
    pub views: ViewRecorder,
    pub likes: InteractionToggle,
    pub comments: CommentThread,
    pub gc: ViewGc,
}

impl Engagement {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session: SessionIdentity::new(storage.clone()),
            views: ViewRecorder::new(store.clone(), storage.clone()),
            likes: InteractionToggle::new(store.clone()),
            comments: CommentThread::new(store),
            gc: ViewGc::new(storage),
        }
    }
}
