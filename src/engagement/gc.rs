// View marker cleanup — drops local `view_*` markers older than yesterday.
//
// Markers only matter for the current UTC day; yesterday's are kept so a
// session straddling midnight doesn't lose its marker mid-read. Runs once per
// process start.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::views::{day_key, VIEW_MARKER_PREFIX};
use crate::storage::KeyValueStore;

pub struct ViewGc {
    storage: Arc<dyn KeyValueStore>,
}

impl ViewGc {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Remove stale markers. Returns how many were removed.
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let today = day_key(now);
        let yesterday = day_key(now - Duration::days(1));

        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "View marker cleanup skipped: storage unavailable");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(VIEW_MARKER_PREFIX)) {
            let day = key.rsplit_once('_').map(|(_, day)| day);
            if day == Some(today.as_str()) || day == Some(yesterday.as_str()) {
                continue;
            }
            match self.storage.remove(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(error = %e, key = %key, "Failed to remove view marker"),
            }
        }

        debug!(removed, "View marker cleanup finished");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::views::view_marker_key;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    #[test]
    fn test_cleanup_keeps_today_and_yesterday() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(&view_marker_key("p1", "tok", "2024-06-10"), "1")
            .unwrap();
        storage
            .set(&view_marker_key("p1", "tok", "2024-06-09"), "1")
            .unwrap();
        storage
            .set(&view_marker_key("p1", "tok", "2024-06-08"), "1")
            .unwrap();
        storage
            .set(&view_marker_key("p_2", "tok", "2024-01-01"), "1")
            .unwrap();
        storage.set("view_garbage", "1").unwrap();
        storage.set("sessionToken", "tok").unwrap();

        let gc = ViewGc::new(storage.clone());
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        assert_eq!(gc.cleanup(now), 3);

        let keys = storage.keys().unwrap();
        assert_eq!(
            keys,
            vec![
                "sessionToken".to_string(),
                "view_p1_tok_2024-06-09".to_string(),
                "view_p1_tok_2024-06-10".to_string(),
            ]
        );
    }

    #[test]
    fn test_cleanup_is_noop_when_nothing_stale() {
        let storage = Arc::new(MemoryStorage::new());
        let gc = ViewGc::new(storage);
        assert_eq!(gc.cleanup(Utc::now()), 0);
    }
}
