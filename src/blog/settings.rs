// Blog-wide settings — a single editable record with a built-in default.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::posts::require_admin;
use crate::db::models::BlogSettings;
use crate::db::ContentStore;
use crate::engagement::identity::Actor;
use crate::error::{BlogError, Result};

/// The stored settings, or the default when none are stored or the read fails.
pub async fn load_settings(store: &Arc<dyn ContentStore>) -> BlogSettings {
    match store.get_settings().await {
        Ok(Some(settings)) => settings,
        Ok(None) => BlogSettings::default(),
        Err(e) => {
            warn!(error = %e, "Failed to load blog settings, serving defaults");
            BlogSettings::default()
        }
    }
}

/// Replace the settings (admin only). Last write wins.
pub async fn save_settings(
    store: &Arc<dyn ContentStore>,
    actor: &Actor,
    mut settings: BlogSettings,
) -> Result<BlogSettings> {
    require_admin(actor, "change blog settings")?;

    settings.title = settings.title.trim().to_string();
    if settings.title.is_empty() {
        return Err(BlogError::validation("Tên blog không được để trống"));
    }
    settings.topics = settings
        .topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    for link in [
        &mut settings.contact_email,
        &mut settings.github_url,
        &mut settings.linkedin_url,
        &mut settings.facebook_url,
    ] {
        if link.as_deref().is_some_and(|l| l.trim().is_empty()) {
            *link = None;
        }
    }
    settings.updated_at = Some(Utc::now());

    store.save_settings(&settings).await?;
    info!(by = %actor.identity, "Blog settings saved");
    Ok(settings)
}
