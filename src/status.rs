// System status display — content store stats and local session state.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::ContentStore;
use crate::engagement::identity::SESSION_TOKEN_KEY;
use crate::engagement::views::VIEW_MARKER_PREFIX;
use crate::storage::KeyValueStore;

/// Display system status to the terminal.
pub async fn show(
    store: &Arc<dyn ContentStore>,
    db_display_path: &str,
    storage: &dyn KeyValueStore,
    storage_path: &Path,
) -> Result<()> {
    // Database file size (SQLite only; a Postgres URL has no local file)
    match std::fs::metadata(db_display_path) {
        Ok(meta) => println!("Database: {} ({})", db_display_path, format_bytes(meta.len())),
        Err(_) => println!("Database: {}", db_display_path),
    }
    println!("Tables: {}", store.table_count().await?);

    let stats = crate::analytics::blog_stats(store).await?;
    crate::output::terminal::display_stats(&stats);

    let settings = crate::blog::load_settings(store).await;
    match settings.updated_at {
        Some(at) => println!("Settings: \"{}\" (updated {})", settings.title, at),
        None => println!("Settings: defaults (\"{}\")", settings.title),
    }

    // Local session state
    let keys = storage.keys()?;
    let markers = keys
        .iter()
        .filter(|k| k.starts_with(VIEW_MARKER_PREFIX))
        .count();
    let has_token = keys.iter().any(|k| k == SESSION_TOKEN_KEY);
    println!("Local storage: {}", storage_path.display());
    println!(
        "  Session token: {}",
        if has_token { "present" } else { "not yet issued" }
    );
    println!("  View markers: {markers}");

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
