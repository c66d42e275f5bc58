// Database layer — the content store behind posts, interactions, comments,
// settings, and profiles.
//
// SQLite (rusqlite, "bundled") is the default backend so there's no system
// SQLite dependency; the file lives wherever QUANTBLOG_DB_PATH points
// (defaults to ./quantblog.db). PostgreSQL is available behind the
// `postgres` feature for the hosted deployment.

pub mod models;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use traits::ContentStore;

use std::sync::Arc;

use anyhow::Result;

#[cfg(feature = "sqlite")]
use anyhow::Context;
#[cfg(feature = "sqlite")]
use rusqlite::Connection;
#[cfg(feature = "sqlite")]
use std::path::Path;

/// Open (or create) the database and run migrations.
///
/// This is the main entry point — called by `quantblog init` and by any
/// command that needs database access.
#[cfg(feature = "sqlite")]
pub fn initialize(db_path: &str) -> Result<Connection> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // Enable WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Run schema creation / migrations (also turns on foreign keys)
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
#[cfg(feature = "sqlite")]
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `quantblog init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Cascading deletes rely on this; it is off by default per connection.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(conn)
}

/// Open an existing SQLite database behind the ContentStore trait.
#[cfg(feature = "sqlite")]
pub fn connect_sqlite(db_path: &str) -> Result<Arc<dyn ContentStore>> {
    let conn = open(db_path)?;
    Ok(Arc::new(sqlite::SqliteStore::new(conn)))
}

/// Create (if needed) a SQLite database and return it behind the trait.
#[cfg(feature = "sqlite")]
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<dyn ContentStore>> {
    let conn = initialize(db_path)?;
    Ok(Arc::new(sqlite::SqliteStore::new(conn)))
}

/// Connect to PostgreSQL, run migrations, and return it behind the trait.
#[cfg(feature = "postgres")]
pub async fn connect_postgres(database_url: &str) -> Result<Arc<dyn ContentStore>> {
    let db = postgres::PgStore::connect(database_url).await?;
    Ok(Arc::new(db))
}

/// True when the URL should be routed to the Postgres backend.
pub fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}
