// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    // Cascades on post/comment deletion depend on this pragma, which is
    // per-connection in SQLite.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Blog posts with denormalized engagement counters
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            excerpt TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',       -- JSON array of strings
            published_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            read_time INTEGER NOT NULL DEFAULT 1 CHECK (read_time >= 1),
            image_url TEXT,
            views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
            likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            shares INTEGER NOT NULL DEFAULT 0 CHECK (shares >= 0),
            is_hidden INTEGER NOT NULL DEFAULT 0
        );

        -- One row per view (per day), like (while liked), or share event
        CREATE TABLE IF NOT EXISTS post_interactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            identity TEXT NOT NULL,            -- user:<id> or anon:<token>
            kind TEXT NOT NULL CHECK (kind IN ('view', 'like', 'share')),
            created_at TEXT NOT NULL
        );

        -- Comments; replies point at a top-level comment on the same post
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            author_identity TEXT NOT NULL,
            author_name TEXT NOT NULL,
            content TEXT NOT NULL,
            parent_id TEXT REFERENCES comments(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        );

        -- Blog-wide settings, stored as JSON so fields can evolve without migrations
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),  -- singleton row
            settings_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- User profiles (role drives authorization)
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'reader',
            created_at TEXT NOT NULL
        );

        -- Dedup lookups: (post, identity, kind) with a time range
        CREATE INDEX IF NOT EXISTS idx_interactions_lookup
            ON post_interactions(post_id, identity, kind, created_at);

        -- A like row marks the post as currently liked: at most one per (post, identity)
        CREATE UNIQUE INDEX IF NOT EXISTS idx_interactions_one_like
            ON post_interactions(post_id, identity) WHERE kind = 'like';

        -- Comment listing per post, newest first
        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: listing posts by publication date is the hot path for
    // the home page and the admin console.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(is_hidden, published_at);",
        )
    })?;

    // Migration v3: reader logins. The hash is kept off `Profile` so it
    // never travels with profile reads.
    run_migration(conn, 3, |c| {
        c.execute_batch(
            "ALTER TABLE profiles ADD COLUMN password_hash TEXT;
             CREATE INDEX IF NOT EXISTS idx_profiles_email ON profiles(LOWER(email));",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Running create_tables twice should not error
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let count = table_count(&conn).unwrap();
        // schema_version, posts, post_interactions, comments, settings, profiles
        assert_eq!(count, 6i64);
    }

    #[test]
    fn test_migrations_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_counters_cannot_go_negative() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO posts (id, title, content, author, published_at, updated_at)
             VALUES ('p1', 't', 'c', 'a', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE posts SET likes = -1 WHERE id = 'p1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_second_like_row_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO posts (id, title, content, author, published_at, updated_at)
             VALUES ('p1', 't', 'c', 'a', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO post_interactions (post_id, identity, kind, created_at)
                      VALUES ('p1', 'user:u1', ?1, '2024-01-01T00:00:00.000000Z')";
        conn.execute(insert, ["like"]).unwrap();
        assert!(conn.execute(insert, ["like"]).is_err());
        // Shares are a log, not a toggle
        conn.execute(insert, ["share"]).unwrap();
        conn.execute(insert, ["share"]).unwrap();
    }

    #[test]
    fn test_interaction_requires_existing_post() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO post_interactions (post_id, identity, kind, created_at)
             VALUES ('missing', 'user:u1', 'like', '2024-01-01T00:00:00.000000Z')",
            [],
        );
        assert!(result.is_err());
    }
}
