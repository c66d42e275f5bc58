// Database queries — CRUD operations for all tables.
//
// Every SQLite interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.
//
// Timestamps are stored as RFC 3339 text with a fixed microsecond precision
// and a `Z` suffix, so lexicographic order matches chronological order and
// range comparisons can be done directly in SQL.

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{
    BlogSettings, Comment, Counter, EngagementCounts, Interaction, InteractionKind, NewComment,
    NewPost, Post, PostPatch, Profile, Role, TimeWindow,
};

const POST_COLUMNS: &str = "id, title, content, excerpt, author, tags, published_at, updated_at,
     read_time, image_url, views, likes, shares, is_hidden";

const INTERACTION_COLUMNS: &str = "id, post_id, identity, kind, created_at";

const COMMENT_COLUMNS: &str =
    "id, post_id, author_identity, author_name, content, parent_id, created_at";

/// Format a timestamp the way it is stored in SQLite.
pub fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        excerpt: row.get(3)?,
        author: row.get(4)?,
        tags,
        published_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
        read_time: row.get(8)?,
        image_url: row.get(9)?,
        views: row.get(10)?,
        likes: row.get(11)?,
        shares: row.get(12)?,
        is_hidden: row.get::<_, i32>(13)? != 0,
    })
}

fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<Interaction> {
    let kind_str: String = row.get(3)?;
    let kind = InteractionKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown interaction kind: {kind_str}").into(),
        )
    })?;
    Ok(Interaction {
        id: row.get(0)?,
        post_id: row.get(1)?,
        identity: row.get(2)?,
        kind,
        created_at: time_column(row, 4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_identity: row.get(2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        parent_id: row.get(5)?,
        created_at: time_column(row, 6)?,
    })
}

// --- Posts ---

/// Insert a new post with a fresh UUID and zeroed counters.
pub fn create_post(conn: &Connection, post: &NewPost) -> Result<Post> {
    let id = Uuid::new_v4().to_string();
    let now = to_db_time(&Utc::now());
    let tags_json = serde_json::to_string(&post.tags)?;
    conn.execute(
        "INSERT INTO posts (id, title, content, excerpt, author, tags, published_at, updated_at,
                            read_time, image_url, is_hidden)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10)",
        params![
            id,
            post.title,
            post.content,
            post.excerpt.as_deref().unwrap_or(""),
            post.author,
            tags_json,
            now,
            post.read_time.unwrap_or(1).max(1),
            post.image_url,
            post.is_hidden,
        ],
    )?;
    get_post(conn, &id)?.ok_or_else(|| anyhow!("Post {id} missing right after insert"))
}

pub fn get_post(conn: &Connection, id: &str) -> Result<Option<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1");
    let post = conn.query_row(&sql, params![id], post_from_row).optional()?;
    Ok(post)
}

/// List posts, newest first.
pub fn list_posts(conn: &Connection, include_hidden: bool) -> Result<Vec<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts
         WHERE ?1 OR is_hidden = 0
         ORDER BY published_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![include_hidden], post_from_row)?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Merge a patch into an existing post. The connection is held exclusively
/// by the caller, so the read-modify-write can't interleave with another
/// update.
pub fn update_post(conn: &Connection, id: &str, patch: &PostPatch) -> Result<Option<Post>> {
    let Some(mut post) = get_post(conn, id)? else {
        return Ok(None);
    };

    if let Some(title) = &patch.title {
        post.title = title.clone();
    }
    if let Some(content) = &patch.content {
        post.content = content.clone();
    }
    if let Some(excerpt) = &patch.excerpt {
        post.excerpt = excerpt.clone();
    }
    if let Some(author) = &patch.author {
        post.author = author.clone();
    }
    if let Some(tags) = &patch.tags {
        post.tags = tags.clone();
    }
    if let Some(read_time) = patch.read_time {
        post.read_time = read_time.max(1);
    }
    if let Some(image_url) = &patch.image_url {
        post.image_url = image_url.clone();
    }

    conn.execute(
        "UPDATE posts SET title = ?2, content = ?3, excerpt = ?4, author = ?5, tags = ?6,
                          read_time = ?7, image_url = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            id,
            post.title,
            post.content,
            post.excerpt,
            post.author,
            serde_json::to_string(&post.tags)?,
            post.read_time,
            post.image_url,
            to_db_time(&Utc::now()),
        ],
    )?;
    get_post(conn, id)
}

pub fn set_post_hidden(conn: &Connection, id: &str, hidden: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE posts SET is_hidden = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, hidden, to_db_time(&Utc::now())],
    )?;
    Ok(changed > 0)
}

/// Delete a post. Interactions and comments go with it via ON DELETE CASCADE.
pub fn delete_post(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

/// Atomically add `delta` to a counter, never going below zero.
pub fn adjust_counter(
    conn: &Connection,
    post_id: &str,
    counter: Counter,
    delta: i64,
) -> Result<Option<i64>> {
    let column = counter.column();
    let sql = format!(
        "UPDATE posts SET {column} = MAX(0, {column} + ?2) WHERE id = ?1 RETURNING {column}"
    );
    let value = conn
        .query_row(&sql, params![post_id, delta], |row| row.get(0))
        .optional()?;
    Ok(value)
}

pub fn set_counters(conn: &Connection, post_id: &str, counts: &EngagementCounts) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE posts SET views = ?2, likes = ?3, shares = ?4 WHERE id = ?1",
        params![
            post_id,
            counts.views.max(0),
            counts.likes.max(0),
            counts.shares.max(0)
        ],
    )?;
    Ok(changed > 0)
}

// --- Interactions ---

/// Find the most recent matching interaction, optionally inside a time window.
pub fn find_interaction(
    conn: &Connection,
    post_id: &str,
    identity: &str,
    kind: InteractionKind,
    window: Option<TimeWindow>,
) -> Result<Option<Interaction>> {
    let interaction = match window {
        Some(window) => {
            let sql = format!(
                "SELECT {INTERACTION_COLUMNS} FROM post_interactions
                 WHERE post_id = ?1 AND identity = ?2 AND kind = ?3
                   AND created_at >= ?4 AND created_at < ?5
                 ORDER BY created_at DESC
                 LIMIT 1"
            );
            conn.query_row(
                &sql,
                params![
                    post_id,
                    identity,
                    kind.as_str(),
                    to_db_time(&window.start),
                    to_db_time(&window.end),
                ],
                interaction_from_row,
            )
            .optional()?
        }
        None => {
            let sql = format!(
                "SELECT {INTERACTION_COLUMNS} FROM post_interactions
                 WHERE post_id = ?1 AND identity = ?2 AND kind = ?3
                 ORDER BY created_at DESC
                 LIMIT 1"
            );
            conn.query_row(
                &sql,
                params![post_id, identity, kind.as_str()],
                interaction_from_row,
            )
            .optional()?
        }
    };
    Ok(interaction)
}

pub fn insert_interaction(
    conn: &Connection,
    post_id: &str,
    identity: &str,
    kind: InteractionKind,
    created_at: DateTime<Utc>,
) -> Result<Interaction> {
    let stamp = to_db_time(&created_at);
    conn.execute(
        "INSERT INTO post_interactions (post_id, identity, kind, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![post_id, identity, kind.as_str(), stamp],
    )?;
    Ok(Interaction {
        id: conn.last_insert_rowid(),
        post_id: post_id.to_string(),
        identity: identity.to_string(),
        kind,
        // Report the timestamp at the precision it was stored with
        created_at: DateTime::parse_from_rfc3339(&stamp)?.with_timezone(&Utc),
    })
}

pub fn delete_interaction(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM post_interactions WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn count_interactions(conn: &Connection, post_id: &str, kind: InteractionKind) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM post_interactions WHERE post_id = ?1 AND kind = ?2",
        params![post_id, kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_interactions(conn: &Connection, post_id: &str) -> Result<Vec<Interaction>> {
    let sql = format!(
        "SELECT {INTERACTION_COLUMNS} FROM post_interactions
         WHERE post_id = ?1
         ORDER BY created_at, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![post_id], interaction_from_row)?;

    let mut interactions = Vec::new();
    for row in rows {
        interactions.push(row?);
    }
    Ok(interactions)
}

// --- Comments ---

/// All comments on a post, newest first. Ties on the timestamp fall back to
/// insertion order so the newest row still comes first.
pub fn list_comments(conn: &Connection, post_id: &str) -> Result<Vec<Comment>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments
         WHERE post_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![post_id], comment_from_row)?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

pub fn get_comment(conn: &Connection, id: &str) -> Result<Option<Comment>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
    let comment = conn.query_row(&sql, params![id], comment_from_row).optional()?;
    Ok(comment)
}

pub fn insert_comment(conn: &Connection, comment: &NewComment) -> Result<Comment> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, author_identity, author_name, content, parent_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            comment.post_id,
            comment.author_identity,
            comment.author_name,
            comment.content,
            comment.parent_id,
            to_db_time(&Utc::now()),
        ],
    )?;
    get_comment(conn, &id)?.ok_or_else(|| anyhow!("Comment {id} missing right after insert"))
}

/// Delete a comment. Replies are removed by the parent_id cascade.
pub fn delete_comment(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// --- Settings ---

pub fn get_settings(conn: &Connection) -> Result<Option<BlogSettings>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT settings_json, updated_at FROM settings WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((json, updated_at)) => {
            let mut settings: BlogSettings = serde_json::from_str(&json)?;
            settings.updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .ok()
                .map(|t| t.with_timezone(&Utc));
            Ok(Some(settings))
        }
        None => Ok(None),
    }
}

/// Store the settings singleton (always id=1).
pub fn save_settings(conn: &Connection, settings: &BlogSettings) -> Result<()> {
    let json = serde_json::to_string(settings)?;
    conn.execute(
        "INSERT INTO settings (id, settings_json, updated_at)
         VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET settings_json = ?1, updated_at = ?2",
        params![json, to_db_time(&Utc::now())],
    )?;
    Ok(())
}

// --- Profiles ---

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let role: String = row.get(3)?;
    Ok(Profile {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::parse(&role),
        created_at: time_column(row, 4)?,
    })
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let profile = conn
        .query_row(
            "SELECT id, email, display_name, role, created_at FROM profiles WHERE id = ?1",
            params![id],
            profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

/// Case-insensitive email lookup, used by reader logins.
pub fn get_profile_by_email(conn: &Connection, email: &str) -> Result<Option<Profile>> {
    let profile = conn
        .query_row(
            "SELECT id, email, display_name, role, created_at FROM profiles
             WHERE LOWER(email) = LOWER(?1)
             LIMIT 1",
            params![email.trim()],
            profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn get_password_hash(conn: &Connection, user_id: &str) -> Result<Option<String>> {
    let hash: Option<Option<String>> = conn
        .query_row(
            "SELECT password_hash FROM profiles WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash.flatten())
}

/// Returns false if the profile doesn't exist.
pub fn set_password_hash(conn: &Connection, user_id: &str, hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE profiles SET password_hash = ?1 WHERE id = ?2",
        params![hash, user_id],
    )?;
    Ok(changed > 0)
}

pub fn upsert_profile(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, email, display_name, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            email = ?2,
            display_name = ?3,
            role = ?4",
        params![
            profile.id,
            profile.email,
            profile.display_name,
            profile.role.as_str(),
            to_db_time(&profile.created_at),
        ],
    )?;
    Ok(())
}
