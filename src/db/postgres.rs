// PgStore — PostgreSQL backend implementing the ContentStore trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time.
//
// Key differences from SQLite:
// - TIMESTAMPTZ instead of TEXT for timestamps
// - JSONB instead of TEXT for tags and settings
// - GREATEST() instead of MAX() for the clamped counter update
// - $1/$2 parameter syntax (handled by sqlx)
// - GENERATED ALWAYS AS IDENTITY for interaction ids

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_core::types::Json;
use sqlx_postgres::{PgRow, Postgres};
use uuid::Uuid;

use super::models::{
    BlogSettings, Comment, Counter, EngagementCounts, Interaction, InteractionKind, NewComment,
    NewPost, Post, PostPatch, Profile, Role, TimeWindow,
};
use super::traits::ContentStore;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

const POST_COLUMNS: &str = "id, title, content, excerpt, author, tags, published_at, updated_at,
     read_time, image_url, views, likes, shares, is_hidden";

const INTERACTION_COLUMNS: &str = "id, post_id, identity, kind, created_at";

const COMMENT_COLUMNS: &str =
    "id, post_id, author_identity, author_name, content, parent_id, created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    ///
    /// Acquires a Postgres session-level advisory lock so that two app
    /// instances starting together don't race to apply the same migration.
    /// The lock and unlock must run on the same physical connection, so a
    /// dedicated connection is held for the whole loop. The unlock always
    /// runs, even when a migration fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "QUANTBLG" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x5155414E54424C47_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [
                (
                    1,
                    include_str!("../../migrations/postgres/0001_initial.sql"),
                ),
                (
                    2,
                    include_str!("../../migrations/postgres/0002_posts_published_index.sql"),
                ),
                (
                    3,
                    include_str!("../../migrations/postgres/0003_profile_credentials.sql"),
                ),
            ];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    // Schema change and schema_version insert commit together.
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit()
                        .await
                        .with_context(|| format!("Migration v{version} failed"))?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        // Migration error takes priority over unlock error.
        migration_result?;
        unlock_result?;

        Ok(())
    }
}

fn post_from_row(row: &PgRow) -> Result<Post> {
    let tags: Json<Vec<String>> = row.try_get("tags")?;
    let read_time: i32 = row.try_get("read_time")?;
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        author: row.try_get("author")?,
        tags: tags.0,
        published_at: row.try_get("published_at")?,
        updated_at: row.try_get("updated_at")?,
        read_time: u32::try_from(read_time.max(1)).unwrap_or(1),
        image_url: row.try_get("image_url")?,
        views: row.try_get("views")?,
        likes: row.try_get("likes")?,
        shares: row.try_get("shares")?,
        is_hidden: row.try_get("is_hidden")?,
    })
}

fn interaction_from_row(row: &PgRow) -> Result<Interaction> {
    let kind: String = row.try_get("kind")?;
    Ok(Interaction {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        identity: row.try_get("identity")?,
        kind: InteractionKind::parse(&kind)
            .ok_or_else(|| anyhow!("unknown interaction kind: {kind}"))?,
        created_at: row.try_get("created_at")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author_identity: row.try_get("author_identity")?,
        author_name: row.try_get("author_name")?,
        content: row.try_get("content")?,
        parent_id: row.try_get("parent_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn read_time_param(read_time: u32) -> Result<i32> {
    i32::try_from(read_time.max(1)).context("read_time exceeds i32 range")
}

#[async_trait]
impl ContentStore for PgStore {
    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let sql = format!(
            "INSERT INTO posts (id, title, content, excerpt, author, tags, read_time, image_url, is_hidden)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.excerpt.as_deref().unwrap_or(""))
            .bind(&post.author)
            .bind(Json(&post.tags))
            .bind(read_time_param(post.read_time.unwrap_or(1))?)
            .bind(post.image_url.as_deref())
            .bind(post.is_hidden)
            .fetch_one(&self.pool)
            .await?;
        post_from_row(&row)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx_core::query::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(&self, include_hidden: bool) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE $1 OR NOT is_hidden
             ORDER BY published_at DESC"
        );
        let rows = sqlx_core::query::query(&sql)
            .bind(include_hidden)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(post_from_row).collect()
    }

    async fn update_post(&self, id: &str, patch: &PostPatch) -> Result<Option<Post>> {
        // COALESCE keeps the stored value for every field the patch leaves out.
        // image_url needs a separate flag because None and Some(None) differ.
        let sql = format!(
            "UPDATE posts SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                excerpt = COALESCE($4, excerpt),
                author = COALESCE($5, author),
                tags = COALESCE($6, tags),
                read_time = COALESCE($7, read_time),
                image_url = CASE WHEN $8 THEN $9 ELSE image_url END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {POST_COLUMNS}"
        );
        let read_time = patch.read_time.map(read_time_param).transpose()?;
        let row = sqlx_core::query::query(&sql)
            .bind(id)
            .bind(patch.title.as_deref())
            .bind(patch.content.as_deref())
            .bind(patch.excerpt.as_deref())
            .bind(patch.author.as_deref())
            .bind(patch.tags.as_ref().map(Json))
            .bind(read_time)
            .bind(patch.image_url.is_some())
            .bind(patch.image_url.clone().flatten())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn set_post_hidden(&self, id: &str, hidden: bool) -> Result<bool> {
        let result = sqlx_core::query::query(
            "UPDATE posts SET is_hidden = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(hidden)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, id: &str) -> Result<bool> {
        let result = sqlx_core::query::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_counter(
        &self,
        post_id: &str,
        counter: Counter,
        delta: i64,
    ) -> Result<Option<i64>> {
        let column = counter.column();
        let sql = format!(
            "UPDATE posts SET {column} = GREATEST(0, {column} + $2) WHERE id = $1 RETURNING {column}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(post_id)
            .bind(delta)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>(0)))
    }

    async fn set_counters(&self, post_id: &str, counts: &EngagementCounts) -> Result<bool> {
        let result = sqlx_core::query::query(
            "UPDATE posts SET views = $2, likes = $3, shares = $4 WHERE id = $1",
        )
        .bind(post_id)
        .bind(counts.views.max(0))
        .bind(counts.likes.max(0))
        .bind(counts.shares.max(0))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_interaction(
        &self,
        post_id: &str,
        identity: &str,
        kind: InteractionKind,
        window: Option<TimeWindow>,
    ) -> Result<Option<Interaction>> {
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM post_interactions
             WHERE post_id = $1 AND identity = $2 AND kind = $3
               AND ($4::timestamptz IS NULL OR created_at >= $4)
               AND ($5::timestamptz IS NULL OR created_at < $5)
             ORDER BY created_at DESC
             LIMIT 1"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(post_id)
            .bind(identity)
            .bind(kind.as_str())
            .bind(window.map(|w| w.start))
            .bind(window.map(|w| w.end))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(interaction_from_row).transpose()
    }

    async fn insert_interaction(
        &self,
        post_id: &str,
        identity: &str,
        kind: InteractionKind,
        created_at: DateTime<Utc>,
    ) -> Result<Interaction> {
        let sql = format!(
            "INSERT INTO post_interactions (post_id, identity, kind, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {INTERACTION_COLUMNS}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(post_id)
            .bind(identity)
            .bind(kind.as_str())
            .bind(created_at)
            .fetch_one(&self.pool)
            .await?;
        interaction_from_row(&row)
    }

    async fn delete_interaction(&self, id: i64) -> Result<bool> {
        let result = sqlx_core::query::query("DELETE FROM post_interactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_interactions(&self, post_id: &str, kind: InteractionKind) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM post_interactions WHERE post_id = $1 AND kind = $2",
        )
        .bind(post_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn list_interactions(&self, post_id: &str) -> Result<Vec<Interaction>> {
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM post_interactions
             WHERE post_id = $1
             ORDER BY created_at, id"
        );
        let rows = sqlx_core::query::query(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(interaction_from_row).collect()
    }

    async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE post_id = $1
             ORDER BY created_at DESC"
        );
        let rows = sqlx_core::query::query(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx_core::query::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let sql = format!(
            "INSERT INTO comments (id, post_id, author_identity, author_name, content, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&comment.post_id)
            .bind(&comment.author_identity)
            .bind(&comment.author_name)
            .bind(&comment.content)
            .bind(comment.parent_id.as_deref())
            .fetch_one(&self.pool)
            .await?;
        comment_from_row(&row)
    }

    async fn delete_comment(&self, id: &str) -> Result<bool> {
        let result = sqlx_core::query::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_settings(&self) -> Result<Option<BlogSettings>> {
        let row = sqlx_core::query::query(
            "SELECT settings_json, updated_at FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let Json(mut settings): Json<BlogSettings> = row.try_get("settings_json")?;
                settings.updated_at = Some(row.try_get("updated_at")?);
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }

    async fn save_settings(&self, settings: &BlogSettings) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO settings (id, settings_json, updated_at)
             VALUES (1, $1, NOW())
             ON CONFLICT(id) DO UPDATE SET settings_json = $1, updated_at = NOW()",
        )
        .bind(Json(settings))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let row = sqlx_core::query::query(
            "SELECT id, email, display_name, role, created_at FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let role: String = row.try_get("role")?;
                Ok(Some(Profile {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                    display_name: row.try_get("display_name")?,
                    role: Role::parse(&role),
                    created_at: row.try_get("created_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO profiles (id, email, display_name, role, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT(id) DO UPDATE SET
                email = $2,
                display_name = $3,
                role = $4",
        )
        .bind(&profile.id)
        .bind(profile.email.as_deref())
        .bind(&profile.display_name)
        .bind(profile.role.as_str())
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let row = sqlx_core::query::query(
            "SELECT id, email, display_name, role, created_at FROM profiles
             WHERE LOWER(email) = LOWER($1)
             LIMIT 1",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let role: String = row.try_get("role")?;
                Ok(Some(Profile {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                    display_name: row.try_get("display_name")?,
                    role: Role::parse(&role),
                    created_at: row.try_get("created_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_password_hash(&self, user_id: &str) -> Result<Option<String>> {
        let row = sqlx_core::query::query("SELECT password_hash FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("password_hash")?),
            None => Ok(None),
        }
    }

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<bool> {
        let result = sqlx_core::query::query("UPDATE profiles SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
