use std::env;
use std::path::PathBuf;

use anyhow::Result;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    /// JSON file holding the CLI's local state (session token, view markers)
    pub storage_path: PathBuf,
    /// User id that the web dashboard login acts as
    pub admin_id: String,
    /// Password for the admin login (QUANTBLOG_WEB_PASSWORD env var)
    #[cfg(feature = "web")]
    pub web_password: String,
    /// Secret for HMAC session token signing (QUANTBLOG_SESSION_SECRET env var)
    #[cfg(feature = "web")]
    pub session_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the web secrets, which are checked
    /// by `require_web` before the server starts.
    pub fn load() -> Result<Self> {
        let storage_path = env::var("QUANTBLOG_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::storage::default_storage_path());

        #[cfg(feature = "web")]
        let web_password = env::var("QUANTBLOG_WEB_PASSWORD").unwrap_or_default();
        #[cfg(feature = "web")]
        let session_secret = env::var("QUANTBLOG_SESSION_SECRET").unwrap_or_default();

        Ok(Self {
            db_path: env::var("QUANTBLOG_DB_PATH").unwrap_or_else(|_| "./quantblog.db".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            storage_path,
            admin_id: env::var("QUANTBLOG_ADMIN_ID")
                .ok()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| "admin".to_string()),
            #[cfg(feature = "web")]
            web_password,
            #[cfg(feature = "web")]
            session_secret,
        })
    }

    /// The Postgres URL, if DATABASE_URL selects the Postgres backend.
    pub fn postgres_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .filter(|url| crate::db::is_postgres_url(url))
    }

    /// Check that the web login secrets are configured.
    /// Call this before starting the HTTP server.
    #[cfg(feature = "web")]
    pub fn require_web(&self) -> Result<()> {
        if self.web_password.is_empty() {
            anyhow::bail!(
                "QUANTBLOG_WEB_PASSWORD not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        if self.session_secret.len() < 32 {
            anyhow::bail!(
                "QUANTBLOG_SESSION_SECRET must be at least 32 characters.\n\
                 Generate one with `openssl rand -hex 32` and add it to your .env file."
            );
        }
        Ok(())
    }
}
