// Identity resolution — who is performing an interaction.
//
// An identity is either an authenticated user (`user:<id>`) or an anonymous
// browser session (`anon:<token>`). The anonymous token is generated once and
// kept in local storage under `sessionToken`; it is never rotated.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use tracing::{debug, warn};

use crate::db::models::Role;
use crate::db::ContentStore;
use crate::storage::KeyValueStore;

/// Local storage key holding the anonymous session token.
pub const SESSION_TOKEN_KEY: &str = "sessionToken";

/// Longest anonymous token accepted from an untrusted client.
pub const MAX_TOKEN_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    User(String),
    Anonymous(String),
}

impl Identity {
    /// Parse the `user:<id>` / `anon:<token>` string form.
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(id) = s.strip_prefix("user:") {
            (!id.is_empty()).then(|| Identity::User(id.to_string()))
        } else if let Some(token) = s.strip_prefix("anon:") {
            (!token.is_empty()).then(|| Identity::Anonymous(token.to_string()))
        } else {
            None
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User(id) => Some(id),
            Identity::Anonymous(_) => None,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        match self {
            Identity::Anonymous(token) => Some(token),
            Identity::User(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{id}"),
            Identity::Anonymous(token) => write!(f, "anon:{token}"),
        }
    }
}

/// An identity plus what it's allowed to do and how it's shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub identity: Identity,
    pub role: Role,
    pub display_name: String,
}

impl Actor {
    pub fn new(identity: Identity, role: Role, display_name: impl Into<String>) -> Self {
        Self {
            identity,
            role,
            display_name: display_name.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin && self.identity.is_authenticated()
    }

    /// Look up the role and display name for an identity.
    ///
    /// Anonymous identities are always readers. A user without a profile, or
    /// a profile lookup that fails, is treated as a reader named by its id.
    pub async fn resolve(store: &dyn ContentStore, identity: Identity) -> Self {
        let Identity::User(user_id) = &identity else {
            return Self::new(identity, Role::Reader, "Khách");
        };

        match store.get_profile(user_id).await {
            Ok(Some(profile)) => {
                let name = if profile.display_name.trim().is_empty() {
                    user_id.clone()
                } else {
                    profile.display_name
                };
                Self::new(identity, profile.role, name)
            }
            Ok(None) => {
                let name = user_id.clone();
                Self::new(identity, Role::Reader, name)
            }
            Err(e) => {
                warn!(error = %e, user_id = %user_id, "Profile lookup failed, treating as reader");
                let name = user_id.clone();
                Self::new(identity, Role::Reader, name)
            }
        }
    }
}

/// The auth/session collaborator: reports the logged-in user, if any.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user_id(&self) -> Result<Option<String>>;
}

/// Auth provider with a fixed answer — the CLI's `--user` flag, or a web
/// request whose session cookie was already validated.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user_id: Option<String>,
}

impl StaticAuth {
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user_id(&self) -> Result<Option<String>> {
        Ok(self.user_id.clone())
    }
}

/// Resolves the identity for the current client.
pub struct SessionIdentity {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionIdentity {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// `user:<id>` when the auth collaborator reports a user, otherwise the
    /// persisted anonymous identity. Never fails: auth errors fall back to
    /// anonymous and storage errors to an unpersisted token.
    pub async fn resolve(&self, auth: &dyn AuthProvider) -> Identity {
        match auth.current_user_id().await {
            Ok(Some(user_id)) if !user_id.is_empty() => return Identity::User(user_id),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Auth lookup failed, continuing anonymously"),
        }

        match self.session_token() {
            Ok(token) => Identity::Anonymous(token),
            Err(e) => {
                warn!(error = %e, "Local storage unavailable, using a one-off session token");
                Identity::Anonymous(generate_session_token())
            }
        }
    }

    /// Read the anonymous token, generating and persisting it on first use.
    pub fn session_token(&self) -> Result<String> {
        if let Some(token) = self.storage.get(SESSION_TOKEN_KEY)? {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        let token = generate_session_token();
        self.storage.set(SESSION_TOKEN_KEY, &token)?;
        debug!("Generated new anonymous session token");
        Ok(token)
    }
}

/// `<unix millis in base 36>-<128 random bits in hex>`.
///
/// Contains only `[0-9a-z-]`, so it can be embedded in `_`-separated
/// storage keys.
pub fn generate_session_token() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut nonce = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce);
    format!("{}-{}", to_base36(millis), hex::encode(nonce))
}

/// Whether a client-supplied token is safe to use as an identity and inside
/// storage keys.
pub fn is_valid_session_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
