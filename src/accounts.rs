// Reader accounts — email/password logins keyed on `profiles`.
//
// Passwords are hashed with Argon2id (PHC string format) and stored on the
// profile row, separately from `Profile` itself. The web layer turns a
// successful `authenticate` into a signed session cookie.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{Profile, Role};
use crate::db::ContentStore;
use crate::error::{BlogError, Result};

pub const MIN_PASSWORD_CHARS: usize = 8;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(BlogError::validation(format!(
            "Mật khẩu cần ít nhất {MIN_PASSWORD_CHARS} ký tự"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BlogError::Store(anyhow::anyhow!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        warn!("Stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Give an existing profile a password (or replace it).
pub async fn set_password(store: &dyn ContentStore, user_id: &str, password: &str) -> Result<()> {
    let hash = hash_password(password)?;
    if !store.set_password_hash(user_id, &hash).await? {
        return Err(BlogError::not_found(format!("profile {user_id}")));
    }
    info!(user_id, "Password set");
    Ok(())
}

/// Look up the profile for `email` and check its password.
///
/// Ok(None) for an unknown email, a profile without a password, or a wrong
/// password; callers should not tell these apart in responses.
pub async fn authenticate(
    store: &dyn ContentStore,
    email: &str,
    password: &str,
) -> Result<Option<Profile>> {
    let Some(profile) = store.get_profile_by_email(email).await? else {
        return Ok(None);
    };
    let Some(hash) = store.get_password_hash(&profile.id).await? else {
        return Ok(None);
    };
    if !verify_password(password, &hash) {
        return Ok(None);
    }
    Ok(Some(profile))
}

/// Self-service sign-up: a new reader profile with a password.
pub async fn register(
    store: &dyn ContentStore,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<Profile> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(BlogError::validation("Email không hợp lệ"));
    }
    let display_name = display_name.trim();
    if display_name.is_empty() {
        return Err(BlogError::validation("Tên hiển thị không được để trống"));
    }
    // Hash first so a weak password never leaves a half-created profile
    let hash = hash_password(password)?;

    if store.get_profile_by_email(email).await?.is_some() {
        return Err(BlogError::validation("Email đã được sử dụng"));
    }

    let profile = Profile {
        id: Uuid::new_v4().to_string(),
        email: Some(email.to_string()),
        display_name: display_name.to_string(),
        role: Role::Reader,
        created_at: Utc::now(),
    };
    store.upsert_profile(&profile).await?;
    store.set_password_hash(&profile.id, &hash).await?;

    info!(user_id = %profile.id, "Reader registered");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteStore;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("dinh-luong-123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("dinh-luong-123", &hash));
        assert!(!verify_password("dinh-luong-124", &hash));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            hash_password("ngan"),
            Err(BlogError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let store = SqliteStore::open_in_memory().unwrap();

        let profile = register(&store, "An@Example.com", "mat-khau-an", "An")
            .await
            .unwrap();
        assert_eq!(profile.role, Role::Reader);

        let ok = authenticate(&store, "an@example.com", "mat-khau-an")
            .await
            .unwrap();
        assert_eq!(ok.map(|p| p.id), Some(profile.id));

        assert!(authenticate(&store, "an@example.com", "sai-mat-khau")
            .await
            .unwrap()
            .is_none());
        assert!(authenticate(&store, "ai@example.com", "mat-khau-an")
            .await
            .unwrap()
            .is_none());

        let duplicate = register(&store, "an@example.com", "mat-khau-khac", "An 2").await;
        assert!(matches!(duplicate, Err(BlogError::Validation(_))));
    }

    #[tokio::test]
    async fn test_profile_without_password_cannot_log_in() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_profile(&Profile {
                id: "u1".to_string(),
                email: Some("u1@example.com".to_string()),
                display_name: "u1".to_string(),
                role: Role::Reader,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(authenticate(&store, "u1@example.com", "")
            .await
            .unwrap()
            .is_none());

        set_password(&store, "u1", "mat-khau-u1").await.unwrap();
        assert!(authenticate(&store, "u1@example.com", "mat-khau-u1")
            .await
            .unwrap()
            .is_some());

        assert!(matches!(
            set_password(&store, "missing", "mat-khau-u1").await,
            Err(BlogError::NotFound(_))
        ));
    }
}
