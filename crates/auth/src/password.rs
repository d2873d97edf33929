use std::sync::OnceLock;

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::AuthError;

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AuthError {
            code: "ERR_INTERNAL",
            message: "failed to hash password".to_string(),
        })
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn hash(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| AuthError {
            code: "ERR_INTERNAL",
            message: "password hashing task failed".to_string(),
        })?
}

/// Verifies against `hash`, or against a throwaway hash when the account does
/// not exist so both paths cost the same.
pub async fn verify(password: String, hash: Option<String>) -> bool {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            if let Some(dummy) = dummy_hash() {
                let _ = verify_password(&password, dummy);
            }
            false
        }
    })
    .await
    .unwrap_or(false)
}

fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH
        .get_or_init(|| hash_password("twolane-dummy-password").ok())
        .as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_phc_argon2id_and_verifies() {
        let hash = hash_password("password1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("password1", &hash));
        assert!(!verify_password("password2", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("password1", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn missing_account_never_verifies() {
        assert!(!verify("password1".to_string(), None).await);
        let hash = hash("password1".to_string()).await.unwrap();
        assert!(verify("password1".to_string(), Some(hash)).await);
    }
}
