//! Salted password hashing. Hashes are argon2 PHC strings; verification
//! goes through argon2's constant-time comparison.

use std::sync::LazyLock;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub fn hash(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?
        .to_string();
    Ok(hash)
}

/// A stored value that does not parse as a PHC string never verifies.
pub fn verify(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

static DECOY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash("decoy-password").unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to build decoy hash");
        String::new()
    })
});

/// A valid hash no submitted password is expected to match, checked when the
/// login email is unknown.
pub fn decoy_hash() -> String {
    DECOY_HASH.clone()
}

/// [`hash`] on the blocking pool; argon2 is CPU bound.
pub async fn hash_blocking(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash(&password)).await?
}

/// [`verify`] on the blocking pool.
pub async fn verify_blocking(password: String, stored: String) -> anyhow::Result<bool> {
    Ok(tokio::task::spawn_blocking(move || verify(&password, &stored)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash("pass").unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(verify("pass", &stored));
        assert!(!verify("wrong", &stored));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash("pass").unwrap(), hash("pass").unwrap());
    }

    #[test]
    fn plaintext_in_store_never_matches() {
        assert!(!verify("pass", "pass"));
    }

    #[test]
    fn decoy_hash_is_a_real_hash() {
        let decoy = decoy_hash();
        assert!(decoy.starts_with("$argon2"));
        assert!(!verify("pass", &decoy));
        assert_eq!(decoy, decoy_hash());
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let stored = hash_blocking("pass".into()).await.unwrap();
        assert!(verify_blocking("pass".into(), stored).await.unwrap());
    }
}
