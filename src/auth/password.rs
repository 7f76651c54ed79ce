use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

/// Storage and comparison strategy for account credentials. The directory
/// keeps the stored form opaque, so a stricter scheme can replace the
/// plain one without changing its contract.
pub trait CredentialScheme: Send + Sync {
    /// Produces the stored form of a plain credential.
    fn protect(&self, plain: &str) -> anyhow::Result<String>;
    /// Checks a plain credential against its stored form.
    fn verify(&self, plain: &str, stored: &str) -> bool;
}

/// Stores credentials verbatim. This is what the app has always done;
/// kept as the default so existing directories stay readable.
pub struct PlainTextScheme;

impl CredentialScheme for PlainTextScheme {
    fn protect(&self, plain: &str) -> anyhow::Result<String> {
        Ok(plain.to_string())
    }

    fn verify(&self, plain: &str, stored: &str) -> bool {
        plain == stored
    }
}

/// Argon2 password hashing.
pub struct Argon2Scheme;

impl CredentialScheme for Argon2Scheme {
    fn protect(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_scheme_compares_verbatim() {
        let scheme = PlainTextScheme;
        let stored = scheme.protect("pw123").expect("protect");
        assert_eq!(stored, "pw123");
        assert!(scheme.verify("pw123", &stored));
        assert!(!scheme.verify("pw124", &stored));
    }

    #[test]
    fn argon2_hash_and_verify_roundtrip() {
        let scheme = Argon2Scheme;
        let stored = scheme
            .protect("Secur3P@ssw0rd!")
            .expect("hashing should succeed");
        assert_ne!(stored, "Secur3P@ssw0rd!");
        assert!(scheme.verify("Secur3P@ssw0rd!", &stored));
    }

    #[test]
    fn argon2_rejects_wrong_password() {
        let scheme = Argon2Scheme;
        let stored = scheme
            .protect("correct-horse-battery-staple")
            .expect("hashing should succeed");
        assert!(!scheme.verify("wrong-password", &stored));
    }

    #[test]
    fn argon2_rejects_malformed_hash() {
        let scheme = Argon2Scheme;
        assert!(!scheme.verify("anything", "not-a-valid-hash"));
    }
}
