//! Credential verification: argon2 password hashing.
//!
//! Verification parses the PHC string and lets argon2 recompute and compare
//! the digest, which is constant-time with respect to the comparison.

use std::sync::LazyLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::AuthError;

/// Hash verified against when the presented email has no account, so a
/// failed login costs the same whether or not the principal exists.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    CredentialVerifier::default()
        .hash("self-polish-timing-equalizer")
        .ok()
});

/// Hashes and verifies passwords.
#[derive(Clone)]
pub struct CredentialVerifier {
    params: Params,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialVerifier {
    /// Use explicit argon2 cost parameters for newly created hashes.
    /// Existing hashes always verify with the parameters they were made with.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Produce a PHC-format hash with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Check a presented password against a stored hash. Malformed hashes
    /// never verify.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Burn the same work as a real verification, always failing.
    pub fn verify_dummy(&self, password: &str) -> bool {
        if let Some(hash) = DUMMY_HASH.as_ref() {
            let _ = self.verify(password, hash);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> CredentialVerifier {
        CredentialVerifier::with_params(Params::new(1024, 1, 1, None).unwrap())
    }

    #[test]
    fn hash_then_verify() {
        let v = light();
        let hash = v.hash("pw123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(v.verify("pw123", &hash));
        assert!(!v.verify("pw124", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let v = light();
        let a = v.hash("pw123").unwrap();
        let b = v.hash("pw123").unwrap();
        assert_ne!(a, b);
        assert!(v.verify("pw123", &a));
        assert!(v.verify("pw123", &b));
    }

    #[test]
    fn verify_uses_params_embedded_in_hash() {
        let hash = light().hash("secret").unwrap();
        assert!(CredentialVerifier::default().verify("secret", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let v = light();
        assert!(!v.verify("pw123", ""));
        assert!(!v.verify("pw123", "pw123"));
        assert!(!v.verify("pw123", "$argon2id$garbage"));
    }

    #[test]
    fn dummy_verification_fails() {
        assert!(!light().verify_dummy("self-polish-timing-equalizer"));
    }
}
