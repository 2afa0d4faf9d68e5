// Password hashing utilities
// Uses bcrypt for secure password hashing

use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};

use crate::errors::Exception;

impl From<BcryptError> for Exception {
    fn from(err: BcryptError) -> Self {
        Exception::internal("failed to process password").with_cause(err)
    }
}

/// Hashes a password using bcrypt at the default cost
pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Verifies a password against a bcrypt hash
///
/// # Returns
/// * `Ok(bool)` - True if password matches, false otherwise
/// * `Err(BcryptError)` - If the hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
    verify(password, hash)
}

/// Succeeds only when `password` matches `hash`.
///
/// A mismatch is `unauthenticated`, a malformed hash `internal`.
pub fn compare_password(hash: &str, password: &str) -> Result<(), Exception> {
    if verify_password(password, hash)? {
        Ok(())
    } else {
        Err(Exception::unauthenticated("invalid credentials"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn hash_and_verify_password() {
        let password = "mySecret123!";
        let hash = hash_password(password).expect("valid hash");

        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("valid verification"));
        assert!(!verify_password("wrong_password", &hash).expect("valid verification"));
    }

    #[test]
    fn hash_different_outputs() {
        let hash1 = hash_password("anotherSecret!").unwrap();
        let hash2 = hash_password("anotherSecret!").unwrap();

        // Hashes should be different due to salt
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn compare_password_outcomes() {
        let hash = hash_password("anotherSecret!").unwrap();

        assert!(compare_password(&hash, "anotherSecret!").is_ok());

        let mismatch = compare_password(&hash, "wrongPassword").unwrap_err();
        assert_eq!(mismatch.kind(), ErrorKind::Unauthenticated);
        assert_eq!(mismatch.message(), "invalid credentials");

        let malformed = compare_password("not-a-bcrypt-hash", "anything").unwrap_err();
        assert_eq!(malformed.kind(), ErrorKind::Internal);
        assert!(malformed.cause().is_some());
    }
}
