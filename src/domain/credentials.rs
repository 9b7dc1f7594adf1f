//! Password hashing and verification.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;

use super::error::PapertradeError;

/// Hash a password with argon2id and a fresh random salt. The returned PHC
/// string is what gets stored in the users table.
pub fn hash_password(password: &str) -> Result<String, PapertradeError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PapertradeError::PasswordHash {
            reason: e.to_string(),
        })?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash string. An unparseable stored
/// hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
