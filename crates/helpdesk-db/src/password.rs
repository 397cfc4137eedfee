use std::sync::OnceLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::warn;

use crate::{StoreError, StoreResult};

/// Hash verified against when the username does not exist, so that an
/// unknown user costs the same Argon2 work as a wrong password.
static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Hash a password with Argon2id into a PHC string (salt embedded).
pub(crate) fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::StorageUnavailable(format!("password hashing failed: {}", e)))
}

pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Spend one verification on the dummy hash. Always fails.
pub(crate) fn verify_against_dummy(password: &str) -> StoreResult<()> {
    let _ = verify_password(password, dummy_hash()?);
    Ok(())
}

/// Build the dummy hash up front so the first unknown-user login is not
/// slower than the rest. Fails if Argon2 cannot produce it.
pub(crate) fn warm_up() -> StoreResult<()> {
    dummy_hash().map(|_| ())
}

pub(crate) fn dummy_hash() -> StoreResult<&'static str> {
    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash);
    }
    let hash = hash_password("helpdesk-dummy-password")?;
    Ok(DUMMY_HASH.get_or_init(|| hash))
}
