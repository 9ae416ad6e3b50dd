use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Duration;
use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Password reset tokens expire one hour after issue.
pub fn reset_token_ttl() -> Duration {
    Duration::hours(1)
}

/// Hash a password with Argon2id and a fresh salt, as a PHC string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// False on mismatch and on unparseable stored hashes.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("locker-unknown-account").unwrap_or_default());

/// Spends the same Argon2 work as a real check when no account matches,
/// so unknown emails cannot be told apart by response time. Always false.
pub fn verify_against_dummy(password: &str) -> bool {
    verify_password(password, &DUMMY_HASH);
    false
}

/// Random URL-safe reset token (hex, 256 bits).
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Only the digest of a reset token is stored.
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
