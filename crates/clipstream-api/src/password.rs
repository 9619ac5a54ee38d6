use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::{SaltString, rand_core::OsRng}};

/// Hash with Argon2id and a fresh salt; returns the PHC string.
/// CPU heavy, call it from the blocking pool.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}
