use crate::config::Argon2Config;
use crate::errors::{Result, RosterError};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

/// Hash a password into an argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str, cfg: &Argon2Config) -> Result<String> {
    let params = Params::new(cfg.memory_cost, cfg.time_cost, cfg.parallelism, None)
        .map_err(|e| RosterError::validation(format!("invalid argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| RosterError::validation(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Anything that is not a parseable PHC string (including hashes written by
/// older builds) never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
