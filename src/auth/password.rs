use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use tracing::error;

// argon2's error type is not std::error::Error, so it is logged and folded
// into anyhow at the boundary.
fn credential_error(context: &'static str, e: argon2::password_hash::Error) -> anyhow::Error {
    error!(error = %e, context, "password handling failure");
    anyhow::anyhow!("{context}: {e}")
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| credential_error("hash password", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| credential_error("parse stored hash", e))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}
