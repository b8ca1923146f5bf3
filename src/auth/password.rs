use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use thiserror::Error;
use tracing::error;

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 36;

lazy_static! {
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
    /// Hash verified against when the username is unknown, so both login
    /// failures spend the same Argon2 work.
    static ref DUMMY_HASH: Option<String> = hash_blocking("fitpizza-dummy-password-0").ok();
}

/// Password policy failures, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Password must be between 8 and 36 characters")]
    Length,
    /// Also reported for trailing whitespace.
    #[error("Password must not start with spaces")]
    SurroundingSpace,
    #[error("Password must contain at least one digit")]
    MissingDigit,
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("argon2: {0}")]
    Hash(String),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub fn validate_password(password: &str) -> Result<(), PolicyViolation> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len) {
        return Err(PolicyViolation::Length);
    }
    if password.starts_with(char::is_whitespace) || password.ends_with(char::is_whitespace) {
        return Err(PolicyViolation::SurroundingSpace);
    }
    if !DIGIT_RE.is_match(password) {
        return Err(PolicyViolation::MissingDigit);
    }
    Ok(())
}

fn hash_blocking(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

fn verify_blocking(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::Hash(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Hashes on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password(plain: &str) -> Result<String, PasswordError> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&plain)).await?
}

/// Argon2 verification compares digests in constant time.
pub async fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || verify_blocking(&plain, &hash)).await?
}

/// Computes the throwaway hash. Call once from the blocking pool at startup.
pub fn init_dummy_hash() {
    lazy_static::initialize(&DUMMY_HASH);
}

/// Burns one verification against a throwaway hash. The hash is built and
/// checked inside the same blocking task so no Argon2 work hits the runtime.
pub async fn verify_dummy(plain: &str) -> Result<(), PasswordError> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_blocking(&plain, hash);
        }
    })
    .await?;
    Ok(())
}
