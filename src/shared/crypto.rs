//! Credential Primitives
//!
//! Random opaque credentials, digests for lookup columns, Argon2id hashing
//! for client secrets and PKCE challenge computation.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::AppError;

/// Prefix for authorization codes
pub const CODE_PREFIX: &str = "oac_";
/// Prefix for access tokens
pub const ACCESS_TOKEN_PREFIX: &str = "oat_";
/// Prefix for refresh tokens
pub const REFRESH_TOKEN_PREFIX: &str = "ort_";
/// Prefix for client secrets
pub const CLIENT_SECRET_PREFIX: &str = "ocs_";

/// Generate `bytes` of OS randomness, base64url encoded without padding.
pub fn random_string(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(&buf)
}

/// Generate a prefixed opaque credential with 256 bits of entropy.
pub fn random_token(prefix: &str) -> String {
    format!("{}{}", prefix, random_string(32))
}

/// Generate a public client identifier (24 url-safe characters).
pub fn generate_client_id() -> String {
    random_string(18)
}

/// Generate a client secret. Returned to the developer once, stored hashed.
pub fn generate_client_secret() -> String {
    format!("{}{}", CLIENT_SECRET_PREFIX, random_string(48))
}

/// SHA-256 hex digest used as the lookup key for codes and tokens.
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a client secret using Argon2id
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Secret hashing failed: {}", e)))
}

/// Verify a client secret against its stored hash
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid secret hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

/// RFC 7636 S256 transform: BASE64URL(SHA256(verifier)).
pub fn pkce_s256(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Constant-time string comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
