//! Session Authentication
//!
//! First-party session JWTs (HS256) issued by the account service. They are
//! read from the `session` cookie or the `X-Session-Token` header and never
//! from `Authorization`, which carries OAuth bearer tokens.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::application::services::Requester;
use crate::shared::error::AppError;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_HEADER: &str = "x-session-token";

/// Role claim value granting application approval rights
const APPROVER_ROLE: &str = "admin";

/// Session JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// User authenticated by a first-party session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: i64,
    pub is_approver: bool,
}

impl SessionUser {
    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.user_id,
            is_approver: self.is_approver,
        }
    }
}

/// Session token from the cookie, falling back to the header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Validate a session JWT and return the user it belongs to.
pub fn decode_session(token: &str, secret: &str) -> Result<SessionUser, AppError> {
    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Session expired".into())
        }
        _ => AppError::Unauthorized("Invalid session".into()),
    })?;

    let user_id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid session claims".into()))?;

    Ok(SessionUser {
        user_id,
        is_approver: token_data.claims.role.as_deref() == Some(APPROVER_ROLE),
    })
}

/// Authenticate the request's session, if it carries one.
pub fn authenticate_session(headers: &HeaderMap, secret: &str) -> Result<SessionUser, AppError> {
    let token = session_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    decode_session(&token, secret)
}

/// Sign a session token. The account service normally does this; the
/// server only needs it for local tooling and tests.
pub fn issue_session_token(
    user_id: i64,
    role: Option<&str>,
    secret: &str,
    ttl: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        role: role.map(str::to_string),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Session signing failed: {}", e)))
}
