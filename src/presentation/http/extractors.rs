//! Custom Extractors
//!
//! Axum extractors for the identities attached by the guard middleware and
//! for request bodies.

use axum::{
    extract::{Form, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use axum_extra::headers::{
    authorization::{Basic, Bearer},
    Authorization, HeaderMapExt,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::application::services::{OAuthContext, OAuthError};
use crate::presentation::middleware::auth::SessionUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;

/// How the current request was authenticated.
#[derive(Debug, Clone)]
pub enum CallerIdentity {
    Session(SessionUser),
    OAuth(OAuthContext),
}

impl CallerIdentity {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Session(user) => Some(user.user_id),
            Self::OAuth(context) => context.user_id,
        }
    }
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// Session-authenticated user. Bearer callers are rejected.
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CallerIdentity>() {
            Some(CallerIdentity::Session(user)) => Ok(*user),
            Some(CallerIdentity::OAuth(_)) => Err(AppError::Forbidden(
                "This endpoint requires session authentication".into(),
            )),
            None => Err(AppError::Unauthorized("Authentication required".into())),
        }
    }
}

/// JSON body that has passed `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate().map_err(validation_error)?;
        Ok(Self(value))
    }
}

/// OAuth endpoint body: `application/x-www-form-urlencoded` per RFC 6749,
/// or JSON.
#[derive(Debug, Clone)]
pub struct OAuthPayload<T>(pub T);

impl<S, T> FromRequest<S> for OAuthPayload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = OAuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let value = if is_form {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(v)| v)
                .map_err(|e| OAuthError::InvalidRequest(e.body_text()))?
        } else {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(v)| v)
                .map_err(|e| OAuthError::InvalidRequest(e.body_text()))?
        };
        Ok(Self(value))
    }
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
}

/// Client credentials from HTTP Basic authentication (RFC 6749 §2.3.1).
pub fn basic_client_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    headers
        .typed_get::<Authorization<Basic>>()
        .map(|Authorization(basic)| (basic.username().to_string(), basic.password().to_string()))
}
