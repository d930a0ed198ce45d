//! OAuth 2.0 Endpoint Handlers

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::application::dto::request::{AuthorizeQuery, TokenActionRequest, TokenRequest};
use crate::application::dto::response::{AuthorizeResponse, ScopeCatalogResponse, TokenResponse};
use crate::application::services::{Introspection, OAuthError, TokenParams};
use crate::presentation::http::extractors::{basic_client_credentials, OAuthPayload};
use crate::presentation::middleware::SessionUser;
use crate::startup::AppState;

/// Issue an authorization code for the signed-in user
pub async fn authorize(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>, OAuthError> {
    let grant = state.oauth.authorize(user.user_id, query.into()).await?;
    Ok(Json(AuthorizeResponse::from(grant)))
}

/// Token endpoint. Client credentials may arrive in the body or via HTTP Basic.
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    OAuthPayload(body): OAuthPayload<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuthError> {
    let mut params = TokenParams::from(body);
    if let Some((client_id, client_secret)) = basic_client_credentials(&headers) {
        if params.client_id.as_deref().is_some_and(|id| id != client_id) {
            return Err(OAuthError::InvalidRequest(
                "client_id in body does not match Authorization header".into(),
            ));
        }
        params.client_id = Some(client_id);
        params.client_secret = Some(client_secret);
    }

    let tokens = state.oauth.token(params).await?;
    Ok(Json(TokenResponse::from(tokens)))
}

/// Revoke a token. Unknown tokens succeed too (RFC 7009 §2.2).
pub async fn revoke(
    State(state): State<AppState>,
    OAuthPayload(body): OAuthPayload<TokenActionRequest>,
) -> Result<StatusCode, OAuthError> {
    state
        .oauth
        .revoke(&body.token, body.token_type_hint.as_deref())
        .await?;
    Ok(StatusCode::OK)
}

pub async fn introspect(
    State(state): State<AppState>,
    OAuthPayload(body): OAuthPayload<TokenActionRequest>,
) -> Result<Json<Introspection>, OAuthError> {
    let introspection = state
        .oauth
        .introspect(&body.token, body.token_type_hint.as_deref())
        .await?;
    Ok(Json(introspection))
}

/// Public scope catalog
pub async fn scopes() -> Json<ScopeCatalogResponse> {
    Json(ScopeCatalogResponse::current())
}
