//! Request DTOs
//!
//! Data structures for API request bodies and query strings. OAuth
//! parameters accept both the RFC snake_case names and camelCase.

use serde::Deserialize;
use validator::Validate;

use crate::application::services::{
    AuthorizeParams, CreateApplicationDto, ReviewDecision, TokenParams, UpdateApplicationDto,
};
use crate::domain::ApplicationEnvironment;

/// Register application request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub environment: ApplicationEnvironment,

    #[serde(default, alias = "redirect_uris")]
    #[validate(length(max = 10, message = "At most 10 redirect URIs"))]
    pub redirect_uris: Vec<String>,

    #[serde(default)]
    pub scopes: Vec<String>,
}

impl From<CreateApplicationRequest> for CreateApplicationDto {
    fn from(req: CreateApplicationRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            environment: req.environment,
            redirect_uris: req.redirect_uris,
            scopes: req.scopes,
        }
    }
}

/// Update application request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub environment: Option<ApplicationEnvironment>,

    #[serde(alias = "redirect_uris")]
    #[validate(length(max = 10, message = "At most 10 redirect URIs"))]
    pub redirect_uris: Option<Vec<String>>,

    pub scopes: Option<Vec<String>>,
}

impl From<UpdateApplicationRequest> for UpdateApplicationDto {
    fn from(req: UpdateApplicationRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            environment: req.environment,
            redirect_uris: req.redirect_uris,
            scopes: req.scopes,
        }
    }
}

/// Approver decision request
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewApplicationRequest {
    pub decision: ReviewDecision,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// `GET /oauth/authorize` query
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(default, alias = "responseType")]
    pub response_type: String,
    #[serde(default, alias = "clientId")]
    pub client_id: String,
    #[serde(default, alias = "redirectUri")]
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    #[serde(alias = "codeChallenge")]
    pub code_challenge: Option<String>,
    #[serde(alias = "codeChallengeMethod")]
    pub code_challenge_method: Option<String>,
}

impl From<AuthorizeQuery> for AuthorizeParams {
    fn from(q: AuthorizeQuery) -> Self {
        Self {
            response_type: q.response_type,
            client_id: q.client_id,
            redirect_uri: q.redirect_uri,
            scope: q.scope,
            state: q.state,
            code_challenge: q.code_challenge,
            code_challenge_method: q.code_challenge_method,
        }
    }
}

/// `POST /oauth/token` body
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default, alias = "grantType")]
    pub grant_type: String,
    pub code: Option<String>,
    #[serde(alias = "redirectUri")]
    pub redirect_uri: Option<String>,
    #[serde(alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(alias = "clientSecret")]
    pub client_secret: Option<String>,
    #[serde(alias = "codeVerifier")]
    pub code_verifier: Option<String>,
    #[serde(alias = "refreshToken")]
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl From<TokenRequest> for TokenParams {
    fn from(req: TokenRequest) -> Self {
        Self {
            grant_type: req.grant_type,
            code: req.code,
            redirect_uri: req.redirect_uri,
            client_id: req.client_id,
            client_secret: req.client_secret,
            code_verifier: req.code_verifier,
            refresh_token: req.refresh_token,
            scope: req.scope,
        }
    }
}

/// `POST /oauth/revoke` and `POST /oauth/introspect` body
#[derive(Debug, Deserialize)]
pub struct TokenActionRequest {
    #[serde(default)]
    pub token: String,
    #[serde(alias = "tokenTypeHint")]
    pub token_type_hint: Option<String>,
}
