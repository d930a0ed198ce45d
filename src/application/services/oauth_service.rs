//! OAuth Protocol Service
//!
//! Parameter-level handling of the authorization, token, revocation and
//! introspection endpoints. Validates protocol inputs and dispatches to the
//! token ledger, which owns all state changes.

use std::sync::Arc;

use tracing::debug;

use super::token_service::{
    is_valid_pkce_value, CodeExchange, Introspection, IssuedGrant, IssuedTokens, OAuthError,
    PkceChallenge, TokenService,
};
use crate::domain::{ApplicationRepository, PkceMethod, ScopeCatalog};

/// `/oauth/authorize` parameters.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// `/oauth/token` parameters. Which fields are required depends on `grant_type`.
#[derive(Debug, Clone, Default)]
pub struct TokenParams {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

pub struct OAuthService {
    applications: Arc<dyn ApplicationRepository>,
    ledger: Arc<TokenService>,
}

impl OAuthService {
    pub fn new(applications: Arc<dyn ApplicationRepository>, ledger: Arc<TokenService>) -> Self {
        Self {
            applications,
            ledger,
        }
    }

    /// Issue an authorization code on behalf of the signed-in user.
    pub async fn authorize(&self, user_id: i64, params: AuthorizeParams) -> Result<IssuedGrant, OAuthError> {
        if params.response_type != "code" {
            return Err(OAuthError::UnsupportedResponseType(params.response_type));
        }
        if params.redirect_uri.is_empty() {
            return Err(OAuthError::InvalidRequest("redirect_uri is required".into()));
        }

        let application = self
            .applications
            .find_by_client_id(&params.client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        let pkce = Self::parse_pkce(
            params.code_challenge,
            params.code_challenge_method.as_deref(),
        )?;
        let requested = ScopeCatalog::parse(params.scope.as_deref());

        self.ledger
            .issue_grant(
                &application,
                user_id,
                &params.redirect_uri,
                &requested,
                pkce,
                params.state,
            )
            .await
    }

    /// Token endpoint dispatch by `grant_type`.
    pub async fn token(&self, params: TokenParams) -> Result<IssuedTokens, OAuthError> {
        debug!(grant_type = %params.grant_type, "Token request");

        match params.grant_type.as_str() {
            "authorization_code" => {
                let exchange = CodeExchange {
                    code: required(params.code, "code")?,
                    redirect_uri: required(params.redirect_uri, "redirect_uri")?,
                    client_id: required(params.client_id, "client_id")?,
                    client_secret: required(params.client_secret, "client_secret")?,
                    code_verifier: params.code_verifier,
                };
                self.ledger.exchange_grant(exchange).await
            }
            "refresh_token" => {
                let refresh_token = required(params.refresh_token, "refresh_token")?;
                let client_id = required(params.client_id, "client_id")?;
                let client_secret = required(params.client_secret, "client_secret")?;
                self.ledger
                    .exchange_refresh_token(&refresh_token, &client_id, &client_secret)
                    .await
            }
            "client_credentials" => {
                let client_id = required(params.client_id, "client_id")?;
                let client_secret = required(params.client_secret, "client_secret")?;
                let requested = ScopeCatalog::parse(params.scope.as_deref());
                self.ledger
                    .issue_client_credentials_token(&client_id, &client_secret, &requested)
                    .await
            }
            "" => Err(OAuthError::InvalidRequest("grant_type is required".into())),
            other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        }
    }

    /// Always succeeds for the caller; a blank token revokes nothing.
    pub async fn revoke(&self, token: &str, token_type_hint: Option<&str>) -> Result<(), OAuthError> {
        if token.is_empty() {
            return Ok(());
        }
        self.ledger.revoke(token, token_type_hint).await
    }

    pub async fn introspect(
        &self,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<Introspection, OAuthError> {
        if token.is_empty() {
            return Err(OAuthError::InvalidRequest("token is required".into()));
        }
        self.ledger.introspect(token, token_type_hint).await
    }

    /// A challenge without a method defaults to `plain` (RFC 7636 §4.3).
    fn parse_pkce(
        challenge: Option<String>,
        method: Option<&str>,
    ) -> Result<Option<PkceChallenge>, OAuthError> {
        match (challenge, method) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(OAuthError::InvalidRequest(
                "code_challenge_method without code_challenge".into(),
            )),
            (Some(challenge), method) => {
                let method = match method {
                    None => PkceMethod::Plain,
                    Some(m) => PkceMethod::parse(m).ok_or_else(|| {
                        OAuthError::InvalidRequest(format!(
                            "unsupported code_challenge_method: {}",
                            m
                        ))
                    })?,
                };
                if !is_valid_pkce_value(&challenge) {
                    return Err(OAuthError::InvalidRequest(
                        "code_challenge must be 43-128 unreserved characters".into(),
                    ));
                }
                Ok(Some(PkceChallenge { challenge, method }))
            }
        }
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, OAuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest(format!("{} is required", name)))
}
