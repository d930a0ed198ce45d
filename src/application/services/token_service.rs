//! Token Ledger Service
//!
//! Owns every credential state transition after client registration:
//! authorization code issuance and single-use redemption, access/refresh
//! token minting with rotation, revocation, introspection and bearer
//! validation for protected routes.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::OAuthSettings;
use crate::domain::{
    Application, ApplicationRepository, AuthorizationGrant, GrantRepository, OAuthToken,
    PkceMethod, ScopeCatalog, TokenKind, TokenRepository, UserDirectory,
};
use crate::infrastructure::metrics;
use crate::shared::crypto::{self, ACCESS_TOKEN_PREFIX, CODE_PREFIX, REFRESH_TOKEN_PREFIX};
use crate::shared::error::AppError;

/// Grants older than their expiry by this much are purged.
const GRANT_RETENTION_HOURS: i64 = 24;
/// Revoked or expired token rows are kept this long for introspection history.
const TOKEN_RETENTION_DAYS: i64 = 30;

/// OAuth protocol errors, rendered as RFC 6749 §5.2 error bodies.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Client authentication failed")]
    InvalidClient,

    #[error("Authorization grant is invalid, expired or already used")]
    InvalidGrant,

    #[error("Grant was issued to a different client or redirect URI")]
    ClientMismatch,

    #[error("PKCE verification failed")]
    PkceVerificationFailed,

    #[error("redirect_uri is not registered for this client")]
    RedirectMismatch,

    #[error("{0}")]
    InvalidScope(String),

    #[error("Unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("Unsupported response_type: {0}")]
    UnsupportedResponseType(String),

    #[error("Application is not active")]
    ApplicationInactive,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Access token revoked")]
    TokenRevoked,

    #[error("Token lacks the scope required by this endpoint")]
    InsufficientScope,

    #[error("This endpoint requires session authentication")]
    SessionRequired,

    #[error("Internal server error")]
    Internal(#[from] AppError),
}

impl OAuthError {
    /// RFC 6749 / RFC 6750 error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::RedirectMismatch => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant | Self::ClientMismatch | Self::PkceVerificationFailed => {
                "invalid_grant"
            }
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::ApplicationInactive => "unauthorized_client",
            Self::InvalidToken | Self::TokenExpired | Self::TokenRevoked => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::SessionRequired => "access_denied",
            Self::Internal(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::RedirectMismatch
            | Self::InvalidScope(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_) => StatusCode::BAD_REQUEST,
            Self::InvalidClient
            | Self::InvalidGrant
            | Self::ClientMismatch
            | Self::PkceVerificationFailed
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::TokenRevoked => StatusCode::UNAUTHORIZED,
            Self::ApplicationInactive | Self::InsufficientScope | Self::SessionRequired => {
                StatusCode::FORBIDDEN
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct OAuthErrorBody {
    error: &'static str,
    error_description: String,
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            error!(error = %e, "OAuth request failed");
        }

        let status = self.status();
        let body = OAuthErrorBody {
            error: self.error_code(),
            error_description: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();

        if matches!(
            self,
            Self::InvalidToken | Self::TokenExpired | Self::TokenRevoked | Self::InsufficientScope
        ) {
            let challenge = format!("Bearer error=\"{}\"", self.error_code());
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

/// PKCE binding requested at authorization time.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub challenge: String,
    pub method: PkceMethod,
}

/// A freshly issued authorization code.
#[derive(Debug, Clone)]
pub struct IssuedGrant {
    pub code: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub expires_in: i64,
}

/// A freshly minted token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scopes: Vec<String>,
}

/// Inputs for redeeming an authorization code.
#[derive(Debug, Clone)]
pub struct CodeExchange {
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub code_verifier: Option<String>,
}

/// RFC 7662 introspection result. Inactive results carry nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Introspection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Introspection {
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Identity attached to a request authenticated with a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthContext {
    pub token_id: Uuid,
    pub application_id: Uuid,
    pub user_id: Option<i64>,
    pub scopes: Vec<String>,
    pub token_type: &'static str,
    /// Requests per minute allowed for the owning application
    #[serde(skip)]
    pub rate_limit: i32,
}

/// Token ledger service
pub struct TokenService {
    applications: Arc<dyn ApplicationRepository>,
    grants: Arc<dyn GrantRepository>,
    tokens: Arc<dyn TokenRepository>,
    users: Arc<dyn UserDirectory>,
    settings: OAuthSettings,
}

impl TokenService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        grants: Arc<dyn GrantRepository>,
        tokens: Arc<dyn TokenRepository>,
        users: Arc<dyn UserDirectory>,
        settings: OAuthSettings,
    ) -> Self {
        Self {
            applications,
            grants,
            tokens,
            users,
            settings,
        }
    }

    /// Issue a single-use authorization code for `user_id`.
    ///
    /// An empty request grants the application's full scope set; otherwise
    /// the request is narrowed to what the application holds.
    pub async fn issue_grant(
        &self,
        application: &Application,
        user_id: i64,
        redirect_uri: &str,
        requested_scopes: &[String],
        pkce: Option<PkceChallenge>,
        state: Option<String>,
    ) -> Result<IssuedGrant, OAuthError> {
        if !application.is_active() {
            return Err(OAuthError::ApplicationInactive);
        }
        if !application.allows_redirect(redirect_uri) {
            warn!(
                application_id = %application.id,
                redirect_uri,
                "Authorization with unregistered redirect URI"
            );
            return Err(OAuthError::RedirectMismatch);
        }

        let scopes = Self::narrow_scopes(requested_scopes, &application.scopes)?;
        let code = crypto::random_token(CODE_PREFIX);
        let now = Utc::now();
        let ttl = self.settings.authorization_code_ttl_secs;

        let grant = AuthorizationGrant {
            id: Uuid::new_v4(),
            code_hash: crypto::sha256_hex(&code),
            application_id: application.id,
            user_id,
            redirect_uri: redirect_uri.to_string(),
            scopes,
            code_challenge: pkce.as_ref().map(|p| p.challenge.clone()),
            code_challenge_method: pkce.map(|p| p.method),
            state: state.clone(),
            expires_at: now + Duration::seconds(ttl),
            consumed: false,
            created_at: now,
        };
        self.grants.create(&grant).await?;

        info!(
            application_id = %application.id,
            user_id,
            grant_id = %grant.id,
            pkce = grant.code_challenge.is_some(),
            "Authorization code issued"
        );

        Ok(IssuedGrant {
            code,
            redirect_uri: grant.redirect_uri,
            state,
            expires_in: ttl,
        })
    }

    /// Redeem an authorization code for an access/refresh token pair.
    ///
    /// The code is consumed by one conditional write: of any number of
    /// concurrent redemptions exactly one succeeds.
    pub async fn exchange_grant(&self, exchange: CodeExchange) -> Result<IssuedTokens, OAuthError> {
        let now = Utc::now();
        let grant = self
            .grants
            .find_by_code_hash(&crypto::sha256_hex(&exchange.code))
            .await?
            .ok_or(OAuthError::InvalidGrant)?;

        if !grant.is_redeemable(now) {
            if grant.consumed {
                warn!(grant_id = %grant.id, "Replay of consumed authorization code");
            }
            return Err(OAuthError::InvalidGrant);
        }
        if grant.redirect_uri != exchange.redirect_uri {
            return Err(OAuthError::ClientMismatch);
        }

        let application = self
            .authenticate_client(&exchange.client_id, &exchange.client_secret)
            .await?;
        if grant.application_id != application.id {
            warn!(
                grant_id = %grant.id,
                client_id = %exchange.client_id,
                "Authorization code presented by another client"
            );
            return Err(OAuthError::ClientMismatch);
        }

        Self::verify_pkce(&grant, exchange.code_verifier.as_deref())?;

        if !self.grants.consume(grant.id, now).await? {
            warn!(grant_id = %grant.id, "Authorization code lost redemption race");
            return Err(OAuthError::InvalidGrant);
        }

        // Scopes the application lost since authorization are not granted
        let scopes = ScopeCatalog::intersect(&grant.scopes, &application.scopes);
        self.mint(&application, Some(grant.user_id), scopes, true, "authorization_code")
            .await
    }

    /// Exchange a refresh token. The presented token is revoked and a new
    /// pair is issued; replaying it afterwards fails with `InvalidGrant`.
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<IssuedTokens, OAuthError> {
        let application = self.authenticate_client(client_id, client_secret).await?;

        let token = self
            .tokens
            .find_by_refresh_hash(&crypto::sha256_hex(refresh_token))
            .await?
            .ok_or(OAuthError::InvalidGrant)?;

        if token.application_id != application.id {
            warn!(token_id = %token.id, client_id, "Refresh token presented by another client");
            return Err(OAuthError::InvalidGrant);
        }
        if !token.refresh_active(Utc::now()) {
            return Err(OAuthError::InvalidGrant);
        }
        if !self.tokens.revoke(token.id).await? {
            warn!(token_id = %token.id, "Refresh token lost rotation race");
            return Err(OAuthError::InvalidGrant);
        }

        let scopes = ScopeCatalog::intersect(&token.scopes, &application.scopes);
        self.mint(&application, token.user_id, scopes, true, "refresh_token")
            .await
    }

    /// Issue an application-only access token (no user, no refresh token).
    pub async fn issue_client_credentials_token(
        &self,
        client_id: &str,
        client_secret: &str,
        requested_scopes: &[String],
    ) -> Result<IssuedTokens, OAuthError> {
        let application = self.authenticate_client(client_id, client_secret).await?;
        let scopes = Self::narrow_scopes(requested_scopes, &application.scopes)?;
        self.mint(&application, None, scopes, false, "client_credentials")
            .await
    }

    /// Revoke the row holding `token`. Unknown tokens are not an error.
    pub async fn revoke(&self, token: &str, hint: Option<&str>) -> Result<(), OAuthError> {
        match self.lookup(token, TokenKind::from_hint(hint)).await? {
            Some((row, kind)) => {
                let changed = self.tokens.revoke(row.id).await?;
                info!(
                    token_id = %row.id,
                    application_id = %row.application_id,
                    kind = ?kind,
                    changed,
                    "Token revoked"
                );
            }
            None => debug!("Revocation of unknown token"),
        }
        Ok(())
    }

    /// Describe a token. Unknown, revoked, expired and orphaned tokens all
    /// come back as `{active: false}`.
    pub async fn introspect(&self, token: &str, hint: Option<&str>) -> Result<Introspection, OAuthError> {
        let Some((row, kind)) = self.lookup(token, TokenKind::from_hint(hint)).await? else {
            return Ok(Introspection::inactive());
        };

        let now = Utc::now();
        let active = match kind {
            TokenKind::AccessToken => row.access_active(now),
            TokenKind::RefreshToken => row.refresh_active(now),
        };
        if !active {
            return Ok(Introspection::inactive());
        }

        let Some(application) = self.applications.find_by_id(row.application_id).await? else {
            return Ok(Introspection::inactive());
        };
        if !application.is_active() {
            return Ok(Introspection::inactive());
        }

        let username = match row.user_id {
            Some(user_id) => self.users.find_username(user_id).await?,
            None => None,
        };

        Ok(Introspection {
            active: true,
            scope: Some(ScopeCatalog::format(&ScopeCatalog::intersect(
                &row.scopes,
                &application.scopes,
            ))),
            client_id: Some(application.client_id),
            username,
            sub: row.user_id.map(|id| id.to_string()),
            token_type: Some(kind),
            exp: row.expiry_of(kind).map(|t| t.timestamp()),
        })
    }

    /// Resolve a bearer access token to the calling application and user.
    ///
    /// Also records `last_used_at` without holding up the request.
    pub async fn validate_bearer(&self, access_token: &str) -> Result<OAuthContext, OAuthError> {
        let result = self.check_bearer(access_token).await;
        let outcome = match &result {
            Ok(_) => "valid",
            Err(OAuthError::TokenExpired) => "expired",
            Err(OAuthError::TokenRevoked) => "revoked",
            Err(OAuthError::ApplicationInactive) => "inactive_app",
            Err(OAuthError::Internal(_)) => "error",
            Err(_) => "invalid",
        };
        metrics::record_bearer_validation(outcome);

        if let Ok(context) = &result {
            let tokens = Arc::clone(&self.tokens);
            let token_id = context.token_id;
            tokio::spawn(async move {
                if let Err(e) = tokens.touch(token_id, Utc::now()).await {
                    warn!(token_id = %token_id, error = %e, "Failed to record token use");
                }
            });
        }
        result
    }

    /// Drop grants and token rows that can no longer be used.
    pub async fn purge_expired(&self) -> Result<(u64, u64), AppError> {
        let now = Utc::now();
        let grants = self
            .grants
            .purge_expired(now - Duration::hours(GRANT_RETENTION_HOURS))
            .await?;
        let tokens = self
            .tokens
            .purge_expired(now - Duration::days(TOKEN_RETENTION_DAYS))
            .await?;
        Ok((grants, tokens))
    }

    async fn check_bearer(&self, access_token: &str) -> Result<OAuthContext, OAuthError> {
        let token = self
            .tokens
            .find_by_access_hash(&crypto::sha256_hex(access_token))
            .await?
            .ok_or(OAuthError::InvalidToken)?;

        if token.revoked {
            return Err(OAuthError::TokenRevoked);
        }
        if Utc::now() >= token.expires_at {
            return Err(OAuthError::TokenExpired);
        }

        let application = self
            .applications
            .find_by_id(token.application_id)
            .await?
            .ok_or(OAuthError::InvalidToken)?;
        if !application.is_active() {
            return Err(OAuthError::ApplicationInactive);
        }

        Ok(OAuthContext {
            token_id: token.id,
            application_id: application.id,
            user_id: token.user_id,
            // Scopes removed from the application stop applying to live tokens
            scopes: ScopeCatalog::intersect(&token.scopes, &application.scopes),
            token_type: "oauth",
            rate_limit: application.rate_limit,
        })
    }

    /// Authenticate a confidential client by id and secret.
    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Application, OAuthError> {
        let application = self
            .applications
            .find_by_client_id(client_id)
            .await?
            .ok_or(OAuthError::InvalidClient)?;

        if !crypto::verify_secret(client_secret, &application.client_secret_hash)? {
            warn!(client_id, "Client secret mismatch");
            return Err(OAuthError::InvalidClient);
        }
        if !application.is_active() {
            return Err(OAuthError::ApplicationInactive);
        }
        Ok(application)
    }

    /// Look a presented token up as access or refresh credential, trying
    /// the hinted kind first.
    async fn lookup(
        &self,
        token: &str,
        hint: Option<TokenKind>,
    ) -> Result<Option<(OAuthToken, TokenKind)>, OAuthError> {
        let hash = crypto::sha256_hex(token);
        let order = match hint {
            Some(TokenKind::RefreshToken) => [TokenKind::RefreshToken, TokenKind::AccessToken],
            _ => [TokenKind::AccessToken, TokenKind::RefreshToken],
        };

        for kind in order {
            let found = match kind {
                TokenKind::AccessToken => self.tokens.find_by_access_hash(&hash).await?,
                TokenKind::RefreshToken => self.tokens.find_by_refresh_hash(&hash).await?,
            };
            if let Some(row) = found {
                return Ok(Some((row, kind)));
            }
        }
        Ok(None)
    }

    async fn mint(
        &self,
        application: &Application,
        user_id: Option<i64>,
        scopes: Vec<String>,
        with_refresh: bool,
        grant_type: &'static str,
    ) -> Result<IssuedTokens, OAuthError> {
        let now = Utc::now();
        let access_token = crypto::random_token(ACCESS_TOKEN_PREFIX);
        let refresh_token = with_refresh.then(|| crypto::random_token(REFRESH_TOKEN_PREFIX));
        let expires_in = self.settings.access_token_ttl_secs;
        let refresh_expires_at: Option<DateTime<Utc>> = refresh_token
            .as_ref()
            .map(|_| now + Duration::days(self.settings.refresh_token_ttl_days));

        let row = OAuthToken {
            id: Uuid::new_v4(),
            user_id,
            application_id: application.id,
            access_token_hash: crypto::sha256_hex(&access_token),
            refresh_token_hash: refresh_token.as_deref().map(crypto::sha256_hex),
            scopes: scopes.clone(),
            revoked: false,
            expires_at: now + Duration::seconds(expires_in),
            refresh_expires_at,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tokens.create(&row).await?;
        metrics::record_token_issued(grant_type);

        info!(
            token_id = %row.id,
            application_id = %application.id,
            user_id = ?user_id,
            grant_type,
            "Access token issued"
        );

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_in,
            scopes,
        })
    }

    fn narrow_scopes(requested: &[String], allowed: &[String]) -> Result<Vec<String>, OAuthError> {
        if requested.is_empty() {
            return Ok(allowed.to_vec());
        }
        let granted = ScopeCatalog::intersect(requested, allowed);
        if granted.is_empty() {
            return Err(OAuthError::InvalidScope(
                "none of the requested scopes are granted to this client".into(),
            ));
        }
        Ok(granted)
    }

    fn verify_pkce(grant: &AuthorizationGrant, verifier: Option<&str>) -> Result<(), OAuthError> {
        match (&grant.code_challenge, verifier) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(OAuthError::InvalidRequest(
                "code_verifier sent for an authorization without PKCE".into(),
            )),
            (Some(_), None) => Err(OAuthError::PkceVerificationFailed),
            (Some(challenge), Some(verifier)) => {
                if !is_valid_pkce_value(verifier) {
                    return Err(OAuthError::PkceVerificationFailed);
                }
                let computed = match grant.code_challenge_method.unwrap_or(PkceMethod::Plain) {
                    PkceMethod::S256 => crypto::pkce_s256(verifier),
                    PkceMethod::Plain => verifier.to_string(),
                };
                if crypto::constant_time_eq(&computed, challenge) {
                    Ok(())
                } else {
                    Err(OAuthError::PkceVerificationFailed)
                }
            }
        }
    }
}

/// RFC 7636 §4.1: 43-128 characters from the unreserved set.
pub fn is_valid_pkce_value(value: &str) -> bool {
    (43..=128).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}
