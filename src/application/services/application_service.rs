//! Application Registry Service
//!
//! Lifecycle of third-party OAuth clients: registration with quota and
//! scope rules, owner-scoped reads and updates, secret rotation, approval
//! workflow and deletion with token revocation.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::OAuthSettings;
use crate::domain::{
    Application, ApplicationEnvironment, ApplicationRepository, ApplicationStatus, ScopeCatalog,
    TokenRepository,
};
use crate::shared::crypto;
use crate::shared::error::AppError;
use crate::shared::validation::is_valid_redirect_uri;

/// Attempts at drawing an unused client id before giving up.
const CLIENT_ID_ATTEMPTS: usize = 5;

/// The authenticated user acting on the registry.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub user_id: i64,
    /// May approve applications and grant approval-gated scopes
    pub is_approver: bool,
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct CreateApplicationDto {
    pub name: String,
    pub description: Option<String>,
    pub environment: ApplicationEnvironment,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
}

/// Partial update. `environment` may be sent but must equal the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateApplicationDto {
    pub name: Option<String>,
    pub description: Option<String>,
    pub environment: Option<ApplicationEnvironment>,
    pub redirect_uris: Option<Vec<String>>,
    pub scopes: Option<Vec<String>>,
}

/// An application together with its plaintext secret, returned exactly once.
#[derive(Debug, Clone)]
pub struct RegisteredApplication {
    pub application: Application,
    pub client_secret: String,
}

/// Approver decision on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Suspend,
    Reinstate,
}

impl ReviewDecision {
    /// Target status if the transition from `current` is legal.
    pub fn apply(&self, current: ApplicationStatus) -> Option<ApplicationStatus> {
        use ApplicationStatus::*;
        match (self, current) {
            (Self::Approve, Pending) => Some(Active),
            (Self::Reject, Pending) => Some(Rejected),
            (Self::Suspend, Active) => Some(Suspended),
            (Self::Reinstate, Suspended) => Some(Active),
            _ => None,
        }
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Application not found")]
    NotFound,

    #[error("You do not own this application")]
    Forbidden,

    #[error("Application limit reached ({0} per developer)")]
    QuotaExceeded(usize),

    #[error("You already have a {0} application")]
    EnvironmentTaken(ApplicationEnvironment),

    #[error("Unknown scopes: {}", .0.join(", "))]
    InvalidScope(Vec<String>),

    #[error("Scopes require administrator approval: {}", .0.join(", "))]
    ApprovalRequired(Vec<String>),

    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    #[error("Cannot {decision:?} an application that is {from}")]
    InvalidTransition {
        decision: ReviewDecision,
        from: ApplicationStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<RegistryError> for AppError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound => AppError::NotFound(error.to_string()),
            RegistryError::Forbidden | RegistryError::ApprovalRequired(_) => {
                AppError::Forbidden(error.to_string())
            }
            RegistryError::QuotaExceeded(_) => AppError::QuotaExceeded(error.to_string()),
            RegistryError::EnvironmentTaken(_) => AppError::Conflict(error.to_string()),
            RegistryError::InvalidScope(_)
            | RegistryError::InvalidRedirectUri(_)
            | RegistryError::InvalidTransition { .. }
            | RegistryError::Validation(_) => AppError::Validation(error.to_string()),
            RegistryError::Store(e) => e,
        }
    }
}

/// Application registry service
pub struct ApplicationService {
    applications: Arc<dyn ApplicationRepository>,
    tokens: Arc<dyn TokenRepository>,
    settings: OAuthSettings,
}

impl ApplicationService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        tokens: Arc<dyn TokenRepository>,
        settings: OAuthSettings,
    ) -> Self {
        Self {
            applications,
            tokens,
            settings,
        }
    }

    /// Register a new application for `requester`.
    ///
    /// Development applications are active immediately; production ones wait
    /// for approval. The plaintext secret is only available in the result.
    pub async fn create(
        &self,
        requester: Requester,
        dto: CreateApplicationDto,
    ) -> Result<RegisteredApplication, RegistryError> {
        let name = Self::validate_name(&dto.name)?;
        Self::validate_redirect_uris(&dto.redirect_uris)?;

        let owned = self.applications.find_by_developer(requester.user_id).await?;
        if owned.len() >= self.settings.max_applications_per_developer {
            return Err(RegistryError::QuotaExceeded(
                self.settings.max_applications_per_developer,
            ));
        }
        if owned.iter().any(|a| a.environment == dto.environment) {
            return Err(RegistryError::EnvironmentTaken(dto.environment));
        }

        let scopes = Self::resolve_scopes(&dto.scopes, requester.is_approver)?;
        let client_id = self.unique_client_id().await?;
        let client_secret = crypto::generate_client_secret();
        let client_secret_hash = crypto::hash_secret(&client_secret)?;

        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            developer_id: requester.user_id,
            name,
            description: dto.description.map(|d| d.trim().to_string()),
            environment: dto.environment,
            client_id,
            client_secret_hash,
            websocket_id: Uuid::new_v4(),
            status: dto.environment.initial_status(),
            scopes,
            redirect_uris: dto.redirect_uris,
            rate_limit: self.settings.default_rate_limit,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .applications
            .create(&application)
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration for the same environment
                AppError::Conflict(_) => RegistryError::EnvironmentTaken(dto.environment),
                e => RegistryError::Store(e),
            })?;

        info!(
            application_id = %created.id,
            developer_id = created.developer_id,
            environment = %created.environment,
            status = %created.status,
            "Application registered"
        );

        Ok(RegisteredApplication {
            application: created,
            client_secret,
        })
    }

    /// Fetch an application owned by `owner_id`.
    pub async fn get(&self, id: Uuid, owner_id: i64) -> Result<Application, RegistryError> {
        let application = self
            .applications
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::NotFound)?;

        if !application.is_owned_by(owner_id) {
            return Err(RegistryError::Forbidden);
        }
        Ok(application)
    }

    /// All applications owned by `owner_id`.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<Application>, RegistryError> {
        Ok(self.applications.find_by_developer(owner_id).await?)
    }

    /// Apply a partial update. Scope changes go through the same rules as creation.
    pub async fn update(
        &self,
        id: Uuid,
        requester: Requester,
        patch: UpdateApplicationDto,
    ) -> Result<Application, RegistryError> {
        let mut application = self.get(id, requester.user_id).await?;

        if let Some(environment) = patch.environment {
            if environment != application.environment {
                return Err(RegistryError::Validation(
                    "environment cannot be changed after creation".into(),
                ));
            }
        }
        if let Some(name) = patch.name {
            application.name = Self::validate_name(&name)?;
        }
        if let Some(description) = patch.description {
            let description = description.trim().to_string();
            application.description = (!description.is_empty()).then_some(description);
        }
        if let Some(redirect_uris) = patch.redirect_uris {
            Self::validate_redirect_uris(&redirect_uris)?;
            application.redirect_uris = redirect_uris;
        }
        if let Some(scopes) = patch.scopes {
            application.scopes = Self::resolve_scopes(&scopes, requester.is_approver)?;
        }
        application.updated_at = Utc::now();

        let updated = self.applications.update(&application).await?;
        info!(application_id = %updated.id, "Application updated");
        Ok(updated)
    }

    /// Replace the client secret. The previous secret stops working immediately.
    pub async fn regenerate_secret(
        &self,
        id: Uuid,
        owner_id: i64,
    ) -> Result<RegisteredApplication, RegistryError> {
        let mut application = self.get(id, owner_id).await?;

        let client_secret = crypto::generate_client_secret();
        let hash = crypto::hash_secret(&client_secret)?;
        self.applications.update_secret_hash(id, &hash).await?;
        application.client_secret_hash = hash;

        info!(application_id = %id, "Client secret regenerated");
        Ok(RegisteredApplication {
            application,
            client_secret,
        })
    }

    /// Delete an application and revoke every token issued to it.
    ///
    /// Returns the deleted record so callers can tear down gateway state.
    pub async fn delete(&self, id: Uuid, owner_id: i64) -> Result<Application, RegistryError> {
        let application = self.get(id, owner_id).await?;

        let revoked = self.tokens.revoke_all_for_application(id).await?;
        if !self.applications.delete(id).await? {
            return Err(RegistryError::NotFound);
        }

        info!(
            application_id = %id,
            revoked_tokens = revoked,
            "Application deleted"
        );
        Ok(application)
    }

    /// Applications waiting for approval. Approvers only.
    pub async fn list_pending(&self, requester: Requester) -> Result<Vec<Application>, RegistryError> {
        if !requester.is_approver {
            return Err(RegistryError::Forbidden);
        }
        Ok(self
            .applications
            .find_by_status(ApplicationStatus::Pending)
            .await?)
    }

    /// Apply an approver decision to an application.
    pub async fn review(
        &self,
        id: Uuid,
        requester: Requester,
        decision: ReviewDecision,
    ) -> Result<Application, RegistryError> {
        if !requester.is_approver {
            warn!(
                application_id = %id,
                user_id = requester.user_id,
                "Non-approver attempted application review"
            );
            return Err(RegistryError::Forbidden);
        }

        let mut application = self
            .applications
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::NotFound)?;

        let status = decision
            .apply(application.status)
            .ok_or(RegistryError::InvalidTransition {
                decision,
                from: application.status,
            })?;

        self.applications.update_status(id, status).await?;
        info!(
            application_id = %id,
            reviewer_id = requester.user_id,
            from = %application.status,
            to = %status,
            "Application reviewed"
        );

        application.status = status;
        application.updated_at = Utc::now();
        Ok(application)
    }

    pub async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Application>, RegistryError> {
        Ok(self.applications.find_by_client_id(client_id).await?)
    }

    pub async fn find_by_websocket_id(
        &self,
        websocket_id: Uuid,
    ) -> Result<Option<Application>, RegistryError> {
        Ok(self.applications.find_by_websocket_id(websocket_id).await?)
    }

    /// Resolve the scope set to store for an application.
    ///
    /// Empty means catalog defaults. Otherwise every id must exist, and
    /// approval-gated ids are only accepted from approvers.
    pub fn resolve_scopes(requested: &[String], is_approver: bool) -> Result<Vec<String>, RegistryError> {
        if requested.is_empty() {
            return Ok(ScopeCatalog::default_scopes());
        }

        let validation = ScopeCatalog::validate(requested);
        if !validation.is_valid() {
            return Err(RegistryError::InvalidScope(validation.invalid));
        }

        if !is_approver {
            let gated: Vec<String> = validation
                .valid
                .iter()
                .filter(|id| ScopeCatalog::find(id).is_some_and(|s| s.requires_approval))
                .cloned()
                .collect();
            if !gated.is_empty() {
                return Err(RegistryError::ApprovalRequired(gated));
            }
        }

        Ok(validation.valid)
    }

    fn validate_name(name: &str) -> Result<String, RegistryError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(RegistryError::Validation(
                "name must be 1-100 characters".into(),
            ));
        }
        Ok(name.to_string())
    }

    fn validate_redirect_uris(uris: &[String]) -> Result<(), RegistryError> {
        if uris.len() > 10 {
            return Err(RegistryError::Validation(
                "at most 10 redirect URIs may be registered".into(),
            ));
        }
        match uris.iter().find(|uri| !is_valid_redirect_uri(uri)) {
            Some(bad) => Err(RegistryError::InvalidRedirectUri(bad.clone())),
            None => Ok(()),
        }
    }

    async fn unique_client_id(&self) -> Result<String, RegistryError> {
        for _ in 0..CLIENT_ID_ATTEMPTS {
            let candidate = crypto::generate_client_id();
            if !self.applications.client_id_exists(&candidate).await? {
                return Ok(candidate);
            }
            warn!("Client id collision, drawing again");
        }
        Err(RegistryError::Store(AppError::Internal(
            "could not allocate a unique client id".into(),
        )))
    }
}
