//! Application Registry Handlers
//!
//! Developer-facing CRUD. Every route here is session-only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{CreateApplicationRequest, UpdateApplicationRequest};
use crate::application::dto::response::{ApplicationResponse, ApplicationSecretResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::SessionUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

pub(super) fn parse_application_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid application ID".into()))
}

/// Register a new application. The client secret is only returned here and
/// from regenerate-secret.
pub async fn create_application(
    State(state): State<AppState>,
    user: SessionUser,
    ValidatedJson(body): ValidatedJson<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationSecretResponse>), AppError> {
    let registered = state
        .applications
        .create(user.requester(), body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(registered.into())))
}

pub async fn list_applications(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    let applications = state.applications.list(user.user_id).await?;
    Ok(Json(applications.into_iter().map(Into::into).collect()))
}

pub async fn get_application(
    State(state): State<AppState>,
    user: SessionUser,
    Path(application_id): Path<String>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let id = parse_application_id(&application_id)?;
    let application = state.applications.get(id, user.user_id).await?;
    Ok(Json(application.into()))
}

pub async fn update_application(
    State(state): State<AppState>,
    user: SessionUser,
    Path(application_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateApplicationRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let id = parse_application_id(&application_id)?;
    let application = state
        .applications
        .update(id, user.requester(), body.into())
        .await?;
    state
        .gateway
        .restrict_application(application.websocket_id, &application.scopes);
    Ok(Json(application.into()))
}

/// Delete an application, revoking its tokens and closing its gateway connection
pub async fn delete_application(
    State(state): State<AppState>,
    user: SessionUser,
    Path(application_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_application_id(&application_id)?;
    let deleted = state.applications.delete(id, user.user_id).await?;
    state.gateway.disconnect_application(deleted.websocket_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn regenerate_secret(
    State(state): State<AppState>,
    user: SessionUser,
    Path(application_id): Path<String>,
) -> Result<Json<ApplicationSecretResponse>, AppError> {
    let id = parse_application_id(&application_id)?;
    let registered = state.applications.regenerate_secret(id, user.user_id).await?;
    Ok(Json(registered.into()))
}
