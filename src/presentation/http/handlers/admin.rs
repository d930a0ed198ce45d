//! Approval Workflow Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use super::applications::parse_application_id;
use crate::application::dto::request::ReviewApplicationRequest;
use crate::application::dto::response::ApplicationResponse;
use crate::application::services::ReviewDecision;
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::SessionUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Applications awaiting approval
pub async fn list_pending(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    let pending = state.applications.list_pending(user.requester()).await?;
    Ok(Json(pending.into_iter().map(Into::into).collect()))
}

pub async fn review_application(
    State(state): State<AppState>,
    user: SessionUser,
    Path(application_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ReviewApplicationRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let id = parse_application_id(&application_id)?;
    let application = state
        .applications
        .review(id, user.requester(), body.decision)
        .await?;

    if body.decision == ReviewDecision::Suspend {
        state.gateway.disconnect_application(application.websocket_id);
    }
    if let Some(reason) = body.reason.as_deref() {
        info!(application_id = %id, reason, "Review reason recorded");
    }
    Ok(Json(application.into()))
}
